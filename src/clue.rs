//! Prompt construction and reply parsing for clue solving.
//!
//! Both halves are pure so they can be exercised against literal fixtures without a network.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::pattern::{Pattern, Slot};

/// Lines with more words than this are treated as prose rather than an answer.
const MAX_WORDS_PER_ANSWER: usize = 4;

const NOTE_SEPARATORS: &[&str] = &["|", " - ", " – ", " — ", ": "];

const LABEL_WORDS: &[&str] = &[
    "answer", "answers", "best", "candidate", "candidates", "final", "guess", "guesses", "likely",
    "my", "option", "options", "possible", "suggestion", "suggestions", "top",
];

const SENTENCE_WORDS: &[&str] = &[
    "answer", "are", "be", "could", "fit", "fits", "i", "is", "it", "likely", "maybe", "might",
    "probably", "should", "that", "think", "this", "was", "were", "would",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Uppercase letters only.
    pub answer: String,
    pub note: Option<String>,
    pub definition: Option<String>,
}

impl Candidate {
    pub fn new(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            note: None,
            definition: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    pub fn for_clue(clue: &str, pattern: Option<&Pattern>, max_candidates: usize) -> Self {
        let system = format!(
            "You are an expert crossword solver. Reply with up to {max_candidates} candidate \
             answers, best first, one per line, formatted as `ANSWER | short reason`. \
             Answers must contain letters only. Do not write anything else."
        );
        let mut lines = vec![format!("Clue: {}", clue.trim())];
        if let Some(pattern) = pattern {
            lines.push(format!("Answer length: {} letters", pattern.len()));
            let shape: String = pattern
                .slots()
                .iter()
                .map(|slot| match slot {
                    Slot::Fixed(ch) => ch.to_uppercase().next().unwrap_or(*ch),
                    Slot::Any => '_',
                })
                .collect();
            lines.push(format!("Pattern: {shape} (each _ is an unknown letter)"));
            if pattern.has_fixed_letters() {
                let known = pattern
                    .fixed_letters()
                    .map(|(idx, ch)| format!("position {} = {}", idx + 1, ch.to_uppercase()))
                    .collect::<Vec<_>>()
                    .join(", ");
                lines.push(format!("Known letters: {known}"));
            }
        }
        let mut user = lines.join("\n");
        user.push('\n');
        Self { system, user }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    EmptyReply,
    NoCandidates,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::EmptyReply => write!(f, "model reply was empty"),
            ParseError::NoCandidates => write!(f, "model reply contained no word-like answers"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Extracts candidate answers from a free-text model reply.
///
/// Accepts one answer per line (optionally `ANSWER | note`, `ANSWER - note` or
/// `ANSWER: note`), as well as comma- or semicolon-separated lists. Bullets,
/// numbering, quotes, markdown emphasis, `Answer:` style labels and trailing
/// enumerations such as `(3)` or `(3,5)` are ignored; preamble lines ending in `:`
/// are skipped. Answers come back uppercase with inner spaces, hyphens and
/// apostrophes removed, deduplicated in first-seen order.
pub fn parse_candidates(reply: &str) -> Result<Vec<Candidate>, ParseError> {
    if reply.trim().is_empty() {
        return Err(ParseError::EmptyReply);
    }
    let mut candidates: Vec<Candidate> = Vec::new();
    let mut push = |answer: Option<String>, note: Option<&str>| {
        let Some(answer) = answer else { return };
        if candidates.iter().any(|c| c.answer == answer) {
            return;
        }
        candidates.push(Candidate {
            answer,
            note: note
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string),
            definition: None,
        });
    };

    for raw_line in reply.lines() {
        let line = strip_list_marker(raw_line.trim());
        if line.is_empty() || line.starts_with("```") || line.ends_with(':') {
            continue;
        }
        let line = strip_label(line);
        let (answers, note) = match split_note(line) {
            Some((answers, note)) => (answers, Some(note)),
            None => (line, None),
        };
        for piece in split_list(answers) {
            push(normalize_answer(piece), note);
        }
    }

    if candidates.is_empty() {
        Err(ParseError::NoCandidates)
    } else {
        Ok(candidates)
    }
}

fn strip_list_marker(line: &str) -> &str {
    let line = line.trim_start_matches(['-', '*', '•', '+']).trim_start();
    let digits = line.len() - line.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits > 0 {
        if let Some(rest) = line[digits..].strip_prefix(['.', ')']) {
            return rest.trim_start();
        }
    }
    line
}

/// Drops a leading `Answer:` / `**Suggestions:**` style label.
fn strip_label(line: &str) -> &str {
    let Some((prefix, rest)) = line.split_once(':') else {
        return line;
    };
    let prefix = prefix
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();
    let is_label = !prefix.is_empty()
        && prefix
            .split_whitespace()
            .all(|word| LABEL_WORDS.contains(&word));
    if is_label && !rest.trim().is_empty() {
        rest.trim_start()
    } else {
        line
    }
}

fn split_note(line: &str) -> Option<(&str, &str)> {
    NOTE_SEPARATORS
        .iter()
        .filter_map(|sep| line.find(sep).map(|idx| (idx, sep.len())))
        .min_by_key(|(idx, _)| *idx)
        .map(|(idx, len)| (&line[..idx], &line[idx + len..]))
}

/// Splits on `,` and `;` outside brackets, so `(3,5)` stays with its answer.
fn split_list(text: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (idx, ch) in text.char_indices() {
        match ch {
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            ',' | ';' if depth == 0 => {
                pieces.push(&text[start..idx]);
                start = idx + ch.len_utf8();
            }
            _ => {}
        }
    }
    pieces.push(&text[start..]);
    pieces
}

/// Removes a trailing letter-count such as `(3)`, `(4,5)` or `[3-4]`.
fn strip_enumeration(token: &str) -> &str {
    for (open, close) in [('(', ')'), ('[', ']')] {
        let Some(body) = token.strip_suffix(close) else {
            continue;
        };
        let Some(idx) = body.rfind(open) else {
            continue;
        };
        let inner = &body[idx + open.len_utf8()..];
        if !inner.trim().is_empty()
            && inner
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, ',' | '-' | ' '))
        {
            return token[..idx].trim_end();
        }
    }
    token
}

fn normalize_answer(token: &str) -> Option<String> {
    let token = token
        .trim()
        .trim_end_matches(|c: char| !c.is_alphanumeric() && c != ')' && c != ']');
    let token = strip_enumeration(token).trim_matches(|c: char| !c.is_alphanumeric());
    let words: Vec<&str> = token.split_whitespace().collect();
    if words.is_empty() || words.len() > MAX_WORDS_PER_ANSWER {
        return None;
    }
    if words.len() > 1 && !reads_as_answer(token, &words) {
        return None;
    }
    let letters: String = token
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '\'' | '’'))
        .collect();
    if letters.chars().all(char::is_alphabetic) {
        Some(letters.to_uppercase())
    } else {
        None
    }
}

/// Multi-word phrases are kept when written in capitals (the requested format) or
/// when they contain none of the filler words that mark a sentence.
fn reads_as_answer(token: &str, words: &[&str]) -> bool {
    !token.chars().any(char::is_lowercase)
        || !words
            .iter()
            .any(|word| SENTENCE_WORDS.contains(&word.to_lowercase().as_str()))
}
