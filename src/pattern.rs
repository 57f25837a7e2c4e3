use std::fmt;
use std::str::FromStr;

/// Characters accepted as "any letter" placeholders.
pub const WILDCARDS: &[char] = &['_', '?', '.'];

/// Canonical wildcard used when a pattern is rendered back to text.
pub const CANONICAL_WILDCARD: char = '_';

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Slot {
    Fixed(char),
    Any,
}

/// A word shape: one slot per letter, each fixed or open.
///
/// Fixed letters are stored lowercase so comparisons are case-insensitive.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Pattern {
    slots: Vec<Slot>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum PatternError {
    Empty,
    UnsupportedChar { ch: char, position: usize },
}

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternError::Empty => write!(f, "pattern is empty"),
            PatternError::UnsupportedChar { ch, position } => {
                write!(f, "unsupported character {ch:?} at position {position}")
            }
        }
    }
}

impl std::error::Error for PatternError {}

impl Pattern {
    /// Parses a pattern such as `C_T` or `c?t`. Surrounding whitespace is ignored.
    pub fn parse(raw: &str) -> Result<Self, PatternError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(PatternError::Empty);
        }
        let slots = trimmed
            .chars()
            .enumerate()
            .map(|(position, ch)| {
                if WILDCARDS.contains(&ch) {
                    Ok(Slot::Any)
                } else if ch.is_alphabetic() {
                    Ok(Slot::Fixed(fold(ch)))
                } else {
                    Err(PatternError::UnsupportedChar { ch, position })
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { slots })
    }

    /// Number of letter positions.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Fixed letters with their zero-based positions.
    pub fn fixed_letters(&self) -> impl Iterator<Item = (usize, char)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| match slot {
                Slot::Fixed(ch) => Some((idx, *ch)),
                Slot::Any => None,
            })
    }

    pub fn has_fixed_letters(&self) -> bool {
        self.slots.iter().any(|slot| matches!(slot, Slot::Fixed(_)))
    }

    /// True when `word` has the same length and agrees on every fixed slot.
    pub fn matches(&self, word: &str) -> bool {
        let mut letters = word.chars();
        for slot in &self.slots {
            match (slot, letters.next()) {
                (_, None) => return false,
                (Slot::Any, Some(_)) => {}
                (Slot::Fixed(expected), Some(actual)) => {
                    if fold(actual) != *expected {
                        return false;
                    }
                }
            }
        }
        letters.next().is_none()
    }
}

impl FromStr for Pattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Pattern::parse(s)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for slot in &self.slots {
            match slot {
                Slot::Fixed(ch) => write!(f, "{ch}")?,
                Slot::Any => write!(f, "{CANONICAL_WILDCARD}")?,
            }
        }
        Ok(())
    }
}

// Single-char lowercase fold; multi-char expansions (e.g. 'ẞ') keep the input char.
fn fold(ch: char) -> char {
    let mut lower = ch.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(single), None) => single,
        _ => ch,
    }
}
