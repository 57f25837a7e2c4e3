//! Language-model collaborator.
//!
//! [`LanguageModel::complete`] takes a finished [`Prompt`] and returns the raw reply text.
//! Prompt construction and reply parsing live in [`crate::clue`].

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::clue::Prompt;
use crate::config::LlmConfig;

#[derive(Debug, Error)]
pub enum LlmError {
    /// No credential was configured.
    #[error("language model is not configured")]
    Unavailable,
    #[error("language model request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("language model rate limited the request")]
    RateLimited,
    #[error("language model responded with status {0}")]
    Status(StatusCode),
    #[error("language model returned an empty reply")]
    EmptyReply,
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &Prompt) -> Result<String, LlmError>;

    /// False for the unconfigured sentinel.
    fn is_available(&self) -> bool {
        true
    }
}

/// Builds the configured model client, or the [`Unavailable`] sentinel when no key is set.
pub fn from_config(config: &LlmConfig) -> Arc<dyn LanguageModel> {
    let Some(api_key) = config.api_key.clone() else {
        info!("No language model credential configured; clue solving is unavailable");
        return Arc::new(Unavailable);
    };
    match ChatCompletionsClient::new(config, api_key) {
        Ok(client) => {
            info!(model = %config.model, base = %config.base_url, "Language model configured");
            Arc::new(client)
        }
        Err(err) => {
            warn!(error = %err, "failed to build language model client");
            Arc::new(Unavailable)
        }
    }
}

/// Stand-in used when no credential is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unavailable;

#[async_trait]
impl LanguageModel for Unavailable {
    async fn complete(&self, _prompt: &Prompt) -> Result<String, LlmError> {
        Err(LlmError::Unavailable)
    }

    fn is_available(&self) -> bool {
        false
    }
}

/// OpenAI-compatible `/chat/completions` client.
pub struct ChatCompletionsClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl ChatCompletionsClient {
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
        })
    }

    fn request_body(&self, prompt: &Prompt) -> serde_json::Value {
        json!({
            "model": self.model,
            "temperature": 0.2,
            "messages": [
                { "role": "system", "content": prompt.system },
                { "role": "user", "content": prompt.user },
            ],
        })
    }
}

#[async_trait]
impl LanguageModel for ChatCompletionsClient {
    async fn complete(&self, prompt: &Prompt) -> Result<String, LlmError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(prompt))
            .send()
            .await?;
        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => return Err(LlmError::RateLimited),
            status if !status.is_success() => return Err(LlmError::Status(status)),
            _ => {}
        }
        let body: ChatCompletion = response.json().await?;
        reply_text(body).ok_or(LlmError::EmptyReply)
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

fn reply_text(body: ChatCompletion) -> Option<String> {
    body.choices
        .into_iter()
        .filter_map(|choice| choice.message.content)
        .find(|content| !content.trim().is_empty())
}
