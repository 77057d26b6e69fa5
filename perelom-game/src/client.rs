//! Chat-completion transport for the generation collaborator.
//!
//! Requests carry role-tagged messages plus generation parameters; the
//! response yields one generated message whose text content is parsed by
//! [`crate::parse`]. `HttpNarrator` speaks the wire contract directly with
//! a caller-supplied credential, or through a same-origin relay endpoint
//! that injects a server-held credential. Behavior is identical on either
//! path.

use serde::{Deserialize, Serialize};

use crate::Narrator;
use crate::state::{HistoryEntry, Role};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

impl From<&HistoryEntry> for ChatMessage {
    fn from(entry: &HistoryEntry) -> Self {
        match entry.role {
            Role::User => Self::user(entry.content.clone()),
            Role::Assistant => Self::assistant(entry.content.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: String,
}

impl ResponseFormat {
    #[must_use]
    pub fn json_object() -> Self {
        Self {
            kind: "json_object".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

impl ChatRequest {
    /// A JSON-shaped request with the crate's default model.
    #[must_use]
    pub fn json_shaped(messages: Vec<ChatMessage>, temperature: f32, max_tokens: u32) -> Self {
        Self {
            model: crate::constants::DEFAULT_MODEL.to_string(),
            messages,
            temperature,
            max_tokens,
            response_format: Some(ResponseFormat::json_object()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatResponseChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponseChoice {
    pub message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponseMessage {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, thiserror::Error)]
pub enum NarratorError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("generation service returned status {status}: {body}")]
    Api { status: u16, body: String },
    #[error("generation reply contained no choices")]
    EmptyReply,
    #[error("no api key and no relay endpoint configured")]
    Unconfigured,
}

/// Default narrator: an async HTTP client for any chat-completions
/// endpoint. With an API key it talks to `{base_url}/chat/completions`
/// directly; without one it posts the same body to the relay endpoint,
/// which holds the credential server-side.
#[derive(Debug, Clone)]
pub struct HttpNarrator {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    relay_url: Option<String>,
}

impl HttpNarrator {
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key,
            relay_url: None,
        }
    }

    /// Configure the relay endpoint used when no API key is present.
    #[must_use]
    pub fn with_relay(mut self, relay_url: impl Into<String>) -> Self {
        self.relay_url = Some(relay_url.into());
        self
    }

    fn route(&self) -> Result<(String, Option<&str>), NarratorError> {
        if let Some(key) = self.api_key.as_deref() {
            let base = self.base_url.trim_end_matches('/');
            return Ok((format!("{base}/chat/completions"), Some(key)));
        }
        match self.relay_url.as_deref() {
            Some(relay) => Ok((relay.to_string(), None)),
            None => Err(NarratorError::Unconfigured),
        }
    }
}

impl Narrator for HttpNarrator {
    async fn complete(&self, request: ChatRequest) -> Result<String, NarratorError> {
        let (url, bearer) = self.route()?;
        let mut call = self.client.post(url).json(&request);
        if let Some(key) = bearer {
            call = call.bearer_auth(key);
        }
        let response = call.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NarratorError::Api {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(NarratorError::EmptyReply)
    }
}
