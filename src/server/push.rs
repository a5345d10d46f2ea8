//! Push notification delivery.
//!
//! A [`PushSender`] takes one payload and the full token list of one
//! recipient; one call is one dispatch. Callers log failures and move on,
//! nothing here retries.

use async_trait::async_trait;
use log::info;
use serde::Serialize;

use crate::config::PushConfig;
use crate::logutil::escape_log;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    /// Optional routing hint for the client app, e.g. `private-message`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl PushPayload {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            kind: None,
        }
    }

    pub fn with_kind(mut self, kind: &str) -> Self {
        self.kind = Some(kind.to_string());
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("push transport error: {0}")]
    Transport(String),

    #[error("push service rejected request: HTTP {status}")]
    Rejected { status: u16 },

    #[error("push misconfigured: {0}")]
    Config(String),
}

#[async_trait]
pub trait PushSender: Send + Sync {
    async fn send(&self, tokens: &[String], payload: &PushPayload) -> Result<(), PushError>;
}

/// Writes notifications to the log instead of delivering them.
#[derive(Debug, Default, Clone)]
pub struct LogPushSender;

#[async_trait]
impl PushSender for LogPushSender {
    async fn send(&self, tokens: &[String], payload: &PushPayload) -> Result<(), PushError> {
        info!(
            target: "heistline::push",
            "push (not delivered) to {} token(s): [{}] {}",
            tokens.len(),
            escape_log(&payload.title),
            escape_log(&payload.body)
        );
        Ok(())
    }
}

/// Expo-style push API client: one JSON array of messages per dispatch.
#[cfg(feature = "push")]
pub struct ExpoPushSender {
    client: reqwest::Client,
    endpoint: String,
    access_token: Option<String>,
}

#[cfg(feature = "push")]
#[derive(Serialize)]
struct ExpoMessage<'a> {
    to: &'a str,
    title: &'a str,
    body: &'a str,
    sound: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<serde_json::Value>,
}

#[cfg(feature = "push")]
impl ExpoPushSender {
    pub fn new(config: &PushConfig) -> Result<Self, PushError> {
        if config.endpoint.trim().is_empty() {
            return Err(PushError::Config("empty push endpoint".to_string()));
        }
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds.max(1)))
            .build()
            .map_err(|e| PushError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            access_token: config.access_token.clone(),
        })
    }
}

#[cfg(feature = "push")]
#[async_trait]
impl PushSender for ExpoPushSender {
    async fn send(&self, tokens: &[String], payload: &PushPayload) -> Result<(), PushError> {
        if tokens.is_empty() {
            return Ok(());
        }
        let data = payload
            .kind
            .as_ref()
            .map(|kind| serde_json::json!({ "type": kind }));
        let messages: Vec<ExpoMessage<'_>> = tokens
            .iter()
            .map(|to| ExpoMessage {
                to,
                title: &payload.title,
                body: &payload.body,
                sound: "default",
                data: data.clone(),
            })
            .collect();

        let mut request = self.client.post(&self.endpoint).json(&messages);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| PushError::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(PushError::Rejected {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

/// Pick the sender the configuration asks for.
pub fn sender_from_config(
    config: &PushConfig,
) -> Result<std::sync::Arc<dyn PushSender>, PushError> {
    if !config.enabled {
        return Ok(std::sync::Arc::new(LogPushSender));
    }
    #[cfg(feature = "push")]
    {
        Ok(std::sync::Arc::new(ExpoPushSender::new(config)?))
    }
    #[cfg(not(feature = "push"))]
    {
        Err(PushError::Config(
            "push enabled but built without the 'push' feature".to_string(),
        ))
    }
}
