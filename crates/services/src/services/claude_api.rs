//! Anthropic Messages API client used for project setup suggestions.

use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const FALLBACK_MODEL: &str = "claude-sonnet-4-20250514";

/// Anthropic's "overloaded" status.
const STATUS_OVERLOADED: u16 = 529;

#[derive(Debug, Clone, Error)]
pub enum ClaudeApiError {
    #[error("ANTHROPIC_API_KEY is not set")]
    MissingApiKey,
    #[error("api key rejected")]
    InvalidApiKey,
    #[error("request failed: {0}")]
    Transport(String),
    #[error("request timed out")]
    Timeout,
    #[error("rate limited by upstream")]
    RateLimited,
    #[error("upstream returned {status}: {body}")]
    Http { status: u16, body: String },
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("reply contained no text")]
    EmptyReply,
}

impl ClaudeApiError {
    /// Transient failures worth another attempt.
    pub fn should_retry(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout | Self::RateLimited => true,
            Self::Http { status, .. } => *status == STATUS_OVERLOADED || *status >= 500,
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClaudeApiConfig {
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl ClaudeApiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: FALLBACK_MODEL.to_string(),
            max_tokens: 2048,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        if let Some(model) = model.filter(|m| !m.trim().is_empty()) {
            self.model = model;
        }
        self
    }
}

#[derive(Debug, Serialize)]
struct Turn<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: [Turn<'a>; 1],
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Block {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<Block>,
    stop_reason: Option<String>,
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct TokenUsage {
    input_tokens: u32,
    output_tokens: u32,
}

impl MessagesResponse {
    /// All text blocks, concatenated.
    fn into_text(self) -> Option<String> {
        let text: String = self
            .content
            .into_iter()
            .filter_map(|block| match block {
                Block::Text { text } => Some(text),
                Block::Other => None,
            })
            .collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

#[derive(Debug, Clone)]
pub struct ClaudeApiClient {
    http: Client,
    config: ClaudeApiConfig,
}

impl ClaudeApiClient {
    /// `ANTHROPIC_API_KEY` plus the optional `ANTHROPIC_MODEL`.
    pub fn from_env() -> Result<Self, ClaudeApiError> {
        let key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| ClaudeApiError::MissingApiKey)?;
        Self::new(key, std::env::var("ANTHROPIC_MODEL").ok())
    }

    pub fn new(api_key: String, model: Option<String>) -> Result<Self, ClaudeApiError> {
        Self::with_config(ClaudeApiConfig::new(api_key).with_model(model))
    }

    pub fn with_config(config: ClaudeApiConfig) -> Result<Self, ClaudeApiError> {
        if config.api_key.trim().is_empty() {
            return Err(ClaudeApiError::MissingApiKey);
        }
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("pipeline-board/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClaudeApiError::Transport(e.to_string()))?;
        Ok(Self { http, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// One user turn in, the reply text out. Transient failures are retried with backoff.
    pub async fn ask(&self, prompt: &str, system: Option<&str>) -> Result<String, ClaudeApiError> {
        let request = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            system,
            messages: [Turn {
                role: "user",
                content: prompt,
            }],
        };

        let response = (|| self.post(&request))
            .retry(retry_policy())
            .when(ClaudeApiError::should_retry)
            .notify(|e, after| warn!(error = %e, retry_in_ms = after.as_millis() as u64, "Completion failed, retrying"))
            .await?;

        if let Some(usage) = &response.usage {
            debug!(
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                stop_reason = ?response.stop_reason,
                "Completion finished"
            );
        }
        response.into_text().ok_or(ClaudeApiError::EmptyReply)
    }

    async fn post(&self, request: &MessagesRequest<'_>) -> Result<MessagesResponse, ClaudeApiError> {
        let res = self
            .http
            .post(MESSAGES_URL)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", API_VERSION)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClaudeApiError::Timeout
                } else {
                    ClaudeApiError::Transport(e.to_string())
                }
            })?;

        let status = res.status();
        if status.is_success() {
            return res
                .json::<MessagesResponse>()
                .await
                .map_err(|e| ClaudeApiError::Decode(e.to_string()));
        }
        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ClaudeApiError::InvalidApiKey,
            StatusCode::TOO_MANY_REQUESTS => ClaudeApiError::RateLimited,
            other => ClaudeApiError::Http {
                status: other.as_u16(),
                body: res.text().await.unwrap_or_default(),
            },
        })
    }
}

fn retry_policy() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(500))
        .with_max_delay(Duration::from_secs(10))
        .with_max_times(3)
        .with_jitter()
}
