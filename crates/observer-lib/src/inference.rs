//! Inference collaborator client
//!
//! The analysis stages delegate all judgment to an external inference
//! service through this narrow seam: a prompt goes in, opaque text comes
//! back. The core never branches on the content of the response.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::InferenceError;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Default per-call timeout; expiry counts as a collaborator failure
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Trait for inference collaborator implementations
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Send a prompt and return the response text
    async fn analyze(&self, prompt: &str, max_tokens: u32) -> Result<String, InferenceError>;
}

/// Client for the Anthropic messages API
pub struct ClaudeClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
}

impl ClaudeClient {
    pub fn new(
        base_url: &str,
        api_key: String,
        model: String,
        timeout_secs: u64,
    ) -> Result<Self, InferenceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            timeout_secs,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl InferenceClient for ClaudeClient {
    async fn analyze(&self, prompt: &str, max_tokens: u32) -> Result<String, InferenceError> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let url = format!("{}/v1/messages", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    InferenceError::Timeout(self.timeout_secs)
                } else {
                    InferenceError::Request(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InferenceError::Status { status, body });
        }

        let body: MessagesResponse = response.json().await?;
        let text = body
            .content
            .into_iter()
            .find_map(|block| block.text)
            .ok_or(InferenceError::EmptyResponse)?;

        debug!(model = %self.model, response_chars = text.len(), "Inference call complete");
        Ok(text)
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: Option<String>,
}
