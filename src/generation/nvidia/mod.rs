
use anyhow::{Context, Result as AnyResult, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use super::{ChatMessage, ChatModel};
use crate::config::LlmConfig;
use crate::http::{HttpClient, endpoint, run_blocking};
use crate::{RagError, Result};

/// Client for an OpenAI-compatible `/chat/completions` endpoint
#[derive(Debug, Clone)]
pub struct NvidiaChat {
    base_url: Url,
    model: String,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    client: HttpClient,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
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

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

impl NvidiaChat {
    #[inline]
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            base_url: config.base_url()?,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            client: HttpClient::new(Duration::from_secs(config.timeout_seconds)),
        })
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Check the server answers and serves the configured model
    #[inline]
    pub fn health_check(&self) -> AnyResult<()> {
        let url = endpoint(&self.base_url, "models")?;
        debug!("Performing health check for LLM at {}", url);

        let text = self.client.get_text(&url).context("Failed to fetch models")?;
        let models: ModelsResponse =
            serde_json::from_str(&text).context("Failed to parse models response")?;

        if !models.data.iter().any(|m| m.id == self.model) {
            let available: Vec<&str> = models.data.iter().map(|m| m.id.as_str()).collect();
            return Err(anyhow!(
                "Model '{}' is not available. Available models: {:?}",
                self.model,
                available
            ));
        }

        info!(
            "Health check passed for LLM server at {} with model {}",
            self.base_url, self.model
        );
        Ok(())
    }

    /// Send one non-streaming completion request
    #[inline]
    pub fn chat(&self, messages: &[ChatMessage]) -> AnyResult<String> {
        let url = endpoint(&self.base_url, "chat/completions")?;
        let request = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        debug!(
            "Requesting completion from {} with {} messages",
            self.model,
            messages.len()
        );

        let response: ChatResponse = self
            .client
            .post_json(&url, &request)
            .context("Failed to generate completion")?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .context("Completion response contained no choices")?;

        let answer = choice.message.content.unwrap_or_default();
        debug!("Received completion of {} characters", answer.len());
        Ok(answer)
    }
}

#[async_trait]
impl ChatModel for NvidiaChat {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let client = self.clone();
        let messages = messages.to_vec();
        run_blocking(move || client.chat(&messages))
            .await
            .map_err(|e| RagError::Generation(format!("{:#}", e)))
    }
}
