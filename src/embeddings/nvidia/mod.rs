
use anyhow::{Context, Result as AnyResult, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::{Embedder, EmbeddingInputType};
use crate::config::EmbeddingsConfig;
use crate::http::{HttpClient, endpoint, run_blocking};
use crate::{RagError, Result};

/// Client for an OpenAI-compatible `/embeddings` endpoint such as NVIDIA NIM
#[derive(Debug, Clone)]
pub struct NvidiaEmbeddings {
    base_url: Url,
    model: String,
    batch_size: u32,
    truncate: String,
    client: HttpClient,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    input: &'a [String],
    model: &'a str,
    input_type: EmbeddingInputType,
    encoding_format: &'static str,
    truncate: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub owned_by: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    data: Vec<ModelInfo>,
}

impl NvidiaEmbeddings {
    #[inline]
    pub fn new(config: &EmbeddingsConfig) -> Result<Self> {
        let base_url = config.base_url()?;

        Ok(Self {
            base_url,
            model: config.model.clone(),
            batch_size: config.batch_size.max(1),
            truncate: config.truncate.clone(),
            client: HttpClient::new(Duration::from_secs(config.timeout_seconds)),
        })
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.client = self.client.with_retry_attempts(attempts);
        self
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Check the server answers and serves the configured model
    #[inline]
    pub fn health_check(&self) -> AnyResult<()> {
        debug!("Performing health check for embeddings at {}", self.base_url);

        self.validate_model().context("Model validation failed")?;

        info!(
            "Health check passed for embeddings server at {} with model {}",
            self.base_url, self.model
        );
        Ok(())
    }

    /// Validate that the configured model is available
    #[inline]
    pub fn validate_model(&self) -> AnyResult<()> {
        let models = self.list_models().context("Failed to list models")?;

        if models.iter().any(|m| m.id == self.model) {
            debug!("Model {} is available", self.model);
            Ok(())
        } else {
            let available: Vec<&str> = models.iter().map(|m| m.id.as_str()).collect();
            warn!(
                "Model {} not found. Available models: {:?}",
                self.model, available
            );
            Err(anyhow!(
                "Model '{}' is not available. Available models: {:?}",
                self.model,
                available
            ))
        }
    }

    /// List the models served at `{url}/models`
    #[inline]
    pub fn list_models(&self) -> AnyResult<Vec<ModelInfo>> {
        let url = endpoint(&self.base_url, "models")?;
        let text = self.client.get_text(&url).context("Failed to fetch models")?;
        let response: ModelsResponse =
            serde_json::from_str(&text).context("Failed to parse models response")?;

        debug!("Found {} models", response.data.len());
        Ok(response.data)
    }

    /// Embed texts in batches of the configured size
    #[inline]
    pub fn embed(
        &self,
        texts: &[String],
        input_type: EmbeddingInputType,
    ) -> AnyResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating {:?} embeddings for {} texts", input_type, texts.len());

        let mut results = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size as usize) {
            let vectors = self
                .embed_single_batch(batch, input_type)
                .with_context(|| format!("Failed to process batch of {} texts", batch.len()))?;
            results.extend(vectors);
        }

        debug!("Generated {} embeddings total", results.len());
        Ok(results)
    }

    fn embed_single_batch(
        &self,
        texts: &[String],
        input_type: EmbeddingInputType,
    ) -> AnyResult<Vec<Vec<f32>>> {
        let url = endpoint(&self.base_url, "embeddings")?;
        let request = EmbedRequest {
            input: texts,
            model: &self.model,
            input_type,
            encoding_format: "float",
            truncate: &self.truncate,
        };

        let mut response: EmbedResponse = self
            .client
            .post_json(&url, &request)
            .context("Failed to generate embeddings")?;

        if response.data.len() != texts.len() {
            return Err(anyhow!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                response.data.len()
            ));
        }

        response.data.sort_by_key(|d| d.index);
        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }
}

fn embedding_error(err: anyhow::Error) -> RagError {
    RagError::Embedding(format!("{:#}", err))
}

#[async_trait]
impl Embedder for NvidiaEmbeddings {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let client = self.clone();
        let texts = texts.to_vec();
        run_blocking(move || client.embed(&texts, EmbeddingInputType::Passage))
            .await
            .map_err(embedding_error)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let client = self.clone();
        let texts = vec![text.to_string()];
        let mut vectors = run_blocking(move || client.embed(&texts, EmbeddingInputType::Query))
            .await
            .map_err(embedding_error)?;

        vectors
            .pop()
            .ok_or_else(|| RagError::Embedding("No embedding returned for query".to_string()))
    }
}
