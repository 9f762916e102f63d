pub mod nvidia;

pub use nvidia::{ModelInfo, NvidiaEmbeddings};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Whether text is being stored or searched for; asymmetric embedding
/// models encode the two differently
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingInputType {
    Passage,
    Query,
}

/// Turns text into fixed-length vectors
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed texts for storage, one vector per input in input order
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single search query
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;
}
