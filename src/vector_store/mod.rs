// Vector store module
// Collections of (generated id, embedding, chunk text + metadata) records


pub mod lance;
pub mod milvus;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::{Config, VectorBackend};
use crate::{RagError, Result};

pub use lance::LanceStore;
pub use milvus::MilvusStore;

/// Where a chunk came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Originating file
    pub source: String,
    /// Zero-based page within the file
    pub page: u32,
    /// Zero-based window index within the page
    pub chunk_index: u32,
}

/// A span of document text, the unit of retrieval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// A chunk returned by similarity search
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: DocumentChunk,
    /// Distance to the query under the collection's metric (lower is closer)
    pub distance: f32,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Drop the collection if it exists
    async fn reset(&self) -> Result<()>;

    /// Append chunks with their vectors, returning the generated record ids
    async fn add_chunks(
        &self,
        chunks: Vec<DocumentChunk>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Vec<String>>;

    /// Nearest `k` records to the vector, closest first
    async fn similarity_search_by_vector(
        &self,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>>;

    /// Number of stored records
    async fn count(&self) -> Result<u64>;

    /// Short human-readable description of the backend
    fn describe(&self) -> String;
}

/// Check that chunks and vectors line up and share one dimensionality
#[inline]
pub fn validate_batch(chunks: &[DocumentChunk], vectors: &[Vec<f32>]) -> Result<Option<usize>> {
    if chunks.len() != vectors.len() {
        return Err(RagError::VectorStore(format!(
            "Mismatch between chunk and vector counts: {} vs {}",
            chunks.len(),
            vectors.len()
        )));
    }

    let Some(first) = vectors.first() else {
        return Ok(None);
    };
    let dimension = first.len();
    if dimension == 0 {
        return Err(RagError::VectorStore("Empty embedding vector".to_string()));
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
        return Err(RagError::VectorStore(format!(
            "Inconsistent vector dimensions in batch: {} vs {}",
            dimension,
            bad.len()
        )));
    }

    Ok(Some(dimension))
}

/// Build the store selected in the configuration
#[inline]
pub async fn from_config(config: &Config) -> Result<Arc<dyn VectorStore>> {
    match config.vector_store.backend {
        VectorBackend::Milvus => Ok(Arc::new(MilvusStore::new(config)?)),
        VectorBackend::Lancedb => Ok(Arc::new(LanceStore::new(config).await?)),
    }
}
