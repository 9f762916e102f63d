pub mod loader;
pub mod splitter;


pub use loader::{PageDocument, is_supported, load_pdf};
pub use splitter::{ChunkingConfig, TokenTextSplitter};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::embeddings::Embedder;
use crate::vector_store::VectorStore;
use crate::{RagError, Result};

/// What one file contributed to the collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub path: PathBuf,
    pub pages: usize,
    pub chunks: usize,
}

/// Loads, splits, embeds and stores documents
#[derive(Clone)]
pub struct Ingestor {
    splitter: TokenTextSplitter,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
}

impl Ingestor {
    #[inline]
    pub fn new(
        splitter: TokenTextSplitter,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            splitter,
            embedder,
            store,
        }
    }

    #[inline]
    pub fn splitter(&self) -> &TokenTextSplitter {
        &self.splitter
    }

    /// Ingest one file and report what was stored
    #[inline]
    pub async fn ingest_file(&self, path: &Path) -> Result<IngestReport> {
        if !is_supported(path) {
            return Err(RagError::UnsupportedFormat(path.display().to_string()));
        }

        debug!("Loading {}", path.display());
        let owned = path.to_path_buf();
        let pages = tokio::task::spawn_blocking(move || load_pdf(&owned))
            .await
            .map_err(|e| RagError::Document(format!("PDF loading task failed: {}", e)))??;

        if pages.is_empty() {
            warn!("No text extracted from {}", path.display());
        }

        let chunks = self.splitter.split_documents(&pages);
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed_documents(&texts).await?;
        let ids = self.store.add_chunks(chunks, vectors).await?;

        info!(
            "Ingested {} ({} pages, {} chunks)",
            path.display(),
            pages.len(),
            ids.len()
        );

        Ok(IngestReport {
            path: path.to_path_buf(),
            pages: pages.len(),
            chunks: ids.len(),
        })
    }

    /// Ingest files in order; the first failure aborts and is returned as is
    #[inline]
    pub async fn ingest_files(&self, paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let mut processed = Vec::with_capacity(paths.len());
        for path in paths {
            let report = self.ingest_file(path).await?;
            processed.push(report.path);
        }
        Ok(processed)
    }
}
