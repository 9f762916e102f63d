
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::Result;
use crate::chain::{RagAnswer, RagChain};
use crate::config::Config;
use crate::embeddings::{Embedder, NvidiaEmbeddings};
use crate::generation::{ChatModel, NvidiaChat};
use crate::ingestion::{IngestReport, Ingestor, TokenTextSplitter};
use crate::vector_store::{self, VectorStore};

/// The two entry points of the chatbot: upload documents and ask questions
#[derive(Clone)]
pub struct RagPipeline {
    ingestor: Ingestor,
    chain: RagChain,
    store: Arc<dyn VectorStore>,
}

impl RagPipeline {
    /// Assemble a pipeline from already-built stages
    #[inline]
    pub fn new(
        config: &Config,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        llm: Arc<dyn ChatModel>,
    ) -> Result<Self> {
        let splitter = TokenTextSplitter::from_config(&config.chunking)?;
        let ingestor = Ingestor::new(splitter, Arc::clone(&embedder), Arc::clone(&store));
        let chain = RagChain::new(embedder, Arc::clone(&store), llm)
            .with_top_k(config.retrieval.top_k);

        Ok(Self {
            ingestor,
            chain,
            store,
        })
    }

    /// Build the remote clients from configuration without touching the
    /// collection
    #[inline]
    pub async fn connect(config: &Config) -> Result<Self> {
        let embedder: Arc<dyn Embedder> = Arc::new(NvidiaEmbeddings::new(&config.embeddings)?);
        let llm: Arc<dyn ChatModel> = Arc::new(NvidiaChat::new(&config.llm)?);
        let store = vector_store::from_config(config).await?;

        Self::new(config, embedder, store, llm)
    }

    /// Build the pipeline for a fresh chat session, dropping the old
    /// collection first when `drop_old` is set
    #[inline]
    pub async fn from_config(config: &Config) -> Result<Self> {
        let pipeline = Self::connect(config).await?;
        if config.vector_store.drop_old {
            info!("Dropping previous collection ({})", pipeline.store.describe());
            pipeline.store.reset().await?;
        }

        Ok(pipeline)
    }

    #[inline]
    pub fn ingestor(&self) -> &Ingestor {
        &self.ingestor
    }

    #[inline]
    pub fn chain(&self) -> &RagChain {
        &self.chain
    }

    #[inline]
    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Upload documents into the collection
    #[inline]
    pub async fn upload(&self, paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
        self.ingestor.ingest_files(paths).await
    }

    #[inline]
    pub async fn ingest_file(&self, path: &std::path::Path) -> Result<IngestReport> {
        self.ingestor.ingest_file(path).await
    }

    /// Answer one chat message
    #[inline]
    pub async fn chat(&self, message: &str) -> Result<String> {
        self.chain.invoke(message).await
    }

    #[inline]
    pub async fn ask(&self, question: &str) -> Result<RagAnswer> {
        self.chain.answer(question).await
    }
}
