
use std::sync::Arc;
use tracing::{debug, info};

use crate::Result;
use crate::embeddings::Embedder;
use crate::generation::{ChatModel, ChatPromptTemplate, format_context};
use crate::vector_store::{ScoredChunk, VectorStore};

pub const DEFAULT_TOP_K: usize = 4;

/// An answer together with the chunks it was generated from
#[derive(Debug, Clone)]
pub struct RagAnswer {
    pub answer: String,
    pub sources: Vec<ScoredChunk>,
}

/// Retrieval followed by generation
#[derive(Clone)]
pub struct RagChain {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    llm: Arc<dyn ChatModel>,
    prompt: ChatPromptTemplate,
    top_k: usize,
}

impl RagChain {
    #[inline]
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        llm: Arc<dyn ChatModel>,
    ) -> Self {
        Self {
            embedder,
            store,
            llm,
            prompt: ChatPromptTemplate::default(),
            top_k: DEFAULT_TOP_K,
        }
    }

    #[inline]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    #[inline]
    pub fn with_prompt(mut self, prompt: ChatPromptTemplate) -> Self {
        self.prompt = prompt;
        self
    }

    #[inline]
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Embed the question in query mode and fetch the nearest chunks
    #[inline]
    pub async fn retrieve(&self, question: &str) -> Result<Vec<ScoredChunk>> {
        let query = self.embedder.embed_query(question).await?;
        let hits = self
            .store
            .similarity_search_by_vector(&query, self.top_k)
            .await?;

        debug!("Retrieved {} chunks for question", hits.len());
        Ok(hits)
    }

    /// Answer a question, keeping the retrieved chunks
    #[inline]
    pub async fn answer(&self, question: &str) -> Result<RagAnswer> {
        let sources = self.retrieve(question).await?;
        let context = format_context(&sources);
        let messages = self.prompt.render(&context, question);

        let answer = self.llm.complete(&messages).await?;
        info!(
            "Answered question using {} retrieved chunks ({} characters)",
            sources.len(),
            answer.len()
        );

        Ok(RagAnswer { answer, sources })
    }

    /// Answer a question with the model's text only
    #[inline]
    pub async fn invoke(&self, question: &str) -> Result<String> {
        Ok(self.answer(question).await?.answer)
    }
}
