
use serde::{Deserialize, Serialize};
use tracing::debug;
use unicode_segmentation::UnicodeSegmentation;

use crate::ingestion::loader::PageDocument;
use crate::vector_store::{ChunkMetadata, DocumentChunk};
use crate::{RagError, Result};

/// Configuration for token-window chunking
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Number of tokens in each window
    pub tokens_per_chunk: usize,
    /// Tokens shared between consecutive windows
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            tokens_per_chunk: 384,
            chunk_overlap: 100,
        }
    }
}

/// A token and its byte span in the source text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenSpan {
    pub start: usize,
    pub end: usize,
}

/// Splits text into fixed-size, overlapping windows of tokens
#[derive(Debug, Clone)]
pub struct TokenTextSplitter {
    tokens_per_chunk: usize,
    chunk_overlap: usize,
}

impl TokenTextSplitter {
    #[inline]
    pub fn new(tokens_per_chunk: usize, chunk_overlap: usize) -> Result<Self> {
        if tokens_per_chunk == 0 {
            return Err(RagError::Config(
                "tokens_per_chunk must be greater than 0".to_string(),
            ));
        }
        if chunk_overlap >= tokens_per_chunk {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be smaller than tokens_per_chunk ({})",
                chunk_overlap, tokens_per_chunk
            )));
        }

        Ok(Self {
            tokens_per_chunk,
            chunk_overlap,
        })
    }

    #[inline]
    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::new(config.tokens_per_chunk, config.chunk_overlap)
    }

    #[inline]
    pub fn tokens_per_chunk(&self) -> usize {
        self.tokens_per_chunk
    }

    #[inline]
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split a single text into window slices
    #[inline]
    pub fn split_text<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return Vec::new();
        }

        let stride = self.tokens_per_chunk - self.chunk_overlap;
        let mut chunks = Vec::new();
        let mut start = 0;

        loop {
            let end = (start + self.tokens_per_chunk).min(tokens.len());
            let span_start = tokens[start].start;
            let span_end = tokens[end - 1].end;
            if let Some(slice) = text.get(span_start..span_end) {
                chunks.push(slice);
            }

            if end == tokens.len() {
                break;
            }
            start += stride;
        }

        chunks
    }

    /// Split loaded pages into chunks, carrying source and page metadata
    #[inline]
    pub fn split_documents(&self, pages: &[PageDocument]) -> Vec<DocumentChunk> {
        let mut chunks = Vec::new();

        for page in pages {
            for (chunk_index, text) in self.split_text(&page.text).into_iter().enumerate() {
                chunks.push(DocumentChunk {
                    text: text.to_string(),
                    metadata: ChunkMetadata {
                        source: page.source.clone(),
                        page: page.page,
                        chunk_index: chunk_index as u32,
                    },
                });
            }
        }

        debug!(
            "Split {} pages into {} chunks ({} tokens, {} overlap)",
            pages.len(),
            chunks.len(),
            self.tokens_per_chunk,
            self.chunk_overlap
        );

        chunks
    }
}

/// Longest run of characters counted as a single token
pub const MAX_TOKEN_CHARS: usize = 16;

/// Tokenize on Unicode word boundaries, dropping whitespace-only segments.
/// Segments longer than [`MAX_TOKEN_CHARS`] are cut into several tokens on
/// char boundaries, so text without spaces still yields bounded windows.
#[inline]
pub fn tokenize(text: &str) -> Vec<TokenSpan> {
    let mut tokens = Vec::new();

    for (start, segment) in text.split_word_bound_indices() {
        if segment.trim().is_empty() {
            continue;
        }

        let mut piece_start = 0;
        for (chars, (offset, _)) in segment.char_indices().enumerate() {
            if chars > 0 && chars % MAX_TOKEN_CHARS == 0 {
                tokens.push(TokenSpan {
                    start: start + piece_start,
                    end: start + offset,
                });
                piece_start = offset;
            }
        }
        tokens.push(TokenSpan {
            start: start + piece_start,
            end: start + segment.len(),
        });
    }

    tokens
}

/// Count tokens the same way the splitter does
#[inline]
pub fn count_tokens(text: &str) -> usize {
    tokenize(text).len()
}
