// In-process stand-ins for the remote services, shared by unit tests

use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use std::sync::Mutex;

use crate::embeddings::Embedder;
use crate::generation::{ChatMessage, ChatModel};
use crate::vector_store::{DocumentChunk, ScoredChunk, VectorStore, validate_batch};
use crate::{RagError, Result};

const LETTERS: usize = 26;

/// Build a PDF with one page per entry, each drawing its text in Courier
pub fn build_pdf(pages: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("content should encode"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let page_count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("pdf should serialize");
    bytes
}

/// Letter-frequency embedding: identical texts map to identical vectors
#[derive(Debug, Default)]
pub struct LetterEmbedder {
    pub queries: Mutex<Vec<String>>,
}

impl LetterEmbedder {
    pub fn vector(text: &str) -> Vec<f32> {
        let mut counts = vec![0.0_f32; LETTERS + 1];
        for c in text.chars().filter(char::is_ascii_alphabetic) {
            let slot = (c.to_ascii_lowercase() as u8 - b'a') as usize;
            counts[slot] += 1.0;
        }
        counts[LETTERS] = text.split_whitespace().count() as f32;
        counts
    }
}

#[async_trait]
impl Embedder for LetterEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.queries
            .lock()
            .expect("lock should not be poisoned")
            .push(text.to_string());
        Ok(Self::vector(text))
    }
}

/// Brute-force L2 store kept in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub records: Mutex<Vec<(String, DocumentChunk, Vec<f32>)>>,
}

impl MemoryStore {
    pub fn chunks(&self) -> Vec<DocumentChunk> {
        self.records
            .lock()
            .expect("lock should not be poisoned")
            .iter()
            .map(|(_, chunk, _)| chunk.clone())
            .collect()
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn reset(&self) -> Result<()> {
        self.records
            .lock()
            .expect("lock should not be poisoned")
            .clear();
        Ok(())
    }

    async fn add_chunks(
        &self,
        chunks: Vec<DocumentChunk>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Vec<String>> {
        if validate_batch(&chunks, &vectors)?.is_none() {
            return Ok(Vec::new());
        }

        let mut records = self.records.lock().expect("lock should not be poisoned");
        let mut ids = Vec::with_capacity(chunks.len());
        for (chunk, vector) in chunks.into_iter().zip(vectors) {
            let id = format!("mem-{}", records.len());
            ids.push(id.clone());
            records.push((id, chunk, vector));
        }
        Ok(ids)
    }

    async fn similarity_search_by_vector(
        &self,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let records = self.records.lock().expect("lock should not be poisoned");
        let mut hits: Vec<ScoredChunk> = records
            .iter()
            .map(|(_, chunk, stored)| ScoredChunk {
                chunk: chunk.clone(),
                distance: stored
                    .iter()
                    .zip(vector)
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum(),
            })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(k);
        Ok(hits)
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.records.lock().expect("lock should not be poisoned").len() as u64)
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// Chat model that records prompts and answers with the context it was given
#[derive(Debug, Default)]
pub struct EchoChat {
    pub prompts: Mutex<Vec<Vec<ChatMessage>>>,
    pub fail: bool,
}

impl EchoChat {
    pub fn failing() -> Self {
        Self {
            prompts: Mutex::default(),
            fail: true,
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().expect("lock should not be poisoned").len()
    }

    pub fn last_prompt(&self) -> Option<Vec<ChatMessage>> {
        self.prompts
            .lock()
            .expect("lock should not be poisoned")
            .last()
            .cloned()
    }
}

#[async_trait]
impl ChatModel for EchoChat {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.prompts
            .lock()
            .expect("lock should not be poisoned")
            .push(messages.to_vec());

        if self.fail {
            return Err(RagError::Generation("model unavailable".to_string()));
        }

        let system = messages.first().map_or("", |m| m.content.as_str());
        Ok(format!("The documents say: {}", system))
    }
}
