#![allow(dead_code)]

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use rag_chatbot::config::Config;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

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

/// Letter-frequency vectors, so identical texts embed identically
pub fn letter_vector(text: &str) -> Vec<f32> {
    let mut counts = vec![0.0_f32; 26];
    for c in text.chars().filter(char::is_ascii_alphabetic) {
        counts[(c.to_ascii_lowercase() as u8 - b'a') as usize] += 1.0;
    }
    counts
}

struct EmbeddingsResponder;

impl Respond for EmbeddingsResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).unwrap_or_default();
        let inputs = body["input"].as_array().cloned().unwrap_or_default();
        let data: Vec<Value> = inputs
            .iter()
            .enumerate()
            .map(|(index, text)| {
                json!({
                    "index": index,
                    "embedding": letter_vector(text.as_str().unwrap_or_default())
                })
            })
            .collect();
        ResponseTemplate::new(200).set_body_json(json!({ "object": "list", "data": data }))
    }
}

struct ChatResponder;

impl Respond for ChatResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).unwrap_or_default();
        let system = body["messages"][0]["content"].as_str().unwrap_or_default();
        ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": format!("From your documents: {}", system) }
            }]
        }))
    }
}

/// In-memory stand-in for the Milvus v2 REST API
#[derive(Clone, Default)]
pub struct FakeMilvus {
    pub exists: Arc<Mutex<bool>>,
    pub rows: Arc<Mutex<Vec<Value>>>,
}

impl Respond for FakeMilvus {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).unwrap_or_default();
        let mut exists = self.exists.lock().expect("lock should not be poisoned");
        let mut rows = self.rows.lock().expect("lock should not be poisoned");

        let data = match request.url.path() {
            "/v2/vectordb/collections/has" => json!({ "has": *exists }),
            "/v2/vectordb/collections/drop" => {
                *exists = false;
                rows.clear();
                json!({})
            }
            "/v2/vectordb/collections/create" => {
                *exists = true;
                json!({})
            }
            "/v2/vectordb/collections/get_stats" => json!({ "rowCount": rows.len() }),
            "/v2/vectordb/entities/insert" => {
                let new_rows = body["data"].as_array().cloned().unwrap_or_default();
                let start = rows.len();
                rows.extend(new_rows.iter().cloned());
                let ids: Vec<usize> = (start..rows.len()).collect();
                json!({ "insertCount": new_rows.len(), "insertIds": ids })
            }
            "/v2/vectordb/entities/search" => {
                let query: Vec<f64> = body["data"][0]
                    .as_array()
                    .map(|v| v.iter().filter_map(Value::as_f64).collect())
                    .unwrap_or_default();
                let limit = body["limit"].as_u64().unwrap_or(4) as usize;
                let mut hits: Vec<(f64, Value)> = rows
                    .iter()
                    .map(|row| {
                        let distance: f64 = row["vector"]
                            .as_array()
                            .map(|v| {
                                v.iter()
                                    .filter_map(Value::as_f64)
                                    .zip(&query)
                                    .map(|(a, b)| (a - b) * (a - b))
                                    .sum()
                            })
                            .unwrap_or_default();
                        (distance, row.clone())
                    })
                    .collect();
                hits.sort_by(|a, b| a.0.total_cmp(&b.0));
                let hits: Vec<Value> = hits
                    .into_iter()
                    .take(limit)
                    .map(|(distance, row)| {
                        json!({
                            "distance": distance,
                            "text": row["text"],
                            "source": row["source"],
                            "page": row["page"],
                            "chunk_index": row["chunk_index"]
                        })
                    })
                    .collect();
                return ResponseTemplate::new(200).set_body_json(json!({ "code": 0, "data": hits }));
            }
            _ => return ResponseTemplate::new(404),
        };

        ResponseTemplate::new(200).set_body_json(json!({ "code": 0, "data": data }))
    }
}

/// Mock embedding, chat and Milvus services behind one server
pub struct MockServices {
    pub server: MockServer,
    pub milvus: FakeMilvus,
}

impl MockServices {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let milvus = FakeMilvus::default();

        Mock::given(method("POST"))
            .and(path("/embeddings/v1/embeddings"))
            .respond_with(EmbeddingsResponder)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/llm/v1/chat/completions"))
            .respond_with(ChatResponder)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path_regex(r"^/v2/vectordb/"))
            .respond_with(milvus.clone())
            .mount(&server)
            .await;

        Self { server, milvus }
    }

    pub fn config(&self, base_dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.base_dir = base_dir.to_path_buf();
        config.llm.url = format!("{}/llm/v1", self.server.uri());
        config.embeddings.url = format!("{}/embeddings/v1", self.server.uri());
        config.vector_store.milvus.url = self.server.uri();
        config
    }

    pub async fn requests_to(&self, target: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == target)
            .count()
    }
}
