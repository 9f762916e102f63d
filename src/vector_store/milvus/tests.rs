use super::*;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn create_test_store(server: &MockServer) -> MilvusStore {
    let mut config = Config::default();
    config.vector_store.milvus.url = server.uri();
    MilvusStore::new(&config).expect("should create milvus store")
}

fn chunk(text: &str, page: u32) -> DocumentChunk {
    DocumentChunk {
        text: text.to_string(),
        metadata: ChunkMetadata {
            source: "/tmp/uploads/report.pdf".to_string(),
            page,
            chunk_index: 0,
        },
    }
}

async fn mount_has(server: &MockServer, has: bool) {
    Mock::given(method("POST"))
        .and(path("/v2/vectordb/collections/has"))
        .and(body_partial_json(json!({
            "dbName": "milvus_demo",
            "collectionName": "rag_chatbot"
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "code": 0, "data": { "has": has } })),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn reset_drops_existing_collection() {
    let server = MockServer::start().await;
    mount_has(&server, true).await;

    Mock::given(method("POST"))
        .and(path("/v2/vectordb/collections/drop"))
        .and(header("Authorization", "Bearer postgres:password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": 0, "data": {} })))
        .expect(1)
        .mount(&server)
        .await;

    let store = create_test_store(&server);
    store.reset().await.expect("reset should succeed");
}

#[tokio::test]
async fn reset_skips_missing_collection() {
    let server = MockServer::start().await;
    mount_has(&server, false).await;

    Mock::given(method("POST"))
        .and(path("/v2/vectordb/collections/drop"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": 0, "data": {} })))
        .expect(0)
        .mount(&server)
        .await;

    let store = create_test_store(&server);
    store.reset().await.expect("reset should succeed");
}

#[tokio::test]
async fn first_insert_creates_collection() {
    let server = MockServer::start().await;
    mount_has(&server, false).await;

    Mock::given(method("POST"))
        .and(path("/v2/vectordb/collections/create"))
        .and(body_partial_json(json!({
            "collectionName": "rag_chatbot",
            "schema": { "autoId": true },
            "indexParams": [{ "metricType": "L2", "params": { "index_type": "FLAT" } }],
            "params": { "consistencyLevel": "Strong" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": 0, "data": {} })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v2/vectordb/entities/insert"))
        .and(body_partial_json(json!({
            "data": [
                { "text": "Alpha", "source": "/tmp/uploads/report.pdf", "page": 0, "chunk_index": 0 },
                { "text": "Beta", "source": "/tmp/uploads/report.pdf", "page": 1, "chunk_index": 0 }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "data": { "insertCount": 2, "insertIds": [451, "452"] }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = create_test_store(&server);
    let ids = store
        .add_chunks(
            vec![chunk("Alpha", 0), chunk("Beta", 1)],
            vec![vec![0.1, 0.2, 0.3], vec![0.4, 0.5, 0.6]],
        )
        .await
        .expect("insert should succeed");

    assert_eq!(ids, vec!["451".to_string(), "452".to_string()]);
}

#[test]
fn create_request_uses_first_vector_dimension() {
    let config = Config::default();
    let store = MilvusStore::new(&config).expect("should create milvus store");
    let request = store.create_request(1024);

    assert_eq!(request["schema"]["fields"][1]["elementTypeParams"]["dim"], "1024");
    assert_eq!(request["dbName"], "milvus_demo");
}

#[tokio::test]
async fn empty_insert_sends_nothing() {
    let server = MockServer::start().await;
    let store = create_test_store(&server);

    let ids = store
        .add_chunks(Vec::new(), Vec::new())
        .await
        .expect("empty insert should succeed");

    assert!(ids.is_empty());
    let requests = server.received_requests().await.unwrap_or_default();
    assert!(requests.is_empty());
}

#[tokio::test]
async fn mismatched_batch_is_rejected() {
    let server = MockServer::start().await;
    let store = create_test_store(&server);

    let result = store
        .add_chunks(vec![chunk("Alpha", 0)], vec![vec![0.1], vec![0.2]])
        .await;

    assert!(matches!(result, Err(RagError::VectorStore(_))));
}

#[tokio::test]
async fn search_on_missing_collection_is_empty() {
    let server = MockServer::start().await;
    mount_has(&server, false).await;

    let store = create_test_store(&server);
    let hits = store
        .similarity_search_by_vector(&[0.1, 0.2, 0.3], 4)
        .await
        .expect("search should succeed");

    assert!(hits.is_empty());
}

#[tokio::test]
async fn search_maps_hits() {
    let server = MockServer::start().await;
    mount_has(&server, true).await;

    Mock::given(method("POST"))
        .and(path("/v2/vectordb/entities/search"))
        .and(body_partial_json(json!({
            "annsField": "vector",
            "limit": 4,
            "data": [[0.5, 0.25]],
            "outputFields": ["text", "source", "page", "chunk_index"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "data": [
                { "pk": 1, "distance": 0.0, "text": "Alpha Beta Gamma", "source": "a.pdf", "page": 0, "chunk_index": 0 },
                { "pk": 2, "distance": 1.5, "text": "Delta", "source": "a.pdf", "page": 2, "chunk_index": 3 }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = create_test_store(&server);
    let hits = store
        .similarity_search_by_vector(&[0.5, 0.25], 4)
        .await
        .expect("search should succeed");

    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].chunk.text, "Alpha Beta Gamma");
    assert_eq!(hits[1].chunk.metadata.page, 2);
    assert_eq!(hits[1].chunk.metadata.chunk_index, 3);
    assert!(hits[0].distance <= hits[1].distance);
}

#[tokio::test]
async fn non_zero_code_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2/vectordb/collections/has"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 1800,
            "message": "user hasn't authenticated"
        })))
        .mount(&server)
        .await;

    let store = create_test_store(&server);
    let err = store.count().await.expect_err("count should fail");

    let message = err.to_string();
    assert!(matches!(err, RagError::VectorStore(_)));
    assert!(message.contains("1800"), "unexpected error: {}", message);
    assert!(message.contains("authenticated"), "unexpected error: {}", message);
}

#[tokio::test]
async fn count_reads_row_count() {
    let server = MockServer::start().await;
    mount_has(&server, true).await;

    Mock::given(method("POST"))
        .and(path("/v2/vectordb/collections/get_stats"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "code": 0, "data": { "rowCount": 12 } })),
        )
        .mount(&server)
        .await;

    let store = create_test_store(&server);
    assert_eq!(store.count().await.expect("count should succeed"), 12);
}
