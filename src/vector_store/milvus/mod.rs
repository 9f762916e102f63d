#[cfg(test)]
mod tests;

use anyhow::{Context, Result as AnyResult, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use super::{ChunkMetadata, DocumentChunk, ScoredChunk, VectorStore, validate_batch};
use crate::config::Config;
use crate::http::{HttpClient, endpoint, run_blocking};
use crate::{RagError, Result};

const VARCHAR_MAX_LENGTH: u32 = 65_535;
const OUTPUT_FIELDS: [&str; 4] = ["text", "source", "page", "chunk_index"];

/// Vector store backed by a Milvus server through its v2 REST API
#[derive(Debug, Clone)]
pub struct MilvusStore {
    client: HttpClient,
    base_url: Url,
    db_name: String,
    collection_name: String,
    index_type: String,
    metric_type: String,
    consistency_level: String,
}

/// Every Milvus REST reply carries a status code; zero means success
#[derive(Debug, Deserialize)]
struct MilvusResponse<T> {
    code: i64,
    #[serde(default)]
    message: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CollectionRequest<'a> {
    db_name: &'a str,
    collection_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct HasCollection {
    has: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CollectionStats {
    #[serde(default)]
    row_count: u64,
}

#[derive(Debug, Serialize)]
struct InsertRow<'a> {
    vector: &'a [f32],
    text: &'a str,
    source: &'a str,
    page: u32,
    chunk_index: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InsertRequest<'a> {
    db_name: &'a str,
    collection_name: &'a str,
    data: Vec<InsertRow<'a>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertResult {
    #[serde(default)]
    insert_count: u64,
    #[serde(default)]
    insert_ids: Vec<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    db_name: &'a str,
    collection_name: &'a str,
    data: [&'a [f32]; 1],
    anns_field: &'static str,
    limit: usize,
    output_fields: [&'static str; 4],
    search_params: Value,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    distance: f32,
    #[serde(default)]
    text: String,
    #[serde(default)]
    source: String,
    #[serde(default)]
    page: u32,
    #[serde(default)]
    chunk_index: u32,
}

impl MilvusStore {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let milvus = &config.vector_store.milvus;
        let base_url = milvus.base_url()?;

        let client = HttpClient::new(Duration::from_secs(milvus.timeout_seconds))
            .with_bearer_token(Some(milvus.token.clone()));

        Ok(Self {
            client,
            base_url,
            db_name: milvus.db_name.clone(),
            collection_name: config.vector_store.collection_name.clone(),
            index_type: milvus.index_type.clone(),
            metric_type: milvus.metric_type.clone(),
            consistency_level: milvus.consistency_level.clone(),
        })
    }

    #[inline]
    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    fn call<B, T>(&self, path: &str, body: &B) -> AnyResult<Option<T>>
    where
        B: Serialize + ?Sized,
        T: for<'de> Deserialize<'de>,
    {
        let url = endpoint(&self.base_url, path)?;
        let response: MilvusResponse<T> = self.client.post_json(&url, body)?;

        if response.code != 0 {
            bail!(
                "Milvus {} failed (code {}): {}",
                path,
                response.code,
                response.message.unwrap_or_default()
            );
        }

        Ok(response.data)
    }

    fn collection_request(&self) -> CollectionRequest<'_> {
        CollectionRequest {
            db_name: &self.db_name,
            collection_name: &self.collection_name,
        }
    }

    /// Check whether the collection exists
    #[inline]
    pub fn has_collection(&self) -> AnyResult<bool> {
        let data: Option<HasCollection> =
            self.call("v2/vectordb/collections/has", &self.collection_request())?;
        Ok(data.is_some_and(|d| d.has))
    }

    /// Drop the collection if it exists
    #[inline]
    pub fn drop_collection(&self) -> AnyResult<bool> {
        if !self.has_collection()? {
            debug!("Collection {} does not exist, nothing to drop", self.collection_name);
            return Ok(false);
        }

        info!("Dropping collection {}", self.collection_name);
        let _: Option<Value> =
            self.call("v2/vectordb/collections/drop", &self.collection_request())?;
        Ok(true)
    }

    /// Create the collection with a vector field of the given dimension
    #[inline]
    pub fn create_collection(&self, dimension: usize) -> AnyResult<()> {
        info!(
            "Creating collection {} ({} dimensions, {} index, {} metric)",
            self.collection_name, dimension, self.index_type, self.metric_type
        );

        let request = self.create_request(dimension);
        let _: Option<Value> = self.call("v2/vectordb/collections/create", &request)?;
        Ok(())
    }

    fn create_request(&self, dimension: usize) -> Value {
        json!({
            "dbName": self.db_name,
            "collectionName": self.collection_name,
            "schema": {
                "autoId": true,
                "enableDynamicField": true,
                "fields": [
                    { "fieldName": "pk", "dataType": "Int64", "isPrimary": true },
                    {
                        "fieldName": "vector",
                        "dataType": "FloatVector",
                        "elementTypeParams": { "dim": dimension.to_string() }
                    },
                    {
                        "fieldName": "text",
                        "dataType": "VarChar",
                        "elementTypeParams": { "max_length": VARCHAR_MAX_LENGTH.to_string() }
                    },
                    {
                        "fieldName": "source",
                        "dataType": "VarChar",
                        "elementTypeParams": { "max_length": VARCHAR_MAX_LENGTH.to_string() }
                    },
                    { "fieldName": "page", "dataType": "Int64" },
                    { "fieldName": "chunk_index", "dataType": "Int64" }
                ]
            },
            "indexParams": [{
                "fieldName": "vector",
                "indexName": "vector",
                "metricType": self.metric_type,
                "params": { "index_type": self.index_type }
            }],
            "params": { "consistencyLevel": self.consistency_level }
        })
    }

    /// Insert rows, creating the collection on first use
    #[inline]
    pub fn insert(&self, chunks: &[DocumentChunk], vectors: &[Vec<f32>]) -> AnyResult<Vec<String>> {
        let Some(dimension) = vectors.first().map(Vec::len) else {
            return Ok(Vec::new());
        };

        if !self.has_collection()? {
            self.create_collection(dimension)?;
        }

        let rows = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| InsertRow {
                vector,
                text: &chunk.text,
                source: &chunk.metadata.source,
                page: chunk.metadata.page,
                chunk_index: chunk.metadata.chunk_index,
            })
            .collect();

        let request = InsertRequest {
            db_name: &self.db_name,
            collection_name: &self.collection_name,
            data: rows,
        };

        let result: InsertResult = self
            .call("v2/vectordb/entities/insert", &request)?
            .context("Milvus insert returned no data")?;

        if result.insert_count as usize != chunks.len() {
            bail!(
                "Milvus inserted {} of {} rows",
                result.insert_count,
                chunks.len()
            );
        }

        let ids = result
            .insert_ids
            .into_iter()
            .map(|id| match id {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect();

        info!(
            "Inserted {} records into {}",
            result.insert_count, self.collection_name
        );
        Ok(ids)
    }

    /// Search the collection; a missing collection has no neighbours
    #[inline]
    pub fn search(&self, vector: &[f32], k: usize) -> AnyResult<Vec<ScoredChunk>> {
        if !self.has_collection()? {
            debug!(
                "Collection {} does not exist yet, returning no results",
                self.collection_name
            );
            return Ok(Vec::new());
        }

        let request = SearchRequest {
            db_name: &self.db_name,
            collection_name: &self.collection_name,
            data: [vector],
            anns_field: "vector",
            limit: k,
            output_fields: OUTPUT_FIELDS,
            search_params: json!({ "metricType": self.metric_type }),
        };

        let hits: Vec<SearchHit> = self
            .call("v2/vectordb/entities/search", &request)?
            .unwrap_or_default();

        debug!("Milvus search returned {} hits", hits.len());

        Ok(hits
            .into_iter()
            .map(|hit| ScoredChunk {
                chunk: DocumentChunk {
                    text: hit.text,
                    metadata: ChunkMetadata {
                        source: hit.source,
                        page: hit.page,
                        chunk_index: hit.chunk_index,
                    },
                },
                distance: hit.distance,
            })
            .collect())
    }

    /// Row count of the collection, zero when it does not exist
    #[inline]
    pub fn row_count(&self) -> AnyResult<u64> {
        if !self.has_collection()? {
            return Ok(0);
        }
        let stats: Option<CollectionStats> =
            self.call("v2/vectordb/collections/get_stats", &self.collection_request())?;
        Ok(stats.map_or(0, |s| s.row_count))
    }

    /// List collections in the database, used as a health probe
    #[inline]
    pub fn list_collections(&self) -> AnyResult<Vec<String>> {
        let data: Option<Vec<String>> = self.call(
            "v2/vectordb/collections/list",
            &json!({ "dbName": self.db_name }),
        )?;
        Ok(data.unwrap_or_default())
    }
}

fn store_error(err: anyhow::Error) -> RagError {
    RagError::VectorStore(format!("{:#}", err))
}

#[async_trait]
impl VectorStore for MilvusStore {
    async fn reset(&self) -> Result<()> {
        let store = self.clone();
        run_blocking(move || store.drop_collection().map(|_| ()))
            .await
            .map_err(store_error)
    }

    async fn add_chunks(
        &self,
        chunks: Vec<DocumentChunk>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Vec<String>> {
        if validate_batch(&chunks, &vectors)?.is_none() {
            return Ok(Vec::new());
        }

        let store = self.clone();
        run_blocking(move || store.insert(&chunks, &vectors))
            .await
            .map_err(store_error)
    }

    async fn similarity_search_by_vector(
        &self,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let store = self.clone();
        let vector = vector.to_vec();
        run_blocking(move || store.search(&vector, k))
            .await
            .map_err(store_error)
    }

    async fn count(&self) -> Result<u64> {
        let store = self.clone();
        run_blocking(move || store.row_count())
            .await
            .map_err(store_error)
    }

    fn describe(&self) -> String {
        format!(
            "milvus {} (db {}, collection {})",
            self.base_url, self.db_name, self.collection_name
        )
    }
}
