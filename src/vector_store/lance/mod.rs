
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::{
    Connection,
    query::{ExecutableQuery, QueryBase},
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use super::{ChunkMetadata, DocumentChunk, ScoredChunk, VectorStore, validate_batch};
use crate::config::Config;
use crate::{RagError, Result};

/// Vector store using an embedded LanceDB table under the config directory
pub struct LanceStore {
    connection: Connection,
    table_name: String,
    db_path: PathBuf,
}

impl LanceStore {
    /// Open (or create) the LanceDB database at the configured path
    #[inline]
    pub async fn new(config: &Config) -> Result<Self> {
        let db_path = config.lancedb_path();
        debug!("Initializing LanceDB at path: {:?}", db_path);

        std::fs::create_dir_all(&db_path).map_err(|e| {
            RagError::VectorStore(format!("Failed to create vector database directory: {}", e))
        })?;

        let uri = format!("file://{}", db_path.display());
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| RagError::VectorStore(format!("Failed to connect to LanceDB: {}", e)))?;

        info!("LanceDB vector store opened at {}", db_path.display());
        Ok(Self {
            connection,
            table_name: config.vector_store.collection_name.clone(),
            db_path,
        })
    }

    async fn table_exists(&self) -> Result<bool> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| RagError::VectorStore(format!("Failed to list tables: {}", e)))?;

        Ok(table_names.contains(&self.table_name))
    }

    async fn open_table(&self) -> Result<lancedb::Table> {
        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| RagError::VectorStore(format!("Failed to open table: {}", e)))
    }

    /// Detect vector dimension from existing table schema
    async fn detect_existing_vector_dimension(&self) -> Result<usize> {
        let table = self.open_table().await?;
        let schema = table
            .schema()
            .await
            .map_err(|e| RagError::VectorStore(format!("Failed to get table schema: {}", e)))?;

        for field in schema.fields() {
            if field.name() == "vector" {
                if let DataType::FixedSizeList(_, size) = field.data_type() {
                    return Ok(*size as usize);
                }
            }
        }

        Err(RagError::VectorStore(
            "Could not find vector column or determine dimension".to_string(),
        ))
    }

    fn create_schema(vector_dim: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    vector_dim as i32,
                ),
                false,
            ),
            Field::new("text", DataType::Utf8, false),
            Field::new("source", DataType::Utf8, false),
            Field::new("page", DataType::UInt32, false),
            Field::new("chunk_index", DataType::UInt32, false),
        ]))
    }

    /// Make sure the table exists with the given vector dimension
    async fn ensure_table(&self, vector_dim: usize) -> Result<()> {
        if self.table_exists().await? {
            let existing = self.detect_existing_vector_dimension().await?;
            if existing != vector_dim {
                return Err(RagError::VectorStore(format!(
                    "Collection {} stores {}-dimensional vectors, got {}",
                    self.table_name, existing, vector_dim
                )));
            }
            return Ok(());
        }

        info!(
            "Creating table {} with vector dimension {}",
            self.table_name, vector_dim
        );
        self.connection
            .create_empty_table(&self.table_name, Self::create_schema(vector_dim))
            .execute()
            .await
            .map_err(|e| RagError::VectorStore(format!("Failed to create table: {}", e)))?;

        Ok(())
    }

    fn create_record_batch(
        ids: &[String],
        chunks: &[DocumentChunk],
        vectors: &[Vec<f32>],
        vector_dim: usize,
    ) -> Result<RecordBatch> {
        let mut flat_values = Vec::with_capacity(vectors.len() * vector_dim);
        for vector in vectors {
            flat_values.extend_from_slice(vector);
        }
        let values_array = Float32Array::from(flat_values);
        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array =
            FixedSizeListArray::try_new(field, vector_dim as i32, Arc::new(values_array), None)
                .map_err(|e| {
                    RagError::VectorStore(format!("Failed to create vector array: {}", e))
                })?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from_iter_values(ids.iter())),
            Arc::new(vector_array),
            Arc::new(StringArray::from_iter_values(chunks.iter().map(|c| &c.text))),
            Arc::new(StringArray::from_iter_values(
                chunks.iter().map(|c| &c.metadata.source),
            )),
            Arc::new(UInt32Array::from_iter_values(
                chunks.iter().map(|c| c.metadata.page),
            )),
            Arc::new(UInt32Array::from_iter_values(
                chunks.iter().map(|c| c.metadata.chunk_index),
            )),
        ];

        RecordBatch::try_new(Self::create_schema(vector_dim), arrays)
            .map_err(|e| RagError::VectorStore(format!("Failed to create record batch: {}", e)))
    }

    /// Parse a single record batch from search results
    fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<ScoredChunk>> {
        let texts = string_column(batch, "text")?;
        let sources = string_column(batch, "source")?;
        let pages = u32_column(batch, "page")?;
        let chunk_indices = u32_column(batch, "chunk_index")?;
        let distances = batch
            .column_by_name("_distance")
            .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

        let mut results = Vec::with_capacity(batch.num_rows());
        for row in 0..batch.num_rows() {
            let distance =
                distances.map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

            results.push(ScoredChunk {
                chunk: DocumentChunk {
                    text: texts.value(row).to_string(),
                    metadata: ChunkMetadata {
                        source: sources.value(row).to_string(),
                        page: pages.value(row),
                        chunk_index: chunk_indices.value(row),
                    },
                },
                distance,
            });
        }

        Ok(results)
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RagError::VectorStore(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| RagError::VectorStore(format!("Invalid {} column type", name)))
}

fn u32_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a UInt32Array> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RagError::VectorStore(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<UInt32Array>()
        .ok_or_else(|| RagError::VectorStore(format!("Invalid {} column type", name)))
}

#[async_trait]
impl VectorStore for LanceStore {
    async fn reset(&self) -> Result<()> {
        if self.table_exists().await? {
            info!("Dropping table {}", self.table_name);
            self.connection
                .drop_table(&self.table_name)
                .await
                .map_err(|e| RagError::VectorStore(format!("Failed to drop table: {}", e)))?;
        }
        Ok(())
    }

    async fn add_chunks(
        &self,
        chunks: Vec<DocumentChunk>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Vec<String>> {
        let Some(vector_dim) = validate_batch(&chunks, &vectors)? else {
            debug!("No embeddings to store");
            return Ok(Vec::new());
        };

        self.ensure_table(vector_dim).await?;

        let ids: Vec<String> = chunks
            .iter()
            .map(|_| uuid::Uuid::new_v4().to_string())
            .collect();
        let record_batch = Self::create_record_batch(&ids, &chunks, &vectors, vector_dim)?;

        let table = self.open_table().await?;
        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| RagError::VectorStore(format!("Failed to insert embeddings: {}", e)))?;

        info!("Stored {} embeddings in {}", ids.len(), self.table_name);
        Ok(ids)
    }

    async fn similarity_search_by_vector(
        &self,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        if !self.table_exists().await? {
            debug!("Table {} does not exist yet, returning no results", self.table_name);
            return Ok(Vec::new());
        }

        let table = self.open_table().await?;
        let mut results = table
            .vector_search(vector)
            .map_err(|e| RagError::VectorStore(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .limit(k)
            .execute()
            .await
            .map_err(|e| RagError::VectorStore(format!("Failed to execute search: {}", e)))?;

        let mut hits = Vec::new();
        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| RagError::VectorStore(format!("Failed to read result stream: {}", e)))?
        {
            hits.extend(Self::parse_search_batch(&batch)?);
        }

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        debug!("LanceDB search returned {} hits", hits.len());
        Ok(hits)
    }

    async fn count(&self) -> Result<u64> {
        if !self.table_exists().await? {
            return Ok(0);
        }

        let count = self
            .open_table()
            .await?
            .count_rows(None)
            .await
            .map_err(|e| RagError::VectorStore(format!("Failed to count rows: {}", e)))?;

        Ok(count as u64)
    }

    fn describe(&self) -> String {
        format!(
            "lancedb {} (table {})",
            self.db_path.display(),
            self.table_name
        )
    }
}
