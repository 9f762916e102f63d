
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use url::Url;

use crate::RagError;
use crate::ingestion::splitter::ChunkingConfig;

pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub embeddings: EmbeddingsConfig,
    pub vector_store: VectorStoreConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub server: ServerConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmConfig {
    pub url: String,
    pub model: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub timeout_seconds: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000/v1".to_string(),
            model: "meta/llama-3.2-1b-instruct".to_string(),
            max_tokens: None,
            temperature: None,
            timeout_seconds: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingsConfig {
    pub url: String,
    pub model: String,
    pub batch_size: u32,
    pub truncate: String,
    pub timeout_seconds: u64,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8001/v1".to_string(),
            model: "nvidia/llama-3.2-nv-embedqa-1b-v2".to_string(),
            batch_size: 50,
            truncate: "NONE".to_string(),
            timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    #[default]
    Milvus,
    Lancedb,
}

impl FromStr for VectorBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "milvus" => Ok(Self::Milvus),
            "lancedb" | "lance" => Ok(Self::Lancedb),
            other => Err(ConfigError::InvalidBackend(other.to_string())),
        }
    }
}

impl fmt::Display for VectorBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Milvus => write!(f, "milvus"),
            Self::Lancedb => write!(f, "lancedb"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VectorStoreConfig {
    pub backend: VectorBackend,
    pub collection_name: String,
    /// Drop the collection when the pipeline starts
    pub drop_old: bool,
    pub milvus: MilvusConfig,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            backend: VectorBackend::Milvus,
            collection_name: "rag_chatbot".to_string(),
            drop_old: true,
            milvus: MilvusConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MilvusConfig {
    pub url: String,
    pub token: String,
    pub db_name: String,
    pub index_type: String,
    pub metric_type: String,
    pub consistency_level: String,
    pub timeout_seconds: u64,
}

impl Default for MilvusConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8002".to_string(),
            token: "postgres:password".to_string(),
            db_name: "milvus_demo".to_string(),
            index_type: "FLAT".to_string(),
            metric_type: "L2".to_string(),
            consistency_level: "Strong".to_string(),
            timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 4 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7860,
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL for {0}: {1}")]
    InvalidUrl(&'static str, String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid model name for {0} (cannot be empty)")]
    InvalidModel(&'static str),
    #[error("Invalid collection name: {0:?} (must be non-empty, letters, digits and underscores)")]
    InvalidCollectionName(String),
    #[error("Invalid vector store backend: {0} (must be 'milvus' or 'lancedb')")]
    InvalidBackend(String),
    #[error("Invalid top_k: {0} (must be between 1 and 100)")]
    InvalidTopK(usize),
    #[error("Invalid tokens per chunk: {0} (must be greater than 0)")]
    InvalidTokensPerChunk(usize),
    #[error("Chunk overlap ({0}) must be smaller than tokens per chunk ({1})")]
    OverlapTooLarge(usize, usize),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidEnv(&'static str, String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl From<ConfigError> for RagError {
    #[inline]
    fn from(err: ConfigError) -> Self {
        RagError::Config(err.to_string())
    }
}

impl Config {
    /// Default configuration directory (`~/.rag-chatbot`)
    #[inline]
    pub fn default_dir() -> Result<PathBuf, ConfigError> {
        dirs::home_dir()
            .map(|home| home.join(".rag-chatbot"))
            .ok_or(ConfigError::DirectoryError)
    }

    /// Load `config.toml` from the directory (if present) and apply environment overrides
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        Self::load_with_env(config_dir, |key| std::env::var(key).ok())
    }

    /// Same as [`Config::load`] but with a custom environment lookup
    #[inline]
    pub fn load_with_env<P, F>(config_dir: P, lookup: F) -> Result<Self>
    where
        P: AsRef<Path>,
        F: Fn(&str) -> Option<String>,
    {
        let config_dir = config_dir.as_ref();
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path).with_context(|| {
                format!("Failed to read config file: {}", config_path.display())
            })?;
            toml::from_str::<Config>(&content).with_context(|| {
                format!("Failed to parse config file: {}", config_path.display())
            })?
        } else {
            Config::default()
        };
        config.base_dir = config_dir.to_path_buf();

        config
            .apply_env_overrides(lookup)
            .context("Invalid environment override")?;

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    /// Override settings from `LLM_URL`, `EMBEDDINGS_URL`, `MILVUS_URL` and friends
    #[inline]
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("LLM_URL") {
            self.llm.url = value;
        }
        if let Some(value) = lookup("LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = lookup("EMBEDDINGS_URL") {
            self.embeddings.url = value;
        }
        if let Some(value) = lookup("EMBEDDINGS_MODEL") {
            self.embeddings.model = value;
        }
        if let Some(value) = lookup("MILVUS_URL") {
            self.vector_store.milvus.url = value;
        }
        if let Some(value) = lookup("MILVUS_TOKEN") {
            self.vector_store.milvus.token = value;
        }
        if let Some(value) = lookup("MILVUS_DB_NAME") {
            self.vector_store.milvus.db_name = value;
        }
        if let Some(value) = lookup("VECTOR_STORE") {
            self.vector_store.backend = value.parse()?;
        }
        if let Some(value) = lookup("COLLECTION_NAME") {
            self.vector_store.collection_name = value;
        }
        if let Some(value) = lookup("DROP_OLD") {
            self.vector_store.drop_old = parse_bool(&value)
                .ok_or(ConfigError::InvalidEnv("DROP_OLD", value))?;
        }
        if let Some(value) = lookup("SERVER_HOST") {
            self.server.host = value;
        }
        if let Some(value) = lookup("SERVER_PORT") {
            self.server.port = value
                .parse()
                .map_err(|_| ConfigError::InvalidEnv("SERVER_PORT", value.clone()))?;
        }
        Ok(())
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();
        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join(CONFIG_FILE_NAME)
    }

    /// Where uploaded documents are written before ingestion
    #[inline]
    pub fn uploads_dir(&self) -> PathBuf {
        self.get_base_dir().join("uploads")
    }

    /// Directory of the embedded LanceDB database
    #[inline]
    pub fn lancedb_path(&self) -> PathBuf {
        self.get_base_dir().join("vectors")
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.llm.base_url()?;
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel("llm"));
        }

        self.embeddings.base_url()?;
        if self.embeddings.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel("embeddings"));
        }
        if self.embeddings.batch_size == 0 || self.embeddings.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.embeddings.batch_size));
        }

        let name = &self.vector_store.collection_name;
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ConfigError::InvalidCollectionName(name.clone()));
        }
        if self.vector_store.backend == VectorBackend::Milvus {
            self.vector_store.milvus.base_url()?;
        }

        if self.chunking.tokens_per_chunk == 0 {
            return Err(ConfigError::InvalidTokensPerChunk(
                self.chunking.tokens_per_chunk,
            ));
        }
        if self.chunking.chunk_overlap >= self.chunking.tokens_per_chunk {
            return Err(ConfigError::OverlapTooLarge(
                self.chunking.chunk_overlap,
                self.chunking.tokens_per_chunk,
            ));
        }

        if !(1..=100).contains(&self.retrieval.top_k) {
            return Err(ConfigError::InvalidTopK(self.retrieval.top_k));
        }

        if self.server.port == 0 {
            return Err(ConfigError::InvalidPort(self.server.port));
        }

        Ok(())
    }
}

impl LlmConfig {
    #[inline]
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        parse_http_url("llm.url", &self.url)
    }
}

impl EmbeddingsConfig {
    #[inline]
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        parse_http_url("embeddings.url", &self.url)
    }
}

impl MilvusConfig {
    #[inline]
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        parse_http_url("vector_store.milvus.url", &self.url)
    }
}

fn parse_http_url(field: &'static str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value).map_err(|_| ConfigError::InvalidUrl(field, value.to_string()))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(field, value.to_string()));
    }
    Ok(url)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
