// Configuration management module
// TOML file in the config directory, overridden by environment variables

pub mod settings;

pub use settings::{
    Config, ConfigError, EmbeddingsConfig, LlmConfig, MilvusConfig, RetrievalConfig,
    ServerConfig, VectorBackend, VectorStoreConfig,
};

/// Resolve the configuration directory, preferring an explicit override
#[inline]
pub fn resolve_config_dir(
    override_dir: Option<std::path::PathBuf>,
) -> Result<std::path::PathBuf, ConfigError> {
    match override_dir {
        Some(dir) => Ok(dir),
        None => Config::default_dir(),
    }
}
