use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the Docweave server.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Base URL of the Ollama runtime used for generation and embeddings.
    pub ollama_url: String,
    /// Model identifier used for the repair/translation step.
    pub repair_model: String,
    /// Model identifier used for topic and overall summaries.
    pub summarize_model: String,
    /// Model identifier used for chunk embeddings.
    pub embedding_model: String,
    /// Maximum characters per chunk produced by the splitter.
    pub chunk_size: usize,
    /// Approximate characters shared between consecutive chunks.
    pub chunk_overlap: usize,
    /// Chunk count above which a topic summary switches to map-reduce.
    pub summarization_chunk_threshold: usize,
    /// Rate limit (calls per minute) for summarization calls; `<= 0` is unlimited.
    pub summarize_max_rpm: i64,
    /// Rate limit (calls per minute) for repair calls; `<= 0` is unlimited.
    pub repair_max_rpm: i64,
    /// Minimum population required before density clustering is attempted.
    pub min_cluster_size: usize,
    /// Neighbor count used for core-distance estimation.
    pub min_samples: usize,
    /// Mutual-reachability distance above which cluster links are cut.
    pub cluster_selection_epsilon: f32,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            ollama_url: load_env_optional("OLLAMA_URL")
                .unwrap_or_else(|| "http://127.0.0.1:11434".to_string()),
            repair_model: load_env("REPAIR_MODEL")?,
            summarize_model: load_env("SUMMARIZE_MODEL")?,
            embedding_model: load_env("EMBEDDING_MODEL")?,
            chunk_size: parse_or("CHUNK_SIZE", 300)?,
            chunk_overlap: parse_or("CHUNK_OVERLAP", 50)?,
            summarization_chunk_threshold: parse_or("SUMMARIZATION_CHUNK_THRESHOLD", 10)?,
            summarize_max_rpm: parse_or("SUMMARIZE_MAX_RPM", 20)?,
            repair_max_rpm: parse_or("REPAIR_MAX_RPM", 60)?,
            min_cluster_size: parse_or("MIN_CLUSTER_SIZE", 5)?,
            min_samples: parse_or("MIN_SAMPLES", 1)?,
            cluster_selection_epsilon: parse_or("CLUSTER_SELECTION_EPSILON", 0.2)?,
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
        })
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match load_env_optional(key) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        ollama_url = %config.ollama_url,
        repair_model = %config.repair_model,
        summarize_model = %config.summarize_model,
        embedding_model = %config.embedding_model,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_or_falls_back_to_default() {
        let value: usize = parse_or("DOCWEAVE_TEST_UNSET_VARIABLE", 42).expect("default applies");
        assert_eq!(value, 42);
    }
}
