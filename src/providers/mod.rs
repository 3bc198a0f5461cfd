//! Capability traits for the text-generation and embedding backends.
//!
//! The pipeline never talks to a concrete provider; it consumes these traits as shared
//! objects so that the HTTP surface, tests, and the binary can wire in whatever backend is
//! configured. Provider lookup by id goes through [`ProviderRegistry`], which resolves to a
//! well-defined unavailable client instead of failing mid-pipeline.

mod ollama;

pub use ollama::{OllamaEmbeddingClient, OllamaGenerationClient};

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by text-generation providers.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Provider was not configured or could not be reached.
    #[error("Generation provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate text: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Provider was not configured or could not be reached.
    #[error("Embedding provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider failed to produce an embedding for the supplied input.
    #[error("Failed to generate embedding: {0}")]
    GenerationFailed(String),
}

/// Interface implemented by text-generation backends.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Generate a completion for the supplied prompts.
    async fn generate(
        &self,
        user_prompt: &str,
        system_prompt: &str,
    ) -> Result<String, GenerationError>;
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce an embedding vector for one chunk of text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

/// Shared handle to a generation backend.
pub type SharedGenerationClient = Arc<dyn GenerationClient>;
/// Shared handle to an embedding backend.
pub type SharedEmbeddingClient = Arc<dyn EmbeddingClient>;

/// Client standing in when no provider matches a requested id and no default exists.
///
/// Every call fails with `ProviderUnavailable`, which the pipeline's per-unit error
/// handling absorbs the same way it absorbs transport failures.
pub struct UnavailableClient;

#[async_trait]
impl GenerationClient for UnavailableClient {
    async fn generate(&self, _: &str, _: &str) -> Result<String, GenerationError> {
        Err(GenerationError::ProviderUnavailable(
            "no generation provider configured".to_string(),
        ))
    }
}

#[async_trait]
impl EmbeddingClient for UnavailableClient {
    async fn embed(&self, _: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::ProviderUnavailable(
            "no embedding provider configured".to_string(),
        ))
    }
}

/// Named provider lookup with an explicit default.
///
/// Unknown ids log a warning and fall back to the default; with no default the resolver
/// hands back an [`UnavailableClient`] rather than erroring at resolution time.
#[derive(Default)]
pub struct ProviderRegistry {
    generators: HashMap<String, SharedGenerationClient>,
    default_generator: Option<SharedGenerationClient>,
    embedders: HashMap<String, SharedEmbeddingClient>,
    default_embedder: Option<SharedEmbeddingClient>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named generation client.
    pub fn register_generator(&mut self, id: impl Into<String>, client: SharedGenerationClient) {
        self.generators.insert(id.into(), client);
    }

    /// Install the fallback generation client used when no id matches.
    pub fn set_default_generator(&mut self, client: SharedGenerationClient) {
        self.default_generator = Some(client);
    }

    /// Register a named embedding client.
    pub fn register_embedder(&mut self, id: impl Into<String>, client: SharedEmbeddingClient) {
        self.embedders.insert(id.into(), client);
    }

    /// Install the fallback embedding client used when no id matches.
    pub fn set_default_embedder(&mut self, client: SharedEmbeddingClient) {
        self.default_embedder = Some(client);
    }

    /// Resolve a generation client by optional id.
    pub fn resolve_generator(&self, id: Option<&str>) -> SharedGenerationClient {
        if let Some(id) = id {
            if let Some(client) = self.generators.get(id) {
                return Arc::clone(client);
            }
            tracing::warn!(provider_id = id, "Unknown generation provider; using default");
        }
        self.default_generator
            .clone()
            .unwrap_or_else(|| Arc::new(UnavailableClient))
    }

    /// Resolve an embedding client by optional id.
    pub fn resolve_embedder(&self, id: Option<&str>) -> SharedEmbeddingClient {
        if let Some(id) = id {
            if let Some(client) = self.embedders.get(id) {
                return Arc::clone(client);
            }
            tracing::warn!(provider_id = id, "Unknown embedding provider; using default");
        }
        self.default_embedder
            .clone()
            .unwrap_or_else(|| Arc::new(UnavailableClient))
    }
}
