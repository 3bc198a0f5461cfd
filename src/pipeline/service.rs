//! Service facade coordinating content fetch, the pipeline, and run metrics.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::fetch::{ContentFetcher, FetchError};
use crate::metrics::{MetricsSnapshot, RunMetrics};
use crate::providers::{SharedEmbeddingClient, SharedGenerationClient};

use super::runner::Pipeline;
use super::types::{PipelineError, PipelineOptions, PipelineResult};

/// Errors surfaced by the service facade.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Content could not be fetched or extracted from the requested URL.
    #[error("Failed to fetch content: {0}")]
    Fetch(#[from] FetchError),
    /// The pipeline aborted with a fatal stage failure.
    #[error("Pipeline failed: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Per-request overrides applied on top of the configured pipeline defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunOverrides {
    /// Run the LLM repair pass.
    #[serde(default)]
    pub use_repair: Option<bool>,
    /// Run clustering and summarization.
    #[serde(default)]
    pub use_clustering_summary: Option<bool>,
    /// Maximum characters per chunk.
    #[serde(default)]
    pub chunk_size: Option<usize>,
    /// Characters shared between consecutive chunks.
    #[serde(default)]
    pub chunk_overlap: Option<usize>,
    /// Chunk count above which topic summaries switch to map-reduce.
    #[serde(default)]
    pub summarization_chunk_threshold: Option<usize>,
    /// Rate limit for summarization calls.
    #[serde(default)]
    pub summarize_max_rpm: Option<i64>,
    /// Rate limit for repair calls.
    #[serde(default)]
    pub repair_max_rpm: Option<i64>,
    /// Additional attempts after a failed repair call.
    #[serde(default)]
    pub max_repair_retries: Option<usize>,
    /// Character budget for a single summarization prompt.
    #[serde(default)]
    pub context_budget: Option<usize>,
    /// Minimum topic size for density clustering.
    #[serde(default)]
    pub min_cluster_size: Option<usize>,
    /// Neighbor count for core-distance estimation.
    #[serde(default)]
    pub min_samples: Option<usize>,
    /// Mutual-reachability distance above which cluster links are cut.
    #[serde(default)]
    pub cluster_selection_epsilon: Option<f32>,
}

impl RunOverrides {
    /// Merge these overrides onto a set of default options.
    pub fn apply(&self, defaults: &PipelineOptions) -> PipelineOptions {
        let mut options = defaults.clone();
        if let Some(value) = self.use_repair {
            options.use_repair = value;
        }
        if let Some(value) = self.use_clustering_summary {
            options.use_clustering_summary = value;
        }
        if let Some(value) = self.chunk_size {
            options.chunk_size = value;
        }
        if let Some(value) = self.chunk_overlap {
            options.chunk_overlap = value;
        }
        if let Some(value) = self.summarization_chunk_threshold {
            options.summarization_chunk_threshold = value;
        }
        if let Some(value) = self.summarize_max_rpm {
            options.summarize_max_rpm = value;
        }
        if let Some(value) = self.repair_max_rpm {
            options.repair_max_rpm = value;
        }
        if let Some(value) = self.max_repair_retries {
            options.max_repair_retries = value;
        }
        if let Some(value) = self.context_budget {
            options.context_budget = value;
        }
        if let Some(value) = self.min_cluster_size {
            options.cluster.min_cluster_size = value;
        }
        if let Some(value) = self.min_samples {
            options.cluster.min_samples = value;
        }
        if let Some(value) = self.cluster_selection_epsilon {
            options.cluster.cluster_selection_epsilon = value;
        }
        options
    }
}

/// Abstraction over the pipeline service used by external surfaces (HTTP, tests).
#[async_trait]
pub trait PipelineApi: Send + Sync {
    /// Fetch a URL, extract its main content, and run the pipeline over it.
    async fn process_url(
        &self,
        url: &str,
        overrides: RunOverrides,
    ) -> Result<PipelineResult, ServiceError>;

    /// Run the pipeline over inline text.
    async fn process_text(
        &self,
        text: &str,
        overrides: RunOverrides,
    ) -> Result<PipelineResult, ServiceError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

/// Owns long-lived handles to the fetcher, providers, and metrics so the HTTP surface and
/// the binary share the same components. Construct once near process start and share
/// through an `Arc`.
pub struct PipelineService {
    fetcher: Arc<dyn ContentFetcher>,
    pipeline: Pipeline,
    defaults: PipelineOptions,
    metrics: Arc<RunMetrics>,
}

impl PipelineService {
    /// Build a new service from its collaborators and default options.
    pub fn new(
        fetcher: Arc<dyn ContentFetcher>,
        repair_client: SharedGenerationClient,
        summarize_client: SharedGenerationClient,
        embedding_client: SharedEmbeddingClient,
        defaults: PipelineOptions,
    ) -> Self {
        Self {
            fetcher,
            pipeline: Pipeline::new(repair_client, summarize_client, embedding_client),
            defaults,
            metrics: Arc::new(RunMetrics::new()),
        }
    }

    async fn run(&self, text: &str, options: PipelineOptions) -> Result<PipelineResult, ServiceError> {
        let result = self.pipeline.run(text, &options).await?;
        let chunk_count = result
            .topics
            .iter()
            .map(|topic| topic.chunks.len())
            .sum::<usize>()
            + result.noise_points.len();
        self.metrics
            .record_run(chunk_count as u64, result.topics.len() as u64);
        Ok(result)
    }
}

#[async_trait]
impl PipelineApi for PipelineService {
    async fn process_url(
        &self,
        url: &str,
        overrides: RunOverrides,
    ) -> Result<PipelineResult, ServiceError> {
        tracing::info!(url, "Processing URL");
        let content = self.fetcher.fetch(url).await?;
        tracing::info!(url, title = %content.title, length = content.text.len(), "Content extracted");
        self.run(&content.text, overrides.apply(&self.defaults)).await
    }

    async fn process_text(
        &self,
        text: &str,
        overrides: RunOverrides,
    ) -> Result<PipelineResult, ServiceError> {
        self.run(text, overrides.apply(&self.defaults)).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
