//! Core data types and error definitions for the pipeline.

use serde::Serialize;
use thiserror::Error;

/// Cluster label assigned to chunks that belong to no dense region.
pub const NOISE_CLUSTER_ID: i32 = -1;

/// A bounded contiguous span of source text, the unit of repair and embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    /// Stable identifier in document order, assigned once at split time.
    pub id: usize,
    /// Chunk contents.
    pub text: String,
}

/// A chunk that survived embedding, annotated as it moves through the pipeline.
///
/// `chunk_id` is an ordering and debugging key, not an array index; repair fan-out and
/// embedding drops leave gaps. The embedding is cleared once clustering has consumed it so
/// that large vectors never propagate into summaries or serialized output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedChunk {
    /// Stable identifier in document order.
    pub chunk_id: usize,
    /// Chunk contents.
    pub text: String,
    /// Embedding vector, present only between the embedding and clustering stages.
    #[serde(skip_serializing)]
    pub embedding: Option<Vec<f32>>,
    /// Cluster label; `-1` marks noise, absent before clustering.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<i32>,
}

/// Summary of one topic cluster together with its member chunks.
#[derive(Debug, Clone, Serialize)]
pub struct TopicSummary {
    /// Cluster label this topic was built from.
    pub topic_id: i32,
    /// Generated summary, or an in-band error string when the call failed.
    pub topic_summary: String,
    /// Member chunks in document order.
    pub chunks: Vec<ProcessedChunk>,
}

/// Final hierarchical result of a pipeline run. Immutable once returned.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    /// Document-level summary; never empty, a fixed placeholder in degenerate cases.
    pub overall_summary: String,
    /// Topic summaries sorted by ascending `topic_id`.
    pub topics: Vec<TopicSummary>,
    /// Chunks that belong to no topic.
    pub noise_points: Vec<ProcessedChunk>,
}

/// Density-clustering parameters, inherited from the source corpus but tunable.
#[derive(Debug, Clone, Copy)]
pub struct ClusterParams {
    /// Minimum population required before clustering is attempted, and the minimum
    /// component size accepted as a cluster.
    pub min_cluster_size: usize,
    /// Neighbor count used for core-distance estimation.
    pub min_samples: usize,
    /// Mutual-reachability distance above which links are cut.
    pub cluster_selection_epsilon: f32,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            min_cluster_size: 5,
            min_samples: 1,
            cluster_selection_epsilon: 0.2,
        }
    }
}

/// Caller-tunable knobs for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Run the LLM repair/translation pass over raw chunks.
    pub use_repair: bool,
    /// Run clustering and summarization; when false the result takes the degenerate
    /// "not performed" shape with every surviving chunk in `noise_points`.
    pub use_clustering_summary: bool,
    /// Maximum characters per chunk.
    pub chunk_size: usize,
    /// Approximate characters shared between consecutive chunks.
    pub chunk_overlap: usize,
    /// Chunk count above which a topic summary switches to map-reduce.
    pub summarization_chunk_threshold: usize,
    /// Rate limit for summarization calls (per minute, `<= 0` unlimited).
    pub summarize_max_rpm: i64,
    /// Rate limit for repair calls (per minute, `<= 0` unlimited).
    pub repair_max_rpm: i64,
    /// Additional attempts after a failed repair call.
    pub max_repair_retries: usize,
    /// Character budget for a single summarization prompt.
    pub context_budget: usize,
    /// Density-clustering parameters.
    pub cluster: ClusterParams,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            use_repair: false,
            use_clustering_summary: true,
            chunk_size: 300,
            chunk_overlap: 50,
            summarization_chunk_threshold: 10,
            summarize_max_rpm: 20,
            repair_max_rpm: 60,
            max_repair_retries: 2,
            context_budget: 20_000,
            cluster: ClusterParams::default(),
        }
    }
}

/// Errors produced while turning raw text into chunks.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Caller configured an impossible character budget.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
}

/// Fatal pipeline failures. Per-chunk and per-topic failures are absorbed into the
/// result instead; only a stage left with nothing to hand downstream aborts the run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Chunking step failed to segment the document.
    #[error("Failed to chunk document: {0}")]
    Chunking(#[from] ChunkingError),
    /// The input document contained no usable text.
    #[error("document contained no text to process")]
    EmptyDocument,
    /// Every chunk was discarded during the repair stage.
    #[error("no chunks survived the repair stage")]
    NoChunksSurvived,
    /// Every chunk failed to embed.
    #[error("no chunks could be embedded")]
    NoEmbeddings,
    /// The clustering worker terminated abnormally.
    #[error("clustering worker failed: {0}")]
    ClusteringFailed(String),
}
