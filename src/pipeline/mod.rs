//! Document pipeline: chunking, repair, embedding, clustering, and summarization.

mod chunking;
mod cluster;
mod embed;
mod repair;
mod runner;
mod service;
mod summarize;
/// Pipeline data types, options, and errors.
pub mod types;

pub use runner::{Pipeline, SUMMARY_NOT_PERFORMED};
pub use service::{PipelineApi, PipelineService, RunOverrides, ServiceError};
pub use summarize::NO_CONTENT_PLACEHOLDER;
pub use types::{
    ChunkingError, ClusterParams, NOISE_CLUSTER_ID, PipelineError, PipelineOptions,
    PipelineResult, ProcessedChunk, TextChunk, TopicSummary,
};
