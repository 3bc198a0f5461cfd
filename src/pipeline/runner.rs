//! Stage sequencing for the chunk → repair → embed → cluster → summarize pipeline.

use std::sync::Arc;

use crate::providers::{SharedEmbeddingClient, SharedGenerationClient};
use crate::ratelimit::RateLimiter;

use super::types::{PipelineError, PipelineOptions, PipelineResult};
use super::{chunking, cluster, embed, repair, summarize};

/// Fixed `overall_summary` value when the caller disabled clustering and summarization.
pub const SUMMARY_NOT_PERFORMED: &str =
    "Summarization was not performed: clustering and summarization were disabled for this run.";

/// The document pipeline as a pure function from text and options to a result.
///
/// Holds only provider handles; all run-specific state lives on the stack of [`Pipeline::run`],
/// so one instance can serve any number of concurrent runs.
pub struct Pipeline {
    repair_client: SharedGenerationClient,
    summarize_client: SharedGenerationClient,
    embedding_client: SharedEmbeddingClient,
}

impl Pipeline {
    /// Assemble a pipeline from its three provider capabilities.
    pub fn new(
        repair_client: SharedGenerationClient,
        summarize_client: SharedGenerationClient,
        embedding_client: SharedEmbeddingClient,
    ) -> Self {
        Self {
            repair_client,
            summarize_client,
            embedding_client,
        }
    }

    /// Run the full pipeline over a document.
    ///
    /// A stage that ends with nothing to hand downstream aborts the run with an explicit
    /// error; per-chunk and per-topic failures are absorbed along the way. Every chunk that
    /// survives repair and embedding appears in exactly one of `topics[*].chunks` or
    /// `noise_points` in the returned result.
    pub async fn run(
        &self,
        text: &str,
        options: &PipelineOptions,
    ) -> Result<PipelineResult, PipelineError> {
        if text.trim().is_empty() {
            return Err(PipelineError::EmptyDocument);
        }

        let chunks = chunking::split_text(text, options.chunk_size, options.chunk_overlap)?;
        if chunks.is_empty() {
            return Err(PipelineError::EmptyDocument);
        }
        tracing::info!(
            chunks = chunks.len(),
            chunk_size = options.chunk_size,
            chunk_overlap = options.chunk_overlap,
            "Document split"
        );

        let chunks = if options.use_repair {
            let limiter = Arc::new(RateLimiter::new(options.repair_max_rpm));
            let repaired = repair::repair_chunks(
                chunks,
                Arc::clone(&self.repair_client),
                limiter,
                options.max_repair_retries,
            )
            .await;
            if repaired.is_empty() {
                return Err(PipelineError::NoChunksSurvived);
            }
            repaired
        } else {
            chunks
        };

        let processed = embed::embed_chunks(chunks, Arc::clone(&self.embedding_client)).await;
        if processed.is_empty() {
            return Err(PipelineError::NoEmbeddings);
        }

        if !options.use_clustering_summary {
            tracing::info!("Clustering and summarization disabled; returning degenerate result");
            let noise_points = processed
                .into_iter()
                .map(|mut chunk| {
                    chunk.embedding = None;
                    chunk
                })
                .collect();
            return Ok(PipelineResult {
                overall_summary: SUMMARY_NOT_PERFORMED.to_string(),
                topics: Vec::new(),
                noise_points,
            });
        }

        // Clustering is the one CPU-bound step; keep it off the async scheduler.
        let params = options.cluster;
        let processed = tokio::task::spawn_blocking(move || {
            let mut chunks = processed;
            cluster::cluster_chunks(&mut chunks, &params);
            chunks
        })
        .await
        .map_err(|error| PipelineError::ClusteringFailed(error.to_string()))?;

        let limiter = Arc::new(RateLimiter::new(options.summarize_max_rpm));
        Ok(summarize::generate_summaries(
            processed,
            Arc::clone(&self.summarize_client),
            options.summarization_chunk_threshold,
            options.context_budget,
            limiter,
        )
        .await)
    }
}
