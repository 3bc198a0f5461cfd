//! Hierarchical summary generation over clustered chunks.
//!
//! Each non-noise cluster gets one topic summary: a direct call while the cluster fits the
//! `summarization_chunk_threshold`, otherwise a two-level map-reduce where contiguous runs
//! of chunk texts are packed into "super-chunks" under a character budget, summarized
//! concurrently, and reduced with one final call. A failing call records an in-band error
//! string as that topic's summary and never aborts its siblings. The overall summary is
//! reduced from the topic summaries, with a map-reduce fallback over the raw chunk texts
//! when clustering produced no topics at all.
//!
//! All calls in this stage share one rate limiter.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::future::join_all;

use crate::providers::{GenerationError, SharedGenerationClient};
use crate::ratelimit::RateLimiter;

use super::types::{NOISE_CLUSTER_ID, PipelineResult, ProcessedChunk, TopicSummary};

pub(crate) const TOPIC_SUMMARY_SYSTEM_PROMPT: &str = "Your task is to provide a concise, \
comprehensive summary of the following text chunks, which all belong to a single topic. \
Output only the summary itself, without any introductory phrases.";

pub(crate) const OVERALL_SUMMARY_SYSTEM_PROMPT: &str = "Your task is to create a high-level, \
overarching summary from the following topic summaries. The summary should capture the main \
themes of the entire document. Output only the summary itself.";

/// Fixed `overall_summary` value when there was no text to summarize at all.
pub const NO_CONTENT_PLACEHOLDER: &str = "No text content was available to summarize.";

/// Generate the hierarchical result from clustered chunks.
pub(crate) async fn generate_summaries(
    chunks: Vec<ProcessedChunk>,
    client: SharedGenerationClient,
    threshold: usize,
    context_budget: usize,
    limiter: Arc<RateLimiter>,
) -> PipelineResult {
    let mut clusters: BTreeMap<i32, Vec<ProcessedChunk>> = BTreeMap::new();
    let mut noise_points = Vec::new();
    let mut all_texts: Vec<String> = Vec::with_capacity(chunks.len());

    for chunk in chunks {
        all_texts.push(chunk.text.clone());
        match chunk.cluster_id {
            Some(NOISE_CLUSTER_ID) | None => noise_points.push(chunk),
            Some(id) => clusters.entry(id).or_default().push(chunk),
        }
    }

    tracing::info!(
        topics = clusters.len(),
        noise = noise_points.len(),
        "Summarizing clustered chunks"
    );

    let topic_futures = clusters.iter().map(|(&topic_id, members)| {
        let client = Arc::clone(&client);
        let limiter = Arc::clone(&limiter);
        async move {
            let texts: Vec<&str> = members.iter().map(|c| c.text.as_str()).collect();
            let summary = if texts.len() > threshold {
                tracing::debug!(topic_id, chunks = texts.len(), "Using map-reduce for topic");
                summarize_map_reduce(&texts, &client, &limiter, context_budget).await
            } else {
                let prompt = format!("TEXT CHUNKS:\n---\n{}", texts.join("\n\n"));
                match generate_throttled(&client, &limiter, &prompt, TOPIC_SUMMARY_SYSTEM_PROMPT)
                    .await
                {
                    Ok(summary) => summary,
                    Err(error) => {
                        tracing::warn!(topic_id, %error, "Topic summarization failed");
                        format!("Error summarizing topic: {error}")
                    }
                }
            };
            (topic_id, summary)
        }
    });
    let summaries: Vec<(i32, String)> = join_all(topic_futures).await;

    let overall_summary = if clusters.is_empty() {
        if all_texts.iter().any(|text| !text.trim().is_empty()) {
            tracing::warn!("No topics found; summarizing all chunk texts via map-reduce");
            let texts: Vec<&str> = all_texts.iter().map(String::as_str).collect();
            summarize_map_reduce(&texts, &client, &limiter, context_budget).await
        } else {
            NO_CONTENT_PLACEHOLDER.to_string()
        }
    } else {
        let joined = summaries
            .iter()
            .map(|(_, summary)| summary.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let prompt = format!("TOPIC SUMMARIES:\n---\n{joined}");
        match generate_throttled(&client, &limiter, &prompt, OVERALL_SUMMARY_SYSTEM_PROMPT).await {
            Ok(summary) => summary,
            Err(error) => {
                tracing::warn!(%error, "Overall summarization failed");
                format!("Error generating overall summary: {error}")
            }
        }
    };

    let topics = summaries
        .into_iter()
        .map(|(topic_id, topic_summary)| TopicSummary {
            topic_id,
            topic_summary,
            chunks: clusters.remove(&topic_id).unwrap_or_default(),
        })
        .collect();

    PipelineResult {
        overall_summary,
        topics,
        noise_points,
    }
}

/// Two-level reduction for inputs that exceed a single prompt's safe size.
///
/// Returns either a summary or an in-band error string; it never propagates an error.
async fn summarize_map_reduce(
    texts: &[&str],
    client: &SharedGenerationClient,
    limiter: &Arc<RateLimiter>,
    context_budget: usize,
) -> String {
    let super_chunks = build_super_chunks(texts, context_budget);
    tracing::debug!(
        chunks = texts.len(),
        super_chunks = super_chunks.len(),
        "Map phase"
    );

    let map_futures = super_chunks.iter().map(|super_chunk| {
        let prompt = format!("TEXT CHUNKS:\n---\n{super_chunk}");
        async move { generate_throttled(client, limiter, &prompt, TOPIC_SUMMARY_SYSTEM_PROMPT).await }
    });
    let intermediate: Vec<String> = join_all(map_futures)
        .await
        .into_iter()
        .filter_map(|result| match result {
            Ok(summary) => Some(summary),
            Err(error) => {
                tracing::warn!(%error, "Intermediate summary failed");
                None
            }
        })
        .collect();

    if intermediate.is_empty() {
        return "Error: failed to generate any intermediate summaries during map-reduce."
            .to_string();
    }

    tracing::debug!(intermediate = intermediate.len(), "Reduce phase");
    let prompt = format!("TOPIC SUMMARIES:\n---\n{}", intermediate.join("\n\n"));
    match generate_throttled(client, limiter, &prompt, OVERALL_SUMMARY_SYSTEM_PROMPT).await {
        Ok(summary) => summary,
        Err(error) => {
            tracing::warn!(%error, "Reduce call failed");
            format!("Error reducing intermediate summaries: {error}")
        }
    }
}

/// Pack texts into maximal contiguous runs whose combined length stays under the budget.
///
/// A single text larger than the budget still becomes its own super-chunk; the backend
/// call decides its own fate.
fn build_super_chunks(texts: &[&str], budget: usize) -> Vec<String> {
    let mut super_chunks = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0;

    for &text in texts {
        let text_chars = text.chars().count();
        if current_chars + text_chars > budget && !current.is_empty() {
            super_chunks.push(std::mem::take(&mut current));
            current_chars = 0;
        }
        if !current.is_empty() {
            current.push_str("\n\n");
            current_chars += 2;
        }
        current.push_str(text);
        current_chars += text_chars;
    }
    if !current.is_empty() {
        super_chunks.push(current);
    }
    super_chunks
}

async fn generate_throttled(
    client: &SharedGenerationClient,
    limiter: &RateLimiter,
    user_prompt: &str,
    system_prompt: &str,
) -> Result<String, GenerationError> {
    limiter.acquire().await;
    client.generate(user_prompt, system_prompt).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::GenerationClient;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts calls; answers differently for map/topic prompts vs. reduce/overall prompts.
    struct CountingGenerator {
        calls: AtomicUsize,
        fail_topic_prompts: bool,
    }

    impl CountingGenerator {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_topic_prompts: false,
            }
        }

        fn failing_topic_prompts() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_topic_prompts: true,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GenerationClient for CountingGenerator {
        async fn generate(
            &self,
            user_prompt: &str,
            system_prompt: &str,
        ) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if system_prompt == TOPIC_SUMMARY_SYSTEM_PROMPT {
                if self.fail_topic_prompts {
                    return Err(GenerationError::GenerationFailed("scripted".into()));
                }
                return Ok(format!("summary-of[{}]", user_prompt.len()));
            }
            Ok("reduced summary".to_string())
        }
    }

    fn clustered_chunk(id: usize, cluster_id: i32, text: &str) -> ProcessedChunk {
        ProcessedChunk {
            chunk_id: id,
            text: text.to_string(),
            embedding: None,
            cluster_id: Some(cluster_id),
        }
    }

    async fn summarize(
        chunks: Vec<ProcessedChunk>,
        client: Arc<CountingGenerator>,
        threshold: usize,
        budget: usize,
    ) -> PipelineResult {
        generate_summaries(
            chunks,
            client,
            threshold,
            budget,
            Arc::new(RateLimiter::new(0)),
        )
        .await
    }

    #[tokio::test]
    async fn large_cluster_takes_the_map_reduce_path() {
        let chunks: Vec<ProcessedChunk> = (0..12)
            .map(|i| clustered_chunk(i, 0, &format!("chunk text {i}")))
            .collect();
        let client = Arc::new(CountingGenerator::new());
        let result = summarize(chunks, Arc::clone(&client), 10, 20_000).await;

        assert_eq!(result.topics.len(), 1);
        assert_eq!(result.topics[0].chunks.len(), 12);
        // One super-chunk summary, one reduce call, one overall call.
        assert_eq!(client.calls(), 3);
    }

    #[tokio::test]
    async fn tight_budget_produces_multiple_super_chunks() {
        let chunks: Vec<ProcessedChunk> = (0..4)
            .map(|i| clustered_chunk(i, 0, &"x".repeat(30)))
            .collect();
        let client = Arc::new(CountingGenerator::new());
        let result = summarize(chunks, Arc::clone(&client), 2, 40).await;

        assert_eq!(result.topics.len(), 1);
        // Four 30-char chunks under a 40-char budget: four map calls + reduce + overall.
        assert_eq!(client.calls(), 6);
        assert_eq!(result.overall_summary, "reduced summary");
    }

    #[tokio::test]
    async fn small_cluster_is_summarized_directly() {
        let chunks: Vec<ProcessedChunk> = (0..3)
            .map(|i| clustered_chunk(i, 0, &format!("text {i}")))
            .collect();
        let client = Arc::new(CountingGenerator::new());
        let result = summarize(chunks, Arc::clone(&client), 10, 20_000).await;

        assert_eq!(result.topics.len(), 1);
        // One direct topic call plus the overall call.
        assert_eq!(client.calls(), 2);
        assert!(result.topics[0].topic_summary.starts_with("summary-of"));
    }

    #[tokio::test]
    async fn topics_are_ordered_and_noise_is_separated() {
        let chunks = vec![
            clustered_chunk(0, 1, "one"),
            clustered_chunk(1, NOISE_CLUSTER_ID, "noise a"),
            clustered_chunk(2, 0, "zero"),
            clustered_chunk(3, 1, "one again"),
            clustered_chunk(4, NOISE_CLUSTER_ID, "noise b"),
        ];
        let client = Arc::new(CountingGenerator::new());
        let result = summarize(chunks, client, 10, 20_000).await;

        let topic_ids: Vec<i32> = result.topics.iter().map(|t| t.topic_id).collect();
        assert_eq!(topic_ids, vec![0, 1]);
        assert_eq!(result.topics[0].chunks.len(), 1);
        assert_eq!(result.topics[1].chunks.len(), 2);
        assert_eq!(result.noise_points.len(), 2);
    }

    #[tokio::test]
    async fn failed_topic_records_in_band_error_without_aborting_run() {
        let chunks = vec![
            clustered_chunk(0, 0, "alpha"),
            clustered_chunk(1, 1, "beta"),
        ];
        let client = Arc::new(CountingGenerator::failing_topic_prompts());
        let result = summarize(chunks, client, 10, 20_000).await;

        assert_eq!(result.topics.len(), 2);
        for topic in &result.topics {
            assert!(topic.topic_summary.starts_with("Error summarizing topic:"));
        }
        // Overall summary uses the overall prompt, which the stub answers.
        assert_eq!(result.overall_summary, "reduced summary");
    }

    #[tokio::test]
    async fn all_noise_falls_back_to_map_reduce_over_raw_chunks() {
        let chunks: Vec<ProcessedChunk> = (0..3)
            .map(|i| clustered_chunk(i, NOISE_CLUSTER_ID, &format!("noise {i}")))
            .collect();
        let client = Arc::new(CountingGenerator::new());
        let result = summarize(chunks, Arc::clone(&client), 10, 20_000).await;

        assert!(result.topics.is_empty());
        assert_eq!(result.noise_points.len(), 3);
        // One map call over the single super-chunk plus the reduce call.
        assert_eq!(client.calls(), 2);
        assert_eq!(result.overall_summary, "reduced summary");
    }

    #[tokio::test]
    async fn no_chunks_yields_fixed_placeholder() {
        let client = Arc::new(CountingGenerator::new());
        let result = summarize(Vec::new(), Arc::clone(&client), 10, 20_000).await;

        assert_eq!(result.overall_summary, NO_CONTENT_PLACEHOLDER);
        assert_eq!(client.calls(), 0);
    }

    #[test]
    fn super_chunks_respect_the_budget_boundaries() {
        let texts = vec!["aaaaaa", "bbbbbb", "cc"];
        let super_chunks = build_super_chunks(&texts, 10);
        assert_eq!(super_chunks, vec!["aaaaaa", "bbbbbb\n\ncc"]);

        let oversized = vec!["yyyyyyyyyyyyyyy", "zz"];
        let super_chunks = build_super_chunks(&oversized, 10);
        assert_eq!(super_chunks, vec!["yyyyyyyyyyyyyyy", "zz"]);
    }
}
