//! Concurrent chunk embedding.
//!
//! Every surviving chunk is embedded concurrently. A chunk whose embedding call fails or
//! comes back empty is dropped outright, since clustering has no use for a chunk without a
//! vector. Completion order is explicitly not an ordering guarantee; the output is re-sorted
//! by chunk id to restore document order.

use std::sync::Arc;

use futures_util::future::join_all;

use crate::providers::SharedEmbeddingClient;

use super::types::{ProcessedChunk, TextChunk};

/// Embed all chunks concurrently, dropping failures, sorted by `chunk_id` ascending.
pub(crate) async fn embed_chunks(
    chunks: Vec<TextChunk>,
    client: SharedEmbeddingClient,
) -> Vec<ProcessedChunk> {
    let total = chunks.len();
    let tasks = chunks.into_iter().map(|chunk| {
        let client = Arc::clone(&client);
        async move {
            match client.embed(&chunk.text).await {
                Ok(embedding) if !embedding.is_empty() => Some(ProcessedChunk {
                    chunk_id: chunk.id,
                    text: chunk.text,
                    embedding: Some(embedding),
                    cluster_id: None,
                }),
                Ok(_) => {
                    tracing::warn!(chunk_id = chunk.id, "Empty embedding; dropping chunk");
                    None
                }
                Err(error) => {
                    tracing::warn!(chunk_id = chunk.id, %error, "Embedding failed; dropping chunk");
                    None
                }
            }
        }
    });

    let mut processed: Vec<ProcessedChunk> = join_all(tasks).await.into_iter().flatten().collect();
    processed.sort_by_key(|chunk| chunk.chunk_id);

    tracing::info!(
        requested = total,
        embedded = processed.len(),
        "Embedding stage complete"
    );
    processed
}
