//! LLM-backed chunk repair with a discard/split/passthrough contract.
//!
//! Each chunk goes to the generation backend with a fixed system prompt. The model answers
//! with one or more `<repaired_text>` segments (a chunk may fan out into several cleaner
//! chunks), or an explicit `<discard/>` marker for content not worth keeping. The failure
//! handling is deliberately asymmetric: a malformed response means the model gave no usable
//! signal and the chunk is discarded without retry, while a transport error says nothing
//! about content quality, so the call is retried and ultimately falls back to the original
//! text.

use std::sync::{Arc, OnceLock};

use regex::Regex;

use crate::providers::{GenerationClient, SharedGenerationClient};
use crate::ratelimit::RateLimiter;

use super::types::TextChunk;

pub(crate) const REPAIR_SYSTEM_PROMPT: &str = "\
You are an expert text processor. Analyze the given text chunk and improve it.

Follow these steps:
1. Determine whether the chunk contains one coherent topic or several distinct topics.
2. Process the text:
   - If the chunk is coherent, repair grammatical errors and formatting artifacts and \
enclose the cleaned result in a single <repaired_text> tag.
   - If the chunk mixes topics, split it into semantically coherent sub-chunks, repair \
each one, and enclose EACH sub-chunk in its own <repaired_text> tag.
   - If the chunk is boilerplate, navigation debris, or otherwise carries no meaningful \
content, output exactly <discard/>.
3. Your entire output must consist only of <repaired_text> tags or the <discard/> marker. \
Do not add any other text.";

const DISCARD_MARKER: &str = "<discard/>";

fn segment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)<repaired_text>(.*?)</repaired_text>").expect("valid segment pattern")
    })
}

/// Repair every chunk concurrently, preserving document order in the output.
///
/// Each chunk runs as its own task under the shared rate limiter; a panicking task falls
/// back to the original chunk text so no chunk silently vanishes. The fan-out results are
/// concatenated in original chunk order and re-identified sequentially.
pub(crate) async fn repair_chunks(
    chunks: Vec<TextChunk>,
    client: SharedGenerationClient,
    limiter: Arc<RateLimiter>,
    max_retries: usize,
) -> Vec<TextChunk> {
    let original_count = chunks.len();
    let mut handles = Vec::with_capacity(chunks.len());
    for chunk in &chunks {
        let client = Arc::clone(&client);
        let limiter = Arc::clone(&limiter);
        let chunk = chunk.clone();
        handles.push(tokio::spawn(async move {
            repair_chunk(&chunk, client.as_ref(), &limiter, max_retries).await
        }));
    }

    let mut texts = Vec::with_capacity(original_count);
    for (handle, original) in handles.into_iter().zip(chunks) {
        match handle.await {
            Ok(fanout) => texts.extend(fanout),
            Err(error) => {
                tracing::warn!(
                    chunk_id = original.id,
                    %error,
                    "Repair task aborted; keeping original chunk"
                );
                texts.push(original.text);
            }
        }
    }

    tracing::info!(
        original_chunks = original_count,
        repaired_chunks = texts.len(),
        "Repair stage complete"
    );
    texts
        .into_iter()
        .enumerate()
        .map(|(id, text)| TextChunk { id, text })
        .collect()
}

/// Repair a single chunk, returning its downstream fan-out (possibly empty).
async fn repair_chunk(
    chunk: &TextChunk,
    client: &dyn GenerationClient,
    limiter: &RateLimiter,
    max_retries: usize,
) -> Vec<String> {
    let user_prompt = format!("Here is the text chunk to process:\n{}", chunk.text);
    let attempts = max_retries + 1;

    for attempt in 1..=attempts {
        limiter.acquire().await;
        match client.generate(&user_prompt, REPAIR_SYSTEM_PROMPT).await {
            Ok(response) => {
                if response.contains(DISCARD_MARKER) {
                    tracing::debug!(chunk_id = chunk.id, "Chunk discarded by repair model");
                    return Vec::new();
                }
                let segments = extract_segments(&response);
                if segments.is_empty() {
                    // No signal from the model; discarding beats keeping a hallucination.
                    tracing::warn!(
                        chunk_id = chunk.id,
                        "Repair response contained no repaired_text segments; discarding chunk"
                    );
                    return Vec::new();
                }
                return segments;
            }
            Err(error) => {
                tracing::warn!(
                    chunk_id = chunk.id,
                    attempt,
                    attempts,
                    %error,
                    "Repair call failed"
                );
            }
        }
    }

    tracing::warn!(
        chunk_id = chunk.id,
        attempts,
        "All repair attempts failed; keeping original text"
    );
    vec![chunk.text.clone()]
}

fn extract_segments(response: &str) -> Vec<String> {
    segment_pattern()
        .captures_iter(response)
        .map(|capture| capture[1].trim().to_string())
        .filter(|segment| !segment.is_empty())
        .collect()
}
