//! Character-budget text splitting.
//!
//! The splitter works in two passes. A recursive pass breaks the document into fragments
//! that each fit the budget, preferring paragraph breaks, then line breaks, then sentence
//! ends, then word boundaries, and only hard-cutting when a single word exceeds the budget.
//! A packing pass then greedily joins consecutive fragments into chunks, carrying whole
//! trailing fragments of the previous chunk forward as overlap. Every emitted chunk is a
//! contiguous span of the original text, so concatenating the non-overlap portions
//! reproduces the document with no gaps.
//!
//! Lengths are measured in characters, not bytes, so multi-byte text never splits inside
//! a code point.

use super::types::{ChunkingError, TextChunk};

const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

/// Split text into ordered chunks of at most `chunk_size` characters, with consecutive
/// chunks overlapping by approximately `chunk_overlap` characters.
///
/// Whitespace-only input yields an empty vector, not an error.
pub(crate) fn split_text(
    text: &str,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<Vec<TextChunk>, ChunkingError> {
    if chunk_size == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let fragments = fragment(text, chunk_size, &SEPARATORS);
    let effective_overlap = chunk_overlap.min(chunk_size.saturating_sub(1));
    let chunks = pack(&fragments, chunk_size, effective_overlap);

    Ok(chunks
        .into_iter()
        .enumerate()
        .map(|(id, text)| TextChunk { id, text })
        .collect())
}

/// Recursively break `text` into fragments of at most `chunk_size` characters, trying
/// each separator in order before falling back to a hard character cut.
fn fragment<'a>(text: &'a str, chunk_size: usize, separators: &[&str]) -> Vec<&'a str> {
    if char_len(text) <= chunk_size {
        return vec![text];
    }

    let Some((separator, rest)) = separators.split_first() else {
        return hard_cut(text, chunk_size);
    };

    let pieces: Vec<&str> = text.split_inclusive(separator).collect();
    if pieces.len() <= 1 {
        return fragment(text, chunk_size, rest);
    }

    let mut fragments = Vec::with_capacity(pieces.len());
    for piece in pieces {
        if char_len(piece) <= chunk_size {
            fragments.push(piece);
        } else {
            fragments.extend(fragment(piece, chunk_size, rest));
        }
    }
    fragments
}

/// Cut text into spans of exactly `chunk_size` characters (the last may be shorter),
/// respecting char boundaries.
fn hard_cut(text: &str, chunk_size: usize) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut start = 0;
    let mut count = 0;
    for (idx, _) in text.char_indices() {
        if count == chunk_size {
            spans.push(&text[start..idx]);
            start = idx;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        spans.push(&text[start..]);
    }
    spans
}

/// Greedily pack fragments into chunks, seeding each new chunk with trailing fragments
/// of the previous one so adjacent chunks share roughly `overlap` characters.
fn pack(fragments: &[&str], chunk_size: usize, overlap: usize) -> Vec<String> {
    let mut chunks: Vec<String> = Vec::new();
    // Fragments of the chunk under construction, with their running char length.
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0;
    // How many leading fragments of `current` were carried over as overlap.
    let mut carried = 0;

    for &frag in fragments {
        let frag_len = char_len(frag);
        if current_len + frag_len > chunk_size && current.len() > carried {
            chunks.push(current.concat());

            let seed = overlap_tail(&current, overlap);
            let mut seed: Vec<&str> = seed.to_vec();
            let mut seed_len: usize = seed.iter().map(|f| char_len(f)).sum();
            // The seed plus the incoming fragment must still respect the budget.
            while !seed.is_empty() && seed_len + frag_len > chunk_size {
                seed_len -= char_len(seed.remove(0));
            }
            carried = seed.len();
            current = seed;
            current_len = seed_len;
        }
        current.push(frag);
        current_len += frag_len;
    }

    if current.len() > carried {
        chunks.push(current.concat());
    }
    chunks
}

/// Longest run of trailing fragments whose combined length stays within `overlap` chars.
fn overlap_tail<'a, 'b>(fragments: &'b [&'a str], overlap: usize) -> &'b [&'a str] {
    if overlap == 0 {
        return &[];
    }
    let mut total = 0;
    let mut start = fragments.len();
    while start > 0 {
        let len = char_len(fragments[start - 1]);
        if total + len > overlap {
            break;
        }
        total += len;
        start -= 1;
    }
    &fragments[start..]
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}
