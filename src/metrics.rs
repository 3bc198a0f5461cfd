use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing pipeline activity.
#[derive(Default)]
pub struct RunMetrics {
    documents_processed: AtomicU64,
    chunks_processed: AtomicU64,
    topics_summarized: AtomicU64,
}

impl RunMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed run with the number of chunks and topics it produced.
    pub fn record_run(&self, chunk_count: u64, topic_count: u64) {
        self.documents_processed.fetch_add(1, Ordering::Relaxed);
        self.chunks_processed
            .fetch_add(chunk_count, Ordering::Relaxed);
        self.topics_summarized
            .fetch_add(topic_count, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_processed: self.documents_processed.load(Ordering::Relaxed),
            chunks_processed: self.chunks_processed.load(Ordering::Relaxed),
            topics_summarized: self.topics_summarized.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of run counters used for reporting.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Number of documents processed since startup.
    pub documents_processed: u64,
    /// Total chunk count across all processed documents.
    pub chunks_processed: u64,
    /// Total topic summaries produced across all runs.
    pub topics_summarized: u64,
}
