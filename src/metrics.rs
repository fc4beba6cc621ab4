use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing build and query activity.
#[derive(Default)]
pub struct RagMetrics {
    builds_completed: AtomicU64,
    chunks_indexed: AtomicU64,
    questions_answered: AtomicU64,
    questions_failed: AtomicU64,
    searches: AtomicU64,
}

impl RagMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed database build. The chunk counter reflects the latest build only,
    /// since a rebuild replaces the collection.
    pub fn record_build(&self, chunk_count: u64) {
        self.builds_completed.fetch_add(1, Ordering::Relaxed);
        self.chunks_indexed.store(chunk_count, Ordering::Relaxed);
    }

    /// Record the outcome of a question.
    pub fn record_question(&self, succeeded: bool) {
        if succeeded {
            self.questions_answered.fetch_add(1, Ordering::Relaxed);
        } else {
            self.questions_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a retrieval-only search.
    pub fn record_search(&self) {
        self.searches.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            builds_completed: self.builds_completed.load(Ordering::Relaxed),
            chunks_indexed: self.chunks_indexed.load(Ordering::Relaxed),
            questions_answered: self.questions_answered.load(Ordering::Relaxed),
            questions_failed: self.questions_failed.load(Ordering::Relaxed),
            searches: self.searches.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of the service counters used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Number of database builds completed since startup.
    pub builds_completed: u64,
    /// Chunks written by the most recent build.
    pub chunks_indexed: u64,
    /// Questions answered successfully.
    pub questions_answered: u64,
    /// Questions whose pipeline returned an error.
    pub questions_failed: u64,
    /// Retrieval-only searches served.
    pub searches: u64,
}
