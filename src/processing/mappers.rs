//! Mapping helpers for Qdrant payloads and chunk preparation.

use crate::{
    document::Document,
    processing::types::{DatabaseStats, RetrievedChunk},
    qdrant::{self, compute_chunk_hash},
};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashSet};

/// Chunk with its hash, ready for embedding.
#[derive(Debug, Clone)]
pub(crate) struct PreparedChunk {
    /// Chunk text and provenance.
    pub(crate) document: Document,
    /// Stable digest used for dedupe.
    pub(crate) chunk_hash: String,
}

/// Remove duplicate chunks, keeping the first occurrence.
///
/// Running headers and footers repeat verbatim across pages of a budget brief; indexing them
/// once keeps them from crowding out retrieval results.
pub(crate) fn dedupe_chunks(chunks: Vec<Document>) -> (Vec<PreparedChunk>, usize) {
    let mut seen = HashSet::new();
    let mut prepared = Vec::new();
    let mut skipped = 0;

    for document in chunks {
        if document.page_content.trim().is_empty() {
            continue;
        }
        let hash = compute_chunk_hash(&document.page_content);
        if seen.insert(hash.clone()) {
            prepared.push(PreparedChunk {
                document,
                chunk_hash: hash,
            });
        } else {
            skipped += 1;
        }
    }

    (prepared, skipped)
}

/// Map a Qdrant scored point into a retrieved chunk. Points without text are dropped.
pub(crate) fn map_scored_point(point: qdrant::ScoredPoint) -> Option<RetrievedChunk> {
    let qdrant::ScoredPoint { id, score, payload } = point;
    let mut map = payload?;

    let text = match map.remove("text") {
        Some(Value::String(value)) if !value.trim().is_empty() => value,
        _ => return None,
    };
    let source = match map.remove("source") {
        Some(Value::String(value)) if !value.trim().is_empty() => Some(value),
        _ => None,
    };

    Some(RetrievedChunk {
        id,
        score,
        text,
        source,
        page: read_usize(&map, "page"),
        start_index: read_usize(&map, "start_index"),
    })
}

fn read_usize(payload: &Map<String, Value>, key: &str) -> Option<usize> {
    payload
        .get(key)
        .and_then(Value::as_u64)
        .and_then(|value| usize::try_from(value).ok())
}

/// Running accumulator for collection statistics.
#[derive(Default)]
pub(crate) struct StatsAccumulator {
    chunks: u64,
    pages: BTreeSet<(String, usize)>,
    sources: BTreeSet<String>,
    last_indexed: Option<String>,
}

impl StatsAccumulator {
    /// Fold one payload into the statistics.
    pub(crate) fn add(&mut self, payload: &Map<String, Value>) {
        self.chunks += 1;
        let source = payload
            .get("source")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or_default()
            .to_string();
        if let Some(page) = read_usize(payload, "page") {
            self.pages.insert((source.clone(), page));
        }
        if !source.is_empty() {
            self.sources.insert(source);
        }
        if let Some(indexed_at) = payload.get("indexed_at").and_then(Value::as_str) {
            // RFC 3339 UTC timestamps order lexicographically.
            if self
                .last_indexed
                .as_deref()
                .is_none_or(|current| indexed_at > current)
            {
                self.last_indexed = Some(indexed_at.to_string());
            }
        }
    }

    /// Produce the final statistics; `points_count` wins over the scanned count when known.
    pub(crate) fn finish(self, points_count: Option<u64>) -> DatabaseStats {
        DatabaseStats {
            chunks: points_count.unwrap_or(self.chunks),
            pages: self.pages.len(),
            sources: self.sources.into_iter().collect(),
            last_indexed: self.last_indexed,
        }
    }
}
