//! Qdrant vector store integration.

pub mod client;
pub mod payload;
/// Streaming helpers for Qdrant scroll pagination.
pub mod scroller;
pub mod types;

pub use client::QdrantService;
pub use payload::{compute_chunk_hash, current_timestamp_rfc3339};
pub use types::{CollectionInfo, PointInsert, QdrantError, ScoredPoint};
