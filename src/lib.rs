#![deny(missing_docs)]

//! Core library for the budget brief question-answering service.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// PDF loading into page documents.
pub mod document;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Chat completion clients.
pub mod llm;
/// Structured logging and tracing setup.
pub mod logging;
/// Build and query counters.
pub mod metrics;
/// Chunking, retrieval, and answer generation.
pub mod processing;
/// Qdrant vector store integration.
pub mod qdrant;
