//! Core data types and error definitions for the RAG pipeline.

use crate::{
    document::LoaderError, embedding::EmbeddingClientError, llm::LlmClientError,
    qdrant::QdrantError,
};
use anyhow::Error as TokenizerError;
use serde::Serialize;
use thiserror::Error;

use super::answer::{Figure, ParsedAnswer};

/// Message returned when no vector database has been built yet.
pub const DATABASE_MISSING_MESSAGE: &str = "Database not found! Please run first '--build' option.";

/// Errors produced while turning page text into chunks.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Ingestion configured an impossible length budget.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
    /// Overlap would swallow the whole chunk.
    #[error("chunk overlap {overlap} must be smaller than chunk size {chunk_size}")]
    InvalidOverlap {
        /// Requested overlap.
        overlap: usize,
        /// Requested chunk size.
        chunk_size: usize,
    },
    /// Tokenizer resources were unavailable for the configured model.
    #[error("failed to initialize tokenizer for model '{model}': {source}")]
    Tokenizer {
        /// Model we attempted to load.
        model: String,
        /// Underlying error raised by the tokenizer library.
        #[source]
        source: TokenizerError,
    },
}

/// Errors emitted by the build and query pipeline.
#[derive(Debug, Error)]
pub enum RagError {
    /// The vector collection has not been built.
    #[error("{}", DATABASE_MISSING_MESSAGE)]
    DatabaseMissing,
    /// The question or query text was blank.
    #[error("query text cannot be empty")]
    EmptyQuery,
    /// The corpus produced no chunks to index.
    #[error("document produced no text chunks")]
    EmptyDocument,
    /// A build is already running.
    #[error("a database build is already in progress")]
    BuildInProgress,
    /// The PDF could not be read.
    #[error("Failed to load document: {0}")]
    Loader(#[from] LoaderError),
    /// Chunking step failed to segment the document.
    #[error("Failed to chunk document: {0}")]
    Chunking(#[from] ChunkingError),
    /// Embedding provider failed to produce vectors.
    #[error("{0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Chat provider failed to answer.
    #[error("{0}")]
    Llm(#[from] LlmClientError),
    /// Qdrant interaction failed.
    #[error("Qdrant request failed: {0}")]
    Qdrant(#[from] QdrantError),
    /// Returned embedding dimension does not match configuration.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected embedding dimension configured on the server.
        expected: usize,
        /// Actual embedding dimension produced by the provider.
        actual: usize,
    },
    /// Embedding provider returned no vectors.
    #[error("Embedding provider returned no vectors for the query")]
    EmptyEmbedding,
}

/// How a question is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    /// Narrative answer split into answer, sources, and excerpts.
    Standard,
    /// Figure-focused answer with extracted amounts.
    Numerical,
    /// Retrieval only; returns the matched context.
    Query,
}

impl QuestionKind {
    /// Parse a request label. Unrecognized labels answer as [`QuestionKind::Standard`].
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "numerical" | "numeric" => Self::Numerical,
            "query" => Self::Query,
            _ => Self::Standard,
        }
    }

    /// Canonical label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Numerical => "numerical",
            Self::Query => "query",
        }
    }
}

/// Summary of a completed database build.
#[derive(Debug, Clone, Serialize)]
pub struct BuildOutcome {
    /// Collection that now holds the corpus.
    pub collection: String,
    /// Pages read from the PDF.
    pub pages: usize,
    /// Chunks embedded and stored.
    pub chunks: usize,
    /// Identical chunks dropped before embedding.
    pub skipped_duplicates: usize,
}

/// Chunk returned by similarity search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedChunk {
    /// Point identifier.
    pub id: String,
    /// Cosine similarity reported by Qdrant.
    pub score: f32,
    /// Chunk text.
    pub text: String,
    /// Source file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Zero-based page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
    /// Byte offset within the page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_index: Option<usize>,
}

/// Post-processed answer body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnswerBody {
    /// Answer parsed into its labelled sections.
    Sections(ParsedAnswer),
    /// Figure-focused answer.
    Numerical {
        /// Model output as returned.
        raw_output: String,
        /// Amounts, percentages, and fiscal years found in the output.
        figures: Vec<Figure>,
    },
    /// Unstructured output or retrieved context.
    Raw {
        /// Model output or joined context.
        raw_output: String,
    },
}

/// Answer plus the chunks it was grounded on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    /// Answer body.
    #[serde(flatten)]
    pub body: AnswerBody,
    /// Retrieved chunks passed to the model.
    pub retrieved: Vec<RetrievedChunk>,
}

/// Collection statistics reported by the status endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DatabaseStats {
    /// Stored chunks.
    pub chunks: u64,
    /// Distinct pages covered.
    pub pages: usize,
    /// Distinct source files.
    pub sources: Vec<String>,
    /// Latest `indexed_at` timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_indexed: Option<String>,
}

/// Vector database presence and statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatabaseStatus {
    /// Whether the collection exists.
    pub database_exists: bool,
    /// Collection URL.
    pub database_path: String,
    /// Statistics when the collection exists.
    pub stats: Option<DatabaseStats>,
}
