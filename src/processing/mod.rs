//! Document processing pipeline: chunking, embedding, retrieval, and answer generation.

pub mod answer;
pub mod chunking;
mod mappers;
pub mod prompt;
mod service;
pub mod types;

pub use answer::{Figure, FigureKind, ParsedAnswer};
pub use service::{RagApi, RagService};
pub use types::{
    Answer, AnswerBody, BuildOutcome, ChunkingError, DATABASE_MISSING_MESSAGE, DatabaseStats,
    DatabaseStatus, QuestionKind, RagError, RetrievedChunk,
};
