//! Memory retrieval and extraction pipeline
//!
//! Embeddings and fact extraction are delegated to OpenAI, vector search to
//! the `match_memory_fragments` pgvector RPC. This module glues those calls
//! together and assembles the persona prompt.

pub mod context;
pub mod extraction;
pub mod service;

pub use context::{ContextBuilder, Persona};
pub use service::{AnswerInput, IngestOutcome, MemoryDraft, MemoryService};

use crate::llm::OpenAiError;
use crate::store::SupabaseError;

/// Memory pipeline errors
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("Database error: {0}")]
    Database(#[from] SupabaseError),

    #[error("Language model error: {0}")]
    Llm(#[from] OpenAiError),

    #[error("Could not parse extraction output: {0}")]
    InvalidExtraction(String),
}
