//! Pipeline error taxonomy.
//!
//! Extraction and embedding failures are contained per file by the
//! orchestrator; query-time failures (including an empty or uninitialized
//! store) degrade to an empty result with the response's `degraded` flag
//! set instead of propagating to the caller.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Malformed or unsupported file content. Marks the file `Failed`;
    /// other files in the same run are unaffected.
    #[error("extraction failed for {file_id}: {cause}")]
    Extraction { file_id: String, cause: String },

    /// Embedding provider unavailable or timed out after bounded retries.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// Backing store unavailable. Queries return a degraded empty result;
    /// ingestion pauses until the next scheduled run.
    #[error("vector store error: {0}")]
    VectorStore(#[from] sqlx::Error),

    /// A file reference could not be downloaded from the listing provider.
    #[error("download failed for {file_id}: {cause}")]
    Download { file_id: String, cause: String },

    /// The answer generator failed after retrieval succeeded.
    #[error("answer generation failed: {0}")]
    AnswerGeneration(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
