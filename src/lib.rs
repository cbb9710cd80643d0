//! # Docdex
//!
//! **A workspace document indexing and question-answering pipeline.**
//!
//! Docdex ingests the documents shared in a team workspace (PDF, DOCX,
//! PPTX, XLSX, plain text, Markdown), chunks and embeds them, and
//! answers questions with precise source attribution — down to the
//! page, slide, sheet row, or line range the answer came from.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────┐
//! │ File Listing │──▶│  Ingestion   │──▶│  SQLite   │
//! │ fs / chat API│   │ Extract+Chunk│   │ chunks+vec│
//! └──────────────┘   └──────────────┘   └────┬─────┘
//!                                            │
//!                                            ▼
//!                                      ┌──────────┐
//!                                      │ Retrieval │
//!                                      │  hybrid   │
//!                                      └──────────┘
//! ```
//!
//! ## Data Flow
//!
//! 1. A [`sources::FileListing`] enumerates workspace files; the
//!    [`registry`] deduplicates them by content hash and tracks each
//!    file's ingestion state.
//! 2. The [`ingest`] orchestrator claims eligible files, runs the
//!    format-specific [`extract`]ors to get locator-tagged text units,
//!    and splits them into overlapping token windows ([`chunk`]).
//! 3. Chunks are persisted in the [`store`] with their full locator
//!    metadata; the [`embedding`] provider backfills vectors in batches.
//! 4. Queries go through [`retrieve`]: semantic cosine similarity and
//!    lexical keyword overlap, merged with a weighted hybrid score.
//! 5. Per-thread [`memory`] links follow-up questions to prior turns
//!    for query expansion.
//!
//! ## Locators
//!
//! | File type | Unit | Locator |
//! |-----------|------|---------|
//! | PDF | page | `page 12` |
//! | DOCX | paragraph range | `paragraphs 20-29` |
//! | PPTX | slide | `slide 3` |
//! | XLSX | sheet row | `sheet Coverage row 5` |
//! | TXT / MD | line range | `lines 1-40` |

pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod memory;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod registry;
pub mod retrieve;
pub mod sources;
pub mod status;
pub mod store;

pub use error::{PipelineError, Result};
pub use pipeline::Pipeline;
