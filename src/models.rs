//! Core data models used throughout docdex.
//!
//! These types represent the source files, extraction units, chunks, and
//! retrieval results that flow through the ingestion and query pipeline.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Supported document formats, selected by filename extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Pdf,
    Docx,
    Pptx,
    Xlsx,
    Txt,
    Md,
}

impl FileType {
    /// Map a filename to a supported format, or `None` for anything else.
    pub fn from_filename(name: &str) -> Option<Self> {
        let ext = name.rsplit('.').next()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(FileType::Pdf),
            "docx" => Some(FileType::Docx),
            "pptx" => Some(FileType::Pptx),
            "xlsx" => Some(FileType::Xlsx),
            "txt" => Some(FileType::Txt),
            "md" | "markdown" => Some(FileType::Md),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Pdf => "pdf",
            FileType::Docx => "docx",
            FileType::Pptx => "pptx",
            FileType::Xlsx => "xlsx",
            FileType::Txt => "txt",
            FileType::Md => "md",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pdf" => Some(FileType::Pdf),
            "docx" => Some(FileType::Docx),
            "pptx" => Some(FileType::Pptx),
            "xlsx" => Some(FileType::Xlsx),
            "txt" => Some(FileType::Txt),
            "md" => Some(FileType::Md),
            _ => None,
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-file ingestion lifecycle state, persisted in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestionState {
    Pending,
    Extracting,
    Indexed,
    Failed,
    PermanentlyFailed,
}

impl IngestionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestionState::Pending => "pending",
            IngestionState::Extracting => "extracting",
            IngestionState::Indexed => "indexed",
            IngestionState::Failed => "failed",
            IngestionState::PermanentlyFailed => "permanently_failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(IngestionState::Pending),
            "extracting" => Some(IngestionState::Extracting),
            "indexed" => Some(IngestionState::Indexed),
            "failed" => Some(IngestionState::Failed),
            "permanently_failed" => Some(IngestionState::PermanentlyFailed),
            _ => None,
        }
    }
}

impl fmt::Display for IngestionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A workspace file as seen by the listing provider, before registration.
#[derive(Debug, Clone)]
pub struct FileListingEntry {
    /// Platform-stable unique identifier.
    pub file_id: String,
    pub filename: String,
    pub file_type: FileType,
    pub size: i64,
    /// Upload timestamp (unix seconds), used for recency tie-breaking.
    pub uploaded_at: i64,
    /// Opaque reference the provider resolves to bytes on download.
    pub download_ref: String,
}

/// Registry row for a registered source file.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub file_id: String,
    pub filename: String,
    pub file_type: FileType,
    pub content_hash: String,
    pub size: i64,
    pub uploaded_at: i64,
    pub state: IngestionState,
    pub retry_count: i64,
    pub last_error: Option<String>,
}

/// Format-specific position descriptor used for citations.
///
/// Serialized as tagged JSON in chunk metadata; rendered via `Display`
/// for user-facing attributions ("page 2", "sheet Coverage row 5").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Locator {
    Page { page: u32 },
    Slide { slide: u32 },
    SheetRow { sheet: String, row: u32 },
    Lines { start: u32, end: u32 },
    Paragraphs { start: u32, end: u32 },
}

impl Locator {
    pub fn unit_kind(&self) -> &'static str {
        match self {
            Locator::Page { .. } => "page",
            Locator::Slide { .. } => "slide",
            Locator::SheetRow { .. } => "sheet_row",
            Locator::Lines { .. } => "line_range",
            Locator::Paragraphs { .. } => "paragraph_range",
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Page { page } => write!(f, "page {}", page),
            Locator::Slide { slide } => write!(f, "slide {}", slide),
            Locator::SheetRow { sheet, row } => write!(f, "sheet {} row {}", sheet, row),
            Locator::Lines { start, end } => write!(f, "lines {}-{}", start, end),
            Locator::Paragraphs { start, end } => write!(f, "paragraphs {}-{}", start, end),
        }
    }
}

/// Intermediate extraction result: one location-tagged span of text.
/// Produced by an extractor, consumed immediately by the chunker; never
/// persisted.
#[derive(Debug, Clone)]
pub struct TextUnit {
    pub source_file_id: String,
    pub locator: Locator,
    pub text: String,
}

/// The atomic indexed entity. `chunk_id` is a pure function of
/// `(file_id, locator, window_index)`, so re-ingestion of unchanged
/// content reproduces identical IDs and upserts are idempotent.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub chunk_id: String,
    pub source_file_id: String,
    pub filename: String,
    pub file_type: FileType,
    pub locator: Locator,
    /// Absolute token offsets into the owning unit's text.
    pub token_start: i64,
    pub token_end: i64,
    pub text: String,
    pub uploaded_at: i64,
}

/// A ranked retrieval result handed to the answer generator.
#[derive(Debug, Clone, Serialize)]
pub struct RankedChunk {
    pub chunk_id: String,
    pub file_id: String,
    pub filename: String,
    pub file_type: FileType,
    pub locator: Locator,
    pub token_start: i64,
    pub text_excerpt: String,
    pub score: f64,
    pub semantic_score: f64,
    pub lexical_score: f64,
}

/// Query response: ranked chunks plus a degradation flag for the caller
/// to render "no information found" instead of crashing.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub chunks: Vec<RankedChunk>,
    pub degraded: bool,
    /// Thread-expanded query actually embedded, if expansion happened.
    /// Diagnostic only; never shown to users.
    pub expanded_query: Option<String>,
}

/// Aggregated diagnostics from registry and vector store.
#[derive(Debug, Clone, Serialize)]
pub struct IngestionStats {
    pub files_by_type: HashMap<String, i64>,
    pub files_by_state: HashMap<String, i64>,
    pub chunks_total: i64,
    pub vectors_total: i64,
    pub last_run_at: Option<i64>,
    pub failed_file_ids: Vec<String>,
}
