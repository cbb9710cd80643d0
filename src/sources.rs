//! Collaborator interfaces and the built-in filesystem file listing.
//!
//! The pipeline talks to the outside world through two traits:
//! [`FileListing`], which enumerates workspace files and resolves
//! download references to bytes, and [`AnswerGenerator`], which turns a
//! ranked chunk list into prose. The chat-platform integration
//! implements both; for local deployments and tests a directory-backed
//! [`FilesystemListing`] ships in-crate.

use anyhow::Result;
use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::WorkspaceConfig;
use crate::models::{FileListingEntry, FileType, RankedChunk};

/// Enumerates workspace files and downloads their content.
#[async_trait]
pub trait FileListing: Send + Sync {
    /// List every file currently visible in the workspace. Each run is a
    /// full scan, not an append-only stream, so historical files
    /// uploaded before the pipeline existed are eventually indexed.
    async fn list_files(&self) -> Result<Vec<FileListingEntry>>;

    /// Resolve a listing entry's `download_ref` to raw bytes.
    async fn download(&self, download_ref: &str) -> Result<Vec<u8>>;
}

/// Turns a question and its ranked evidence into an answer. Implemented
/// by the LLM integration; opaque to the pipeline.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(&self, question: &str, chunks: &[RankedChunk]) -> Result<String>;
}

/// Directory-backed [`FileListing`]: workspace files are the supported
/// documents under a root directory, with relative paths as stable file
/// IDs.
pub struct FilesystemListing {
    root: PathBuf,
    include: GlobSet,
    exclude: GlobSet,
}

impl FilesystemListing {
    pub fn new(config: &WorkspaceConfig) -> Result<Self> {
        let mut default_excludes = vec!["**/.git/**".to_string(), "**/target/**".to_string()];
        default_excludes.extend(config.exclude_globs.clone());
        Ok(Self {
            root: config.root.clone(),
            include: build_globset(&config.include_globs)?,
            exclude: build_globset(&default_excludes)?,
        })
    }
}

#[async_trait]
impl FileListing for FilesystemListing {
    async fn list_files(&self) -> Result<Vec<FileListingEntry>> {
        if !self.root.exists() {
            anyhow::bail!("workspace root does not exist: {}", self.root.display());
        }

        let mut entries = Vec::new();
        for entry in WalkDir::new(&self.root) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let relative = path.strip_prefix(&self.root).unwrap_or(path);
            let rel_str = relative.to_string_lossy().to_string();

            if self.exclude.is_match(&rel_str) || !self.include.is_match(&rel_str) {
                continue;
            }

            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| rel_str.clone());
            let file_type = match FileType::from_filename(&filename) {
                Some(ft) => ft,
                None => continue,
            };

            let metadata = std::fs::metadata(path)?;
            let uploaded_at = metadata
                .modified()
                .ok()
                .and_then(|m| m.duration_since(std::time::SystemTime::UNIX_EPOCH).ok())
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0);

            entries.push(FileListingEntry {
                file_id: rel_str.clone(),
                filename,
                file_type,
                size: metadata.len() as i64,
                uploaded_at,
                download_ref: path.to_string_lossy().to_string(),
            });
        }

        // Sort for deterministic ordering.
        entries.sort_by(|a, b| a.file_id.cmp(&b.file_id));
        Ok(entries)
    }

    async fn download(&self, download_ref: &str) -> Result<Vec<u8>> {
        Ok(std::fs::read(Path::new(download_ref))?)
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
