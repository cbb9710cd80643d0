//! Sliding token-window chunker.
//!
//! Splits each [`TextUnit`] into overlapping windows of whitespace
//! tokens. Windows advance by `window * (1 - overlap_ratio)` tokens; the
//! last window is truncated to the remaining tail, never padded and never
//! dropped, so even a one-word unit produces exactly one chunk.
//!
//! `token_start`/`token_end` are absolute token indices into the unit's
//! text and the chunk text is the exact substring between those tokens,
//! which keeps lexical filtering and citation debugging honest.
//!
//! Chunk IDs are a SHA-256 of `(file_id, locator, window index)`:
//! re-running ingestion on unchanged content reproduces identical IDs,
//! which is what makes re-ingestion an idempotent upsert instead of a
//! duplication.

use sha2::{Digest, Sha256};

use crate::models::{Chunk, FileType, Locator, TextUnit};

/// A token with its byte span in the source text.
struct TokenSpan {
    start: usize,
    end: usize,
}

fn token_spans(text: &str) -> Vec<TokenSpan> {
    let mut spans = Vec::new();
    let mut start: Option<usize> = None;
    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            if let Some(s) = start.take() {
                spans.push(TokenSpan { start: s, end: i });
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        spans.push(TokenSpan {
            start: s,
            end: text.len(),
        });
    }
    spans
}

/// Deterministic chunk identity: pure function of file, locator, and
/// window index.
pub fn chunk_id(file_id: &str, locator: &Locator, window_index: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(file_id.as_bytes());
    hasher.update(b"\x1f");
    hasher.update(locator.to_string().as_bytes());
    hasher.update(b"\x1f");
    hasher.update(window_index.to_le_bytes());
    format!("{:x}", hasher.finalize())
}

/// Window a unit's text into chunks (embedding filled in later).
pub fn chunk_unit(
    unit: &TextUnit,
    filename: &str,
    file_type: FileType,
    uploaded_at: i64,
    window_tokens: usize,
    overlap_ratio: f64,
) -> Vec<Chunk> {
    let spans = token_spans(&unit.text);
    if spans.is_empty() {
        return Vec::new();
    }

    let stride = ((window_tokens as f64) * (1.0 - overlap_ratio)).floor() as usize;
    let stride = stride.max(1);

    let mut chunks = Vec::new();
    let mut window_index = 0usize;
    let mut token_start = 0usize;

    loop {
        let token_end = (token_start + window_tokens).min(spans.len());
        let byte_start = spans[token_start].start;
        let byte_end = spans[token_end - 1].end;

        chunks.push(Chunk {
            chunk_id: chunk_id(&unit.source_file_id, &unit.locator, window_index),
            source_file_id: unit.source_file_id.clone(),
            filename: filename.to_string(),
            file_type,
            locator: unit.locator.clone(),
            token_start: token_start as i64,
            token_end: token_end as i64,
            text: unit.text[byte_start..byte_end].to_string(),
            uploaded_at,
        });

        if token_end == spans.len() {
            break;
        }
        token_start += stride;
        window_index += 1;
    }

    chunks
}

/// Lowercased unique token set of a chunk's text, space-joined for
/// storage. Used by the lexical stage of hybrid retrieval.
pub fn token_set(text: &str) -> String {
    let mut tokens: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric() && c != '.' && c != '$')
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect();
    tokens.sort();
    tokens.dedup();
    tokens.join(" ")
}
