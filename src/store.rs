//! Vector Store: chunk metadata and embedding persistence.
//!
//! Disk-backed SQLite, shared with the registry, so everything survives
//! restarts and already-indexed content is recoverable without re-reading
//! source files. Upserts are keyed on the deterministic chunk ID, which
//! makes re-ingestion of unchanged content a no-op in effect. Similarity
//! search loads the persisted BLOBs and scores cosine in Rust.

use sqlx::{Row, SqlitePool};
use tracing::warn;

use crate::chunk::token_set;
use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::error::Result;
use crate::models::{Chunk, FileType, Locator};

/// Chunk row with its stored metadata, as read back from the store.
#[derive(Debug, Clone)]
pub struct StoredChunk {
    pub chunk_id: String,
    pub file_id: String,
    pub filename: String,
    pub file_type: FileType,
    pub locator: Locator,
    pub token_start: i64,
    pub token_end: i64,
    pub text: String,
    pub tokens: String,
    pub uploaded_at: i64,
}

pub struct VectorStore {
    pool: SqlitePool,
}

impl VectorStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Idempotent metadata upsert keyed on the deterministic chunk ID.
    pub async fn upsert_chunk(&self, chunk: &Chunk) -> Result<()> {
        let locator_json = serde_json::to_string(&chunk.locator)
            .unwrap_or_else(|_| "{}".to_string());
        sqlx::query(
            r#"
            INSERT INTO chunks
                (chunk_id, file_id, filename, file_type, unit_kind, locator_json,
                 token_start, token_end, text, tokens, uploaded_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(chunk_id) DO UPDATE SET
                filename = excluded.filename,
                file_type = excluded.file_type,
                unit_kind = excluded.unit_kind,
                locator_json = excluded.locator_json,
                token_start = excluded.token_start,
                token_end = excluded.token_end,
                text = excluded.text,
                tokens = excluded.tokens,
                uploaded_at = excluded.uploaded_at
            "#,
        )
        .bind(&chunk.chunk_id)
        .bind(&chunk.source_file_id)
        .bind(&chunk.filename)
        .bind(chunk.file_type.as_str())
        .bind(chunk.locator.unit_kind())
        .bind(&locator_json)
        .bind(chunk.token_start)
        .bind(chunk.token_end)
        .bind(&chunk.text)
        .bind(token_set(&chunk.text))
        .bind(chunk.uploaded_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_vector(&self, chunk_id: &str, vector: &[f32]) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO chunk_vectors (chunk_id, embedding) VALUES (?, ?)
            ON CONFLICT(chunk_id) DO UPDATE SET embedding = excluded.embedding
            "#,
        )
        .bind(chunk_id)
        .bind(vec_to_blob(vector))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Replace a file's chunk set: delete rows whose IDs are not in the
    /// new set (stale windows from a longer previous version), then
    /// upsert the new chunks. Runs in one transaction per file.
    pub async fn replace_file_chunks(&self, file_id: &str, chunks: &[Chunk]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let existing: Vec<(String,)> =
            sqlx::query_as("SELECT chunk_id FROM chunks WHERE file_id = ?")
                .bind(file_id)
                .fetch_all(&mut *tx)
                .await?;
        let keep: std::collections::HashSet<&str> =
            chunks.iter().map(|c| c.chunk_id.as_str()).collect();

        for (chunk_id,) in &existing {
            if !keep.contains(chunk_id.as_str()) {
                sqlx::query("DELETE FROM chunk_vectors WHERE chunk_id = ?")
                    .bind(chunk_id)
                    .execute(&mut *tx)
                    .await?;
                sqlx::query("DELETE FROM chunks WHERE chunk_id = ?")
                    .bind(chunk_id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        for chunk in chunks {
            let locator_json = serde_json::to_string(&chunk.locator)
                .unwrap_or_else(|_| "{}".to_string());
            sqlx::query(
                r#"
                INSERT INTO chunks
                    (chunk_id, file_id, filename, file_type, unit_kind, locator_json,
                     token_start, token_end, text, tokens, uploaded_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(chunk_id) DO UPDATE SET
                    filename = excluded.filename,
                    file_type = excluded.file_type,
                    unit_kind = excluded.unit_kind,
                    locator_json = excluded.locator_json,
                    token_start = excluded.token_start,
                    token_end = excluded.token_end,
                    text = excluded.text,
                    tokens = excluded.tokens,
                    uploaded_at = excluded.uploaded_at
                "#,
            )
            .bind(&chunk.chunk_id)
            .bind(&chunk.source_file_id)
            .bind(&chunk.filename)
            .bind(chunk.file_type.as_str())
            .bind(chunk.locator.unit_kind())
            .bind(&locator_json)
            .bind(chunk.token_start)
            .bind(chunk.token_end)
            .bind(&chunk.text)
            .bind(token_set(&chunk.text))
            .bind(chunk.uploaded_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Nearest-neighbor search: cosine similarity against every stored
    /// vector, top `k` returned as `(chunk_id, similarity)`.
    pub async fn search(&self, query_vector: &[f32], k: usize) -> Result<Vec<(String, f64)>> {
        let rows = sqlx::query("SELECT chunk_id, embedding FROM chunk_vectors")
            .fetch_all(&self.pool)
            .await?;

        let mut scored: Vec<(String, f64)> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let vec = blob_to_vec(&blob);
                let similarity = cosine_similarity(query_vector, &vec) as f64;
                (row.get("chunk_id"), similarity)
            })
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(k);
        Ok(scored)
    }

    pub async fn get_chunk(&self, chunk_id: &str) -> Result<Option<StoredChunk>> {
        let row = sqlx::query(
            r#"
            SELECT chunk_id, file_id, filename, file_type, locator_json,
                   token_start, token_end, text, tokens, uploaded_at
            FROM chunks WHERE chunk_id = ?
            "#,
        )
        .bind(chunk_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| row_to_chunk(&r)))
    }

    /// Full metadata scan for the lexical channel.
    pub async fn all_chunks(&self) -> Result<Vec<StoredChunk>> {
        let rows = sqlx::query(
            r#"
            SELECT chunk_id, file_id, filename, file_type, locator_json,
                   token_start, token_end, text, tokens, uploaded_at
            FROM chunks
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_chunk).collect())
    }

    /// Chunks without a stored vector, oldest file first, for embedding
    /// backfill.
    pub async fn pending_vectors(&self, limit: usize) -> Result<Vec<(String, String)>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT c.chunk_id, c.text
            FROM chunks c
            LEFT JOIN chunk_vectors v ON v.chunk_id = c.chunk_id
            WHERE v.chunk_id IS NULL
            ORDER BY c.file_id, c.token_start
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn count_chunks(&self) -> Result<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?)
    }

    pub async fn count_vectors(&self) -> Result<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM chunk_vectors")
            .fetch_one(&self.pool)
            .await?)
    }

    /// Pin the embedding model identity. A change of model clears all
    /// stored vectors so they are re-embedded in the new space instead
    /// of being silently mixed with the old one.
    pub async fn ensure_model(&self, model: &str, dims: usize) -> Result<()> {
        let stored: Option<(String, i64)> =
            sqlx::query_as("SELECT model, dims FROM embedding_meta WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;

        match stored {
            Some((stored_model, stored_dims))
                if stored_model == model && stored_dims == dims as i64 =>
            {
                return Ok(());
            }
            Some((stored_model, _)) => {
                warn!(
                    old_model = %stored_model,
                    new_model = %model,
                    "embedding model changed; clearing vectors for full re-embed"
                );
                sqlx::query("DELETE FROM chunk_vectors")
                    .execute(&self.pool)
                    .await?;
            }
            None => {}
        }

        sqlx::query(
            r#"
            INSERT INTO embedding_meta (id, model, dims) VALUES (1, ?, ?)
            ON CONFLICT(id) DO UPDATE SET model = excluded.model, dims = excluded.dims
            "#,
        )
        .bind(model)
        .bind(dims as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn row_to_chunk(row: &sqlx::sqlite::SqliteRow) -> StoredChunk {
    let file_type: String = row.get("file_type");
    let locator_json: String = row.get("locator_json");
    StoredChunk {
        chunk_id: row.get("chunk_id"),
        file_id: row.get("file_id"),
        filename: row.get("filename"),
        file_type: FileType::parse(&file_type).unwrap_or(FileType::Txt),
        locator: serde_json::from_str(&locator_json)
            .unwrap_or(Locator::Lines { start: 0, end: 0 }),
        token_start: row.get("token_start"),
        token_end: row.get("token_end"),
        text: row.get("text"),
        tokens: row.get("tokens"),
        uploaded_at: row.get("uploaded_at"),
    }
}
