//! File Registry: the persistent dedup ledger and per-file state machine.
//!
//! Every workspace file the orchestrator has ever seen gets a row here.
//! Rows are never deleted while the file exists upstream; a re-upload
//! with a new content hash flips the row back to `pending` (re-ingestion,
//! not overwrite-in-place) so the audit trail survives.
//!
//! The `claim` transition doubles as the per-file concurrency lock: an
//! atomic `UPDATE ... WHERE state IN (...)` moves exactly one eligible
//! row to `extracting`, and the pipeline that lost the race skips the
//! file. A crash mid-extraction leaves the row in `extracting`;
//! [`reset_stale_claims`] reclaims those on the next startup
//! (at-least-once semantics, made harmless by deterministic chunk IDs).

use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use tracing::info;

use crate::error::Result;
use crate::models::{FileListingEntry, FileType, IngestionState, SourceFile};

/// Outcome of registering a listed file against the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// Never seen before; row created in `pending`.
    New,
    /// Same content hash as the stored row; nothing to do.
    Unchanged,
    /// Known file with different content; reset to `pending` for
    /// re-ingestion.
    Changed,
}

pub struct Registry {
    pool: SqlitePool,
    max_retries: i64,
}

impl Registry {
    pub fn new(pool: SqlitePool, max_retries: i64) -> Self {
        Self { pool, max_retries }
    }

    /// Register a listed file, deduplicating by `(file_id, content_hash)`.
    ///
    /// Safe under concurrent registration: the insert is atomic on the
    /// `file_id` key, so two racing scans agree on one `New` and one
    /// `Unchanged` instead of colliding.
    pub async fn register_if_new(
        &self,
        entry: &FileListingEntry,
        content_hash: &str,
    ) -> Result<RegisterOutcome> {
        let now = chrono::Utc::now().timestamp();

        let inserted = sqlx::query(
            r#"
            INSERT INTO files
                (file_id, filename, file_type, content_hash, size,
                 uploaded_at, state, retry_count, last_error, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, 'pending', 0, NULL, ?)
            ON CONFLICT(file_id) DO NOTHING
            "#,
        )
        .bind(&entry.file_id)
        .bind(&entry.filename)
        .bind(entry.file_type.as_str())
        .bind(content_hash)
        .bind(entry.size)
        .bind(entry.uploaded_at)
        .bind(now)
        .execute(&self.pool)
        .await?;
        if inserted.rows_affected() == 1 {
            return Ok(RegisterOutcome::New);
        }

        let stored_hash: String =
            sqlx::query_scalar("SELECT content_hash FROM files WHERE file_id = ?")
                .bind(&entry.file_id)
                .fetch_one(&self.pool)
                .await?;
        if stored_hash == content_hash {
            return Ok(RegisterOutcome::Unchanged);
        }

        // Content changed upstream: reset for re-ingestion and clear the
        // retry budget. A file mid-extraction keeps its claim; the next
        // scan re-registers the new content once the claim is released.
        let updated = sqlx::query(
            r#"
            UPDATE files
            SET content_hash = ?, filename = ?, size = ?, uploaded_at = ?,
                state = 'pending', retry_count = 0, last_error = NULL,
                updated_at = ?
            WHERE file_id = ? AND state != 'extracting'
            "#,
        )
        .bind(content_hash)
        .bind(&entry.filename)
        .bind(entry.size)
        .bind(entry.uploaded_at)
        .bind(now)
        .bind(&entry.file_id)
        .execute(&self.pool)
        .await?;
        if updated.rows_affected() == 1 {
            Ok(RegisterOutcome::Changed)
        } else {
            Ok(RegisterOutcome::Unchanged)
        }
    }

    /// Atomically claim a file for extraction. Returns `false` if another
    /// pipeline claimed it first or it is not in an eligible state.
    pub async fn claim(&self, file_id: &str) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            UPDATE files
            SET state = 'extracting', updated_at = ?
            WHERE file_id = ? AND state IN ('pending', 'failed')
            "#,
        )
        .bind(now)
        .bind(file_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn mark_indexed(&self, file_id: &str) -> Result<()> {
        self.set_state(file_id, IngestionState::Indexed, None).await
    }

    /// Record a per-file failure. Once the retry budget is spent the file
    /// is parked as `permanently_failed` and excluded from further
    /// automatic retries (still visible via status()).
    pub async fn mark_failed(&self, file_id: &str, error: &str) -> Result<IngestionState> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            UPDATE files
            SET retry_count = retry_count + 1, last_error = ?, updated_at = ?,
                state = CASE WHEN retry_count + 1 > ? THEN 'permanently_failed'
                             ELSE 'failed' END
            WHERE file_id = ?
            "#,
        )
        .bind(error)
        .bind(now)
        .bind(self.max_retries)
        .bind(file_id)
        .execute(&self.pool)
        .await?;

        let state: String = sqlx::query_scalar("SELECT state FROM files WHERE file_id = ?")
            .bind(file_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(IngestionState::parse(&state).unwrap_or(IngestionState::Failed))
    }

    /// Return files left in `extracting` by a crashed or cancelled run to
    /// `pending` so the next scan retries them.
    pub async fn reset_stale_claims(&self) -> Result<u64> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            "UPDATE files SET state = 'pending', updated_at = ? WHERE state = 'extracting'",
        )
        .bind(now)
        .execute(&self.pool)
        .await?;
        let reclaimed = result.rows_affected();
        if reclaimed > 0 {
            info!(reclaimed, "reset stale extraction claims");
        }
        Ok(reclaimed)
    }

    pub async fn list_by_state(&self, state: IngestionState) -> Result<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT file_id FROM files WHERE state = ? ORDER BY file_id")
                .bind(state.as_str())
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Files eligible for a claim this run: anything not indexed and not
    /// permanently parked.
    pub async fn list_eligible(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT file_id FROM files WHERE state IN ('pending', 'failed') ORDER BY file_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    pub async fn get(&self, file_id: &str) -> Result<Option<SourceFile>> {
        let row = sqlx::query(
            r#"
            SELECT file_id, filename, file_type, content_hash, size,
                   uploaded_at, state, retry_count, last_error
            FROM files WHERE file_id = ?
            "#,
        )
        .bind(file_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| {
            let file_type: String = row.get("file_type");
            let state: String = row.get("state");
            SourceFile {
                file_id: row.get("file_id"),
                filename: row.get("filename"),
                file_type: FileType::parse(&file_type).unwrap_or(FileType::Txt),
                content_hash: row.get("content_hash"),
                size: row.get("size"),
                uploaded_at: row.get("uploaded_at"),
                state: IngestionState::parse(&state).unwrap_or(IngestionState::Pending),
                retry_count: row.get("retry_count"),
                last_error: row.get("last_error"),
            }
        }))
    }

    /// Counts by file type and by state, for status reporting.
    pub async fn stats(&self) -> Result<(HashMap<String, i64>, HashMap<String, i64>)> {
        let by_type: Vec<(String, i64)> =
            sqlx::query_as("SELECT file_type, COUNT(*) FROM files GROUP BY file_type")
                .fetch_all(&self.pool)
                .await?;
        let by_state: Vec<(String, i64)> =
            sqlx::query_as("SELECT state, COUNT(*) FROM files GROUP BY state")
                .fetch_all(&self.pool)
                .await?;
        Ok((
            by_type.into_iter().collect(),
            by_state.into_iter().collect(),
        ))
    }

    async fn set_state(
        &self,
        file_id: &str,
        state: IngestionState,
        error: Option<&str>,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query("UPDATE files SET state = ?, last_error = ?, updated_at = ? WHERE file_id = ?")
            .bind(state.as_str())
            .bind(error)
            .bind(now)
            .bind(file_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
