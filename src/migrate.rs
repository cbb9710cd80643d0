//! Idempotent schema creation.
//!
//! Two durable stores back the pipeline: the file registry (`files`) and
//! the vector store (`chunks` + `chunk_vectors`). Both must survive
//! process restarts, and already-indexed entries must be recoverable
//! without re-reading the original files.

use anyhow::Result;
use sqlx::SqlitePool;

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // File registry: the dedup ledger and ingestion state machine.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS files (
            file_id TEXT PRIMARY KEY,
            filename TEXT NOT NULL,
            file_type TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            size INTEGER NOT NULL,
            uploaded_at INTEGER NOT NULL,
            state TEXT NOT NULL DEFAULT 'pending',
            retry_count INTEGER NOT NULL DEFAULT 0,
            last_error TEXT,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Chunk metadata. `tokens` holds the lowercased unique token set of
    // `text` for lexical filtering; `locator_json` is the tagged Locator.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            chunk_id TEXT PRIMARY KEY,
            file_id TEXT NOT NULL,
            filename TEXT NOT NULL,
            file_type TEXT NOT NULL,
            unit_kind TEXT NOT NULL,
            locator_json TEXT NOT NULL,
            token_start INTEGER NOT NULL,
            token_end INTEGER NOT NULL,
            text TEXT NOT NULL,
            tokens TEXT NOT NULL,
            uploaded_at INTEGER NOT NULL,
            FOREIGN KEY (file_id) REFERENCES files(file_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Embedding vectors, one BLOB of little-endian f32 per chunk.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunk_vectors (
            chunk_id TEXT PRIMARY KEY,
            embedding BLOB NOT NULL,
            FOREIGN KEY (chunk_id) REFERENCES chunks(chunk_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Pinned embedding model identity. A configured model that differs
    // from this row triggers a full re-embed instead of mixing spaces.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS embedding_meta (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            model TEXT NOT NULL,
            dims INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Timestamp of the last completed ingestion pass, for status().
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS runs (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            last_run_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_file_id ON chunks(file_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_files_state ON files(state)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_uploaded_at ON chunks(uploaded_at DESC)")
        .execute(pool)
        .await?;

    Ok(())
}
