//! Ingestion orchestration: full-scan runs over the file listing.
//!
//! Each run is one pass: list every workspace file, register it against
//! the ledger, then claim and process each eligible file end to end
//! (download, extract, chunk, persist, embed). Failures are contained
//! per file; one corrupt PDF never stops the rest of the scan. Claims
//! left stale by a crash are reclaimed once at startup, not per run, so
//! concurrent runs never undo each other's claims. Deterministic chunk
//! IDs make a crashed or repeated run converge on the same stored
//! state, so at-least-once processing is safe.

use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::chunk::chunk_unit;
use crate::config::Config;
use crate::embedding;
use crate::error::{PipelineError, Result};
use crate::extract;
use crate::models::FileListingEntry;
use crate::registry::{RegisterOutcome, Registry};
use crate::sources::FileListing;
use crate::store::VectorStore;

/// Counters for one ingestion run.
#[derive(Debug, Default, Clone)]
pub struct RunSummary {
    pub scanned: usize,
    pub registered_new: usize,
    pub registered_changed: usize,
    pub indexed: usize,
    pub failed: usize,
    pub chunks_written: usize,
    pub vectors_written: usize,
}

pub struct Ingestor {
    pool: SqlitePool,
    listing: Arc<dyn FileListing>,
    registry: Registry,
    store: VectorStore,
    config: Config,
}

impl Ingestor {
    pub fn new(pool: SqlitePool, listing: Arc<dyn FileListing>, config: Config) -> Self {
        let registry = Registry::new(pool.clone(), config.ingestion.max_retries);
        let store = VectorStore::new(pool.clone());
        Self {
            pool,
            listing,
            registry,
            store,
            config,
        }
    }

    /// Execute one full ingestion run. Safe to run concurrently with
    /// itself: registration is atomic per file and claims make the
    /// second run skip files the first already took.
    pub async fn run(&self) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        if self.config.embedding.is_enabled() {
            let provider = embedding::create_provider(&self.config.embedding)
                .map_err(|e| PipelineError::Embedding(e.to_string()))?;
            self.store
                .ensure_model(provider.model_name(), provider.dims())
                .await?;
        }

        let entries = self
            .listing
            .list_files()
            .await
            .map_err(|e| PipelineError::Download {
                file_id: "<listing>".to_string(),
                cause: e.to_string(),
            })?;
        summary.scanned = entries.len();

        // Registration pass. Content is downloaded to hash it, except for
        // files whose stored row already matches the listing metadata —
        // those are known-unchanged and skipped without a download.
        let mut by_id: HashMap<String, FileListingEntry> = HashMap::new();
        let mut downloaded: HashMap<String, Vec<u8>> = HashMap::new();

        for entry in entries {
            let known = self.registry.get(&entry.file_id).await?;
            if let Some(stored) = &known {
                if stored.state == crate::models::IngestionState::Indexed
                    && stored.size == entry.size
                    && stored.uploaded_at == entry.uploaded_at
                {
                    continue;
                }
            }

            let bytes = match self.listing.download(&entry.download_ref).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(file_id = %entry.file_id, error = %e, "download failed during scan");
                    if known.is_some() {
                        self.registry
                            .mark_failed(&entry.file_id, &format!("download failed: {}", e))
                            .await?;
                    }
                    summary.failed += 1;
                    continue;
                }
            };
            let content_hash = hex_digest(&bytes);

            match self.registry.register_if_new(&entry, &content_hash).await? {
                RegisterOutcome::New => summary.registered_new += 1,
                RegisterOutcome::Changed => summary.registered_changed += 1,
                RegisterOutcome::Unchanged => {}
            }

            downloaded.insert(entry.file_id.clone(), bytes);
            by_id.insert(entry.file_id.clone(), entry);
        }

        // Processing pass: claim each eligible file and take it through
        // extract -> chunk -> persist. Files eligible in the ledger but
        // absent from this scan (deleted upstream) are left alone.
        for file_id in self.registry.list_eligible().await? {
            let entry = match by_id.get(&file_id) {
                Some(entry) => entry,
                None => continue,
            };
            if !self.registry.claim(&file_id).await? {
                continue;
            }

            let bytes = match downloaded.remove(&file_id) {
                Some(bytes) => bytes,
                None => match self.listing.download(&entry.download_ref).await {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        self.registry
                            .mark_failed(&file_id, &format!("download failed: {}", e))
                            .await?;
                        summary.failed += 1;
                        continue;
                    }
                },
            };

            match self.process_file(entry, &bytes).await {
                Ok(chunk_count) => {
                    self.registry.mark_indexed(&file_id).await?;
                    summary.indexed += 1;
                    summary.chunks_written += chunk_count;
                    info!(file_id = %file_id, chunks = chunk_count, "file indexed");
                }
                Err(e) => {
                    let state = self.registry.mark_failed(&file_id, &e.to_string()).await?;
                    summary.failed += 1;
                    error!(file_id = %file_id, state = state.as_str(), error = %e, "file ingestion failed");
                }
            }
        }

        if self.config.embedding.is_enabled() {
            summary.vectors_written = self.backfill_vectors().await;
        }

        self.record_run().await?;
        info!(
            scanned = summary.scanned,
            new = summary.registered_new,
            changed = summary.registered_changed,
            indexed = summary.indexed,
            failed = summary.failed,
            chunks = summary.chunks_written,
            vectors = summary.vectors_written,
            "ingestion run complete"
        );
        Ok(summary)
    }

    /// Extract, chunk, and persist one file. Returns the chunk count.
    async fn process_file(&self, entry: &FileListingEntry, bytes: &[u8]) -> Result<usize> {
        let units = extract::extract(
            &entry.file_id,
            entry.file_type,
            bytes,
            &self.config.extraction,
        )
        .map_err(|e| {
            PipelineError::Extraction {
                file_id: entry.file_id.clone(),
                cause: e.to_string(),
            }
        })?;

        let mut chunks = Vec::new();
        for unit in &units {
            chunks.extend(chunk_unit(
                unit,
                &entry.filename,
                entry.file_type,
                entry.uploaded_at,
                self.config.chunking.window_tokens,
                self.config.chunking.overlap_ratio,
            ));
        }

        debug!(file_id = %entry.file_id, units = units.len(), chunks = chunks.len(), "extracted");

        // A file with no extractable text still indexes, with zero
        // chunks; replace clears any stale rows from a prior version.
        self.store
            .replace_file_chunks(&entry.file_id, &chunks)
            .await?;
        Ok(chunks.len())
    }

    /// Embed chunks that have no stored vector yet, in provider batches.
    /// Covers both fresh chunks from this run and the backlog left by a
    /// previously disabled provider. Failures end the backfill early;
    /// remaining chunks stay pending for the next run.
    async fn backfill_vectors(&self) -> usize {
        let batch_size = self.config.embedding.batch_size;
        let mut written = 0;

        loop {
            let pending = match self.store.pending_vectors(batch_size).await {
                Ok(pending) => pending,
                Err(e) => {
                    warn!(error = %e, "pending vector scan failed");
                    break;
                }
            };
            if pending.is_empty() {
                break;
            }

            let texts: Vec<String> = pending.iter().map(|(_, text)| text.clone()).collect();
            let vectors = match embedding::embed_texts(&self.config.embedding, &texts).await {
                Ok(vectors) => vectors,
                Err(e) => {
                    warn!(error = %e, "embedding batch failed; backfill deferred");
                    break;
                }
            };
            if vectors.len() != pending.len() {
                warn!(
                    expected = pending.len(),
                    got = vectors.len(),
                    "embedding count mismatch; batch dropped"
                );
                break;
            }

            for ((chunk_id, _), vector) in pending.iter().zip(vectors.iter()) {
                match self.store.upsert_vector(chunk_id, vector).await {
                    Ok(()) => written += 1,
                    Err(e) => warn!(chunk_id = %chunk_id, error = %e, "vector upsert failed"),
                }
            }
        }

        written
    }

    async fn record_run(&self) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO runs (id, last_run_at) VALUES (1, ?)
            ON CONFLICT(id) DO UPDATE SET last_run_at = excluded.last_run_at
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Run ingestion on a fixed interval until the shutdown signal flips.
/// The first scan fires immediately; a run's failure is logged and the
/// schedule continues.
pub async fn run_scheduler(ingestor: &Ingestor, mut shutdown: watch::Receiver<bool>) {
    let period = std::time::Duration::from_secs(ingestor.config.ingestion.interval_secs.max(1));
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = ingestor.run().await {
                    error!(error = %e, "scheduled ingestion run failed");
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("ingestion scheduler stopping");
                    return;
                }
            }
        }
    }
}

fn hex_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_stable_hex() {
        let d = hex_digest(b"hello");
        assert_eq!(d.len(), 64);
        assert_eq!(d, hex_digest(b"hello"));
        assert_ne!(d, hex_digest(b"hello2"));
    }
}
