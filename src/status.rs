//! Status reporting: a point-in-time snapshot of the index.

use sqlx::SqlitePool;

use crate::error::Result;
use crate::models::{IngestionState, IngestionStats};
use crate::registry::Registry;
use crate::store::VectorStore;

/// Aggregate ledger and store counters into one [`IngestionStats`].
pub async fn collect(pool: &SqlitePool, registry: &Registry) -> Result<IngestionStats> {
    let store = VectorStore::new(pool.clone());

    let (files_by_type, files_by_state) = registry.stats().await?;
    let chunks_total = store.count_chunks().await?;
    let vectors_total = store.count_vectors().await?;

    let last_run_at: Option<i64> =
        sqlx::query_scalar("SELECT last_run_at FROM runs WHERE id = 1")
            .fetch_optional(pool)
            .await?;

    let mut failed_file_ids = registry.list_by_state(IngestionState::Failed).await?;
    failed_file_ids.extend(
        registry
            .list_by_state(IngestionState::PermanentlyFailed)
            .await?,
    );
    failed_file_ids.sort();

    Ok(IngestionStats {
        files_by_type,
        files_by_state,
        chunks_total,
        vectors_total,
        last_run_at,
        failed_file_ids,
    })
}
