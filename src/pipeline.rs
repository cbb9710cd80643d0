//! The pipeline facade: one handle over ingestion, retrieval, thread
//! memory, and status, sharing a single SQLite pool.

use sqlx::SqlitePool;
use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::ingest::{Ingestor, RunSummary};
use crate::memory::ThreadMemory;
use crate::models::{IngestionStats, QueryResponse};
use crate::registry::Registry;
use crate::retrieve;
use crate::sources::{AnswerGenerator, FileListing};
use crate::status;
use crate::store::VectorStore;
use crate::{db, migrate};

pub struct Pipeline {
    pool: SqlitePool,
    config: Config,
    registry: Registry,
    store: VectorStore,
    memory: ThreadMemory,
    ingestor: Ingestor,
}

impl Pipeline {
    /// Open (or create) the database and wire up all components.
    pub async fn open(config: Config, listing: Arc<dyn FileListing>) -> anyhow::Result<Self> {
        let pool = db::connect(&config.db.path).await?;
        migrate::run_migrations(&pool).await?;

        let registry = Registry::new(pool.clone(), config.ingestion.max_retries);
        // A crash mid-extraction leaves rows claimed; reclaim them once
        // at startup so the next scan retries those files.
        registry.reset_stale_claims().await?;
        let store = VectorStore::new(pool.clone());
        let memory = ThreadMemory::new(config.memory.eviction_hours, config.memory.max_turns);
        let ingestor = Ingestor::new(pool.clone(), listing, config.clone());

        Ok(Self {
            pool,
            config,
            registry,
            store,
            memory,
            ingestor,
        })
    }

    /// One full ingestion scan. Idempotent, and safe to call
    /// concurrently with itself: per-file claims make the second caller
    /// skip files the first already took.
    pub async fn ingest_pending(&self) -> Result<RunSummary> {
        self.ingestor.run().await
    }

    /// Answer a query with ranked, attributed chunks. When `thread_id`
    /// is set the turn is recorded and follow-ups get query expansion
    /// from the prior turn.
    pub async fn query(&self, question: &str, thread_id: Option<&str>) -> QueryResponse {
        let prior = thread_id.and_then(|t| self.memory.prior_question(t));

        let response = retrieve::retrieve(
            &self.store,
            &self.config.embedding,
            &self.config.retrieval,
            question,
            prior.as_deref(),
        )
        .await;

        if let Some(thread_id) = thread_id {
            let top_ids = response
                .chunks
                .iter()
                .map(|c| c.chunk_id.clone())
                .collect();
            self.memory.record_turn(thread_id, question, top_ids);
        }

        response
    }

    /// Retrieve then generate: the full question-to-answer path. The
    /// generated answer is summarized back into thread memory.
    pub async fn answer(
        &self,
        question: &str,
        thread_id: Option<&str>,
        generator: &dyn AnswerGenerator,
    ) -> Result<(String, QueryResponse)> {
        let response = self.query(question, thread_id).await;

        if response.chunks.is_empty() {
            return Ok((
                "No information found in the indexed documents.".to_string(),
                response,
            ));
        }

        let answer = generator
            .generate(question, &response.chunks)
            .await
            .map_err(|e| crate::error::PipelineError::AnswerGeneration(e.to_string()))?;

        if let Some(thread_id) = thread_id {
            self.memory.record_answer(thread_id, &answer);
        }
        Ok((answer, response))
    }

    pub async fn status(&self) -> Result<IngestionStats> {
        status::collect(&self.pool, &self.registry).await
    }

    pub fn ingestor(&self) -> &Ingestor {
        &self.ingestor
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
