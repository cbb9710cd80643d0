//! Short-lived per-thread conversation state.
//!
//! Links follow-up questions to the prior retrieved context so the
//! retriever can expand anaphoric queries ("and for tier 2?"). Threads
//! hold a bounded turn history and are evicted after an inactivity
//! timeout, so memory stays bounded no matter how many conversations the
//! workspace sees. Chunk references are IDs only: chunk lifecycle is
//! owned by the vector store, not by thread memory.

use std::collections::HashMap;
use std::sync::Mutex;

/// One question/answer exchange in a thread.
#[derive(Debug, Clone)]
pub struct Turn {
    pub question: String,
    pub top_chunk_ids: Vec<String>,
    pub answer_summary: Option<String>,
}

#[derive(Debug)]
struct ThreadContext {
    turns: Vec<Turn>,
    last_active_at: i64,
}

pub struct ThreadMemory {
    threads: Mutex<HashMap<String, ThreadContext>>,
    eviction_secs: i64,
    max_turns: usize,
}

impl ThreadMemory {
    pub fn new(eviction_hours: u64, max_turns: usize) -> Self {
        Self {
            threads: Mutex::new(HashMap::new()),
            eviction_secs: (eviction_hours * 3600) as i64,
            max_turns,
        }
    }

    /// The previous turn's question in this thread, for query expansion.
    pub fn prior_question(&self, thread_id: &str) -> Option<String> {
        let now = chrono::Utc::now().timestamp();
        let mut threads = self.threads.lock().unwrap_or_else(|e| e.into_inner());
        Self::evict_expired(&mut threads, now, self.eviction_secs);
        threads
            .get(thread_id)
            .and_then(|ctx| ctx.turns.last())
            .map(|turn| turn.question.clone())
    }

    /// Append a completed turn, trimming history to the configured bound.
    pub fn record_turn(&self, thread_id: &str, question: &str, top_chunk_ids: Vec<String>) {
        let now = chrono::Utc::now().timestamp();
        let mut threads = self.threads.lock().unwrap_or_else(|e| e.into_inner());
        Self::evict_expired(&mut threads, now, self.eviction_secs);

        let ctx = threads.entry(thread_id.to_string()).or_insert(ThreadContext {
            turns: Vec::new(),
            last_active_at: now,
        });
        ctx.turns.push(Turn {
            question: question.to_string(),
            top_chunk_ids,
            answer_summary: None,
        });
        if ctx.turns.len() > self.max_turns {
            let excess = ctx.turns.len() - self.max_turns;
            ctx.turns.drain(..excess);
        }
        ctx.last_active_at = now;
    }

    /// Attach the answer generator's output to the latest turn.
    pub fn record_answer(&self, thread_id: &str, summary: &str) {
        let mut threads = self.threads.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(ctx) = threads.get_mut(thread_id) {
            if let Some(turn) = ctx.turns.last_mut() {
                turn.answer_summary = Some(summary.to_string());
            }
            ctx.last_active_at = chrono::Utc::now().timestamp();
        }
    }

    pub fn thread_count(&self) -> usize {
        self.threads
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    fn evict_expired(
        threads: &mut HashMap<String, ThreadContext>,
        now: i64,
        eviction_secs: i64,
    ) {
        threads.retain(|_, ctx| now - ctx.last_active_at <= eviction_secs);
    }
}
