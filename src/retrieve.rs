//! Hybrid retrieval: vector similarity plus lexical keyword overlap.
//!
//! Two candidate channels feed the final ranking. The semantic channel
//! embeds the query and takes the top `N = candidate_multiplier * k`
//! chunks by cosine similarity. The lexical channel scores every chunk's
//! stored token set by normalized overlap with the stop-word-filtered
//! query terms and takes its own top N — which is what recovers small,
//! exact facts (numbers, names, IDs) that embedding similarity alone
//! under-ranks. The union is re-sorted by
//! `alpha * semantic + (1 - alpha) * lexical`.
//!
//! Ties break toward the more recent upload, then the earlier offset in
//! the unit, then the chunk ID, so ordering is deterministic and
//! testable.
//!
//! Follow-up questions in a thread are expanded with the prior turn's
//! question text before embedding (never shown to the user), resolving
//! anaphora like "and for tier 2?".
//!
//! An empty or unreachable store degrades to an empty ranked list; the
//! caller renders "no information found" instead of crashing.

use tracing::{debug, warn};

use crate::config::{EmbeddingConfig, RetrievalConfig};
use crate::embedding;
use crate::models::{QueryResponse, RankedChunk};
use crate::store::{StoredChunk, VectorStore};

/// Common words stripped from queries before lexical matching.
const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "is", "are", "was", "were", "on", "it", "this", "that",
    "to", "of", "for", "in", "with", "by", "as", "at", "what", "which", "who", "how", "when",
    "where", "why", "do", "does", "did", "can", "could", "would", "should", "have", "has", "had",
    "i", "you", "he", "she", "we", "they", "about",
];

/// Lowercased query terms worth matching lexically.
pub fn query_terms(query: &str) -> Vec<String> {
    query
        .split(|c: char| !c.is_alphanumeric() && c != '.' && c != '$')
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .filter(|t| t.len() > 1 && !STOP_WORDS.contains(&t.as_str()))
        .collect()
}

/// Fraction of query terms present in the chunk's token set, verbatim
/// or as a substring of some token.
pub fn lexical_overlap(terms: &[String], token_set: &str) -> f64 {
    if terms.is_empty() {
        return 0.0;
    }
    let tokens: Vec<&str> = token_set.split(' ').collect();
    let hits = terms
        .iter()
        .filter(|term| tokens.iter().any(|tok| tok.contains(term.as_str())))
        .count();
    hits as f64 / terms.len() as f64
}

/// Expand a follow-up query with the previous question for embedding.
pub fn expand_query(query: &str, prior_question: Option<&str>) -> Option<String> {
    prior_question.map(|prior| format!("{} {}", prior, query))
}

struct Candidate {
    chunk: StoredChunk,
    semantic: f64,
    lexical: f64,
}

/// Retrieve the top `k` chunks for a query.
///
/// `prior_question` is the previous turn's question in the same thread,
/// if any. Embedding the query is skipped when the provider is disabled;
/// ranking then falls back to the lexical channel alone.
pub async fn retrieve(
    store: &VectorStore,
    embedding_config: &EmbeddingConfig,
    retrieval: &RetrievalConfig,
    query: &str,
    prior_question: Option<&str>,
) -> QueryResponse {
    let expanded = expand_query(query, prior_question);
    let embed_input = expanded.as_deref().unwrap_or(query);

    // Semantic channel. Failures degrade to lexical-only rather than
    // erroring out of the query path.
    let query_vector = if embedding_config.is_enabled() {
        match embedding::embed_query(embedding_config, embed_input).await {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(error = %e, "query embedding failed; lexical-only retrieval");
                None
            }
        }
    } else {
        None
    };

    rank(store, retrieval, query, query_vector, expanded).await
}

/// Rank stored chunks for a query with an already-computed query vector
/// (or none, for lexical-only ranking). The seam below [`retrieve`] so
/// ranking is exercisable without an embedding backend.
pub async fn rank(
    store: &VectorStore,
    retrieval: &RetrievalConfig,
    query: &str,
    query_vector: Option<Vec<f32>>,
    expanded: Option<String>,
) -> QueryResponse {
    let k = retrieval.final_k;
    let candidate_n = retrieval.candidate_multiplier * k;

    let semantic_hits: Vec<(String, f64)> = match &query_vector {
        Some(vector) => match store.search(vector, candidate_n).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(error = %e, "vector search failed");
                return QueryResponse {
                    chunks: Vec::new(),
                    degraded: true,
                    expanded_query: expanded,
                };
            }
        },
        None => Vec::new(),
    };

    // Lexical channel over all stored token sets.
    let terms = query_terms(query);
    let all_chunks = match store.all_chunks().await {
        Ok(chunks) => chunks,
        Err(e) => {
            warn!(error = %e, "chunk metadata scan failed");
            return QueryResponse {
                chunks: Vec::new(),
                degraded: true,
                expanded_query: expanded,
            };
        }
    };

    if all_chunks.is_empty() {
        // Nothing ingested yet; the degraded flag tells the caller to
        // answer "no information found".
        return QueryResponse {
            chunks: Vec::new(),
            degraded: true,
            expanded_query: expanded,
        };
    }

    let mut lexical_scored: Vec<(usize, f64)> = all_chunks
        .iter()
        .enumerate()
        .map(|(i, c)| (i, lexical_overlap(&terms, &c.tokens)))
        .filter(|(_, score)| *score > 0.0)
        .collect();
    lexical_scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    lexical_scored.truncate(candidate_n);

    // Union of both channels.
    let mut by_id: std::collections::HashMap<String, Candidate> = std::collections::HashMap::new();
    let semantic_by_id: std::collections::HashMap<&str, f64> = semantic_hits
        .iter()
        .map(|(id, s)| (id.as_str(), *s))
        .collect();

    for (i, lexical) in &lexical_scored {
        let chunk = all_chunks[*i].clone();
        let semantic = semantic_by_id
            .get(chunk.chunk_id.as_str())
            .copied()
            .unwrap_or(0.0);
        by_id.insert(
            chunk.chunk_id.clone(),
            Candidate {
                chunk,
                semantic,
                lexical: *lexical,
            },
        );
    }
    for (chunk_id, semantic) in &semantic_hits {
        if by_id.contains_key(chunk_id) {
            continue;
        }
        if let Some(chunk) = all_chunks.iter().find(|c| &c.chunk_id == chunk_id) {
            by_id.insert(
                chunk_id.clone(),
                Candidate {
                    chunk: chunk.clone(),
                    semantic: *semantic,
                    lexical: lexical_overlap(&terms, &chunk.tokens),
                },
            );
        }
    }

    // With no query vector the semantic term contributes nothing; score
    // purely lexically so a disabled provider still answers.
    let alpha = if query_vector.is_some() {
        retrieval.hybrid_alpha
    } else {
        0.0
    };

    let mut candidates: Vec<Candidate> = by_id.into_values().collect();
    candidates.sort_by(|a, b| {
        let score_a = alpha * a.semantic + (1.0 - alpha) * a.lexical;
        let score_b = alpha * b.semantic + (1.0 - alpha) * b.lexical;
        score_b
            .partial_cmp(&score_a)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.chunk.uploaded_at.cmp(&a.chunk.uploaded_at))
            .then_with(|| a.chunk.token_start.cmp(&b.chunk.token_start))
            .then_with(|| a.chunk.chunk_id.cmp(&b.chunk.chunk_id))
    });
    candidates.truncate(k);

    debug!(
        candidates = candidates.len(),
        alpha,
        expanded = expanded.is_some(),
        "retrieval complete"
    );

    let chunks = candidates
        .into_iter()
        .map(|c| {
            let combined = alpha * c.semantic + (1.0 - alpha) * c.lexical;
            let excerpt = excerpt(&c.chunk.text, retrieval.excerpt_chars);
            RankedChunk {
                chunk_id: c.chunk.chunk_id,
                file_id: c.chunk.file_id,
                filename: c.chunk.filename,
                file_type: c.chunk.file_type,
                locator: c.chunk.locator,
                token_start: c.chunk.token_start,
                text_excerpt: excerpt,
                score: combined,
                semantic_score: c.semantic,
                lexical_score: c.lexical,
            }
        })
        .collect();

    QueryResponse {
        chunks,
        degraded: false,
        expanded_query: expanded,
    }
}

/// Truncate on a char boundary, trimming a trailing partial word.
fn excerpt(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    match truncated.rfind(char::is_whitespace) {
        Some(pos) if pos > 0 => format!("{}...", &truncated[..pos].trim_end()),
        _ => format!("{}...", truncated),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FileType, Locator};

    fn stored(chunk_id: &str, text: &str, uploaded_at: i64, token_start: i64) -> StoredChunk {
        StoredChunk {
            chunk_id: chunk_id.to_string(),
            file_id: "F1".to_string(),
            filename: "doc.pdf".to_string(),
            file_type: FileType::Pdf,
            locator: Locator::Page { page: 1 },
            token_start,
            token_end: token_start + 10,
            text: text.to_string(),
            tokens: crate::chunk::token_set(text),
            uploaded_at,
        }
    }

    #[test]
    fn query_terms_drop_stop_words() {
        let terms = query_terms("What is the SLA for tier 2?");
        assert_eq!(terms, vec!["sla", "tier"]);
    }

    #[test]
    fn query_terms_keep_numbers_and_currency() {
        let terms = query_terms("budget of $45,000");
        assert!(terms.contains(&"budget".to_string()));
        assert!(terms.contains(&"$45".to_string()));
        assert!(terms.contains(&"000".to_string()));
    }

    #[test]
    fn lexical_overlap_counts_substring_hits() {
        let c = stored("c1", "Budget: $45,000 approved for Q3", 0, 0);
        let terms = query_terms("what is the budget?");
        assert!((lexical_overlap(&terms, &c.tokens) - 1.0).abs() < 1e-9);

        let terms = query_terms("budget headcount");
        assert!((lexical_overlap(&terms, &c.tokens) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn lexical_overlap_empty_terms_is_zero() {
        assert_eq!(lexical_overlap(&[], "budget 45"), 0.0);
    }

    #[test]
    fn expansion_prepends_prior_question() {
        assert_eq!(
            expand_query("and for tier 2?", Some("What is the SLA?")),
            Some("What is the SLA? and for tier 2?".to_string())
        );
        assert_eq!(expand_query("hello", None), None);
    }

    #[test]
    fn excerpt_trims_on_word_boundary() {
        let text = "alpha beta gamma delta";
        let e = excerpt(text, 12);
        assert_eq!(e, "alpha beta...");
        assert_eq!(excerpt("short", 100), "short");
    }
}
