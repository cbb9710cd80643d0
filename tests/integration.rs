//! End-to-end pipeline tests against a temporary workspace and database.
//!
//! The embedding provider stays disabled throughout, so ingestion
//! indexes chunks for lexical retrieval without any network access.
//! Vector-path behavior is covered by upserting hand-built embeddings
//! directly into the store.

use std::path::Path;
use std::sync::Arc;

use docdex::config::{Config, DbConfig, RetrievalConfig, WorkspaceConfig};
use docdex::models::{FileType, IngestionState, Locator};
use docdex::registry::{RegisterOutcome, Registry};
use docdex::sources::{FileListing, FilesystemListing};
use docdex::store::VectorStore;
use docdex::Pipeline;

fn test_config(root: &Path, db_path: &Path) -> Config {
    let toml_str = format!(
        r#"
        [db]
        path = "{}"

        [chunking]
        window_tokens = 20
        overlap_ratio = 0.5

        [retrieval]
        final_k = 3

        [workspace]
        root = "{}"
        "#,
        db_path.display(),
        root.display()
    );
    toml::from_str(&toml_str).unwrap()
}

async fn open_pipeline(root: &Path, db_path: &Path) -> Pipeline {
    let config = test_config(root, db_path);
    let workspace = config.workspace.clone().unwrap();
    let listing = Arc::new(FilesystemListing::new(&workspace).unwrap());
    Pipeline::open(config, listing).await.unwrap()
}

#[tokio::test]
async fn ingest_indexes_text_files_with_line_locators() {
    let tmp = tempfile::TempDir::new().unwrap();
    let workspace = tmp.path().join("ws");
    std::fs::create_dir_all(&workspace).unwrap();
    std::fs::write(
        workspace.join("budget.txt"),
        "The Q3 budget is $45,000 approved by finance.\nHeadcount stays flat.\n",
    )
    .unwrap();

    let pipeline = open_pipeline(&workspace, &tmp.path().join("db.sqlite")).await;
    let summary = pipeline.ingest_pending().await.unwrap();

    assert_eq!(summary.scanned, 1);
    assert_eq!(summary.registered_new, 1);
    assert_eq!(summary.indexed, 1);
    assert_eq!(summary.failed, 0);
    assert!(summary.chunks_written >= 1);

    let stats = pipeline.status().await.unwrap();
    assert_eq!(stats.files_by_state.get("indexed"), Some(&1));
    assert_eq!(stats.files_by_type.get("txt"), Some(&1));
    assert!(stats.chunks_total >= 1);
    assert_eq!(stats.vectors_total, 0); // provider disabled
    assert!(stats.last_run_at.is_some());
    assert!(stats.failed_file_ids.is_empty());

    // Locator metadata survives the round trip.
    let chunks = pipeline.store().all_chunks().await.unwrap();
    assert!(matches!(
        chunks[0].locator,
        Locator::Lines { start: 1, .. }
    ));
    assert_eq!(chunks[0].file_type, FileType::Txt);
}

#[tokio::test]
async fn reingest_of_unchanged_workspace_is_idempotent() {
    let tmp = tempfile::TempDir::new().unwrap();
    let workspace = tmp.path().join("ws");
    std::fs::create_dir_all(&workspace).unwrap();
    std::fs::write(workspace.join("notes.md"), "alpha beta gamma delta\n").unwrap();

    let pipeline = open_pipeline(&workspace, &tmp.path().join("db.sqlite")).await;
    let first = pipeline.ingest_pending().await.unwrap();
    let chunk_count = pipeline.store().count_chunks().await.unwrap();

    let second = pipeline.ingest_pending().await.unwrap();
    assert_eq!(second.registered_new, 0);
    assert_eq!(second.registered_changed, 0);
    assert_eq!(second.indexed, 0); // nothing eligible, nothing reprocessed
    assert_eq!(
        pipeline.store().count_chunks().await.unwrap(),
        chunk_count
    );
    assert_eq!(first.registered_new, 1);
}

#[tokio::test]
async fn changed_content_is_reingested_and_stale_chunks_removed() {
    let tmp = tempfile::TempDir::new().unwrap();
    let workspace = tmp.path().join("ws");
    std::fs::create_dir_all(&workspace).unwrap();
    let file = workspace.join("doc.txt");

    // Long first version, short second version: stale windows must go.
    let long_text = (0..200)
        .map(|i| format!("word{}", i))
        .collect::<Vec<_>>()
        .join(" ");
    std::fs::write(&file, &long_text).unwrap();

    let pipeline = open_pipeline(&workspace, &tmp.path().join("db.sqlite")).await;
    pipeline.ingest_pending().await.unwrap();
    let before = pipeline.store().count_chunks().await.unwrap();
    assert!(before > 1);

    std::fs::write(&file, "replacement content entirely").unwrap();
    let summary = pipeline.ingest_pending().await.unwrap();
    assert_eq!(summary.registered_changed, 1);
    assert_eq!(summary.indexed, 1);

    let after = pipeline.store().all_chunks().await.unwrap();
    assert_eq!(after.len(), 1);
    assert!(after[0].text.contains("replacement"));
}

#[tokio::test]
async fn corrupt_file_fails_without_stopping_the_run() {
    let tmp = tempfile::TempDir::new().unwrap();
    let workspace = tmp.path().join("ws");
    std::fs::create_dir_all(&workspace).unwrap();
    std::fs::write(workspace.join("broken.docx"), b"not a zip archive").unwrap();
    std::fs::write(workspace.join("fine.txt"), "perfectly good text\n").unwrap();

    let pipeline = open_pipeline(&workspace, &tmp.path().join("db.sqlite")).await;
    let summary = pipeline.ingest_pending().await.unwrap();

    assert_eq!(summary.indexed, 1);
    assert_eq!(summary.failed, 1);

    let stats = pipeline.status().await.unwrap();
    assert_eq!(stats.failed_file_ids, vec!["broken.docx".to_string()]);

    let broken = pipeline.registry().get("broken.docx").await.unwrap().unwrap();
    assert_eq!(broken.state, IngestionState::Failed);
    assert_eq!(broken.retry_count, 1);
    assert!(broken.last_error.is_some());
}

#[tokio::test]
async fn repeated_failures_park_the_file_permanently() {
    let tmp = tempfile::TempDir::new().unwrap();
    let workspace = tmp.path().join("ws");
    std::fs::create_dir_all(&workspace).unwrap();
    std::fs::write(workspace.join("broken.pptx"), b"still not a zip").unwrap();

    let pipeline = open_pipeline(&workspace, &tmp.path().join("db.sqlite")).await;
    // max_retries defaults to 3; the fourth failure parks the file.
    for _ in 0..4 {
        pipeline.ingest_pending().await.unwrap();
    }

    let broken = pipeline.registry().get("broken.pptx").await.unwrap().unwrap();
    assert_eq!(broken.state, IngestionState::PermanentlyFailed);

    // Parked files are no longer retried.
    let summary = pipeline.ingest_pending().await.unwrap();
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.indexed, 0);
}

#[tokio::test]
async fn lexical_query_finds_exact_facts_with_attribution() {
    let tmp = tempfile::TempDir::new().unwrap();
    let workspace = tmp.path().join("ws");
    std::fs::create_dir_all(&workspace).unwrap();
    std::fs::write(
        workspace.join("budget.txt"),
        "The Q3 marketing budget is $45,000 approved by finance.\n",
    )
    .unwrap();
    std::fs::write(
        workspace.join("travel.txt"),
        "Travel policy requires manager approval for trips over two days.\n",
    )
    .unwrap();

    let pipeline = open_pipeline(&workspace, &tmp.path().join("db.sqlite")).await;
    pipeline.ingest_pending().await.unwrap();

    let response = pipeline.query("what is the marketing budget?", None).await;
    assert!(!response.degraded);
    assert!(!response.chunks.is_empty());

    let top = &response.chunks[0];
    assert_eq!(top.filename, "budget.txt");
    assert!(top.text_excerpt.contains("$45,000"));
    assert!(top.lexical_score > 0.0);
    assert_eq!(top.semantic_score, 0.0); // provider disabled
    assert!(matches!(top.locator, Locator::Lines { .. }));
}

#[tokio::test]
async fn query_against_empty_index_degrades_gracefully() {
    let tmp = tempfile::TempDir::new().unwrap();
    let workspace = tmp.path().join("ws");
    std::fs::create_dir_all(&workspace).unwrap();

    let pipeline = open_pipeline(&workspace, &tmp.path().join("db.sqlite")).await;
    let response = pipeline.query("anything at all", None).await;

    assert!(response.degraded);
    assert!(response.chunks.is_empty());
}

#[tokio::test]
async fn thread_follow_up_expands_the_query() {
    let tmp = tempfile::TempDir::new().unwrap();
    let workspace = tmp.path().join("ws");
    std::fs::create_dir_all(&workspace).unwrap();
    std::fs::write(
        workspace.join("sla.txt"),
        "Tier 1 SLA response time is four hours. Tier 2 SLA response time is one business day.\n",
    )
    .unwrap();

    let pipeline = open_pipeline(&workspace, &tmp.path().join("db.sqlite")).await;
    pipeline.ingest_pending().await.unwrap();

    let first = pipeline
        .query("What is the SLA response time?", Some("thread-1"))
        .await;
    assert!(first.expanded_query.is_none());
    assert!(!first.chunks.is_empty());

    let second = pipeline.query("and for tier 2?", Some("thread-1")).await;
    assert_eq!(
        second.expanded_query.as_deref(),
        Some("What is the SLA response time? and for tier 2?")
    );

    // A different thread sees no expansion.
    let other = pipeline.query("and for tier 2?", Some("thread-2")).await;
    assert!(other.expanded_query.is_none());
}

#[tokio::test]
async fn vector_search_ranks_by_cosine_similarity() {
    let tmp = tempfile::TempDir::new().unwrap();
    let workspace = tmp.path().join("ws");
    std::fs::create_dir_all(&workspace).unwrap();
    std::fs::write(workspace.join("a.txt"), "first document text\n").unwrap();
    std::fs::write(workspace.join("b.txt"), "second document text\n").unwrap();

    let pipeline = open_pipeline(&workspace, &tmp.path().join("db.sqlite")).await;
    pipeline.ingest_pending().await.unwrap();

    let chunks = {
        let mut c = pipeline.store().all_chunks().await.unwrap();
        c.sort_by(|a, b| a.file_id.cmp(&b.file_id));
        c
    };
    assert_eq!(chunks.len(), 2);

    // a.txt points along x, b.txt along y.
    pipeline
        .store()
        .upsert_vector(&chunks[0].chunk_id, &[1.0, 0.0, 0.0])
        .await
        .unwrap();
    pipeline
        .store()
        .upsert_vector(&chunks[1].chunk_id, &[0.0, 1.0, 0.0])
        .await
        .unwrap();

    let hits = pipeline
        .store()
        .search(&[0.9, 0.1, 0.0], 2)
        .await
        .unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].0, chunks[0].chunk_id);
    assert!(hits[0].1 > hits[1].1);
}

#[tokio::test]
async fn model_change_clears_vectors_for_reembedding() {
    let tmp = tempfile::TempDir::new().unwrap();
    let pool = docdex::db::connect(&tmp.path().join("db.sqlite")).await.unwrap();
    docdex::migrate::run_migrations(&pool).await.unwrap();
    let store = VectorStore::new(pool.clone());

    // chunk_vectors references chunks, which references files; satisfy
    // both before storing a vector.
    let registry = Registry::new(pool, 3);
    let entry = docdex::models::FileListingEntry {
        file_id: "f1".to_string(),
        filename: "f1.txt".to_string(),
        file_type: FileType::Txt,
        size: 1,
        uploaded_at: 0,
        download_ref: "f1.txt".to_string(),
    };
    registry.register_if_new(&entry, "h").await.unwrap();
    let chunk = docdex::models::Chunk {
        chunk_id: "c1".to_string(),
        source_file_id: "f1".to_string(),
        filename: "f1.txt".to_string(),
        file_type: FileType::Txt,
        locator: Locator::Lines { start: 1, end: 1 },
        token_start: 0,
        token_end: 1,
        text: "x".to_string(),
        uploaded_at: 0,
    };
    store.upsert_chunk(&chunk).await.unwrap();

    store.ensure_model("model-a", 3).await.unwrap();
    store.upsert_vector("c1", &[1.0, 2.0, 3.0]).await.unwrap();
    assert_eq!(store.count_vectors().await.unwrap(), 1);

    // Same model: vectors survive.
    store.ensure_model("model-a", 3).await.unwrap();
    assert_eq!(store.count_vectors().await.unwrap(), 1);

    // Different model: vectors cleared for a full re-embed.
    store.ensure_model("model-b", 4).await.unwrap();
    assert_eq!(store.count_vectors().await.unwrap(), 0);
}

#[tokio::test]
async fn stale_extraction_claims_are_reclaimed() {
    let tmp = tempfile::TempDir::new().unwrap();
    let pool = docdex::db::connect(&tmp.path().join("db.sqlite")).await.unwrap();
    docdex::migrate::run_migrations(&pool).await.unwrap();
    let registry = Registry::new(pool, 3);

    let entry = docdex::models::FileListingEntry {
        file_id: "doc.txt".to_string(),
        filename: "doc.txt".to_string(),
        file_type: FileType::Txt,
        size: 10,
        uploaded_at: 0,
        download_ref: "doc.txt".to_string(),
    };
    registry.register_if_new(&entry, "hash1").await.unwrap();
    assert!(registry.claim("doc.txt").await.unwrap());

    // Simulated crash: row stuck in `extracting`. A second claim fails
    // until the stale claim is reset.
    assert!(!registry.claim("doc.txt").await.unwrap());
    assert_eq!(registry.reset_stale_claims().await.unwrap(), 1);
    assert!(registry.claim("doc.txt").await.unwrap());
}

#[tokio::test]
async fn deleted_workspace_files_keep_their_ledger_rows() {
    let tmp = tempfile::TempDir::new().unwrap();
    let workspace = tmp.path().join("ws");
    std::fs::create_dir_all(&workspace).unwrap();
    let file = workspace.join("gone.txt");
    std::fs::write(&file, "soon to be deleted\n").unwrap();

    let pipeline = open_pipeline(&workspace, &tmp.path().join("db.sqlite")).await;
    pipeline.ingest_pending().await.unwrap();
    std::fs::remove_file(&file).unwrap();

    let summary = pipeline.ingest_pending().await.unwrap();
    assert_eq!(summary.scanned, 0);

    // The ledger row and its chunks survive the upstream deletion.
    let row = pipeline.registry().get("gone.txt").await.unwrap();
    assert!(row.is_some());
    assert_eq!(pipeline.store().count_chunks().await.unwrap(), 1);
}

#[tokio::test]
async fn filesystem_listing_respects_globs() {
    let tmp = tempfile::TempDir::new().unwrap();
    std::fs::create_dir_all(tmp.path().join("sub")).unwrap();
    std::fs::write(tmp.path().join("a.txt"), "x").unwrap();
    std::fs::write(tmp.path().join("sub/b.md"), "y").unwrap();
    std::fs::write(tmp.path().join("c.exe"), "z").unwrap();

    let workspace = WorkspaceConfig {
        root: tmp.path().to_path_buf(),
        include_globs: vec!["**/*.txt".to_string(), "**/*.md".to_string()],
        exclude_globs: vec![],
    };
    let listing = FilesystemListing::new(&workspace).unwrap();
    let entries = listing.list_files().await.unwrap();

    let ids: Vec<&str> = entries.iter().map(|e| e.file_id.as_str()).collect();
    assert_eq!(ids, vec!["a.txt", "sub/b.md"]);
}

fn pdf_with_pages(page_texts: &[&str]) -> Vec<u8> {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in page_texts {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![100.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

#[tokio::test]
async fn pdf_budget_answer_cites_page_two() {
    let tmp = tempfile::TempDir::new().unwrap();
    let workspace = tmp.path().join("ws");
    std::fs::create_dir_all(&workspace).unwrap();
    std::fs::write(
        workspace.join("budget.pdf"),
        pdf_with_pages(&[
            "Quarterly overview of spending and headcount trends",
            "Budget: $45,000 approved for the next quarter",
        ]),
    )
    .unwrap();

    let pipeline = open_pipeline(&workspace, &tmp.path().join("db.sqlite")).await;
    let summary = pipeline.ingest_pending().await.unwrap();
    assert_eq!(summary.indexed, 1);
    assert!(summary.chunks_written >= 2);

    let response = pipeline.query("what is the budget?", None).await;
    assert!(!response.chunks.is_empty());

    let top = &response.chunks[0];
    assert_eq!(top.filename, "budget.pdf");
    assert_eq!(top.locator, Locator::Page { page: 2 });
    assert!(top.text_excerpt.contains("$45,000"));
}

#[tokio::test]
async fn concurrent_scans_tolerate_each_other() {
    let tmp = tempfile::TempDir::new().unwrap();
    let workspace = tmp.path().join("ws");
    std::fs::create_dir_all(&workspace).unwrap();
    std::fs::write(workspace.join("a.txt"), "first file contents\n").unwrap();
    std::fs::write(workspace.join("b.txt"), "second file contents\n").unwrap();

    let pipeline = open_pipeline(&workspace, &tmp.path().join("db.sqlite")).await;
    let (first, second) = tokio::join!(pipeline.ingest_pending(), pipeline.ingest_pending());

    // Neither run may abort on the other's registration or claims.
    let first = first.unwrap();
    let second = second.unwrap();

    assert_eq!(first.registered_new + second.registered_new, 2);
    assert_eq!(first.indexed + second.indexed, 2);
    assert_eq!(first.failed + second.failed, 0);

    let stats = pipeline.status().await.unwrap();
    assert_eq!(stats.files_by_state.get("indexed"), Some(&2));
    assert_eq!(stats.chunks_total, 2);
}

#[tokio::test]
async fn racing_registrations_agree_on_one_new() {
    let tmp = tempfile::TempDir::new().unwrap();
    let pool = docdex::db::connect(&tmp.path().join("db.sqlite")).await.unwrap();
    docdex::migrate::run_migrations(&pool).await.unwrap();
    let registry = Registry::new(pool, 3);

    let entry = docdex::models::FileListingEntry {
        file_id: "doc.txt".to_string(),
        filename: "doc.txt".to_string(),
        file_type: FileType::Txt,
        size: 10,
        uploaded_at: 0,
        download_ref: "doc.txt".to_string(),
    };

    let (a, b) = tokio::join!(
        registry.register_if_new(&entry, "hash1"),
        registry.register_if_new(&entry, "hash1")
    );
    let outcomes = [a.unwrap(), b.unwrap()];
    assert_eq!(
        outcomes.iter().filter(|o| **o == RegisterOutcome::New).count(),
        1
    );
    assert_eq!(
        outcomes
            .iter()
            .filter(|o| **o == RegisterOutcome::Unchanged)
            .count(),
        1
    );
}

#[tokio::test]
async fn changed_upload_leaves_active_claims_alone() {
    let tmp = tempfile::TempDir::new().unwrap();
    let pool = docdex::db::connect(&tmp.path().join("db.sqlite")).await.unwrap();
    docdex::migrate::run_migrations(&pool).await.unwrap();
    let registry = Registry::new(pool, 3);

    let entry = docdex::models::FileListingEntry {
        file_id: "doc.txt".to_string(),
        filename: "doc.txt".to_string(),
        file_type: FileType::Txt,
        size: 10,
        uploaded_at: 0,
        download_ref: "doc.txt".to_string(),
    };
    registry.register_if_new(&entry, "hash1").await.unwrap();
    assert!(registry.claim("doc.txt").await.unwrap());

    // New content arrives while another run holds the extraction claim:
    // the claim survives, and the new hash is picked up on a later scan.
    let outcome = registry.register_if_new(&entry, "hash2").await.unwrap();
    assert_eq!(outcome, RegisterOutcome::Unchanged);
    let row = registry.get("doc.txt").await.unwrap().unwrap();
    assert_eq!(row.state, IngestionState::Extracting);
    assert_eq!(row.content_hash, "hash1");

    // Claim released: the same re-upload now resets the file.
    registry.mark_indexed("doc.txt").await.unwrap();
    let outcome = registry.register_if_new(&entry, "hash2").await.unwrap();
    assert_eq!(outcome, RegisterOutcome::Changed);
    let row = registry.get("doc.txt").await.unwrap().unwrap();
    assert_eq!(row.state, IngestionState::Pending);
    assert_eq!(row.content_hash, "hash2");
}

#[tokio::test]
async fn exact_token_outranks_higher_semantic_candidates() {
    let tmp = tempfile::TempDir::new().unwrap();
    let workspace = tmp.path().join("ws");
    std::fs::create_dir_all(&workspace).unwrap();
    std::fs::write(
        workspace.join("exact.txt"),
        "incident mitigated using override 7741 sequence\n",
    )
    .unwrap();
    std::fs::write(
        workspace.join("near1.txt"),
        "services recovered after the outage window closed\n",
    )
    .unwrap();
    std::fs::write(
        workspace.join("near2.txt"),
        "routing tables rebuilt during maintenance\n",
    )
    .unwrap();
    std::fs::write(
        workspace.join("near3.txt"),
        "alerting thresholds tuned for paging noise\n",
    )
    .unwrap();

    let pipeline = open_pipeline(&workspace, &tmp.path().join("db.sqlite")).await;
    pipeline.ingest_pending().await.unwrap();

    let chunks = pipeline.store().all_chunks().await.unwrap();
    let id_for = |file_id: &str| {
        chunks
            .iter()
            .find(|c| c.file_id == file_id)
            .unwrap()
            .chunk_id
            .clone()
    };

    // Semantic ordering alone: near1 > near2 > near3 > exact. The exact
    // chunk is dead last by cosine.
    pipeline
        .store()
        .upsert_vector(&id_for("near1.txt"), &[0.9, 0.43589, 0.0])
        .await
        .unwrap();
    pipeline
        .store()
        .upsert_vector(&id_for("near2.txt"), &[0.4, 0.91652, 0.0])
        .await
        .unwrap();
    pipeline
        .store()
        .upsert_vector(&id_for("near3.txt"), &[0.35, 0.93675, 0.0])
        .await
        .unwrap();
    pipeline
        .store()
        .upsert_vector(&id_for("exact.txt"), &[0.0, 0.0, 1.0])
        .await
        .unwrap();

    let retrieval = RetrievalConfig {
        hybrid_alpha: 0.7,
        candidate_multiplier: 4,
        final_k: 2,
        excerpt_chars: 400,
    };
    let response = docdex::retrieve::rank(
        pipeline.store(),
        &retrieval,
        "override 7741",
        Some(vec![1.0, 0.0, 0.0]),
        None,
    )
    .await;

    assert_eq!(response.chunks.len(), 2);
    assert_eq!(response.chunks[0].filename, "near1.txt");
    // The blend promotes the exact-token chunk into the top k even
    // though two other chunks beat it on cosine similarity.
    assert_eq!(response.chunks[1].filename, "exact.txt");
    let exact = &response.chunks[1];
    assert!(exact.lexical_score > 0.99);
    assert!(exact.semantic_score < response.chunks[0].semantic_score);
    assert!(exact.semantic_score < 0.01);
}

// Keep DbConfig referenced so config construction stays in the public API.
#[test]
fn config_builds_programmatically() {
    let config = Config {
        db: DbConfig {
            path: "x.sqlite".into(),
        },
        chunking: Default::default(),
        retrieval: Default::default(),
        embedding: Default::default(),
        extraction: Default::default(),
        ingestion: Default::default(),
        memory: Default::default(),
        workspace: None,
    };
    assert_eq!(config.retrieval.final_k, 5);
}
