//! # Docdex CLI
//!
//! Commands for database initialization, ingestion, querying, and
//! status inspection.
//!
//! ```bash
//! docdex --config ./docdex.toml init
//! docdex ingest                 # one full scan of the workspace
//! docdex watch                  # scan on a schedule until Ctrl-C
//! docdex query "What is the Q3 budget?"
//! docdex status
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use docdex::config::{self, Config};
use docdex::ingest::run_scheduler;
use docdex::sources::{FileListing, FilesystemListing};
use docdex::{db, migrate, Pipeline};

#[derive(Parser)]
#[command(
    name = "docdex",
    about = "Workspace document indexing and question answering with source attribution",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./docdex.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the SQLite database and run schema migrations. Idempotent.
    Init,

    /// Run one full ingestion scan over the configured workspace.
    Ingest,

    /// Run ingestion on the configured schedule until interrupted.
    Watch,

    /// Query the index and print ranked chunks with their sources.
    Query {
        /// The question to answer.
        question: String,

        /// Thread ID for conversational follow-ups.
        #[arg(long)]
        thread: Option<String>,
    },

    /// Print index status: file counts by type and state, chunk and
    /// vector totals, last run time, and failed files.
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg.db.path).await?;
            migrate::run_migrations(&pool).await?;
            println!("Database initialized at {}", cfg.db.path.display());
        }
        Commands::Ingest => {
            let pipeline = open_pipeline(cfg).await?;
            let summary = pipeline.ingest_pending().await?;
            println!(
                "Scanned {} files: {} new, {} changed, {} indexed, {} failed, {} chunks, {} vectors",
                summary.scanned,
                summary.registered_new,
                summary.registered_changed,
                summary.indexed,
                summary.failed,
                summary.chunks_written,
                summary.vectors_written
            );
        }
        Commands::Watch => {
            let pipeline = open_pipeline(cfg).await?;
            let (tx, rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    let _ = tx.send(true);
                }
            });
            run_scheduler(pipeline.ingestor(), rx).await;
        }
        Commands::Query { question, thread } => {
            let pipeline = open_pipeline(cfg).await?;
            let response = pipeline.query(&question, thread.as_deref()).await;

            if response.chunks.is_empty() {
                if response.degraded {
                    println!("No index available — run `docdex ingest` first.");
                } else {
                    println!("No information found in the indexed documents.");
                }
                return Ok(());
            }

            for (i, chunk) in response.chunks.iter().enumerate() {
                println!(
                    "{}. [{:.3}] {} ({})",
                    i + 1,
                    chunk.score,
                    chunk.filename,
                    chunk.locator
                );
                println!("   {}", chunk.text_excerpt.replace('\n', " "));
            }
        }
        Commands::Status => {
            let pipeline = open_pipeline(cfg).await?;
            let stats = pipeline.status().await?;

            println!("Files by type:");
            let mut by_type: Vec<_> = stats.files_by_type.iter().collect();
            by_type.sort();
            for (file_type, count) in by_type {
                println!("  {:12} {}", file_type, count);
            }

            println!("Files by state:");
            let mut by_state: Vec<_> = stats.files_by_state.iter().collect();
            by_state.sort();
            for (state, count) in by_state {
                println!("  {:20} {}", state, count);
            }

            println!("Chunks:  {}", stats.chunks_total);
            println!("Vectors: {}", stats.vectors_total);
            match stats.last_run_at {
                Some(ts) => println!("Last run: {}", ts),
                None => println!("Last run: never"),
            }
            if !stats.failed_file_ids.is_empty() {
                println!("Failed files:");
                for file_id in &stats.failed_file_ids {
                    println!("  {}", file_id);
                }
            }
        }
    }

    Ok(())
}

async fn open_pipeline(cfg: Config) -> Result<Pipeline> {
    let workspace = cfg
        .workspace
        .clone()
        .ok_or_else(|| anyhow::anyhow!("[workspace] section required for this command"))?;
    let listing: Arc<dyn FileListing> = Arc::new(FilesystemListing::new(&workspace)?);
    Ok(Pipeline::open(cfg, listing).await?)
}
