use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub ingestion: IngestionConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub workspace: Option<WorkspaceConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_window_tokens")]
    pub window_tokens: usize,
    #[serde(default = "default_overlap_ratio")]
    pub overlap_ratio: f64,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            window_tokens: default_window_tokens(),
            overlap_ratio: default_overlap_ratio(),
        }
    }
}

fn default_window_tokens() -> usize {
    500
}
fn default_overlap_ratio() -> f64 {
    0.5
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Weight of the semantic score in the combined ranking; the lexical
    /// overlap gets `1 - hybrid_alpha`.
    #[serde(default = "default_hybrid_alpha")]
    pub hybrid_alpha: f64,
    /// Candidate pool size per channel, as a multiple of the final k.
    #[serde(default = "default_candidate_multiplier")]
    pub candidate_multiplier: usize,
    #[serde(default = "default_final_k")]
    pub final_k: usize,
    #[serde(default = "default_excerpt_chars")]
    pub excerpt_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            hybrid_alpha: default_hybrid_alpha(),
            candidate_multiplier: default_candidate_multiplier(),
            final_k: default_final_k(),
            excerpt_chars: default_excerpt_chars(),
        }
    }
}

fn default_hybrid_alpha() -> f64 {
    0.7
}
fn default_candidate_multiplier() -> usize {
    4
}
fn default_final_k() -> usize {
    5
}
fn default_excerpt_chars() -> usize {
    400
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            url: None,
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    /// Pages processed per PDF. Files over the cap index their first
    /// `max_pdf_pages` pages and log the dropped count.
    #[serde(default = "default_max_pdf_pages")]
    pub max_pdf_pages: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_pdf_pages: default_max_pdf_pages(),
        }
    }
}

fn default_max_pdf_pages() -> usize {
    2000
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestionConfig {
    /// Seconds between scheduled full scans.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Extraction failures tolerated before a file is parked as
    /// permanently failed.
    #[serde(default = "default_ingest_max_retries")]
    pub max_retries: i64,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            max_retries: default_ingest_max_retries(),
        }
    }
}

fn default_interval_secs() -> u64 {
    300
}
fn default_ingest_max_retries() -> i64 {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct MemoryConfig {
    #[serde(default = "default_eviction_hours")]
    pub eviction_hours: u64,
    /// Conversation turns retained per thread.
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            eviction_hours: default_eviction_hours(),
            max_turns: default_max_turns(),
        }
    }
}

fn default_eviction_hours() -> u64 {
    24
}
fn default_max_turns() -> usize {
    5
}

/// Filesystem-backed file listing, standing in for the chat-platform
/// file API in local deployments and tests.
#[derive(Debug, Deserialize, Clone)]
pub struct WorkspaceConfig {
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

fn default_include_globs() -> Vec<String> {
    vec![
        "**/*.pdf".to_string(),
        "**/*.docx".to_string(),
        "**/*.pptx".to_string(),
        "**/*.xlsx".to_string(),
        "**/*.txt".to_string(),
        "**/*.md".to_string(),
    ]
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.window_tokens == 0 {
        anyhow::bail!("chunking.window_tokens must be > 0");
    }
    if !(0.0..1.0).contains(&config.chunking.overlap_ratio) {
        anyhow::bail!("chunking.overlap_ratio must be in [0.0, 1.0)");
    }
    if !(0.0..=1.0).contains(&config.retrieval.hybrid_alpha) {
        anyhow::bail!("retrieval.hybrid_alpha must be in [0.0, 1.0]");
    }
    if config.retrieval.final_k == 0 {
        anyhow::bail!("retrieval.final_k must be >= 1");
    }
    if config.retrieval.candidate_multiplier == 0 {
        anyhow::bail!("retrieval.candidate_multiplier must be >= 1");
    }
    if config.ingestion.max_retries < 0 {
        anyhow::bail!("ingestion.max_retries must be >= 0");
    }
    if config.extraction.max_pdf_pages == 0 {
        anyhow::bail!("extraction.max_pdf_pages must be > 0");
    }

    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }

    Ok(())
}
