//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Search backend connection settings
    #[serde(default)]
    pub backend: BackendConfig,

    /// Dataset loading and partitioning
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Bulk upload retry policy
    #[serde(default)]
    pub upload: UploadConfig,

    /// Query settings
    #[serde(default)]
    pub search: SearchConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.backend.hosts.is_empty() {
            return Err(AppError::validation("backend.hosts is empty"));
        }
        for host in &self.backend.hosts {
            Url::parse(host).map_err(|e| {
                AppError::validation(format!("backend.hosts entry '{host}' is invalid: {e}"))
            })?;
        }
        if self.backend.index.trim().is_empty() {
            return Err(AppError::validation("backend.index is empty"));
        }
        if self.backend.timeout_secs == 0 {
            return Err(AppError::validation("backend.timeout_secs must be > 0"));
        }
        if self.ingest.target_partition_bytes == 0 {
            return Err(AppError::validation(
                "ingest.target_partition_bytes must be > 0",
            ));
        }
        if self.ingest.max_partition_documents == 0 {
            return Err(AppError::validation(
                "ingest.max_partition_documents must be > 0",
            ));
        }
        if self.ingest.workers == 0 {
            return Err(AppError::validation("ingest.workers must be > 0"));
        }
        self.ingest.delimiter_byte()?;
        if self.upload.max_attempts == 0 {
            return Err(AppError::validation("upload.max_attempts must be > 0"));
        }
        if self.upload.backoff_base_ms > self.upload.backoff_max_ms {
            return Err(AppError::validation(
                "upload.backoff_base_ms must not exceed upload.backoff_max_ms",
            ));
        }
        if self.search.result_size == 0 {
            return Err(AppError::validation("search.result_size must be > 0"));
        }
        Ok(())
    }
}

/// Search backend connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URLs of the backend nodes, tried in order
    #[serde(default = "defaults::hosts")]
    pub hosts: Vec<String>,

    /// Target index name
    #[serde(default = "defaults::index")]
    pub index: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            hosts: defaults::hosts(),
            index: defaults::index(),
            timeout_secs: defaults::timeout(),
            user_agent: defaults::user_agent(),
        }
    }
}

/// Dataset loading and partitioning settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Path of the metadata table
    #[serde(default = "defaults::dataset")]
    pub dataset: PathBuf,

    /// Directory relative body-source paths are resolved against
    #[serde(default = "defaults::data_dir")]
    pub data_dir: PathBuf,

    /// Column delimiter of the metadata table
    #[serde(default = "defaults::delimiter")]
    pub delimiter: String,

    /// Estimated serialized size at which a partition is cut
    #[serde(default = "defaults::target_partition_bytes")]
    pub target_partition_bytes: usize,

    /// Hard cap on records per partition
    #[serde(default = "defaults::max_partition_documents")]
    pub max_partition_documents: usize,

    /// Number of partition workers
    #[serde(default = "defaults::workers")]
    pub workers: usize,

    /// Keep only records whose title mentions one of these keywords
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl IngestConfig {
    /// The delimiter as a single byte, as the CSV reader expects it.
    pub fn delimiter_byte(&self) -> Result<u8> {
        match self.delimiter.as_bytes() {
            [byte] if byte.is_ascii() => Ok(*byte),
            _ => Err(AppError::validation(format!(
                "ingest.delimiter must be a single ASCII character, got {:?}",
                self.delimiter
            ))),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            dataset: defaults::dataset(),
            data_dir: defaults::data_dir(),
            delimiter: defaults::delimiter(),
            target_partition_bytes: defaults::target_partition_bytes(),
            max_partition_documents: defaults::max_partition_documents(),
            workers: defaults::workers(),
            keywords: Vec::new(),
        }
    }
}

/// Retry policy for bulk uploads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Attempts per batch before it is escalated
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// First backoff delay in milliseconds
    #[serde(default = "defaults::backoff_base")]
    pub backoff_base_ms: u64,

    /// Upper bound for a single backoff delay in milliseconds
    #[serde(default = "defaults::backoff_max")]
    pub backoff_max_ms: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::max_attempts(),
            backoff_base_ms: defaults::backoff_base(),
            backoff_max_ms: defaults::backoff_max(),
        }
    }
}

/// Query settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Maximum number of results returned per query
    #[serde(default = "defaults::result_size")]
    pub result_size: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            result_size: defaults::result_size(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,

    /// Print per-partition progress lines
    #[serde(default = "defaults::show_progress")]
    pub show_progress: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
            show_progress: defaults::show_progress(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Backend defaults
    pub fn hosts() -> Vec<String> {
        vec!["http://localhost:9200".into()]
    }
    pub fn index() -> String {
        "covid19_papers".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn user_agent() -> String {
        "covidsearch/0.1".into()
    }

    // Ingest defaults
    pub fn dataset() -> PathBuf {
        PathBuf::from("metadata.csv")
    }
    pub fn data_dir() -> PathBuf {
        PathBuf::from(".")
    }
    pub fn delimiter() -> String {
        ",".into()
    }
    pub fn target_partition_bytes() -> usize {
        5 * 1024 * 1024
    }
    pub fn max_partition_documents() -> usize {
        1000
    }
    pub fn workers() -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
    }

    // Upload defaults
    pub fn max_attempts() -> u32 {
        5
    }
    pub fn backoff_base() -> u64 {
        500
    }
    pub fn backoff_max() -> u64 {
        30_000
    }

    // Search defaults
    pub fn result_size() -> usize {
        20
    }

    // Logging defaults
    pub fn log_level() -> String {
        "info".into()
    }
    pub fn show_progress() -> bool {
        true
    }
}
