//! Configuration loaded from `ingest.toml`.
//!
//! Missing keys fall back to defaults. `OPENAI_API_KEY` and `INGEST_BASE_URL`
//! take precedence over the file; CLI flags are applied on top by `main`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::openai::client::{API_URL, DEFAULT_MODEL};

pub const CONFIG_FILE: &str = "ingest.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// OpenAI API key.
    pub api_key: String,

    /// Model used for all three stages.
    pub model: String,

    /// Full URL of the Responses endpoint.
    pub base_url: String,

    pub connect_timeout_secs: u64,

    /// Upper bound for a single model call.
    pub request_timeout_secs: u64,

    /// Upper bound for a stage, enforced by the executor on top of the HTTP timeout.
    pub stage_timeout_secs: u64,

    /// Pipeline runs allowed to hold a client lease at the same time.
    pub max_concurrent_runs: usize,

    pub worker_count: usize,

    pub worker_heartbeat_ms: u64,

    /// Budget for each read the health snapshot performs.
    pub probe_timeout_ms: u64,

    /// Directory holding one JSON file per job.
    pub data_dir: PathBuf,

    pub bind_addr: String,

    /// Jobs listed in the health snapshot.
    pub recent_jobs_limit: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            base_url: API_URL.to_string(),
            connect_timeout_secs: 10,
            request_timeout_secs: 120,
            stage_timeout_secs: 150,
            max_concurrent_runs: 4,
            worker_count: 2,
            worker_heartbeat_ms: 5_000,
            probe_timeout_ms: 1_000,
            data_dir: PathBuf::from(".ingest/jobs"),
            bind_addr: "127.0.0.1:8000".to_string(),
            recent_jobs_limit: 20,
        }
    }
}

impl IngestConfig {
    /// Load `ingest.toml` from the working directory, or defaults if absent.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            toml::from_str::<IngestConfig>(&contents)
                .with_context(|| format!("failed to parse {}", path.display()))?
        } else {
            Self::default()
        };

        if let Ok(key) = std::env::var("OPENAI_API_KEY")
            && !key.is_empty()
        {
            config.api_key = key;
        }
        if let Ok(url) = std::env::var("INGEST_BASE_URL")
            && !url.is_empty()
        {
            config.base_url = url;
        }

        Ok(config)
    }

    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn worker_heartbeat(&self) -> Duration {
        Duration::from_millis(self.worker_heartbeat_ms)
    }

    /// Workers silent for three heartbeats are considered gone.
    pub fn worker_stale_after(&self) -> Duration {
        self.worker_heartbeat() * 3
    }
}
