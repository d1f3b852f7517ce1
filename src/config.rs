use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub traversal: TraversalConfig,
    pub remote: RemoteConfig,
}

/// Traversal tuning configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TraversalConfig {
    /// Maximum BFS distance from any seed; -1 means unbounded.
    #[serde(default = "default_max_distance")]
    pub max_distance: i32,
    /// Bound on concurrent remote fetches within one distance level.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    /// Directory for resumable checkpoint snapshots. No checkpointing if unset.
    #[serde(default)]
    pub checkpoint_dir: Option<PathBuf>,
}

/// Remote vocabulary service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Base URL of the drug-vocabulary service (unauthenticated).
    #[serde(default = "default_drug_base_url")]
    pub drug_base_url: String,
    pub api_key_env: String,
    /// Vocabulary release to query (e.g. "current").
    #[serde(default = "default_version")]
    pub version: String,
    /// Source abbreviation of the secondary ontology.
    #[serde(default = "default_secondary_source")]
    pub secondary_source: String,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
}

fn default_max_distance() -> i32 {
    -1
}

fn default_max_in_flight() -> usize {
    4
}

fn default_base_url() -> String {
    "https://uts-ws.nlm.nih.gov".to_string()
}

fn default_drug_base_url() -> String {
    "https://rxnav.nlm.nih.gov/REST".to_string()
}

fn default_version() -> String {
    "current".to_string()
}

fn default_secondary_source() -> String {
    "SNOMEDCT_US".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> usize {
    3
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in TERMGRAPH_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // Load .env file if it exists (ignore errors - file is optional)
        let _ = dotenv::dotenv();

        let config_path = std::env::var("TERMGRAPH_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Config = toml::from_str(&config_str)
            .context("Failed to parse config.toml")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        // Check both environment variable and .env file (dotenv already loaded in Config::load)
        std::env::var(&self.remote.api_key_env)
            .with_context(|| {
                format!(
                    "Environment variable {} not set. Set it in your .env file or as an environment variable with your terminology-service API key.",
                    self.remote.api_key_env
                )
            })?;

        if self.traversal.max_distance < -1 {
            anyhow::bail!(
                "traversal.max_distance must be -1 (unbounded) or >= 0, got {}",
                self.traversal.max_distance
            );
        }

        if self.traversal.max_in_flight == 0 {
            anyhow::bail!("traversal.max_in_flight must be greater than 0");
        }

        if self.remote.request_timeout_secs == 0 {
            anyhow::bail!("remote.request_timeout_secs must be greater than 0");
        }

        Ok(())
    }

    /// Get the checkpoint directory, if checkpointing is enabled
    pub fn checkpoint_dir(&self) -> Option<&Path> {
        self.traversal.checkpoint_dir.as_deref()
    }
}
