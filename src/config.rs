//! Configuration management.
//!
//! Settings come from `gleaner.toml` in the data directory (or the working
//! directory), with per-field serde defaults so a missing file or a sparse
//! file both work. A handful of environment variables override the basics
//! for container deployments.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::browser::BrowserOptions;
use crate::extract::ExtractOptions;

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Top-level application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the database and export artifacts.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Size of the extraction worker pool.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    #[serde(default)]
    pub browser: BrowserOptions,

    #[serde(default)]
    pub extraction: ExtractOptions,

    #[serde(default)]
    pub server: ServerConfig,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_worker_count() -> usize {
    3
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            worker_count: default_worker_count(),
            browser: BrowserOptions::default(),
            extraction: ExtractOptions::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Config {
    /// Load settings, applying overrides in order: file, environment,
    /// explicit `--data-dir`.
    pub fn load(data_dir_override: Option<PathBuf>) -> anyhow::Result<Self> {
        let data_dir = data_dir_override
            .or_else(|| std::env::var("GLEANER_DATA_DIR").ok().map(PathBuf::from));

        let mut config = Self::read_file(data_dir.as_deref())?;

        if let Some(dir) = data_dir {
            config.data_dir = dir;
        }
        if let Ok(workers) = std::env::var("GLEANER_WORKERS") {
            if let Ok(count) = workers.parse::<usize>() {
                config.worker_count = count.max(1);
            }
        }

        Ok(config)
    }

    fn read_file(data_dir: Option<&Path>) -> anyhow::Result<Self> {
        let mut candidates: Vec<PathBuf> = Vec::new();
        if let Some(dir) = data_dir {
            candidates.push(dir.join("gleaner.toml"));
        }
        candidates.push(PathBuf::from("gleaner.toml"));

        for path in candidates {
            if path.exists() {
                let raw = std::fs::read_to_string(&path)?;
                let config: Config = toml::from_str(&raw)
                    .map_err(|e| anyhow::anyhow!("invalid config {}: {e}", path.display()))?;
                return Ok(config);
            }
        }

        Ok(Self::default())
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("gleaner.db")
    }

    pub fn database_url(&self) -> String {
        self.database_path().display().to_string()
    }

    /// Directory for flat-text job exports.
    pub fn export_dir(&self) -> PathBuf {
        self.data_dir.join("exports")
    }

    /// Create the data directory tree.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(self.export_dir())
    }
}
