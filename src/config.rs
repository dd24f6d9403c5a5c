// ⚙️ Configuration - environment-driven settings shared by both binaries
//
// Blank variables count as unset. Malformed numbers are errors, not defaults.

use crate::embedding::{DEFAULT_API_BASE, DEFAULT_EMBEDDING_MODEL};
use crate::reference::ReferenceData;
use crate::similarity::DEFAULT_BATCH_SIZE;
use anyhow::{anyhow, bail, Context, Result};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_CSV_PATH: &str = "data/ghana_facilities.csv";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// FACILITY_CSV_PATH
    pub csv_path: PathBuf,

    /// FACILITY_REFERENCE_PATH; bundled tables when unset
    pub reference_path: Option<PathBuf>,

    /// OPENAI_API_KEY; no similarity index without it
    pub openai_api_key: Option<String>,

    pub embedding_model: String,
    pub embedding_api_base: String,
    pub embedding_batch_size: usize,

    pub host: String,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            csv_path: PathBuf::from(DEFAULT_CSV_PATH),
            reference_path: None,
            openai_api_key: None,
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_api_base: DEFAULT_API_BASE.to_string(),
            embedding_batch_size: DEFAULT_BATCH_SIZE,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl Config {
    /// Read from the process environment (call `dotenvy::dotenv()` first)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key → value source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Config::default();

        let embedding_batch_size = match get("EMBEDDING_BATCH_SIZE") {
            Some(raw) => {
                let size: usize = raw
                    .parse()
                    .with_context(|| format!("EMBEDDING_BATCH_SIZE must be a positive integer, got '{}'", raw))?;
                if size == 0 {
                    bail!("EMBEDDING_BATCH_SIZE must be at least 1");
                }
                size
            }
            None => defaults.embedding_batch_size,
        };

        let port = match get("PORT") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("PORT must be a port number, got '{}'", raw))?,
            None => defaults.port,
        };

        Ok(Config {
            csv_path: get("FACILITY_CSV_PATH").map(PathBuf::from).unwrap_or(defaults.csv_path),
            reference_path: get("FACILITY_REFERENCE_PATH").map(PathBuf::from),
            openai_api_key: get("OPENAI_API_KEY"),
            embedding_model: get("EMBEDDING_MODEL").unwrap_or(defaults.embedding_model),
            embedding_api_base: get("EMBEDDING_API_BASE").unwrap_or(defaults.embedding_api_base),
            embedding_batch_size,
            host: get("HOST").unwrap_or(defaults.host),
            port,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn load_reference(&self) -> Result<ReferenceData> {
        match &self.reference_path {
            Some(path) => ReferenceData::from_file(path),
            None => ReferenceData::bundled(),
        }
    }
}

/// Install the fmt subscriber; an explicit level beats RUST_LOG, which beats "info"
pub fn init_tracing(log_level: Option<&str>) -> Result<()> {
    let filter = match log_level {
        Some(level) => EnvFilter::try_new(level).with_context(|| format!("Invalid log level '{}'", level))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!(e))
}

// ============================================================================
// TESTS
// ============================================================================
