use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::llm_client::DEFAULT_MODEL;

/// Uploads above this size are rejected before screening (12 MiB).
const DEFAULT_MAX_UPLOAD_BYTES: usize = 12 * 1024 * 1024;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub port: u16,
    pub rust_log: String,
    /// Root directory that `analyze-existing` CV paths are resolved against.
    pub cv_storage_dir: PathBuf,
    /// Upper bound on a whole screening call. `None` means unbounded.
    pub screening_deadline: Option<Duration>,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let screening_deadline = optional_env("SCREENING_DEADLINE_SECS")
            .map(|v| {
                v.parse::<u64>()
                    .context("SCREENING_DEADLINE_SECS must be a whole number of seconds")
            })
            .transpose()?
            .map(Duration::from_secs);

        let max_upload_bytes = optional_env("MAX_UPLOAD_BYTES")
            .map(|v| {
                v.parse::<usize>()
                    .context("MAX_UPLOAD_BYTES must be a byte count")
            })
            .transpose()?
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);

        Ok(Config {
            gemini_api_key: require_env("GEMINI_API_KEY")?,
            gemini_model: optional_env("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            cv_storage_dir: optional_env("CV_STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("uploads")),
            screening_deadline,
            max_upload_bytes,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Reads an env var, treating empty values as unset.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
