use std::path::PathBuf;

use thiserror::Error;

use crate::llm_client::LlmError;

/// The résumé file could not be read. Fatal for the request; never retried.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("CV file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read CV file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that cross the screening boundary. Model and parse failures never
/// appear here; they end in the fallback scorer.
#[derive(Debug, Error)]
pub enum ScreeningError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("Invalid input: {0}")]
    Input(String),
}

/// Every model attempt failed.
#[derive(Debug, Error)]
#[error("model unavailable after {attempts} attempts: {last}")]
pub struct ModelError {
    pub attempts: u32,
    #[source]
    pub last: LlmError,
}

/// Model output that could not be coerced into a JSON object, even after repair.
#[derive(Debug, Error)]
pub enum ParseFailure {
    #[error("model output is not valid JSON: {source}")]
    Malformed {
        raw: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("model output is JSON but not an object")]
    NotAnObject { raw: String },
}

impl ParseFailure {
    pub fn raw(&self) -> &str {
        match self {
            ParseFailure::Malformed { raw, .. } | ParseFailure::NotAnObject { raw } => raw,
        }
    }
}
