use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("corrupt container: {0}")]
    CorruptBundle(String),

    #[error("bundle for '{repo}' is missing {count} object(s)")]
    IncompleteBundle { repo: String, count: usize },

    #[error("extraction target '{path}' is occupied by foreign data")]
    PathConflict { path: PathBuf },

    #[error("extraction failed for '{repo}': {reason}")]
    ExtractionFailed { repo: String, reason: String },

    #[error("no bundle downloaded for '{0}'")]
    NotDownloaded(String),

    #[error("invalid repository id '{0}': expected owner/name")]
    InvalidRepoId(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;
