//! Error type returned by the clean and upsert drivers.

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The snapshot parsed but is not a JSON array, or is not valid JSON.
    #[error("invalid input in {path}: {message}")]
    InputShape { path: PathBuf, message: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    /// A call to the external index (or its credential lookup) failed.
    #[error("{stage} failed: {cause:#}")]
    External {
        stage: &'static str,
        cause: anyhow::Error,
    },
}

impl IngestError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn external(stage: &'static str, cause: anyhow::Error) -> Self {
        Self::External { stage, cause }
    }
}
