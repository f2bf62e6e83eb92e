//! Error taxonomy shared by the merge pipeline.
//!
//! Every variant is fatal. Library code returns [`MergeError`] so callers and
//! tests can tell the categories apart; the CLI layer wraps them in
//! `anyhow::Error` with context before reporting.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MergeError {
    /// Missing or malformed setting, bad path, bad column letter, or an
    /// excluded row position that does not exist.
    #[error("configuration error: {0}")]
    Config(String),

    /// A source or template file could not be opened, read, or written.
    #[error("cannot access {path:?}: {reason}")]
    DataAccess { path: PathBuf, reason: String },

    /// A section value or header block no longer matches the identifier layout.
    #[error("format drift: no section identifier in {context} text '{text}'")]
    FormatDrift { context: &'static str, text: String },

    /// A computed plan position does not exist in the live document.
    #[error("internal consistency error: {0}")]
    InternalConsistency(String),
}

impl MergeError {
    pub fn config(message: impl Into<String>) -> Self {
        MergeError::Config(message.into())
    }

    pub fn data_access(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        MergeError::DataAccess {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn is_format_drift(&self) -> bool {
        matches!(self, MergeError::FormatDrift { .. })
    }
}

pub type MergeResult<T> = std::result::Result<T, MergeError>;
