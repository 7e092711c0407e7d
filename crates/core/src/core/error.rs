use std::io;

use thiserror::Error;

use crate::index::ContextId;

/// Failures raised by the brain itself (index, learn/reply engines, persistence).
#[derive(Debug, Error)]
pub enum BrainError {
    /// A snapshot or archive did not have the expected shape. Nothing was installed.
    #[error("brain format error: {0}")]
    Format(String),

    /// A context id referenced from the word table is missing from the context table.
    ///
    /// Contexts are never deleted, so this is an internal consistency violation.
    #[error("context {0} not found (index is inconsistent)")]
    ContextNotFound(ContextId),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BrainError {
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        BrainError::Format(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, BrainError>;
