//! Engine error taxonomy.
//!
//! Typed so callers (the CLI here, an HTTP layer elsewhere) can map
//! `Validation`/`NotFound` to client errors and `Storage` to server errors
//! without string matching.

use thiserror::Error;

/// Errors surfaced by the grade aggregation engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Input data violated an engine invariant.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Opaque passthrough from the persistence layer.
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        EngineError::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        EngineError::NotFound(message.into())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
