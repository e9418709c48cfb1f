//! Error types shared by the ward-core collaborators.

use thiserror::Error;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised by the sequential collaborators (store, retrieval, chat API).
///
/// All of these are recoverable at the turn level: the voice loop substitutes
/// a fallback reply or skips the step rather than crashing.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Response generation failed: {0}")]
    Generation(String),

    #[error("Conversation store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
