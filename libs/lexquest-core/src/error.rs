//! Error types for lexquest-core.

use thiserror::Error;
use uuid::Uuid;

/// Result type alias using CoreError.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors surfaced to callers of the engine.
///
/// Only caller misuse and storage failures end up here. Data-integrity
/// anomalies are clamped or ignored where they are read.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid rating value: {0}")]
    InvalidRating(u8),

    #[error("card not found: {0}")]
    CardNotFound(Uuid),

    #[error("book not found: {0}")]
    BookNotFound(Uuid),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors raised by a store implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// A collaborator (point table, target setting) could not answer.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
}
