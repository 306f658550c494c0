//! Database error types.

use lexquest_core::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl From<DbError> for StoreError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::Sqlite(e) => StoreError::Backend(e.to_string()),
            DbError::Json(e) => StoreError::Corrupt(e.to_string()),
            DbError::InvalidData(msg) => StoreError::Corrupt(msg),
        }
    }
}
