//! Crate error type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    /// The stored database image is not valid base64.
    #[error("corrupt database image: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid storage key: {0:?}")]
    InvalidKey(String),
    #[error("unknown id {0}")]
    UnknownId(i64),
    #[error("unknown goal #{0}")]
    UnknownGoal(usize),
}

pub type Result<T> = std::result::Result<T, Error>;
