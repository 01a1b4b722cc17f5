//! Error types for the data model crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid resource: {0}")]
    InvalidResource(String),

    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("invalid field value: {0}")]
    InvalidFieldValue(String),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("invalid element path: {0}")]
    InvalidPath(String),

    #[error("element not found: {0}")]
    ElementNotFound(String),
}

pub type Result<T> = std::result::Result<T, Error>;
