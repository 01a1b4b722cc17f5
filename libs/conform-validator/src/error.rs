//! Error types for the validation engine's fallible boundaries.
//!
//! Checkers themselves never fail — they accumulate [`crate::result::Issue`]
//! values and return normally. These errors are reserved for the outer
//! boundary: malformed wire bytes, registry lookups, and configuration.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("malformed resource bytes: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("resource has no string-valued resourceType")]
    MissingResourceType,

    #[error("no schema registered for type '{0}'")]
    UnknownResourceType(String),

    #[error("no schema registered for profile '{0}'")]
    UnknownProfile(String),

    #[error("models error: {0}")]
    Models(#[from] conform_models::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid option: {0}")]
    InvalidOption(String),
}
