//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid version: {0}")]
    InvalidVersion(String),

    #[error("invalid app id: {0}")]
    InvalidAppId(String),

    #[error("invalid channel: {0}")]
    InvalidChannelRef(String),

    #[error("channel has no active progressive deploy to advance")]
    MissingBaseline,
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
