//! Cipher error types.

use thiserror::Error;

/// Key handling and encryption errors.
#[derive(Debug, Error)]
pub enum CipherError {
    #[error("key generation error: {0}")]
    KeyGeneration(String),

    #[error("key parsing error: {0}")]
    KeyParsing(String),

    #[error("no usable key found: {0}")]
    KeyNotFound(String),

    #[error("encryption error: {0}")]
    Encryption(String),

    /// Carries no detail on purpose: a caller must not be able to tell a
    /// wrong key from a tampered or malformed container.
    #[error("decryption failed")]
    DecryptionFailed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for cipher operations.
pub type CipherResult<T> = std::result::Result<T, CipherError>;
