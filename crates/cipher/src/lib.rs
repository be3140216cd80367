//! Bundle encryption for airlift.
//!
//! This crate provides:
//! - RSA key generation and PEM handling
//! - Sealing bundle payloads for a public-key holder
//! - The self-describing encrypted container format
//! - Key resolution on the developer machine
//!
//! The default scheme is hybrid: a fresh AES-256-GCM session key encrypts
//! the payload and RSA-OAEP wraps the session key. A legacy direct mode
//! RSA-encrypts small payloads without a session key.

pub mod cipher;
pub mod container;
pub mod error;
pub mod key;
pub mod keystore;

pub use cipher::{decrypt, direct_capacity, encrypt, encrypt_direct};
pub use container::{CipherMode, EncryptedPayload};
pub use error::{CipherError, CipherResult};
pub use key::{KeyPair, PrivateKey, PublicKey};
