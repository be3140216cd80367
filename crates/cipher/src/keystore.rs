//! Locating key material on the developer machine.
//!
//! Resolution order mirrors the CLI surface: inline key data beats an
//! explicit key file path, which beats the conventional key file in the
//! working directory, which beats a key embedded in the project config.

use std::path::Path;

use airlift_core::config::EncryptionConfig;
use base64::Engine;

use crate::error::{CipherError, CipherResult};
use crate::key::{PrivateKey, PublicKey};

/// Conventional private key file name in the project directory.
pub const PRIVATE_KEY_FILE: &str = ".airlift_key";

/// Conventional public key file name in the project directory.
pub const PUBLIC_KEY_FILE: &str = ".airlift_key.pub";

/// Parse private key data that is either raw PEM or base64-wrapped PEM.
pub fn parse_private_key_data(data: &str) -> CipherResult<PrivateKey> {
    PrivateKey::from_pem(&pem_or_base64(data)?)
}

/// Parse public key data that is either raw PEM or base64-wrapped PEM.
pub fn parse_public_key_data(data: &str) -> CipherResult<PublicKey> {
    PublicKey::from_pem(&pem_or_base64(data)?)
}

/// Resolve the key used to open sealed bundles.
///
/// Tries, in order: inline `data`, an explicit `path`, the conventional
/// [`PRIVATE_KEY_FILE`] under `dir`, then the project config.
pub fn resolve_private_key(
    data: Option<&str>,
    path: Option<&Path>,
    dir: &Path,
    encryption: &EncryptionConfig,
) -> CipherResult<PrivateKey> {
    if let Some(data) = data {
        return parse_private_key_data(data);
    }
    if let Some(path) = path {
        return PrivateKey::from_pem(&read_key_file(path)?);
    }
    let conventional = dir.join(PRIVATE_KEY_FILE);
    if conventional.exists() {
        return PrivateKey::from_pem(&read_key_file(&conventional)?);
    }
    if let Some(embedded) = &encryption.private_key {
        return parse_private_key_data(embedded);
    }
    Err(CipherError::KeyNotFound(format!(
        "no private key: tried --key-data, --key, {} and the project config",
        conventional.display()
    )))
}

/// Resolve the key bundles are sealed for.
///
/// Mirrors [`resolve_private_key`] with the `.pub` file and the embedded
/// public key.
pub fn resolve_public_key(
    data: Option<&str>,
    path: Option<&Path>,
    dir: &Path,
    encryption: &EncryptionConfig,
) -> CipherResult<PublicKey> {
    if let Some(data) = data {
        return parse_public_key_data(data);
    }
    if let Some(path) = path {
        return PublicKey::from_pem(&read_key_file(path)?);
    }
    let conventional = dir.join(PUBLIC_KEY_FILE);
    if conventional.exists() {
        return PublicKey::from_pem(&read_key_file(&conventional)?);
    }
    if let Some(embedded) = &encryption.public_key {
        return parse_public_key_data(embedded);
    }
    Err(CipherError::KeyNotFound(format!(
        "no public key: tried --key-data, --key, {} and the project config",
        conventional.display()
    )))
}

fn pem_or_base64(data: &str) -> CipherResult<String> {
    let trimmed = data.trim();
    if trimmed.starts_with("-----BEGIN") {
        return Ok(trimmed.to_string());
    }
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(trimmed)
        .map_err(|e| CipherError::KeyParsing(format!("key data is neither PEM nor base64: {e}")))?;
    String::from_utf8(decoded)
        .map_err(|e| CipherError::KeyParsing(format!("decoded key data is not UTF-8: {e}")))
}

fn read_key_file(path: &Path) -> CipherResult<String> {
    std::fs::read_to_string(path).map_err(|e| {
        CipherError::KeyNotFound(format!("cannot read key file {}: {e}", path.display()))
    })
}
