//! Sealing and opening bundle payloads.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand_core::{OsRng, RngCore};
use rsa::Oaep;
use rsa::traits::PublicKeyParts;
use sha2::Sha256;

use crate::container::{CipherMode, EncryptedPayload, NONCE_LEN};
use crate::error::{CipherError, CipherResult};
use crate::key::{PrivateKey, PublicKey};

/// AES-256 session key length in bytes.
const SESSION_KEY_LEN: usize = 32;

/// Largest payload a direct-mode container can hold for `key`.
///
/// OAEP with SHA-256 costs two hash lengths plus two bytes of the RSA
/// block.
pub fn direct_capacity(key: &PublicKey) -> usize {
    key.rsa_key().size().saturating_sub(2 * 32 + 2)
}

/// Seal `payload` for the holder of the private half of `key`.
///
/// A fresh session key and nonce are drawn per call, so sealing the same
/// payload twice yields different containers.
pub fn encrypt(payload: &[u8], key: &PublicKey) -> CipherResult<EncryptedPayload> {
    let fingerprint = key.fingerprint()?;

    let mut session_key = [0u8; SESSION_KEY_LEN];
    OsRng.fill_bytes(&mut session_key);
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let aead = Aes256Gcm::new_from_slice(&session_key)
        .map_err(|e| CipherError::Encryption(e.to_string()))?;
    let ciphertext = aead
        .encrypt(Nonce::from_slice(&nonce), payload)
        .map_err(|_| CipherError::Encryption("payload encryption failed".to_string()))?;

    let wrapped_key = key
        .rsa_key()
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), &session_key)
        .map_err(|e| CipherError::Encryption(format!("session key wrapping failed: {e}")))?;

    Ok(EncryptedPayload::hybrid(
        fingerprint,
        wrapped_key,
        nonce,
        ciphertext,
    ))
}

/// Seal `payload` with RSA alone, producing a legacy direct container.
///
/// Fails when the payload exceeds [`direct_capacity`]; callers wanting
/// arbitrary sizes use [`encrypt`].
pub fn encrypt_direct(payload: &[u8], key: &PublicKey) -> CipherResult<EncryptedPayload> {
    let capacity = direct_capacity(key);
    if payload.len() > capacity {
        return Err(CipherError::Encryption(format!(
            "payload of {} bytes exceeds the direct-mode capacity of {capacity} bytes",
            payload.len()
        )));
    }

    let fingerprint = key.fingerprint()?;
    let ciphertext = key
        .rsa_key()
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), payload)
        .map_err(|e| CipherError::Encryption(e.to_string()))?;

    Ok(EncryptedPayload::direct(fingerprint, ciphertext))
}

/// Open a container with `key`, returning the exact original payload.
///
/// Every failure, whether a wrong key, a fingerprint mismatch, tampered
/// ciphertext, or a bad session key, is the same
/// [`CipherError::DecryptionFailed`].
pub fn decrypt(container: &EncryptedPayload, key: &PrivateKey) -> CipherResult<Vec<u8>> {
    let expected = key
        .public_key()
        .fingerprint()
        .map_err(|_| CipherError::DecryptionFailed)?;
    if &expected != container.fingerprint() {
        return Err(CipherError::DecryptionFailed);
    }

    match container.mode() {
        CipherMode::Direct => key
            .rsa_key()
            .decrypt(Oaep::new::<Sha256>(), container.ciphertext())
            .map_err(|_| CipherError::DecryptionFailed),
        CipherMode::Hybrid => {
            let wrapped = container
                .wrapped_session_key()
                .ok_or(CipherError::DecryptionFailed)?;
            let nonce = container.nonce().ok_or(CipherError::DecryptionFailed)?;

            let session_key = key
                .rsa_key()
                .decrypt(Oaep::new::<Sha256>(), wrapped)
                .map_err(|_| CipherError::DecryptionFailed)?;
            if session_key.len() != SESSION_KEY_LEN {
                return Err(CipherError::DecryptionFailed);
            }

            let aead = Aes256Gcm::new_from_slice(&session_key)
                .map_err(|_| CipherError::DecryptionFailed)?;
            aead.decrypt(Nonce::from_slice(nonce), container.ciphertext())
                .map_err(|_| CipherError::DecryptionFailed)
        }
    }
}
