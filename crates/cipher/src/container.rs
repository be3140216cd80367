//! The encrypted bundle container format.
//!
//! Layout, with all lengths big-endian:
//!
//! ```text
//! magic "ALFC" | format u8 | mode u8 | key fingerprint [32]
//! direct:  payload_len u64 | rsa ciphertext
//! hybrid:  wrapped_len u16 | wrapped session key | nonce [12]
//!          | payload_len u64 | aes-gcm ciphertext
//! ```
//!
//! Parsing is deliberately unhelpful about why input was rejected: every
//! malformed container surfaces as [`CipherError::DecryptionFailed`].

use crate::error::{CipherError, CipherResult};
use crate::key::hex_encode;
use std::fmt;

/// Magic bytes at the start of every container.
pub const MAGIC: &[u8; 4] = b"ALFC";

/// Container format version.
pub const FORMAT_VERSION: u8 = 1;

/// AES-GCM nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// Encryption mode recorded in the container header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CipherMode {
    /// Legacy: RSA-OAEP over the raw payload. Small payloads only.
    Direct,
    /// AES-256-GCM payload with an RSA-OAEP-wrapped session key.
    Hybrid,
}

impl CipherMode {
    fn to_byte(self) -> u8 {
        match self {
            Self::Direct => 1,
            Self::Hybrid => 2,
        }
    }

    fn from_byte(byte: u8) -> CipherResult<Self> {
        match byte {
            1 => Ok(Self::Direct),
            2 => Ok(Self::Hybrid),
            _ => Err(CipherError::DecryptionFailed),
        }
    }
}

/// A sealed payload plus everything needed to open it with the right key.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptedPayload {
    mode: CipherMode,
    fingerprint: [u8; 32],
    wrapped_key: Option<Vec<u8>>,
    nonce: Option<[u8; NONCE_LEN]>,
    ciphertext: Vec<u8>,
}

impl EncryptedPayload {
    pub(crate) fn direct(fingerprint: [u8; 32], ciphertext: Vec<u8>) -> Self {
        Self {
            mode: CipherMode::Direct,
            fingerprint,
            wrapped_key: None,
            nonce: None,
            ciphertext,
        }
    }

    pub(crate) fn hybrid(
        fingerprint: [u8; 32],
        wrapped_key: Vec<u8>,
        nonce: [u8; NONCE_LEN],
        ciphertext: Vec<u8>,
    ) -> Self {
        Self {
            mode: CipherMode::Hybrid,
            fingerprint,
            wrapped_key: Some(wrapped_key),
            nonce: Some(nonce),
            ciphertext,
        }
    }

    /// Get the encryption mode.
    pub fn mode(&self) -> CipherMode {
        self.mode
    }

    /// Fingerprint of the public key this container was sealed for.
    pub fn fingerprint(&self) -> &[u8; 32] {
        &self.fingerprint
    }

    /// Hex form of the key fingerprint, for display.
    pub fn fingerprint_hex(&self) -> String {
        hex_encode(&self.fingerprint)
    }

    /// The RSA-wrapped session key, present in hybrid containers.
    pub fn wrapped_session_key(&self) -> Option<&[u8]> {
        self.wrapped_key.as_deref()
    }

    /// Ciphertext length in bytes.
    pub fn ciphertext_len(&self) -> usize {
        self.ciphertext.len()
    }

    pub(crate) fn nonce(&self) -> Option<&[u8; NONCE_LEN]> {
        self.nonce.as_ref()
    }

    pub(crate) fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// Serialize to the wire format.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.ciphertext.len() + 64);
        out.extend_from_slice(MAGIC);
        out.push(FORMAT_VERSION);
        out.push(self.mode.to_byte());
        out.extend_from_slice(&self.fingerprint);
        if let (Some(wrapped), Some(nonce)) = (&self.wrapped_key, &self.nonce) {
            out.extend_from_slice(&(wrapped.len() as u16).to_be_bytes());
            out.extend_from_slice(wrapped);
            out.extend_from_slice(nonce);
        }
        out.extend_from_slice(&(self.ciphertext.len() as u64).to_be_bytes());
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Parse from the wire format.
    ///
    /// Rejects anything that is not exactly one well-formed container.
    pub fn from_bytes(bytes: &[u8]) -> CipherResult<Self> {
        let mut rest = bytes;

        if take(&mut rest, 4)? != MAGIC.as_slice() {
            return Err(CipherError::DecryptionFailed);
        }
        if take(&mut rest, 1)?[0] != FORMAT_VERSION {
            return Err(CipherError::DecryptionFailed);
        }
        let mode = CipherMode::from_byte(take(&mut rest, 1)?[0])?;

        let mut fingerprint = [0u8; 32];
        fingerprint.copy_from_slice(take(&mut rest, 32)?);

        let (wrapped_key, nonce) = match mode {
            CipherMode::Direct => (None, None),
            CipherMode::Hybrid => {
                let mut len_bytes = [0u8; 2];
                len_bytes.copy_from_slice(take(&mut rest, 2)?);
                let wrapped = take(&mut rest, u16::from_be_bytes(len_bytes) as usize)?.to_vec();
                if wrapped.is_empty() {
                    return Err(CipherError::DecryptionFailed);
                }
                let mut nonce = [0u8; NONCE_LEN];
                nonce.copy_from_slice(take(&mut rest, NONCE_LEN)?);
                (Some(wrapped), Some(nonce))
            }
        };

        let mut len_bytes = [0u8; 8];
        len_bytes.copy_from_slice(take(&mut rest, 8)?);
        let ciphertext_len = usize::try_from(u64::from_be_bytes(len_bytes))
            .map_err(|_| CipherError::DecryptionFailed)?;
        let ciphertext = take(&mut rest, ciphertext_len)?.to_vec();

        if !rest.is_empty() {
            return Err(CipherError::DecryptionFailed);
        }

        Ok(Self {
            mode,
            fingerprint,
            wrapped_key,
            nonce,
            ciphertext,
        })
    }
}

impl fmt::Debug for EncryptedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedPayload")
            .field("mode", &self.mode)
            .field("fingerprint", &self.fingerprint_hex())
            .field("ciphertext_len", &self.ciphertext.len())
            .finish()
    }
}

fn take<'a>(rest: &mut &'a [u8], n: usize) -> CipherResult<&'a [u8]> {
    if rest.len() < n {
        return Err(CipherError::DecryptionFailed);
    }
    let (head, tail) = rest.split_at(n);
    *rest = tail;
    Ok(head)
}
