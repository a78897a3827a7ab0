//! AES-256-CBC encryption of provider access tokens.
//!
//! Access tokens are encrypted before they reach the credential store and
//! decrypted only when a provider call needs them.  The stored form is
//! self-contained:
//!
//! ```text
//! <iv as 32 hex chars>:<ciphertext as hex>
//! ```
//!
//! so decryption needs nothing but the stored string and the process-wide
//! key.  A fresh random 128-bit IV is drawn from `ring`'s system CSPRNG for
//! every call to [`TokenCipher::encrypt`].
//!
//! # Security Notes
//!
//! - CBC provides confidentiality only.  Tampering is detected solely by the
//!   PKCS#7 padding check and UTF-8 validation, both of which are
//!   probabilistic.  The layout is kept because records written by earlier
//!   deployments use it.
//! - The key is held in memory for the lifetime of the process.

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use ring::rand::{SecureRandom, SystemRandom};

use crate::error::{Result, VaultError};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Length of the AES-256 key in bytes.
pub const KEY_LEN: usize = 32;

/// Length of the CBC initialization vector in bytes.
pub const IV_LEN: usize = 16;

/// Separator between the hex IV and the hex ciphertext.
const SEPARATOR: char = ':';

/// Symmetric cipher for access tokens at rest.
#[derive(Clone)]
pub struct TokenCipher {
    key: [u8; KEY_LEN],
    rng: SystemRandom,
}

impl std::fmt::Debug for TokenCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCipher").finish_non_exhaustive()
    }
}

impl TokenCipher {
    /// Create a cipher from a raw 256-bit key.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidKey`] if `key` is not exactly
    /// [`KEY_LEN`] bytes.
    pub fn new(key: &[u8]) -> Result<Self> {
        let key: [u8; KEY_LEN] = key.try_into().map_err(|_| VaultError::InvalidKey {
            reason: format!("key must be {} bytes, got {}", KEY_LEN, key.len()),
        })?;
        Ok(Self {
            key,
            rng: SystemRandom::new(),
        })
    }

    /// Create a cipher from a configured key string.
    ///
    /// Accepts either 64 hex characters or exactly 32 raw bytes; the raw
    /// form keeps keys from existing deployments readable.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidKey`] if the string is neither form.
    pub fn from_config_str(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.len() == KEY_LEN * 2 {
            if let Ok(bytes) = hex::decode(value) {
                return Self::new(&bytes);
            }
        }
        if value.len() == KEY_LEN {
            return Self::new(value.as_bytes());
        }
        Err(VaultError::InvalidKey {
            reason: format!(
                "expected {} hex characters or {} raw bytes, got {} bytes",
                KEY_LEN * 2,
                KEY_LEN,
                value.len()
            ),
        })
    }

    /// Encrypt `plaintext` and return the `ivHex:cipherHex` string.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::EncryptionFailed`] if the CSPRNG fails.
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let mut iv = [0u8; IV_LEN];
        self.rng
            .fill(&mut iv)
            .map_err(|_| VaultError::EncryptionFailed {
                reason: "failed to generate random IV".into(),
            })?;

        let ciphertext = Aes256CbcEnc::new_from_slices(&self.key, &iv)
            .map_err(|_| VaultError::EncryptionFailed {
                reason: "failed to initialise AES-256-CBC".into(),
            })?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

        tracing::trace!(
            plaintext_len = plaintext.len(),
            ciphertext_len = ciphertext.len(),
            "encrypted token"
        );

        Ok(format!(
            "{}{SEPARATOR}{}",
            hex::encode(iv),
            hex::encode(ciphertext)
        ))
    }

    /// Decrypt a string previously produced by [`TokenCipher::encrypt`].
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::DecryptionFailed`] if the separator is missing,
    /// either half is not valid hex, the IV has the wrong length, padding
    /// does not verify (wrong key or corrupted data), or the plaintext is
    /// not UTF-8.
    pub fn decrypt(&self, stored: &str) -> Result<String> {
        let (iv_hex, cipher_hex) =
            stored
                .split_once(SEPARATOR)
                .ok_or_else(|| VaultError::DecryptionFailed {
                    reason: "missing IV separator".into(),
                })?;

        let iv = hex::decode(iv_hex).map_err(|e| VaultError::DecryptionFailed {
            reason: format!("IV is not valid hex: {e}"),
        })?;
        if iv.len() != IV_LEN {
            return Err(VaultError::DecryptionFailed {
                reason: format!("IV must be {} bytes, got {}", IV_LEN, iv.len()),
            });
        }

        let ciphertext = hex::decode(cipher_hex).map_err(|e| VaultError::DecryptionFailed {
            reason: format!("ciphertext is not valid hex: {e}"),
        })?;

        let plaintext = Aes256CbcDec::new_from_slices(&self.key, &iv)
            .map_err(|_| VaultError::DecryptionFailed {
                reason: "failed to initialise AES-256-CBC".into(),
            })?
            .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
            .map_err(|_| VaultError::DecryptionFailed {
                reason: "bad padding: wrong key or corrupted data".into(),
            })?;

        String::from_utf8(plaintext).map_err(|_| VaultError::DecryptionFailed {
            reason: "plaintext is not valid UTF-8".into(),
        })
    }
}

/// Generate a random 256-bit key, hex encoded, suitable for configuration.
///
/// # Errors
///
/// Returns [`VaultError::Internal`] if the system CSPRNG fails.
pub fn generate_key_hex() -> Result<String> {
    let mut key = [0u8; KEY_LEN];
    SystemRandom::new()
        .fill(&mut key)
        .map_err(|_| VaultError::Internal("failed to generate random bytes".into()))?;
    Ok(hex::encode(key))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
