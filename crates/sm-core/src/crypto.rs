//! Symmetric encryption of sensitive output fields
//!
//! The mapper only needs an `encrypt(text) -> ciphertext` capability. Key
//! management stays outside the pipeline: `SessionCipher` draws a fresh key
//! from the OS RNG when it is built and never exposes or persists it.

use crate::error::{Error, Result};
use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::Aes256Gcm;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;

/// Literal appended to every encrypted value so it can be recognized without decrypting
pub const ENCRYPTION_MARKER: &str = "**ENC**";

/// An opaque encryption capability
pub trait Encryptor {
    /// Encrypt `plaintext` into a printable ciphertext
    fn encrypt(&self, plaintext: &str) -> Result<String>;
}

impl<F> Encryptor for F
where
    F: Fn(&str) -> Result<String>,
{
    fn encrypt(&self, plaintext: &str) -> Result<String> {
        self(plaintext)
    }
}

/// Encrypt `plaintext` and append the marker
pub fn seal(encryptor: &dyn Encryptor, plaintext: &str) -> Result<String> {
    let mut sealed = encryptor.encrypt(plaintext)?;
    sealed.push_str(ENCRYPTION_MARKER);
    Ok(sealed)
}

/// Whether a value carries the encryption marker
pub fn is_sealed(value: &str) -> bool {
    value.ends_with(ENCRYPTION_MARKER)
}

/// AES-256-GCM with a per-run key.
///
/// Each value gets a fresh 96-bit nonce; output is URL-safe base64 of
/// `nonce || ciphertext || tag`. Output is not reproducible across runs.
pub struct SessionCipher {
    cipher: Aes256Gcm,
}

impl SessionCipher {
    /// Build a cipher around a newly generated key
    pub fn generate() -> Self {
        let key = Aes256Gcm::generate_key(OsRng);
        Self {
            cipher: Aes256Gcm::new(&key),
        }
    }
}

impl Encryptor for SessionCipher {
    fn encrypt(&self, plaintext: &str) -> Result<String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| Error::Encryption(e.to_string()))?;

        let mut payload = Vec::with_capacity(nonce.len() + ciphertext.len());
        payload.extend_from_slice(&nonce);
        payload.extend_from_slice(&ciphertext);
        Ok(URL_SAFE.encode(payload))
    }
}

impl std::fmt::Debug for SessionCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCipher").finish_non_exhaustive()
    }
}
