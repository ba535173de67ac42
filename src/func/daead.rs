//! Deterministic authenticated encryption
//!
//! AES-256-GCM-SIV with a synthetic nonce `HMAC-SHA256(mac_key, plaintext)[..12]`.
//! The same plaintext under the same key always produces the same token,
//! which keeps equality joins on pseudonymized columns working. Tokens are
//! URL-safe base64 without padding of `nonce || ciphertext`.

use super::{PseudoFunc, PseudoFuncOutput};
use crate::domain::{FuncError, PseudoError, Result};
use crate::kms::DataKey;
use aes_gcm_siv::{
    aead::{Aead, KeyInit},
    Aes256GcmSiv, Nonce,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroizing;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Algorithm name reported in metadata
pub const DAEAD_ALGORITHM: &str = "TINK_DAEAD";

/// Deterministic AES-GCM-SIV
pub struct DaeadFunc {
    cipher: Aes256GcmSiv,
    mac_key: Zeroizing<Vec<u8>>,
}

impl DaeadFunc {
    /// Creates a function from a data key
    pub fn new(key: &DataKey) -> Result<Self> {
        let cipher = Aes256GcmSiv::new_from_slice(key.cipher_key())
            .map_err(|e| PseudoError::Configuration(format!("Invalid DAEAD key: {e}")))?;
        Ok(Self {
            cipher,
            mac_key: Zeroizing::new(key.mac_key().to_vec()),
        })
    }

    fn synthetic_nonce(&self, plaintext: &[u8]) -> std::result::Result<[u8; NONCE_LEN], FuncError> {
        let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(&self.mac_key)
            .map_err(|e| FuncError::Encrypt(e.to_string()))?;
        mac.update(plaintext);
        let digest = mac.finalize().into_bytes();
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&digest[..NONCE_LEN]);
        Ok(nonce)
    }

    /// Encrypts `value` into a token
    pub fn encrypt(&self, value: &str) -> std::result::Result<String, FuncError> {
        let nonce = self.synthetic_nonce(value.as_bytes())?;
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), value.as_bytes())
            .map_err(|_| FuncError::Encrypt("aead operation failed".to_string()))?;

        let mut token = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        token.extend_from_slice(&nonce);
        token.extend_from_slice(&ciphertext);
        Ok(URL_SAFE_NO_PAD.encode(token))
    }

    /// Decrypts and authenticates a token
    pub fn decrypt(&self, token: &str) -> std::result::Result<String, FuncError> {
        let raw = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|e| FuncError::Decrypt(format!("token is not base64: {e}")))?;
        if raw.len() < NONCE_LEN + TAG_LEN {
            return Err(FuncError::Decrypt("token is too short".to_string()));
        }
        let (nonce, body) = raw.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), body)
            .map_err(|_| FuncError::Decrypt("token failed authentication".to_string()))?;

        if self.synthetic_nonce(&plaintext)?.as_slice() != nonce {
            return Err(FuncError::Decrypt("token nonce mismatch".to_string()));
        }
        String::from_utf8(plaintext)
            .map_err(|_| FuncError::Decrypt("plaintext is not UTF-8".to_string()))
    }
}

impl PseudoFunc for DaeadFunc {
    fn algorithm(&self) -> &str {
        DAEAD_ALGORITHM
    }

    fn apply(&self, value: &str) -> std::result::Result<PseudoFuncOutput, FuncError> {
        self.encrypt(value).map(PseudoFuncOutput::of)
    }

    fn restore(&self, value: &str) -> std::result::Result<PseudoFuncOutput, FuncError> {
        self.decrypt(value).map(PseudoFuncOutput::of)
    }
}
