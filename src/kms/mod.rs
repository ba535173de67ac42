//! Key access
//!
//! Keysets arrive wrapped by a key-encryption-key (KEK). A [`KekClient`]
//! resolves a KEK URI to a [`KeyWrap`] primitive and [`AeadCache`] keeps the
//! resolved primitives for a short time so that concurrent sessions share one
//! round trip to the key service.
//!
//! [`LocalKekClient`] serves KEKs from configuration (`local-kek://` URIs).

pub mod keyring;

use crate::core::cache::BoundedCache;
use crate::domain::KeyAccessError;
use aes_gcm_siv::{
    aead::{Aead, KeyInit, OsRng},
    Aes256GcmSiv, Nonce,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use zeroize::Zeroizing;

pub use keyring::{generate_keyset, DataKey, KeyRing, KEY_LEN};

/// Default maximum number of cached KEK primitives
pub const DEFAULT_AEAD_MAX_ENTRIES: usize = 2000;

/// Default lifetime of a cached KEK primitive
pub const DEFAULT_AEAD_TTL_SECS: u64 = 120;

/// URI scheme served by [`LocalKekClient`]
pub const LOCAL_KEK_SCHEME: &str = "local-kek";

const NONCE_LEN: usize = 12;

/// Wraps and unwraps key material with a KEK
pub trait KeyWrap: Send + Sync {
    /// Encrypts key material
    fn wrap_key(&self, plaintext: &[u8]) -> Result<Vec<u8>, KeyAccessError>;

    /// Decrypts key material
    fn unwrap_key(&self, ciphertext: &[u8]) -> Result<Vec<u8>, KeyAccessError>;
}

/// Resolves KEK URIs to wrap primitives
pub trait KekClient: Send + Sync {
    /// Returns the primitive for `kek_uri`
    ///
    /// # Errors
    ///
    /// [`KeyAccessError::UnknownKek`] when the URI is not known and
    /// [`KeyAccessError::Unreachable`] when the key service fails.
    fn get_aead(&self, kek_uri: &str) -> Result<Arc<dyn KeyWrap>, KeyAccessError>;
}

/// AES-256-GCM-SIV KEK held in memory
pub struct LocalKek {
    cipher: Aes256GcmSiv,
}

impl LocalKek {
    /// Creates a KEK from 32 bytes of key material
    pub fn new(material: &[u8]) -> Result<Self, KeyAccessError> {
        let cipher = Aes256GcmSiv::new_from_slice(material).map_err(|_| {
            KeyAccessError::InvalidKeyset(format!(
                "KEK material must be {KEY_LEN} bytes, got {}",
                material.len()
            ))
        })?;
        Ok(Self { cipher })
    }
}

impl KeyWrap for LocalKek {
    fn wrap_key(&self, plaintext: &[u8]) -> Result<Vec<u8>, KeyAccessError> {
        use aes_gcm_siv::aead::rand_core::RngCore;
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| KeyAccessError::InvalidKeyset("key wrap failed".to_string()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    fn unwrap_key(&self, ciphertext: &[u8]) -> Result<Vec<u8>, KeyAccessError> {
        if ciphertext.len() <= NONCE_LEN {
            return Err(KeyAccessError::InvalidKeyset(
                "wrapped keyset is too short".to_string(),
            ));
        }
        let (nonce, body) = ciphertext.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), body)
            .map_err(|_| {
                KeyAccessError::InvalidKeyset(
                    "keyset could not be decrypted with the KEK".to_string(),
                )
            })
    }
}

/// KEK client backed by configured key material
#[derive(Default)]
pub struct LocalKekClient {
    keks: HashMap<String, Zeroizing<Vec<u8>>>,
}

impl LocalKekClient {
    /// Creates an empty client
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers KEK material under a URI
    pub fn with_kek(mut self, uri: impl Into<String>, material: impl AsRef<[u8]>) -> Self {
        self.keks
            .insert(uri.into(), Zeroizing::new(material.as_ref().to_vec()));
        self
    }

    /// Registered URIs
    pub fn uris(&self) -> impl Iterator<Item = &str> {
        self.keks.keys().map(String::as_str)
    }
}

impl KekClient for LocalKekClient {
    fn get_aead(&self, kek_uri: &str) -> Result<Arc<dyn KeyWrap>, KeyAccessError> {
        let material = self
            .keks
            .get(kek_uri)
            .ok_or_else(|| KeyAccessError::UnknownKek(kek_uri.to_string()))?;
        Ok(Arc::new(LocalKek::new(material)?))
    }
}

/// Bounded, expiring cache of KEK primitives
pub struct AeadCache {
    client: Arc<dyn KekClient>,
    cache: BoundedCache<String, Arc<dyn KeyWrap>>,
    lookups: AtomicUsize,
}

impl AeadCache {
    /// Creates a cache in front of `client`
    pub fn new(client: Arc<dyn KekClient>, max_entries: usize, ttl: Duration) -> Self {
        Self {
            client,
            cache: BoundedCache::with_ttl(max_entries, ttl),
            lookups: AtomicUsize::new(0),
        }
    }

    /// Creates a cache with the default bounds
    pub fn with_defaults(client: Arc<dyn KekClient>) -> Self {
        Self::new(
            client,
            DEFAULT_AEAD_MAX_ENTRIES,
            Duration::from_secs(DEFAULT_AEAD_TTL_SECS),
        )
    }

    /// Returns the primitive for `kek_uri`, asking the client at most once
    /// per live entry
    pub fn get(&self, kek_uri: &str) -> Result<Arc<dyn KeyWrap>, KeyAccessError> {
        self.cache.get_or_try_insert_with(kek_uri.to_string(), || {
            self.lookups.fetch_add(1, Ordering::Relaxed);
            debug!(kek_uri = %kek_uri, "Resolving key encryption key");
            self.client.get_aead(kek_uri)
        })
    }

    /// Number of times the client was asked for a primitive
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URI: &str = "local-kek://test/main";

    #[test]
    fn test_wrap_roundtrip() {
        let kek = LocalKek::new(&[3u8; KEY_LEN]).unwrap();
        let wrapped = kek.wrap_key(b"secret keyset").unwrap();
        assert_ne!(&wrapped[NONCE_LEN..], b"secret keyset");
        assert_eq!(kek.unwrap_key(&wrapped).unwrap(), b"secret keyset");
    }

    #[test]
    fn test_unwrap_with_wrong_kek_fails() {
        let wrapped = LocalKek::new(&[3u8; KEY_LEN])
            .unwrap()
            .wrap_key(b"secret keyset")
            .unwrap();
        let other = LocalKek::new(&[4u8; KEY_LEN]).unwrap();
        assert!(matches!(
            other.unwrap_key(&wrapped),
            Err(KeyAccessError::InvalidKeyset(_))
        ));
    }

    #[test]
    fn test_invalid_kek_length() {
        assert!(LocalKek::new(&[0u8; 16]).is_err());
    }

    #[test]
    fn test_unknown_kek_uri() {
        let client = LocalKekClient::new().with_kek(URI, [1u8; KEY_LEN]);
        assert!(matches!(
            client.get_aead("local-kek://test/unknown"),
            Err(KeyAccessError::UnknownKek(_))
        ));
        assert_eq!(client.uris().collect::<Vec<_>>(), vec![URI]);
    }

    #[test]
    fn test_cache_resolves_once() {
        let client = Arc::new(LocalKekClient::new().with_kek(URI, [1u8; KEY_LEN]));
        let cache = AeadCache::with_defaults(client);
        let first = cache.get(URI).unwrap();
        let second = cache.get(URI).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.lookups(), 1);
    }

    #[test]
    fn test_cache_does_not_keep_failures() {
        let client = Arc::new(LocalKekClient::new());
        let cache = AeadCache::with_defaults(client);
        assert!(cache.get(URI).is_err());
        assert!(cache.get(URI).is_err());
        assert_eq!(cache.lookups(), 2);
    }
}
