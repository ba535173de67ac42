//! Data keys and keyset unwrapping
//!
//! A plaintext keyset is JSON:
//!
//! ```json
//! {"primaryKeyId": 1234, "keys": [{"keyId": 1234, "keyMaterial": "base64 of 64 bytes"}]}
//! ```
//!
//! The first 32 bytes of each key are the cipher key, the last 32 bytes the
//! MAC key. Callers only ever see the wrapped form ([`PseudoKeyset`]).

use super::{AeadCache, KeyWrap};
use crate::domain::{KeyAccessError, KeysetInfo, PseudoKeyset};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::HashMap;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Length of a cipher or MAC key
pub const KEY_LEN: usize = 32;

/// Key material for one key id
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DataKey {
    cipher_key: [u8; KEY_LEN],
    mac_key: [u8; KEY_LEN],
}

impl DataKey {
    /// Builds a key from raw material
    ///
    /// 64 bytes are split into cipher and MAC key. 32 bytes are used as the
    /// cipher key and the MAC key is derived from it.
    pub fn from_bytes(material: &[u8]) -> Result<Self, KeyAccessError> {
        let mut cipher_key = [0u8; KEY_LEN];
        let mut mac_key = [0u8; KEY_LEN];
        match material.len() {
            64 => {
                cipher_key.copy_from_slice(&material[..KEY_LEN]);
                mac_key.copy_from_slice(&material[KEY_LEN..]);
            }
            KEY_LEN => {
                cipher_key.copy_from_slice(material);
                let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(material)
                    .map_err(|e| KeyAccessError::InvalidKeyset(e.to_string()))?;
                mac.update(b"pseudo-service/mac-key");
                mac_key.copy_from_slice(&mac.finalize().into_bytes());
            }
            other => {
                return Err(KeyAccessError::InvalidKeyset(format!(
                    "key material must be 32 or 64 bytes, got {other}"
                )))
            }
        }
        Ok(Self {
            cipher_key,
            mac_key,
        })
    }

    /// Generates fresh random key material
    pub fn generate() -> Self {
        let mut material = Zeroizing::new([0u8; 2 * KEY_LEN]);
        rand::thread_rng().fill_bytes(&mut material[..]);
        let mut cipher_key = [0u8; KEY_LEN];
        let mut mac_key = [0u8; KEY_LEN];
        cipher_key.copy_from_slice(&material[..KEY_LEN]);
        mac_key.copy_from_slice(&material[KEY_LEN..]);
        Self {
            cipher_key,
            mac_key,
        }
    }

    /// AES-256 key
    pub fn cipher_key(&self) -> &[u8; KEY_LEN] {
        &self.cipher_key
    }

    /// HMAC-SHA256 key
    pub fn mac_key(&self) -> &[u8; KEY_LEN] {
        &self.mac_key
    }

    fn to_material(&self) -> Zeroizing<Vec<u8>> {
        let mut material = Zeroizing::new(Vec::with_capacity(2 * KEY_LEN));
        material.extend_from_slice(&self.cipher_key);
        material.extend_from_slice(&self.mac_key);
        material
    }
}

impl std::fmt::Debug for DataKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DataKey([REDACTED])")
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeysetJson {
    primary_key_id: u32,
    keys: Vec<KeyJson>,
}

#[derive(Serialize, Deserialize, Zeroize)]
#[serde(rename_all = "camelCase")]
#[zeroize(drop)]
struct KeyJson {
    key_id: u32,
    key_material: String,
}

/// Key references resolvable for one configuration
///
/// Built from the configuration's keysets plus the named secrets known to
/// the factory.
#[derive(Debug, Default)]
pub struct KeyRing {
    keys: HashMap<String, DataKey>,
    default_key_id: Option<String>,
}

impl KeyRing {
    /// Unwraps every keyset through the KEK cache
    ///
    /// # Errors
    ///
    /// Returns a [`KeyAccessError`] when a KEK is unknown or unreachable, or
    /// when a keyset does not decrypt to a valid keyset.
    pub fn unwrap_keysets(
        keysets: &[PseudoKeyset],
        aead_cache: &AeadCache,
    ) -> Result<Self, KeyAccessError> {
        let mut ring = KeyRing::default();
        for keyset in keysets {
            let aead = aead_cache.get(&keyset.kek_uri)?;
            let wrapped = STANDARD
                .decode(keyset.encrypted_keyset.as_bytes())
                .map_err(|e| KeyAccessError::InvalidKeyset(format!("invalid base64: {e}")))?;
            let plaintext = Zeroizing::new(aead.unwrap_key(&wrapped)?);
            let parsed: KeysetJson = serde_json::from_slice(&plaintext)
                .map_err(|e| KeyAccessError::InvalidKeyset(e.to_string()))?;

            if parsed.primary_key_id != keyset.keyset_info.primary_key_id {
                return Err(KeyAccessError::InvalidKeyset(format!(
                    "primary key id mismatch: wrapper says {}, keyset says {}",
                    keyset.keyset_info.primary_key_id, parsed.primary_key_id
                )));
            }

            for key in &parsed.keys {
                let material = Zeroizing::new(
                    STANDARD
                        .decode(key.key_material.as_bytes())
                        .map_err(|e| KeyAccessError::InvalidKeyset(format!("invalid key material: {e}")))?,
                );
                ring.keys
                    .insert(key.key_id.to_string(), DataKey::from_bytes(&material)?);
            }
            if !ring.keys.contains_key(&keyset.primary_key_id()) {
                return Err(KeyAccessError::InvalidKeyset(format!(
                    "primary key {} missing from keyset",
                    keyset.primary_key_id()
                )));
            }
            if ring.default_key_id.is_none() {
                ring.default_key_id = Some(keyset.primary_key_id());
            }
        }
        Ok(ring)
    }

    /// Adds named keys that keysets did not already provide
    pub fn with_named_keys(mut self, named: &HashMap<String, DataKey>) -> Self {
        for (id, key) in named {
            self.keys.entry(id.clone()).or_insert_with(|| key.clone());
        }
        self
    }

    /// Resolves a key reference
    ///
    /// `None` selects the primary key of the first keyset.
    pub fn get(&self, key_id: Option<&str>) -> Result<&DataKey, KeyAccessError> {
        let id = match key_id {
            Some(id) => id,
            None => self.default_key_id.as_deref().ok_or_else(|| {
                KeyAccessError::UnknownKeyId(
                    "no keyId given and no keyset supplied".to_string(),
                )
            })?,
        };
        self.keys
            .get(id)
            .ok_or_else(|| KeyAccessError::UnknownKeyId(id.to_string()))
    }
}

/// Wraps fresh key material into a keyset
///
/// The key id is random. The keyset JSON is encrypted with `kek`.
pub fn generate_keyset(kek: &dyn KeyWrap, kek_uri: &str) -> Result<PseudoKeyset, KeyAccessError> {
    let key = DataKey::generate();
    let key_id = rand::thread_rng().next_u32() & 0x7fff_ffff;
    let keyset = KeysetJson {
        primary_key_id: key_id,
        keys: vec![KeyJson {
            key_id,
            key_material: STANDARD.encode(key.to_material().as_slice()),
        }],
    };
    let plaintext = Zeroizing::new(
        serde_json::to_vec(&keyset).map_err(|e| KeyAccessError::InvalidKeyset(e.to_string()))?,
    );
    let wrapped = kek.wrap_key(&plaintext)?;
    Ok(PseudoKeyset {
        encrypted_keyset: STANDARD.encode(wrapped),
        keyset_info: KeysetInfo {
            primary_key_id: key_id,
        },
        kek_uri: kek_uri.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kms::LocalKekClient;
    use std::sync::Arc;
    use std::time::Duration;

    const KEK_URI: &str = "local-kek://test/main";

    fn cache() -> AeadCache {
        let client = LocalKekClient::new().with_kek(KEK_URI, [7u8; KEY_LEN]);
        AeadCache::new(Arc::new(client), 10, Duration::from_secs(60))
    }

    #[test]
    fn test_generate_and_unwrap_keyset() {
        let cache = cache();
        let aead = cache.get(KEK_URI).unwrap();
        let keyset = generate_keyset(aead.as_ref(), KEK_URI).unwrap();

        let ring = KeyRing::unwrap_keysets(&[keyset.clone()], &cache).unwrap();
        assert!(ring.get(Some(&keyset.primary_key_id())).is_ok());
        assert!(ring.get(None).is_ok());
        assert!(matches!(
            ring.get(Some("does-not-exist")),
            Err(KeyAccessError::UnknownKeyId(_))
        ));
    }

    #[test]
    fn test_unwrap_with_unknown_kek_fails() {
        let cache = cache();
        let aead = cache.get(KEK_URI).unwrap();
        let mut keyset = generate_keyset(aead.as_ref(), KEK_URI).unwrap();
        keyset.kek_uri = "local-kek://test/other".to_string();

        let err = KeyRing::unwrap_keysets(&[keyset], &cache).unwrap_err();
        assert!(matches!(err, KeyAccessError::UnknownKek(_)));
    }

    #[test]
    fn test_tampered_keyset_fails() {
        let cache = cache();
        let aead = cache.get(KEK_URI).unwrap();
        let mut keyset = generate_keyset(aead.as_ref(), KEK_URI).unwrap();
        keyset.keyset_info.primary_key_id ^= 1;

        assert!(KeyRing::unwrap_keysets(&[keyset], &cache).is_err());
    }

    #[test]
    fn test_named_keys_do_not_shadow_keysets() {
        let mut named = HashMap::new();
        named.insert("legacy".to_string(), DataKey::from_bytes(&[1u8; 32]).unwrap());
        let ring = KeyRing::default().with_named_keys(&named);
        assert!(ring.get(Some("legacy")).is_ok());
        assert!(ring.get(None).is_err());
    }

    #[test]
    fn test_data_key_lengths() {
        assert!(DataKey::from_bytes(&[0u8; 64]).is_ok());
        assert!(DataKey::from_bytes(&[0u8; 32]).is_ok());
        assert!(DataKey::from_bytes(&[0u8; 16]).is_err());
        assert_eq!(format!("{:?}", DataKey::generate()), "DataKey([REDACTED])");
    }
}
