//! Wrapped keysets supplied by callers

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A data keyset wrapped by a key-encryption-key
///
/// The JSON shape follows the encrypted keyset wrapper produced by
/// `generate-keyset`:
///
/// ```json
/// {
///   "encryptedKeyset": "base64...",
///   "keysetInfo": { "primaryKeyId": 1234567 },
///   "kekUri": "local-kek://pseudo/main"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PseudoKeyset {
    /// Base64 encoded ciphertext of the keyset JSON
    pub encrypted_keyset: String,

    /// Public information about the keyset
    pub keyset_info: KeysetInfo,

    /// URI of the key-encryption-key that wraps the keyset
    pub kek_uri: String,
}

/// Public keyset information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeysetInfo {
    /// Id of the key used for new encryptions
    pub primary_key_id: u32,
}

impl PseudoKeyset {
    /// Primary key id as a key reference string
    pub fn primary_key_id(&self) -> String {
        self.keyset_info.primary_key_id.to_string()
    }

    /// Cache signature of the keyset
    ///
    /// Two keysets with the same primary key, KEK and wrapped material share
    /// a signature. The raw `primaryKeyId|kekUri|json` string is hashed so
    /// cache keys stay small.
    pub fn signature(&self) -> String {
        let serialized = serde_json::to_string(self).unwrap_or_default();
        let raw = format!(
            "{}|{}|{}",
            self.keyset_info.primary_key_id, self.kek_uri, serialized
        );
        hex::encode(Sha256::digest(raw.as_bytes()))
    }
}
