//! Secure handling of configured key material
//!
//! Key material in `pseudo.toml` is held in a `secrecy` wrapper so it is
//! zeroed on drop and redacted in debug output. Material is base64 encoded
//! in the file and only decoded when the service is built.
//!
//! # Example
//!
//! ```rust
//! use pseudo_service::config::{decode_key_material, secret_string};
//!
//! let material = secret_string("AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8=".to_string());
//! let bytes = decode_key_material(&material).unwrap();
//! assert_eq!(bytes.len(), 32);
//! println!("{:?}", material); // Prints: Secret([REDACTED ...])
//! ```

use base64::{engine::general_purpose::STANDARD, Engine as _};
use secrecy::{CloneableSecret, DebugSecret, ExposeSecret, Secret, SerializableSecret};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::{Zeroize, Zeroizing};

/// Newtype wrapper for String that implements the required traits for Secret
#[derive(Clone, Debug, Zeroize)]
#[zeroize(drop)]
pub struct SecretValue(String);

impl CloneableSecret for SecretValue {}
impl DebugSecret for SecretValue {}
impl SerializableSecret for SecretValue {}

impl From<String> for SecretValue {
    fn from(s: String) -> Self {
        SecretValue(s)
    }
}

impl AsRef<str> for SecretValue {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl SecretValue {
    /// Check if the secret value is empty
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl Serialize for SecretValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SecretValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(SecretValue)
    }
}

/// Type alias for a secret string
pub type SecretString = Secret<SecretValue>;

/// Helper function to create a SecretString from a String
#[inline]
pub fn secret_string(value: String) -> SecretString {
    Secret::new(SecretValue::from(value))
}

/// Decodes base64 key material
///
/// # Errors
///
/// Returns a message when the material is empty or not valid base64. The
/// message never contains the material itself.
pub fn decode_key_material(material: &SecretString) -> Result<Zeroizing<Vec<u8>>, String> {
    let encoded = material.expose_secret();
    if encoded.is_empty() {
        return Err("key material is empty".to_string());
    }
    STANDARD
        .decode(encoded.as_ref().trim())
        .map(Zeroizing::new)
        .map_err(|e| format!("key material is not valid base64: {e}"))
}
