//! Configuration schema types

use crate::config::secret::decode_key_material;
use crate::config::SecretString;
use crate::core::factory::DEFAULT_PSEUDO_FUNCS_MAX_ENTRIES;
use crate::kms::{DEFAULT_AEAD_MAX_ENTRIES, DEFAULT_AEAD_TTL_SECS, KEY_LEN, LOCAL_KEK_SCHEME};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

/// Main pseudo service configuration
///
/// This is the root configuration structure that maps to the TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PseudoServiceConfig {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Cache bounds
    #[serde(default)]
    pub cache: CacheConfig,

    /// Named key material resolvable as `keyId=<id>`
    #[serde(default)]
    pub secrets: Vec<SecretKeyConfig>,

    /// Key encryption keys served locally
    #[serde(default)]
    pub keks: Vec<KekConfig>,

    /// SID index (required by `map-sid*` functions)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<SidConfig>,
}

impl PseudoServiceConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<(), String> {
        self.application.validate()?;
        self.logging.validate()?;
        self.cache.validate()?;

        let mut ids = HashSet::new();
        for secret in &self.secrets {
            secret.validate()?;
            if !ids.insert(secret.id.as_str()) {
                return Err(format!("Duplicate secret id '{}'", secret.id));
            }
        }

        let mut uris = HashSet::new();
        for kek in &self.keks {
            kek.validate()?;
            if !uris.insert(kek.uri.as_str()) {
                return Err(format!("Duplicate KEK uri '{}'", kek.uri));
            }
        }

        if let Some(ref sid) = self.sid {
            sid.validate()?;
        }
        Ok(())
    }
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl ApplicationConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable local file logging
    #[serde(default)]
    pub local_enabled: bool,

    /// Local log file path
    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// Log rotation schedule (daily, hourly or never)
    #[serde(default = "default_local_rotation")]
    pub local_rotation: String,
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }

        if self.local_enabled && self.local_path.trim().is_empty() {
            return Err("logging.local_path cannot be empty when local logging is enabled".to_string());
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: false,
            local_path: default_local_path(),
            local_rotation: default_local_rotation(),
        }
    }
}

/// Cache bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of cached function sets
    #[serde(default = "default_pseudo_funcs_max_entries")]
    pub pseudo_funcs_max_entries: usize,

    /// Maximum number of cached KEK primitives
    #[serde(default = "default_aead_max_entries")]
    pub aead_max_entries: usize,

    /// Lifetime of a cached KEK primitive
    #[serde(default = "default_aead_ttl_seconds")]
    pub aead_ttl_seconds: u64,
}

impl CacheConfig {
    fn validate(&self) -> Result<(), String> {
        if self.pseudo_funcs_max_entries == 0 {
            return Err("cache.pseudo_funcs_max_entries must be > 0".to_string());
        }
        if self.aead_max_entries == 0 {
            return Err("cache.aead_max_entries must be > 0".to_string());
        }
        if self.aead_ttl_seconds == 0 {
            return Err("cache.aead_ttl_seconds must be > 0".to_string());
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            pseudo_funcs_max_entries: default_pseudo_funcs_max_entries(),
            aead_max_entries: default_aead_max_entries(),
            aead_ttl_seconds: default_aead_ttl_seconds(),
        }
    }
}

/// Named key material
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretKeyConfig {
    /// Key reference used in `keyId` arguments
    pub id: String,

    /// Base64 key material, 32 or 64 bytes
    pub material: SecretString,
}

impl SecretKeyConfig {
    fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("secrets.id cannot be empty".to_string());
        }
        let material =
            decode_key_material(&self.material).map_err(|e| format!("Secret '{}': {e}", self.id))?;
        if material.len() != KEY_LEN && material.len() != 2 * KEY_LEN {
            return Err(format!(
                "Secret '{}' must be {KEY_LEN} or {} bytes, got {}",
                self.id,
                2 * KEY_LEN,
                material.len()
            ));
        }
        Ok(())
    }
}

/// Key encryption key served by the local KEK client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KekConfig {
    /// KEK URI, e.g. `local-kek://pseudo/main`
    pub uri: String,

    /// Base64 key material, 32 bytes
    pub material: SecretString,
}

impl KekConfig {
    fn validate(&self) -> Result<(), String> {
        let parsed = url::Url::parse(&self.uri)
            .map_err(|e| format!("Invalid KEK uri '{}': {e}", self.uri))?;
        if parsed.scheme() != LOCAL_KEK_SCHEME {
            return Err(format!(
                "KEK uri '{}' must use the {LOCAL_KEK_SCHEME}:// scheme",
                self.uri
            ));
        }
        let material =
            decode_key_material(&self.material).map_err(|e| format!("KEK '{}': {e}", self.uri))?;
        if material.len() != KEY_LEN {
            return Err(format!(
                "KEK '{}' must be {KEY_LEN} bytes, got {}",
                self.uri,
                material.len()
            ));
        }
        Ok(())
    }
}

/// SID index configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SidConfig {
    /// JSON index file
    #[serde(default)]
    pub index_path: Option<PathBuf>,
}

impl SidConfig {
    fn validate(&self) -> Result<(), String> {
        if let Some(ref path) = self.index_path {
            if path.as_os_str().is_empty() {
                return Err("sid.index_path cannot be empty".to_string());
            }
        }
        Ok(())
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_local_path() -> String {
    "./logs".to_string()
}

fn default_local_rotation() -> String {
    "daily".to_string()
}

fn default_pseudo_funcs_max_entries() -> usize {
    DEFAULT_PSEUDO_FUNCS_MAX_ENTRIES
}

fn default_aead_max_entries() -> usize {
    DEFAULT_AEAD_MAX_ENTRIES
}

fn default_aead_ttl_seconds() -> u64 {
    DEFAULT_AEAD_TTL_SECS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::secret_string;
    use base64::{engine::general_purpose::STANDARD, Engine as _};

    fn kek(uri: &str, len: usize) -> KekConfig {
        KekConfig {
            uri: uri.to_string(),
            material: secret_string(STANDARD.encode(vec![1u8; len])),
        }
    }

    #[test]
    fn test_application_config_validation() {
        let mut config = ApplicationConfig::default();
        assert!(config.validate().is_ok());

        config.log_level = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_values() {
        let config = PseudoServiceConfig::default();
        assert_eq!(config.application.log_level, "info");
        assert_eq!(config.cache.pseudo_funcs_max_entries, 1000);
        assert_eq!(config.cache.aead_max_entries, 2000);
        assert_eq!(config.cache.aead_ttl_seconds, 120);
        assert!(!config.logging.local_enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cache_config_validation() {
        let mut config = CacheConfig::default();
        config.aead_ttl_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_logging_config_validation() {
        let mut config = LoggingConfig::default();
        config.local_rotation = "size".to_string();
        assert!(config.validate().is_err());
        config.local_rotation = "hourly".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_kek_validation() {
        assert!(kek("local-kek://pseudo/main", KEY_LEN).validate().is_ok());
        assert!(kek("local-kek://pseudo/main", 16).validate().is_err());
        assert!(kek("gcp-kms://projects/p/keys/k", KEY_LEN).validate().is_err());
        assert!(kek("not a uri", KEY_LEN).validate().is_err());
    }

    #[test]
    fn test_secret_validation() {
        let secret = |id: &str, len: usize| SecretKeyConfig {
            id: id.to_string(),
            material: secret_string(STANDARD.encode(vec![2u8; len])),
        };
        assert!(secret("legacy", 32).validate().is_ok());
        assert!(secret("legacy", 64).validate().is_ok());
        assert!(secret("legacy", 48).validate().is_err());
        assert!(secret(" ", 32).validate().is_err());
    }

    #[test]
    fn test_duplicate_kek_uri() {
        let config = PseudoServiceConfig {
            keks: vec![
                kek("local-kek://pseudo/main", KEY_LEN),
                kek("local-kek://pseudo/main", KEY_LEN),
            ],
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().contains("Duplicate"));
    }
}
