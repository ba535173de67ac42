//! Configuration management for the pseudo service.
//!
//! # Overview
//!
//! The service uses a TOML configuration file with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `PSEUDO_*` environment overrides
//! - Default values for optional settings
//! - Validation on load
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use pseudo_service::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("pseudo.toml")?;
//! println!("Log level: {}", config.application.log_level);
//! println!("KEKs: {}", config.keks.len());
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Application settings (log level)
//! - [`LoggingConfig`] - Local file logging
//! - [`CacheConfig`] - Function set and KEK cache bounds
//! - [`SecretKeyConfig`] - Named key material
//! - [`KekConfig`] - Key encryption keys
//! - [`SidConfig`] - SID index location
//!
//! # Example Configuration
//!
//! ```toml
//! [application]
//! log_level = "info"
//!
//! [cache]
//! pseudo_funcs_max_entries = 1000
//! aead_max_entries = 2000
//! aead_ttl_seconds = 120
//!
//! [[keks]]
//! uri = "local-kek://pseudo/main"
//! material = "${PSEUDO_KEK_MATERIAL}"
//!
//! [[secrets]]
//! id = "ssb-common-key-1"
//! material = "${PSEUDO_SECRET_COMMON_KEY_1}"
//!
//! [sid]
//! index_path = "./sid-index.json"
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

pub use loader::load_config;
pub use schema::{
    ApplicationConfig, CacheConfig, KekConfig, LoggingConfig, PseudoServiceConfig,
    SecretKeyConfig, SidConfig,
};
pub use secret::{decode_key_material, secret_string, SecretString, SecretValue};
