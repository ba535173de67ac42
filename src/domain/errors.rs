//! Domain error types
//!
//! This module defines the error hierarchy for the pseudonymization engine.
//! Errors are domain-specific and don't expose third-party cipher types.

use thiserror::Error;

/// Main pseudonymization error type
///
/// Configuration and key-access errors are raised before any value is
/// processed. Transform errors carry the field path and offending value.
#[derive(Debug, Error)]
pub enum PseudoError {
    /// Malformed rule pattern, unknown function, bad arguments or config file
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Key-encryption-key or keyset could not be resolved
    #[error("Key access error: {0}")]
    KeyAccess(#[from] KeyAccessError),

    /// A single value failed inside a function
    #[error("{direction} error - field='{path}', originalValue='{value}', func='{func}': {source}")]
    Transform {
        direction: &'static str,
        path: String,
        value: String,
        func: String,
        #[source]
        source: FuncError,
    },

    /// Function failure outside of a field context (e.g. SID lookups)
    #[error("Function error: {0}")]
    Func(#[from] FuncError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),
}

/// Coarse classification used by transports to pick a response code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller supplied something unusable
    BadRequest,
    /// An external capability is temporarily unavailable
    Unavailable,
    /// Anything else
    Internal,
}

impl PseudoError {
    /// Classify the error for transport mapping
    pub fn kind(&self) -> ErrorKind {
        match self {
            PseudoError::Configuration(_) | PseudoError::Validation(_) => ErrorKind::BadRequest,
            PseudoError::KeyAccess(KeyAccessError::Unreachable(_)) => ErrorKind::Unavailable,
            PseudoError::KeyAccess(_) => ErrorKind::BadRequest,
            PseudoError::Transform { source, .. } | PseudoError::Func(source) => source.kind(),
            PseudoError::Serialization(_) => ErrorKind::BadRequest,
            PseudoError::Io(_) => ErrorKind::Internal,
        }
    }
}

/// Errors raised by individual pseudo functions
#[derive(Debug, Error)]
pub enum FuncError {
    /// The value cannot be handled by the function
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Encryption failed
    #[error("Encryption failed: {0}")]
    Encrypt(String),

    /// Decryption or authentication failed
    #[error("Decryption failed: {0}")]
    Decrypt(String),

    /// A stateful function was applied before `init` for the value
    #[error("Function '{func}' was not initialized for the value")]
    NotInitialized { func: String },

    /// The SID index has no snapshot loaded
    #[error("SID index unavailable: {0}")]
    SidUnavailable(String),
}

impl FuncError {
    fn kind(&self) -> ErrorKind {
        match self {
            FuncError::SidUnavailable(_) => ErrorKind::Unavailable,
            FuncError::InvalidInput(_) => ErrorKind::BadRequest,
            _ => ErrorKind::Internal,
        }
    }
}

/// Key access errors
///
/// Raised by the key-encryption-key client and the keyset unwrapping path.
#[derive(Debug, Error)]
pub enum KeyAccessError {
    /// No KEK is registered under the URI
    #[error("Unknown key encryption key: {0}")]
    UnknownKek(String),

    /// The key service could not be reached
    #[error("Key service unreachable: {0}")]
    Unreachable(String),

    /// The wrapped keyset could not be decrypted or parsed
    #[error("Invalid keyset: {0}")]
    InvalidKeyset(String),

    /// The key id is not part of any keyset or named secret
    #[error("Unknown key id: {0}")]
    UnknownKeyId(String),
}

// Conversion from std::io::Error
impl From<std::io::Error> for PseudoError {
    fn from(err: std::io::Error) -> Self {
        PseudoError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for PseudoError {
    fn from(err: serde_json::Error) -> Self {
        PseudoError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for PseudoError {
    fn from(err: toml::de::Error) -> Self {
        PseudoError::Configuration(format!("TOML parse error: {err}"))
    }
}
