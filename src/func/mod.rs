//! Pseudo functions
//!
//! Every function implements [`PseudoFunc`]. The engine only relies on this
//! trait; the implementations in this module are the reference ciphers:
//!
//! - [`fpe::FpeFunc`] - FF1 format-preserving encryption (`fpe`, `ff31`)
//! - [`daead::DaeadFunc`] - deterministic AES-GCM-SIV (`daead`)
//! - [`sid::MapSidFunc`] - stable identifier mapping (`map-sid*`)
//! - [`redact::RedactFunc`] - placeholder replacement (`redact`)

pub mod daead;
pub mod declaration;
pub mod fpe;
pub mod redact;
pub mod sid;

use crate::domain::FuncError;
use std::collections::BTreeMap;
use std::fmt;

pub use declaration::{FuncName, MapFailureStrategy, PseudoFuncDeclaration, MIN_VALUE_LENGTH};

/// Metadata key carrying the SID snapshot a value was mapped with
pub const METADATA_SNAPSHOT_DATE: &str = "snapshotDate";
/// Metadata key present when no SID mapping exists for a value
pub const METADATA_MAP_FAILURE: &str = "mapFailure";

/// Direction of a transformation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransformDirection {
    /// Pseudonymize
    Apply,
    /// Depseudonymize
    Restore,
}

impl TransformDirection {
    /// Operation label used in errors and logs
    pub fn label(&self) -> &'static str {
        match self {
            TransformDirection::Apply => "pseudonymize",
            TransformDirection::Restore => "depseudonymize",
        }
    }
}

impl fmt::Display for TransformDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of a single `apply` or `restore`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PseudoFuncOutput {
    /// Transformed value, `None` when the function suppresses it
    pub value: Option<String>,
    /// Warnings for the session log
    pub warnings: Vec<String>,
    /// Side channel, see [`METADATA_SNAPSHOT_DATE`] and [`METADATA_MAP_FAILURE`]
    pub metadata: BTreeMap<String, String>,
}

impl PseudoFuncOutput {
    /// Output carrying a value and nothing else
    pub fn of(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            ..Default::default()
        }
    }

    /// Adds a warning
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    /// Adds a metadata entry
    pub fn with_metadata(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// The SID snapshot reported by the function
    pub fn snapshot_date(&self) -> Option<&str> {
        self.metadata.get(METADATA_SNAPSHOT_DATE).map(String::as_str)
    }

    /// Whether the function reported a failed SID mapping
    pub fn map_failed(&self) -> bool {
        self.metadata.contains_key(METADATA_MAP_FAILURE)
    }
}

/// A configured cryptographic function
pub trait PseudoFunc: Send + Sync {
    /// Algorithm name reported in provenance metadata
    fn algorithm(&self) -> &str;

    /// Forward transformation
    fn apply(&self, value: &str) -> Result<PseudoFuncOutput, FuncError>;

    /// Reverse transformation
    fn restore(&self, value: &str) -> Result<PseudoFuncOutput, FuncError>;

    /// Prepares per-value state before `apply` or `restore`
    ///
    /// Stateless functions need no preparation.
    fn init(&self, _value: &str, _direction: TransformDirection) -> Result<(), FuncError> {
        Ok(())
    }

    /// Whether the function requires `init` and must not be shared across sessions
    fn is_stateful(&self) -> bool {
        false
    }
}

impl fmt::Debug for dyn PseudoFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PseudoFunc")
            .field("algorithm", &self.algorithm())
            .field("stateful", &self.is_stateful())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_builders() {
        let out = PseudoFuncOutput::of("abc")
            .with_warning("careful")
            .with_metadata(METADATA_SNAPSHOT_DATE, "2024-01-01");
        assert_eq!(out.value.as_deref(), Some("abc"));
        assert_eq!(out.warnings, vec!["careful".to_string()]);
        assert_eq!(out.snapshot_date(), Some("2024-01-01"));
        assert!(!out.map_failed());
    }

    #[test]
    fn test_direction_labels() {
        assert_eq!(TransformDirection::Apply.to_string(), "pseudonymize");
        assert_eq!(TransformDirection::Restore.label(), "depseudonymize");
    }
}
