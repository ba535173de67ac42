//! Parsing of function declaration strings
//!
//! Grammar: `name` or `name(key=value, key=value, ...)`. Whitespace around
//! tokens is ignored and argument order is preserved.

use crate::domain::{PseudoError, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Argument holding the key reference
pub const ARG_KEY_ID: &str = "keyId";
/// Argument holding the short-value failure strategy
pub const ARG_FAILURE_STRATEGY: &str = "failureStrategy";
/// Argument holding the requested SID snapshot date
pub const ARG_SNAPSHOT_DATE: &str = "snapshotDate";
/// Argument selecting the FPE alphabet
pub const ARG_ALPHABET: &str = "alphabet";
/// Argument holding the redaction placeholder
pub const ARG_PLACEHOLDER: &str = "placeholder";

/// Known function kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FuncName {
    /// Format-preserving encryption (FF1)
    Fpe,
    /// Format-preserving encryption, tink compatible naming
    Ff31,
    /// Deterministic authenticated encryption
    Daead,
    /// SID mapping followed by FPE
    MapSid,
    /// SID mapping followed by FF31
    MapSidFf31,
    /// SID mapping followed by DAEAD
    MapSidDaead,
    /// Replace with a placeholder
    Redact,
}

impl FuncName {
    /// Declaration name of the function
    pub fn as_str(&self) -> &'static str {
        match self {
            FuncName::Fpe => "fpe",
            FuncName::Ff31 => "ff31",
            FuncName::Daead => "daead",
            FuncName::MapSid => "map-sid",
            FuncName::MapSidFf31 => "map-sid-ff31",
            FuncName::MapSidDaead => "map-sid-daead",
            FuncName::Redact => "redact",
        }
    }

    /// Whether instances hold per-session state and must never be cached
    pub fn is_stateful(&self) -> bool {
        self.is_sid_mapping()
    }

    /// Whether the function maps identifiers through the SID index
    ///
    /// SID mappings are multi-stage, so null values are not counted for them.
    pub fn is_sid_mapping(&self) -> bool {
        matches!(
            self,
            FuncName::MapSid | FuncName::MapSidFf31 | FuncName::MapSidDaead
        )
    }

    /// Whether values shorter than [`MIN_VALUE_LENGTH`] bypass the function
    pub fn is_short_value_limited(&self) -> bool {
        matches!(
            self,
            FuncName::Fpe | FuncName::Ff31 | FuncName::MapSid | FuncName::MapSidFf31
        )
    }
}

/// Minimum value length for format-preserving and SID functions
pub const MIN_VALUE_LENGTH: usize = 4;

impl FromStr for FuncName {
    type Err = PseudoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fpe" => Ok(FuncName::Fpe),
            "ff31" => Ok(FuncName::Ff31),
            "daead" => Ok(FuncName::Daead),
            "map-sid" => Ok(FuncName::MapSid),
            "map-sid-ff31" => Ok(FuncName::MapSidFf31),
            "map-sid-daead" => Ok(FuncName::MapSidDaead),
            "redact" => Ok(FuncName::Redact),
            other => Err(PseudoError::Configuration(format!(
                "Unknown pseudo function '{other}'"
            ))),
        }
    }
}

impl fmt::Display for FuncName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do with values too short for the function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MapFailureStrategy {
    /// Pass the value through unchanged
    #[default]
    ReturnOriginal,
    /// Replace the value with null
    Suppress,
}

impl FromStr for MapFailureStrategy {
    type Err = PseudoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "RETURN_ORIGINAL" => Ok(MapFailureStrategy::ReturnOriginal),
            "SUPPRESS" => Ok(MapFailureStrategy::Suppress),
            other => Err(PseudoError::Configuration(format!(
                "Invalid {ARG_FAILURE_STRATEGY} '{other}'. Must be one of: RETURN_ORIGINAL, SUPPRESS"
            ))),
        }
    }
}

/// Parsed function declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PseudoFuncDeclaration {
    name: FuncName,
    args: Vec<(String, String)>,
    raw: String,
}

impl PseudoFuncDeclaration {
    /// Parses a declaration string
    ///
    /// # Errors
    ///
    /// Returns a configuration error for unknown functions, unbalanced
    /// parentheses, arguments without `=` and duplicate keys.
    pub fn parse(declaration: &str) -> Result<Self> {
        let raw = declaration.trim();
        let (name_part, args_part) = match raw.find('(') {
            Some(open) => {
                if !raw.ends_with(')') {
                    return Err(PseudoError::Configuration(format!(
                        "Malformed function declaration '{raw}': missing closing parenthesis"
                    )));
                }
                (&raw[..open], Some(&raw[open + 1..raw.len() - 1]))
            }
            None => {
                if raw.contains(')') {
                    return Err(PseudoError::Configuration(format!(
                        "Malformed function declaration '{raw}': unexpected ')'"
                    )));
                }
                (raw, None)
            }
        };

        let name: FuncName = name_part.parse()?;
        let mut args: Vec<(String, String)> = Vec::new();

        if let Some(args_part) = args_part.filter(|a| !a.trim().is_empty()) {
            for pair in args_part.split(',') {
                let (key, value) = pair.split_once('=').ok_or_else(|| {
                    PseudoError::Configuration(format!(
                        "Malformed argument '{}' in function declaration '{raw}'",
                        pair.trim()
                    ))
                })?;
                let key = key.trim();
                if key.is_empty() || key.contains('(') || key.contains(')') {
                    return Err(PseudoError::Configuration(format!(
                        "Malformed argument '{}' in function declaration '{raw}'",
                        pair.trim()
                    )));
                }
                if args.iter().any(|(k, _)| k == key) {
                    return Err(PseudoError::Configuration(format!(
                        "Duplicate argument '{key}' in function declaration '{raw}'"
                    )));
                }
                args.push((key.to_string(), value.trim().to_string()));
            }
        }

        let declaration = Self {
            name,
            args,
            raw: raw.to_string(),
        };
        // Validate eagerly so broken declarations fail before values are processed
        declaration.failure_strategy()?;
        declaration.snapshot_date()?;
        Ok(declaration)
    }

    /// The function kind
    pub fn name(&self) -> FuncName {
        self.name
    }

    /// The declaration string as written in the rule
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Looks up an argument
    pub fn arg(&self, key: &str) -> Option<&str> {
        self.args
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All arguments in declaration order
    pub fn args(&self) -> &[(String, String)] {
        &self.args
    }

    /// Arguments as a sorted map, used for provenance metadata
    pub fn args_map(&self) -> BTreeMap<String, String> {
        self.args.iter().cloned().collect()
    }

    /// The referenced key id, if any
    pub fn key_id(&self) -> Option<&str> {
        self.arg(ARG_KEY_ID)
    }

    /// Failure strategy for short values, defaulting to `RETURN_ORIGINAL`
    pub fn failure_strategy(&self) -> Result<MapFailureStrategy> {
        match self.arg(ARG_FAILURE_STRATEGY) {
            Some(value) => value.parse(),
            None => Ok(MapFailureStrategy::default()),
        }
    }

    /// Requested SID snapshot date
    pub fn snapshot_date(&self) -> Result<Option<chrono::NaiveDate>> {
        self.arg(ARG_SNAPSHOT_DATE)
            .map(|value| {
                chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|e| {
                    PseudoError::Configuration(format!(
                        "Invalid {ARG_SNAPSHOT_DATE} '{value}' in '{}': {e}",
                        self.raw
                    ))
                })
            })
            .transpose()
    }
}

impl FromStr for PseudoFuncDeclaration {
    type Err = PseudoError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for PseudoFuncDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
