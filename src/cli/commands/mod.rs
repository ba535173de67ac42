//! CLI command implementations
//!
//! Commands read JSON requests from files and write JSON responses to a file
//! or stdout. Processing runs on the blocking thread pool.

pub mod field;
pub mod init;
pub mod keyset;
pub mod records;
pub mod sid;
pub mod validate;

use crate::config::{load_config, PseudoServiceConfig};
use crate::core::service::PseudoService;
use crate::domain::{ErrorKind, PseudoError};
use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::Path;

/// Exit code for configuration errors
pub const EXIT_CONFIG: i32 = 2;
/// Exit code for rejected requests
pub const EXIT_BAD_REQUEST: i32 = 3;
/// Exit code for unavailable capabilities
pub const EXIT_UNAVAILABLE: i32 = 4;
/// Exit code for anything else
pub const EXIT_FATAL: i32 = 5;

/// Maps an engine error to a process exit code
pub fn exit_code(error: &PseudoError) -> i32 {
    match error {
        PseudoError::Configuration(_) => EXIT_CONFIG,
        other => match other.kind() {
            ErrorKind::BadRequest => EXIT_BAD_REQUEST,
            ErrorKind::Unavailable => EXIT_UNAVAILABLE,
            ErrorKind::Internal => EXIT_FATAL,
        },
    }
}

/// Loads configuration and builds the service, printing the failure
///
/// Returns the exit code on failure.
pub(crate) fn load_service(config_path: &str) -> std::result::Result<PseudoService, i32> {
    let config = load_checked_config(config_path)?;
    build_service(&config)
}

/// Loads configuration, printing the failure
pub(crate) fn load_checked_config(
    config_path: &str,
) -> std::result::Result<PseudoServiceConfig, i32> {
    load_config(config_path).map_err(|e| {
        eprintln!("❌ Failed to load configuration: {e}");
        EXIT_CONFIG
    })
}

/// Builds the service, printing the failure
pub(crate) fn build_service(
    config: &PseudoServiceConfig,
) -> std::result::Result<PseudoService, i32> {
    PseudoService::from_config(config).map_err(|e| {
        crate::log_error_with_context!(&e, "Failed to initialize pseudo service");
        eprintln!("❌ Failed to initialize pseudo service: {e}");
        exit_code(&e)
    })
}

/// Reads and parses a JSON file
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Writes pretty JSON to `output`, or stdout when no path is given
pub(crate) fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    match output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{json}")?;
        }
    }
    Ok(())
}

/// Reports an engine error and returns its exit code
pub(crate) fn report_failure(error: &PseudoError, context: &str) -> i32 {
    crate::log_error_with_context!(error, context);
    eprintln!("❌ {context}: {error}");
    exit_code(error)
}
