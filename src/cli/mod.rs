//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for the pseudo service
//! using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// Pseudo Service - rule driven pseudonymization of structured values
#[derive(Parser, Debug)]
#[command(name = "pseudo-service")]
#[command(version, about, long_about = None)]
#[command(author = "Pseudo Service Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "pseudo.toml", env = "PSEUDO_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "PSEUDO_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Pseudonymize the values of one field
    PseudonymizeField(commands::field::PseudonymizeFieldArgs),

    /// Restore pseudonymized values of one field
    DepseudonymizeField(commands::field::DepseudonymizeFieldArgs),

    /// Move values of one field from a source to a target configuration
    RepseudonymizeField(commands::field::RepseudonymizeFieldArgs),

    /// Pseudonymize NDJSON records
    PseudonymizeRecords(commands::records::RecordsArgs),

    /// Restore pseudonymized NDJSON records
    DepseudonymizeRecords(commands::records::RecordsArgs),

    /// Wrap a fresh keyset with a configured key encryption key
    GenerateKeyset(commands::keyset::GenerateKeysetArgs),

    /// Look up an FNR or SNR in the SID index
    LookupSid(commands::sid::LookupSidArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}
