// Pseudo Service - Rule driven pseudonymization engine
// Copyright (c) 2025 Pseudo Service Contributors
// Licensed under the MIT License

//! # Pseudo Service
//!
//! A rule driven pseudonymization engine for structured field values.
//!
//! ## Overview
//!
//! This library provides the core functionality for:
//! - **Matching** field paths against ordered glob rules, first match wins
//! - **Pseudonymizing** values with format preserving encryption (FF1),
//!   deterministic AEAD, redaction and SID mapping
//! - **Restoring** and **repseudonymizing** values under a new configuration
//! - **Reporting** provenance metadata, metrics and warnings per session
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - The engine (matching, caching, transforms, processors)
//! - [`func`] - Pseudo functions and their declarations
//! - [`kms`] - Key encryption keys and keyset unwrapping
//! - [`domain`] - Core domain types and errors
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pseudo_service::config::load_config;
//! use pseudo_service::core::service::PseudoService;
//! use pseudo_service::domain::{PseudoConfig, PseudoFuncRule};
//! use serde_json::json;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("pseudo.toml")?;
//!     let service = PseudoService::from_config(&config)?;
//!
//!     let rules = PseudoConfig::default()
//!         .with_rule(PseudoFuncRule::new("fnr", "**/fnr", "redact(placeholder=#)"));
//!     let response = service.pseudonymize_records(
//!         &[rules],
//!         vec![json!({"person": {"fnr": "11854898347", "name": "Ola"}})],
//!     )?;
//!
//!     println!("{}", response.data[0]);
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! The engine uses [`domain::PseudoError`] for all errors. Configuration and
//! key errors surface before any value is processed:
//!
//! ```rust,no_run
//! use pseudo_service::domain::PseudoError;
//!
//! fn example() -> Result<(), PseudoError> {
//!     let config = pseudo_service::config::load_config("pseudo.toml")?;
//!     let _service = pseudo_service::core::service::PseudoService::from_config(&config)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Logging
//!
//! Structured logging uses the `tracing` crate. Values are never logged.
//!
//! ```rust,no_run
//! use tracing::{info, warn};
//!
//! info!(correlation_id = "0b6f5c9e", "Session completed");
//! warn!(path = "/person/fnr", "Value too short for FPE");
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod func;
pub mod kms;
pub mod logging;
