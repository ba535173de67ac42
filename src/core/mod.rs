//! The pseudonymization engine.
//!
//! # Modules
//!
//! - [`matcher`] - Field pattern matching, first match wins
//! - [`cache`] - Bounded get-or-compute cache shared across sessions
//! - [`funcs`] - Resolved function sets and per-session match memoization
//! - [`factory`] - Builds and caches function sets, creates processors
//! - [`transform`] - Applies one function to one value
//! - [`record`] - Nested record traversal through an interceptor chain
//! - [`field`] - Single field batch fast path
//! - [`metadata`] - Provenance metadata, metrics and warnings
//! - [`service`] - Field level operations
//!
//! # Session Workflow
//!
//! 1. **Resolve**: each configuration becomes a [`funcs::PseudoFuncs`],
//!    cached when it holds only stateless functions
//! 2. **Match**: each field path is matched once per session
//! 3. **Transform**: values pass through the matched function of every
//!    configuration in order
//! 4. **Report**: metadata, metrics and warnings are returned with the values
//!
//! # Example
//!
//! ```rust,no_run
//! use pseudo_service::config::load_config;
//! use pseudo_service::core::service::{PseudoFieldRequest, PseudoService};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("pseudo.toml")?;
//! let service = PseudoService::from_config(&config)?;
//!
//! let response = service.pseudonymize_field(&PseudoFieldRequest {
//!     name: "fnr".to_string(),
//!     pattern: None,
//!     pseudo_func: "redact".to_string(),
//!     keyset: None,
//!     values: vec![Some("11854898347".to_string())],
//! })?;
//! println!("{:?}", response.data);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod factory;
pub mod field;
pub mod funcs;
pub mod matcher;
pub mod metadata;
pub mod record;
pub mod service;
pub mod transform;
