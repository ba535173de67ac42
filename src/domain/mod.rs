//! Domain models and types for the pseudonymization engine.
//!
//! The domain layer provides:
//! - **Field identity** ([`FieldDescriptor`], [`normalize_path`])
//! - **Caller supplied configuration** ([`PseudoFuncRule`], [`PseudoConfig`], [`PseudoKeyset`])
//! - **Error types** ([`PseudoError`], [`FuncError`], [`KeyAccessError`])
//! - **Result type alias** ([`Result`])
//!
//! # Example
//!
//! ```rust
//! use pseudo_service::domain::{FieldDescriptor, PseudoConfig, PseudoFuncRule};
//!
//! let config = PseudoConfig::default()
//!     .with_rule(PseudoFuncRule::new("fnr", "**/fnr", "redact"));
//! let field = FieldDescriptor::new("/persons[0]/fnr");
//! assert_eq!(field.normalized_path(), "persons.fnr");
//! assert_eq!(config.rules.len(), 1);
//! ```

pub mod errors;
pub mod field;
pub mod keyset;
pub mod result;
pub mod rule;

// Re-export commonly used types for convenience
pub use errors::{ErrorKind, FuncError, KeyAccessError, PseudoError};
pub use field::{normalize_path, FieldDescriptor};
pub use keyset::{KeysetInfo, PseudoKeyset};
pub use result::Result;
pub use rule::{PseudoConfig, PseudoFuncRule};
