//! Logging and observability
//!
//! This module provides structured logging with support for:
//! - Console logs on stderr, keeping stdout free for command output
//! - Configurable log levels
//! - JSON file logging with rotation
//!
//! # Example
//!
//! ```no_run
//! use pseudo_service::logging::init_logging;
//! use pseudo_service::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Service started");
//! ```

pub mod structured;

pub use structured::{init_logging, LoggingGuard};

/// Log the start of a pseudonymization session
///
/// # Example
///
/// ```no_run
/// use pseudo_service::log_session_start;
///
/// log_session_start!("pseudonymize-field", "0b6f5c9e", 100);
/// ```
#[macro_export]
macro_rules! log_session_start {
    ($operation:expr, $correlation_id:expr, $count:expr) => {
        tracing::debug!(
            operation = $operation,
            correlation_id = %$correlation_id,
            count = $count,
            "Starting session"
        );
    };
}

/// Log the completion of a pseudonymization session
///
/// # Example
///
/// ```no_run
/// use pseudo_service::log_session_complete;
///
/// log_session_complete!("pseudonymize-field", "0b6f5c9e", 100);
/// ```
#[macro_export]
macro_rules! log_session_complete {
    ($operation:expr, $correlation_id:expr, $count:expr) => {
        tracing::info!(
            operation = $operation,
            correlation_id = %$correlation_id,
            count = $count,
            "Session completed"
        );
    };
}

/// Log an error with context
///
/// # Example
///
/// ```no_run
/// use pseudo_service::log_error_with_context;
/// use pseudo_service::domain::PseudoError;
///
/// let error = PseudoError::Configuration("Invalid config".to_string());
/// log_error_with_context!(&error, "Failed to load configuration");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            kind = ?$error.kind(),
            context = $context,
            "Error occurred"
        );
    };
}

#[cfg(test)]
mod tests {
    use crate::domain::PseudoError;

    #[test]
    fn test_macros_expand() {
        let error = PseudoError::Validation("bad input".to_string());
        log_session_start!("pseudonymize-field", "c-1", 3);
        log_session_complete!("pseudonymize-field", "c-1", 3usize);
        log_error_with_context!(&error, "while testing");
    }
}
