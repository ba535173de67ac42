//! Placeholder redaction

use super::{PseudoFunc, PseudoFuncOutput};
use crate::domain::FuncError;

/// Default replacement text
pub const DEFAULT_PLACEHOLDER: &str = "***";

/// Replaces every value with a fixed placeholder
///
/// Redaction is one-way: `restore` returns its input and logs a warning.
#[derive(Debug, Clone)]
pub struct RedactFunc {
    placeholder: String,
}

impl RedactFunc {
    /// Creates a redaction with the given placeholder
    pub fn new(placeholder: Option<&str>) -> Self {
        Self {
            placeholder: placeholder.unwrap_or(DEFAULT_PLACEHOLDER).to_string(),
        }
    }
}

impl PseudoFunc for RedactFunc {
    fn algorithm(&self) -> &str {
        "REDACT"
    }

    fn apply(&self, _value: &str) -> Result<PseudoFuncOutput, FuncError> {
        Ok(PseudoFuncOutput::of(self.placeholder.clone()))
    }

    fn restore(&self, value: &str) -> Result<PseudoFuncOutput, FuncError> {
        Ok(PseudoFuncOutput::of(value)
            .with_warning("Redacted values cannot be depseudonymized, returning input"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_uses_placeholder() {
        let redact = RedactFunc::new(Some("<hidden>"));
        assert_eq!(redact.apply("secret").unwrap().value.as_deref(), Some("<hidden>"));
        assert_eq!(RedactFunc::new(None).apply("x").unwrap().value.as_deref(), Some("***"));
    }

    #[test]
    fn test_restore_warns() {
        let out = RedactFunc::new(None).restore("***").unwrap();
        assert_eq!(out.value.as_deref(), Some("***"));
        assert_eq!(out.warnings.len(), 1);
    }
}
