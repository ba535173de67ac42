//! Pseudo rules and configurations

use super::keyset::PseudoKeyset;
use serde::{Deserialize, Serialize};

/// Associates a field pattern with a function declaration
///
/// Rules are evaluated in declaration order and the first matching
/// pattern wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PseudoFuncRule {
    /// Human readable rule name
    pub name: String,

    /// Glob pattern over field paths, e.g. `**/fnr`
    pub pattern: String,

    /// Function declaration, e.g. `daead(keyId=1234)`
    pub func: String,
}

impl PseudoFuncRule {
    /// Creates a new rule
    pub fn new(
        name: impl Into<String>,
        pattern: impl Into<String>,
        func: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            func: func.into(),
        }
    }
}

/// An ordered rule list plus the keysets the rules refer to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PseudoConfig {
    /// Rules in precedence order
    #[serde(default)]
    pub rules: Vec<PseudoFuncRule>,

    /// Keysets referenced by `keyId` arguments
    #[serde(default)]
    pub keysets: Vec<PseudoKeyset>,
}

impl PseudoConfig {
    /// Creates a configuration from rules and keysets
    pub fn new(rules: Vec<PseudoFuncRule>, keysets: Vec<PseudoKeyset>) -> Self {
        Self { rules, keysets }
    }

    /// Adds a rule after the existing ones
    pub fn with_rule(mut self, rule: PseudoFuncRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Adds a keyset
    pub fn with_keyset(mut self, keyset: PseudoKeyset) -> Self {
        self.keysets.push(keyset);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder_keeps_order() {
        let config = PseudoConfig::default()
            .with_rule(PseudoFuncRule::new("specific", "/person/fnr", "redact"))
            .with_rule(PseudoFuncRule::new("general", "**", "fpe"));
        assert_eq!(config.rules[0].name, "specific");
        assert_eq!(config.rules[1].name, "general");
    }

    #[test]
    fn test_config_deserializes_without_keysets() {
        let config: PseudoConfig = serde_json::from_str(
            r#"{"rules": [{"name": "fnr", "pattern": "**/fnr", "func": "redact"}]}"#,
        )
        .unwrap();
        assert_eq!(config.rules.len(), 1);
        assert!(config.keysets.is_empty());
    }
}
