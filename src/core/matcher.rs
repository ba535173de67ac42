//! Field pattern matching
//!
//! Patterns are globs over structural field paths:
//!
//! - `*` matches within one path segment
//! - `**` matches any number of segments
//! - `?` and `[abc]` match single characters
//!
//! Patterns starting with `/` are absolute. Anything else is relative and
//! matches at any depth, so `fnr` matches both `/fnr` and `/person/fnr`.
//! Array index markers are ignored when matching: `/persons[2]/fnr` is
//! matched as `/persons/fnr`.

use crate::domain::{FieldDescriptor, PseudoError, Result};
use glob::{MatchOptions, Pattern};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// A compiled field pattern
#[derive(Debug, Clone)]
pub struct FieldPattern {
    raw: String,
    compiled: Pattern,
}

impl FieldPattern {
    /// Compiles a pattern
    ///
    /// # Errors
    ///
    /// Returns a configuration error for empty or malformed globs.
    pub fn new(pattern: &str) -> Result<Self> {
        let raw = pattern.trim();
        if raw.is_empty() {
            return Err(PseudoError::Configuration(
                "Field pattern must not be empty".to_string(),
            ));
        }
        let anchored = if raw.starts_with('/') {
            raw.to_string()
        } else if raw.starts_with("**") {
            format!("/{raw}")
        } else {
            format!("/**/{raw}")
        };
        let compiled = Pattern::new(&anchored).map_err(|e| {
            PseudoError::Configuration(format!("Invalid field pattern '{raw}': {e}"))
        })?;
        Ok(Self {
            raw: raw.to_string(),
            compiled,
        })
    }

    /// The pattern as written
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether the field matches
    pub fn matches(&self, field: &FieldDescriptor) -> bool {
        let path = strip_indexes(field.path());
        self.compiled.matches_with(&path, MATCH_OPTIONS)
    }
}

fn strip_indexes(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut in_index = false;
    for c in path.chars() {
        match c {
            '[' => in_index = true,
            ']' if in_index => in_index = false,
            _ if in_index => {}
            other => out.push(other),
        }
    }
    out
}

/// Returns the position of the first pattern matching `field`
pub fn first_match<'a, I>(patterns: I, field: &FieldDescriptor) -> Option<usize>
where
    I: IntoIterator<Item = &'a FieldPattern>,
{
    patterns
        .into_iter()
        .position(|pattern| pattern.matches(field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn matches(pattern: &str, path: &str) -> bool {
        FieldPattern::new(pattern)
            .unwrap()
            .matches(&FieldDescriptor::new(path))
    }

    #[test_case("fnr", "/fnr", true ; "relative at root")]
    #[test_case("fnr", "/person/fnr", true ; "relative nested")]
    #[test_case("fnr", "/person/fnr2", false ; "relative is whole segment")]
    #[test_case("/fnr", "/person/fnr", false ; "absolute does not float")]
    #[test_case("/person/*", "/person/fnr", true ; "single segment wildcard")]
    #[test_case("/person/*", "/person/address/street", false ; "star stops at separator")]
    #[test_case("/person/**", "/person/address/street", true ; "double star crosses segments")]
    #[test_case("**/fnr", "/a/b/c/fnr", true ; "leading double star")]
    #[test_case("**", "/anything/at/all", true ; "match everything")]
    #[test_case("f?r", "/fnr", true ; "question mark")]
    #[test_case("[fs]nr", "/snr", true ; "character class")]
    #[test_case("/persons/fnr", "/persons[3]/fnr", true ; "array index ignored")]
    #[test_case("person/*", "/root/person/fnr", true ; "relative multi segment")]
    fn test_pattern_matching(pattern: &str, path: &str, expected: bool) {
        assert_eq!(matches(pattern, path), expected, "{pattern} vs {path}");
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(FieldPattern::new("").is_err());
        assert!(FieldPattern::new("[unclosed").is_err());
        assert!(FieldPattern::new("/a/***/b").is_err());
    }

    #[test]
    fn test_first_match_wins() {
        let patterns = vec![
            FieldPattern::new("/person/fnr").unwrap(),
            FieldPattern::new("**").unwrap(),
        ];
        assert_eq!(first_match(&patterns, &FieldDescriptor::new("/person/fnr")), Some(0));
        assert_eq!(first_match(&patterns, &FieldDescriptor::new("/other")), Some(1));
        assert_eq!(first_match(&patterns[..1], &FieldDescriptor::new("/other")), None);
    }

    #[test]
    fn test_strip_indexes() {
        assert_eq!(strip_indexes("/a[0]/b[12]/c"), "/a/b/c");
    }
}
