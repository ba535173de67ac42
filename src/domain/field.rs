//! Field descriptors and path normalization

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a field by its structural path and leaf name
///
/// Paths use `/` as separator and `[n]` as array index marker,
/// e.g. `/persons[3]/fnr`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldDescriptor {
    path: String,
    name: String,
}

impl FieldDescriptor {
    /// Creates a descriptor from a structural path
    ///
    /// A missing leading `/` is added.
    pub fn new(path: impl Into<String>) -> Self {
        let mut path = path.into();
        if !path.starts_with('/') {
            path.insert(0, '/');
        }
        let name = leaf_name(&path).to_string();
        Self { path, name }
    }

    /// The structural path
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The leaf name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The path shared by all occurrences of a repeated field
    pub fn normalized_path(&self) -> String {
        normalize_path(&self.path)
    }
}

impl From<&str> for FieldDescriptor {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl fmt::Display for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

fn leaf_name(path: &str) -> &str {
    let leaf = path.rsplit('/').next().unwrap_or(path);
    match leaf.find('[') {
        Some(idx) => &leaf[..idx],
        None => leaf,
    }
}

/// Normalizes a structural path for metadata identity
///
/// Strips the leading separator, replaces `/` with `.` and removes array
/// index markers: `/persons[3]/fnr` becomes `persons.fnr`.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    let mut out = String::with_capacity(trimmed.len());
    let mut chars = trimmed.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '/' => out.push('.'),
            '[' => {
                let mut skipped = String::new();
                let mut closed = false;
                while let Some(&next) = chars.peek() {
                    if next.is_ascii_digit() {
                        skipped.push(next);
                        chars.next();
                    } else {
                        if next == ']' {
                            chars.next();
                            closed = true;
                        }
                        break;
                    }
                }
                if !closed {
                    out.push('[');
                    out.push_str(&skipped);
                }
            }
            other => out.push(other),
        }
    }
    out
}
