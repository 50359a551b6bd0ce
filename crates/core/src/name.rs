//! Case-insensitive identifiers for modules and resources.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A case-insensitive identifier.
///
/// The original casing is kept for display; equality, hashing and ordering
/// all use the lower-cased normalized form, so `Name::from("Core")` and
/// `Name::from("core")` are the same key.
#[derive(Debug, Clone)]
pub struct Name {
    original: String,
    normalized: String,
}

impl Name {
    pub fn new(value: impl Into<String>) -> Self {
        let original = value.into();
        let normalized = original.to_lowercase();
        Self {
            original,
            normalized,
        }
    }

    /// The canonical empty sentinel.
    pub fn empty() -> Self {
        Self::new("")
    }

    pub fn is_empty(&self) -> bool {
        self.normalized.is_empty()
    }

    /// The identifier as originally written.
    pub fn as_str(&self) -> &str {
        &self.original
    }

    /// The lower-cased form used as the comparison key.
    pub fn normalized(&self) -> &str {
        &self.normalized
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.normalized == other.normalized
    }
}

impl Eq for Name {}

impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized.hash(state);
    }
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Name {
    fn cmp(&self, other: &Self) -> Ordering {
        self.normalized.cmp(&other.normalized)
    }
}

/// Lookups in maps keyed by `Name` work with the normalized string.
impl Borrow<str> for Name {
    fn borrow(&self) -> &str {
        &self.normalized
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

impl From<&str> for Name {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Name {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl Serialize for Name {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.original)
    }
}

impl<'de> Deserialize<'de> for Name {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Name::new(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_case_insensitive_equality() {
        assert_eq!(Name::from("Engine"), Name::from("engine"));
        assert_eq!(Name::from("ENGINE"), Name::from("engine"));
        assert_ne!(Name::from("engine"), Name::from("editor"));
    }

    #[test]
    fn test_display_preserves_original_case() {
        assert_eq!(Name::from("CoreAssets").to_string(), "CoreAssets");
    }

    #[test]
    fn test_map_lookup_by_normalized_str() {
        let mut map = HashMap::new();
        map.insert(Name::from("Core"), 1);
        assert_eq!(map.get("core"), Some(&1));
    }

    #[test]
    fn test_empty_sentinel() {
        assert!(Name::empty().is_empty());
        assert_eq!(Name::empty(), Name::from(""));
        assert!(!Name::from("x").is_empty());
    }

    #[test]
    fn test_ordering_uses_normalized_form() {
        let mut names = vec![Name::from("beta"), Name::from("Alpha")];
        names.sort();
        assert_eq!(names[0].as_str(), "Alpha");
    }
}
