//! The on-disk module description document.
//!
//! This schema is an external contract: a written document read back must
//! reproduce an equal `ModuleMetadata`.

use loadstone_core::{Name, Version, VersionRange};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Identity, version and dependency declarations of one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleMetadata {
    pub id: Name,
    pub version: Version,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub dependencies: Vec<DependencyInfo>,
    #[serde(default)]
    pub required_permissions: BTreeSet<String>,
}

impl ModuleMetadata {
    pub fn new(id: impl Into<Name>, version: Version) -> Self {
        Self {
            id: id.into(),
            version,
            display_name: String::new(),
            description: String::new(),
            dependencies: Vec::new(),
            required_permissions: BTreeSet::new(),
        }
    }

    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    pub fn to_vec(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }
}

/// One declared dependency on another module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyInfo {
    pub id: Name,
    pub min_version: Version,
    /// Exclusive upper bound; defaults to the next major of `min_version`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_version: Option<Version>,
    #[serde(default)]
    pub optional: bool,
}

impl DependencyInfo {
    pub fn new(id: impl Into<Name>, min_version: Version) -> Self {
        Self {
            id: id.into(),
            min_version,
            max_version: None,
            optional: false,
        }
    }

    /// The `[min, max)` range this dependency accepts.
    pub fn version_range(&self) -> VersionRange {
        let upper = self
            .max_version
            .unwrap_or_else(|| self.min_version.next_major());
        VersionRange::new(self.min_version, upper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ModuleMetadata {
        let mut metadata = ModuleMetadata::new("CoreAssets", Version::new(1, 2, 0));
        metadata.display_name = "Core Assets".to_string();
        metadata.description = "Base content".to_string();
        metadata.dependencies = vec![
            DependencyInfo::new("engine", Version::new(2, 0, 0)),
            DependencyInfo {
                id: Name::from("audio"),
                min_version: Version::new(0, 3, 0),
                max_version: Some(Version::new(0, 4, 0)),
                optional: true,
            },
        ];
        metadata.required_permissions.insert("io".to_string());
        metadata
    }

    #[test]
    fn test_document_round_trip() {
        let metadata = sample();
        let bytes = metadata.to_vec().unwrap();
        let back = ModuleMetadata::from_slice(&bytes).unwrap();
        assert_eq!(back, metadata);
    }

    #[test]
    fn test_optional_fields_default() {
        let metadata: ModuleMetadata =
            serde_json::from_str(r#"{"id": "bare", "version": "0.1.0"}"#).unwrap();
        assert_eq!(metadata.id, Name::from("bare"));
        assert!(metadata.dependencies.is_empty());
        assert!(metadata.required_permissions.is_empty());
    }

    #[test]
    fn test_dependency_version_range() {
        let metadata = sample();
        let engine = metadata.dependencies[0].version_range();
        assert!(engine.contains(Version::new(2, 9, 0)));
        assert!(!engine.contains(Version::new(3, 0, 0)));

        let audio = metadata.dependencies[1].version_range();
        assert!(audio.contains(Version::new(0, 3, 5)));
        assert!(!audio.contains(Version::new(0, 4, 0)));
    }
}
