//! The index of types and resources a module offers.

use loadstone_core::files::FileSource;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// What a module contributes to reflective queries.
///
/// Built once at module construction and immutable thereafter: either
/// deserialized from a pre-built `manifest.json`, or the resource half is
/// computed by scanning the module's file source. Type information only
/// comes from the manifest document (or explicit registration by the host);
/// there is no runtime type discovery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleManifest {
    /// Exported type names, e.g. `core::mesh::Mesh`.
    #[serde(default)]
    pub types: BTreeSet<String>,
    /// Interface name -> implementing type names.
    #[serde(default)]
    pub implementations: BTreeMap<String, BTreeSet<String>>,
    /// Tag -> tagged type names.
    #[serde(default)]
    pub tags: BTreeMap<String, BTreeSet<String>>,
    /// Relative paths of the module's resource files.
    #[serde(default)]
    pub resources: BTreeSet<String>,
}

impl ModuleManifest {
    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    /// Builds the resource index by walking `source`.
    pub fn scan_resources(source: &dyn FileSource) -> Self {
        let resources = source
            .files()
            .into_iter()
            .map(|file| file.path().join("/"))
            .collect();
        Self {
            resources,
            ..Self::default()
        }
    }

    pub fn has_type(&self, type_name: &str) -> bool {
        self.types.contains(type_name)
    }

    pub fn subtypes_of(&self, interface: &str) -> BTreeSet<String> {
        self.implementations
            .get(interface)
            .cloned()
            .unwrap_or_default()
    }

    pub fn types_tagged(&self, tag: &str) -> BTreeSet<String> {
        self.tags.get(tag).cloned().unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
            && self.implementations.is_empty()
            && self.tags.is_empty()
            && self.resources.is_empty()
    }

    /// Unions `other` into this manifest.
    pub fn merge(&mut self, other: &ModuleManifest) {
        self.types.extend(other.types.iter().cloned());
        for (interface, impls) in &other.implementations {
            self.implementations
                .entry(interface.clone())
                .or_default()
                .extend(impls.iter().cloned());
        }
        for (tag, types) in &other.tags {
            self.tags
                .entry(tag.clone())
                .or_default()
                .extend(types.iter().cloned());
        }
        self.resources.extend(other.resources.iter().cloned());
    }
}
