//! A versioned, dependency-declaring unit of code and resources.

use crate::manifest::ModuleManifest;
use crate::metadata::ModuleMetadata;
use loadstone_core::files::FileSource;
use loadstone_core::{Name, Version};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Decides whether a type name belongs to a module when the manifest cannot
/// answer. Needed for host-resident "package modules" whose types are
/// compiled into the host rather than listed in a manifest document.
pub type TypePredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// A module is created by [`crate::ModuleFactory`] from exactly one physical
/// source and never mutated afterwards; it is retired by closing the
/// [`crate::ModuleEnvironment`] that owns it.
pub struct Module {
    metadata: ModuleMetadata,
    manifest: ModuleManifest,
    resources: Arc<dyn FileSource>,
    type_predicate: Option<TypePredicate>,
    code_paths: Vec<PathBuf>,
}

impl Module {
    pub fn new(
        metadata: ModuleMetadata,
        manifest: ModuleManifest,
        resources: Arc<dyn FileSource>,
        type_predicate: Option<TypePredicate>,
        code_paths: Vec<PathBuf>,
    ) -> Self {
        Self {
            metadata,
            manifest,
            resources,
            type_predicate,
            code_paths,
        }
    }

    pub fn id(&self) -> &Name {
        &self.metadata.id
    }

    pub fn version(&self) -> Version {
        self.metadata.version
    }

    pub fn metadata(&self) -> &ModuleMetadata {
        &self.metadata
    }

    pub fn manifest(&self) -> &ModuleManifest {
        &self.manifest
    }

    pub fn resources(&self) -> &Arc<dyn FileSource> {
        &self.resources
    }

    pub fn type_predicate(&self) -> Option<&TypePredicate> {
        self.type_predicate.as_ref()
    }

    /// Jar/directory locations this module's code is loaded from. Empty for
    /// resource-only and host-resident modules.
    pub fn code_paths(&self) -> &[PathBuf] {
        &self.code_paths
    }

    /// Whether this module contributes code of its own (and therefore gets
    /// its own link in the environment's namespace chain).
    pub fn has_code(&self) -> bool {
        !self.code_paths.is_empty()
            || !self.manifest.types.is_empty()
            || self.type_predicate.is_some()
    }

    /// Whether `type_name` is one of this module's types, answering from the
    /// manifest first and falling back to the membership predicate.
    pub fn provides_type(&self, type_name: &str) -> bool {
        if self.manifest.has_type(type_name) {
            return true;
        }
        self.type_predicate
            .as_ref()
            .is_some_and(|predicate| predicate(type_name))
    }

    pub fn dependency_ids(&self) -> impl Iterator<Item = &Name> {
        self.metadata.dependencies.iter().map(|dep| &dep.id)
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("id", &self.metadata.id)
            .field("version", &self.metadata.version)
            .field("code_paths", &self.code_paths)
            .finish_non_exhaustive()
    }
}
