//! Builds modules from directories, archives and host-resident packages.

use crate::error::{ModuleError, Result};
use crate::manifest::ModuleManifest;
use crate::metadata::ModuleMetadata;
use crate::module::{Module, TypePredicate};
use loadstone_core::files::{ArchiveFileSource, DirectoryFileSource, FileSource};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct ModuleFactoryConfig {
    /// Name of the metadata document a module must carry.
    pub metadata_filename: String,
    /// Name of the optional pre-built manifest document.
    pub manifest_filename: String,
    /// Whether to scan the file source for resources when no manifest
    /// document is present. Turning this off leaves such modules with an
    /// empty manifest.
    pub scan_when_manifest_missing: bool,
}

impl Default for ModuleFactoryConfig {
    fn default() -> Self {
        Self {
            metadata_filename: "module.json".to_string(),
            manifest_filename: "manifest.json".to_string(),
            scan_when_manifest_missing: true,
        }
    }
}

/// Creates [`Module`]s from exactly one physical source each.
#[derive(Debug, Default)]
pub struct ModuleFactory {
    config: ModuleFactoryConfig,
}

impl ModuleFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ModuleFactoryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ModuleFactoryConfig {
        &self.config
    }

    /// A module rooted at a directory. Code paths are the directory itself
    /// plus every archive under its `libs/` subpath.
    pub fn create_directory_module(&self, path: &Path) -> Result<Module> {
        let source: Arc<dyn FileSource> =
            Arc::new(DirectoryFileSource::new(path).map_err(ModuleError::io(path))?);
        let metadata = self.read_metadata(source.as_ref(), path)?;

        let mut code_paths = vec![path.to_path_buf()];
        code_paths.extend(lib_archives(&path.join("libs")));

        debug!(module = %metadata.id, path = %path.display(), "created directory module");
        Ok(Module::new(
            metadata,
            self.build_manifest(source.as_ref(), path),
            source,
            None,
            code_paths,
        ))
    }

    /// A module packed into a zip archive; the archive is its own code path.
    pub fn create_archive_module(&self, path: &Path) -> Result<Module> {
        let source: Arc<dyn FileSource> =
            Arc::new(ArchiveFileSource::new(path).map_err(ModuleError::io(path))?);
        let metadata = self.read_metadata(source.as_ref(), path)?;

        debug!(module = %metadata.id, path = %path.display(), "created archive module");
        Ok(Module::new(
            metadata,
            self.build_manifest(source.as_ref(), path),
            source,
            None,
            vec![path.to_path_buf()],
        ))
    }

    /// A module whose code lives inside the host binary. The caller supplies
    /// the metadata and a membership predicate in place of code paths.
    pub fn create_package_module(
        &self,
        metadata: ModuleMetadata,
        source: Arc<dyn FileSource>,
        type_predicate: TypePredicate,
    ) -> Module {
        let manifest = self.build_manifest(source.as_ref(), Path::new(metadata.id.as_str()));
        debug!(module = %metadata.id, "created package module");
        Module::new(metadata, manifest, source, Some(type_predicate), Vec::new())
    }

    fn read_metadata(&self, source: &dyn FileSource, origin: &Path) -> Result<ModuleMetadata> {
        let file = source
            .get_file(&[&self.config.metadata_filename])
            .ok_or_else(|| ModuleError::MissingMetadata {
                path: origin.join(&self.config.metadata_filename),
            })?;
        let bytes = file.read().map_err(ModuleError::io(origin))?;
        ModuleMetadata::from_slice(&bytes).map_err(|source| ModuleError::MetadataParse {
            path: origin.join(&self.config.metadata_filename),
            source,
        })
    }

    /// Loads the manifest document when present, falls back to scanning.
    /// Failures here degrade to an empty manifest rather than failing the
    /// module: a module with no manifest is still usable, it just has
    /// nothing to offer reflective queries.
    fn build_manifest(&self, source: &dyn FileSource, origin: &Path) -> ModuleManifest {
        if let Some(file) = source.get_file(&[&self.config.manifest_filename]) {
            match file.read() {
                Ok(bytes) => match ModuleManifest::from_slice(&bytes) {
                    Ok(manifest) => return manifest,
                    Err(error) => {
                        warn!(path = %origin.display(), %error, "ignoring malformed manifest document");
                    }
                },
                Err(error) => {
                    warn!(path = %origin.display(), %error, "ignoring unreadable manifest document");
                }
            }
        }
        if self.config.scan_when_manifest_missing {
            ModuleManifest::scan_resources(source)
        } else {
            ModuleManifest::default()
        }
    }
}

fn lib_archives(libs: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(libs) else {
        return Vec::new();
    };
    let mut archives: Vec<PathBuf> = entries
        .filter_map(|entry| {
            let path = entry.ok()?.path();
            let extension = path.extension()?.to_str()?;
            if path.is_file() && matches!(extension, "jar" | "zip") {
                Some(path)
            } else {
                None
            }
        })
        .collect();
    archives.sort();
    archives
}
