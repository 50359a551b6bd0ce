//! Discovers modules on disk and feeds them into a registry.

use crate::factory::ModuleFactory;
use crate::registry::ModuleRegistry;
use std::path::Path;
use tracing::{info, warn};

/// Scans directories for module candidates: every child directory carrying
/// the metadata document, and every `*.zip`/`*.jar` archive.
///
/// One broken candidate never aborts the scan; its error is logged with the
/// offending path and the scan continues.
pub struct ModulePathScanner {
    factory: ModuleFactory,
}

impl ModulePathScanner {
    pub fn new(factory: ModuleFactory) -> Self {
        Self { factory }
    }

    pub fn factory(&self) -> &ModuleFactory {
        &self.factory
    }

    /// Scans one root directory. Returns how many modules were added.
    pub fn scan(&self, registry: &mut ModuleRegistry, path: &Path) -> usize {
        let entries = match std::fs::read_dir(path) {
            Ok(entries) => entries,
            Err(error) => {
                warn!(path = %path.display(), %error, "cannot scan module path");
                return 0;
            }
        };

        let mut candidates: Vec<_> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .collect();
        candidates.sort();

        let mut added = 0;
        for candidate in candidates {
            let result = if candidate.is_dir() {
                if !candidate
                    .join(&self.factory.config().metadata_filename)
                    .is_file()
                {
                    continue;
                }
                self.factory.create_directory_module(&candidate)
            } else if is_archive(&candidate) {
                self.factory.create_archive_module(&candidate)
            } else {
                continue;
            };

            match result {
                Ok(module) => {
                    if registry.add(module.into()) {
                        added += 1;
                    }
                }
                Err(error) => {
                    warn!(path = %candidate.display(), %error, "skipping broken module candidate");
                }
            }
        }

        info!(path = %path.display(), added, "module scan complete");
        added
    }

    /// Scans several roots in order. Earlier roots win on duplicates.
    pub fn scan_all<'a>(
        &self,
        registry: &mut ModuleRegistry,
        paths: impl IntoIterator<Item = &'a Path>,
    ) -> usize {
        paths
            .into_iter()
            .map(|path| self.scan(registry, path))
            .sum()
    }
}

fn is_archive(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| matches!(ext, "zip" | "jar"))
}
