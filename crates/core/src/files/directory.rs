//! Directory-backed file source.

use super::{FileReference, FileSource};
use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;
use walkdir::WalkDir;

/// Predicate deciding which file names a source exposes.
pub type ContentFilter = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Excludes compiled artifacts; everything else is content.
pub fn default_content_filter() -> ContentFilter {
    Arc::new(|name| !name.ends_with(".class"))
}

/// Exposes a directory tree as a [`FileSource`].
///
/// Lookups that escape the root (via `..` or symlinks) resolve to nothing:
/// every candidate path is canonicalized and checked against the
/// canonicalized root before use.
pub struct DirectoryFileSource {
    root: PathBuf,
    filter: ContentFilter,
}

impl DirectoryFileSource {
    pub fn new(root: &Path) -> io::Result<Self> {
        Self::with_filter(root, default_content_filter())
    }

    pub fn with_filter(root: &Path, filter: ContentFilter) -> io::Result<Self> {
        let root = root.canonicalize()?;
        if !root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("not a directory: {}", root.display()),
            ));
        }
        Ok(Self { root, filter })
    }

    fn resolve(&self, path: &[&str]) -> Option<PathBuf> {
        let mut candidate = self.root.clone();
        for segment in path {
            candidate.push(segment);
        }
        // Canonicalization fails for missing files and resolves symlinks, so
        // anything that lands outside the root is rejected here.
        let resolved = candidate.canonicalize().ok()?;
        if resolved.starts_with(&self.root) {
            Some(resolved)
        } else {
            warn!(path = %candidate.display(), "rejected path escaping source root");
            None
        }
    }

    fn reference(&self, absolute: &Path) -> Option<Arc<dyn FileReference>> {
        let relative = absolute.strip_prefix(&self.root).ok()?;
        let segments: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        let name = segments.last()?;
        if !(self.filter)(name) {
            return None;
        }
        Some(Arc::new(DirectoryFileReference {
            absolute: absolute.to_path_buf(),
            segments,
        }))
    }
}

impl FileSource for DirectoryFileSource {
    fn get_file(&self, path: &[&str]) -> Option<Arc<dyn FileReference>> {
        let resolved = self.resolve(path)?;
        if resolved.is_file() {
            self.reference(&resolved)
        } else {
            None
        }
    }

    fn files_in_path(&self, recursive: bool, path: &[&str]) -> Vec<Arc<dyn FileReference>> {
        let Some(base) = self.resolve(path) else {
            return Vec::new();
        };
        let walker = if recursive {
            WalkDir::new(&base)
        } else {
            WalkDir::new(&base).max_depth(1)
        };
        walker
            .into_iter()
            .filter_map(|entry| {
                let entry = entry.ok()?;
                if entry.file_type().is_file() {
                    self.reference(entry.path())
                } else {
                    None
                }
            })
            .collect()
    }

    fn subpaths(&self, path: &[&str]) -> BTreeSet<String> {
        let Some(base) = self.resolve(path) else {
            return BTreeSet::new();
        };
        let Ok(entries) = std::fs::read_dir(&base) else {
            return BTreeSet::new();
        };
        entries
            .filter_map(|entry| {
                let entry = entry.ok()?;
                if entry.file_type().ok()?.is_dir() {
                    Some(entry.file_name().to_string_lossy().into_owned())
                } else {
                    None
                }
            })
            .collect()
    }
}

struct DirectoryFileReference {
    absolute: PathBuf,
    segments: Vec<String>,
}

impl FileReference for DirectoryFileReference {
    fn name(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or("")
    }

    fn path(&self) -> &[String] {
        &self.segments
    }

    fn read(&self) -> io::Result<Vec<u8>> {
        std::fs::read(&self.absolute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("textures/ui")).unwrap();
        fs::write(dir.path().join("readme.txt"), b"root").unwrap();
        fs::write(dir.path().join("textures/stone.png"), b"png").unwrap();
        fs::write(dir.path().join("textures/ui/icon.png"), b"icon").unwrap();
        fs::write(dir.path().join("textures/Stone.class"), b"code").unwrap();
        dir
    }

    #[test]
    fn test_get_file_and_read() {
        let dir = fixture();
        let source = DirectoryFileSource::new(dir.path()).unwrap();

        let file = source.get_file(&["textures", "stone.png"]).unwrap();
        assert_eq!(file.name(), "stone.png");
        assert_eq!(file.path(), ["textures", "stone.png"]);
        assert_eq!(file.read().unwrap(), b"png");

        assert!(source.get_file(&["missing.txt"]).is_none());
    }

    #[test]
    fn test_default_filter_hides_compiled_artifacts() {
        let dir = fixture();
        let source = DirectoryFileSource::new(dir.path()).unwrap();
        assert!(source.get_file(&["textures", "Stone.class"]).is_none());
        let names: Vec<_> = source.files().iter().map(|f| f.name().to_string()).collect();
        assert!(!names.contains(&"Stone.class".to_string()));
    }

    #[test]
    fn test_path_escape_is_rejected() {
        let dir = fixture();
        let source = DirectoryFileSource::new(dir.path()).unwrap();
        assert!(source.get_file(&["..", "etc", "passwd"]).is_none());
        assert!(source.get_file(&["textures", "..", "..", "readme.txt"]).is_none());
        // staying inside the root through `..` is still fine
        assert!(source.get_file(&["textures", "..", "readme.txt"]).is_some());
    }

    #[test]
    fn test_enumeration() {
        let dir = fixture();
        let source = DirectoryFileSource::new(dir.path()).unwrap();

        assert_eq!(source.files().len(), 3);
        assert_eq!(source.files_in_path(false, &["textures"]).len(), 1);
        assert_eq!(source.files_in_path(true, &["textures"]).len(), 2);
        assert_eq!(
            source.subpaths(&["textures"]),
            BTreeSet::from(["ui".to_string()])
        );
    }
}
