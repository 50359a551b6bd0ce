//! Host-embedded file source.

use super::{FileReference, FileSource, join_segments};
use std::collections::{BTreeSet, HashMap};
use std::io;
use std::sync::Arc;

/// A [`FileSource`] over byte tables compiled into (or registered by) the
/// host application, for modules that ship inside the host binary rather
/// than on disk.
///
/// Entry paths are `/`-separated; a `base_path` prefix is stripped from
/// every entry, and entries outside it are ignored.
pub struct EmbeddedFileSource {
    entries: HashMap<String, Arc<Vec<u8>>>,
    paths: Vec<String>,
    subdirs: HashMap<String, BTreeSet<String>>,
}

impl EmbeddedFileSource {
    pub fn new(
        base_path: &str,
        contents: impl IntoIterator<Item = (String, Vec<u8>)>,
    ) -> Self {
        let prefix = if base_path.is_empty() {
            String::new()
        } else {
            format!("{}/", base_path.trim_matches('/'))
        };

        let mut entries = HashMap::new();
        let mut subdirs: HashMap<String, BTreeSet<String>> = HashMap::new();
        for (path, bytes) in contents {
            let Some(relative) = path.strip_prefix(&prefix) else {
                continue;
            };
            if relative.is_empty() {
                continue;
            }
            super::archive::register_ancestors(&mut subdirs, relative);
            entries.insert(relative.to_string(), Arc::new(bytes));
        }

        let mut paths: Vec<String> = entries.keys().cloned().collect();
        paths.sort();

        Self {
            entries,
            paths,
            subdirs,
        }
    }

    fn reference(&self, path: &str) -> Arc<dyn FileReference> {
        Arc::new(EmbeddedFileReference {
            bytes: Arc::clone(&self.entries[path]),
            segments: path.split('/').map(str::to_string).collect(),
        })
    }
}

impl FileSource for EmbeddedFileSource {
    fn get_file(&self, path: &[&str]) -> Option<Arc<dyn FileReference>> {
        let key = join_segments(path);
        self.entries.contains_key(&key).then(|| self.reference(&key))
    }

    fn files_in_path(&self, recursive: bool, path: &[&str]) -> Vec<Arc<dyn FileReference>> {
        let mut prefix = join_segments(path);
        if !prefix.is_empty() {
            prefix.push('/');
        }
        self.paths
            .iter()
            .filter(|candidate| {
                candidate.starts_with(&prefix)
                    && (recursive || !candidate[prefix.len()..].contains('/'))
            })
            .map(|candidate| self.reference(candidate))
            .collect()
    }

    fn subpaths(&self, path: &[&str]) -> BTreeSet<String> {
        self.subdirs
            .get(&join_segments(path))
            .cloned()
            .unwrap_or_default()
    }
}

struct EmbeddedFileReference {
    bytes: Arc<Vec<u8>>,
    segments: Vec<String>,
}

impl FileReference for EmbeddedFileReference {
    fn name(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or("")
    }

    fn path(&self) -> &[String] {
        &self.segments
    }

    fn read(&self) -> io::Result<Vec<u8>> {
        Ok(self.bytes.as_ref().clone())
    }
}
