//! Zip/archive-backed file source.

use super::{FileReference, FileSource, join_segments};
use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::{Arc, Mutex};
use zip::ZipArchive;

/// Exposes the contents of a zip archive as a [`FileSource`].
///
/// The central directory is scanned once at construction into a path index
/// and a subpath map; entry contents are decompressed lazily on each
/// [`FileReference::read`].
pub struct ArchiveFileSource {
    archive: Arc<Mutex<ZipArchive<File>>>,
    entries: HashMap<String, usize>,
    // sorted so enumeration order is stable across runs
    paths: Vec<String>,
    subdirs: HashMap<String, BTreeSet<String>>,
}

impl ArchiveFileSource {
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        let mut archive = ZipArchive::new(file).map_err(io::Error::other)?;

        let mut entries = HashMap::new();
        let mut subdirs: HashMap<String, BTreeSet<String>> = HashMap::new();
        for index in 0..archive.len() {
            let entry = archive.by_index_raw(index).map_err(io::Error::other)?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().replace('\\', "/");
            register_ancestors(&mut subdirs, &name);
            entries.insert(name, index);
        }

        let mut paths: Vec<String> = entries.keys().cloned().collect();
        paths.sort();

        Ok(Self {
            archive: Arc::new(Mutex::new(archive)),
            entries,
            paths,
            subdirs,
        })
    }

    /// Reads one entry eagerly, without keeping the source around.
    pub fn read_entry(archive_path: &Path, entry: &[&str]) -> io::Result<Vec<u8>> {
        let file = File::open(archive_path)?;
        let mut archive = ZipArchive::new(file).map_err(io::Error::other)?;
        let mut entry = archive
            .by_name(&join_segments(entry))
            .map_err(io::Error::other)?;
        let mut contents = Vec::new();
        entry.read_to_end(&mut contents)?;
        Ok(contents)
    }

    fn reference(&self, path: &str) -> Arc<dyn FileReference> {
        Arc::new(ArchiveFileReference {
            archive: Arc::clone(&self.archive),
            index: self.entries[path],
            segments: path.split('/').map(str::to_string).collect(),
        })
    }
}

pub(super) fn register_ancestors(subdirs: &mut HashMap<String, BTreeSet<String>>, file_path: &str) {
    let mut parent = String::new();
    let segments: Vec<&str> = file_path.split('/').collect();
    for segment in segments[..segments.len().saturating_sub(1)].iter().copied() {
        subdirs
            .entry(parent.clone())
            .or_default()
            .insert(segment.to_string());
        if !parent.is_empty() {
            parent.push('/');
        }
        parent.push_str(segment);
    }
    subdirs.entry(parent).or_default();
}

impl FileSource for ArchiveFileSource {
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

struct ArchiveFileReference {
    archive: Arc<Mutex<ZipArchive<File>>>,
    index: usize,
    segments: Vec<String>,
}

impl FileReference for ArchiveFileReference {
    fn name(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or("")
    }

    fn path(&self) -> &[String] {
        &self.segments
    }

    fn read(&self) -> io::Result<Vec<u8>> {
        let mut archive = self.archive.lock().unwrap();
        let mut entry = archive.by_index(self.index).map_err(io::Error::other)?;
        let mut contents = Vec::new();
        entry.read_to_end(&mut contents)?;
        Ok(contents)
    }
}
