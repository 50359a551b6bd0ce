//! Union of multiple file sources.

use super::{FileReference, FileSource};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Unions several sources into one.
///
/// `get_file` is first-match-wins in the order the sources were added, so
/// an earlier source shadows files of the same path in later ones.
/// Enumeration concatenates and `subpaths` takes the set union.
#[derive(Default)]
pub struct CompositeFileSource {
    sources: Vec<Arc<dyn FileSource>>,
}

impl CompositeFileSource {
    pub fn new(sources: Vec<Arc<dyn FileSource>>) -> Self {
        Self { sources }
    }

    pub fn add(&mut self, source: Arc<dyn FileSource>) {
        self.sources.push(source);
    }
}

impl FileSource for CompositeFileSource {
    fn get_file(&self, path: &[&str]) -> Option<Arc<dyn FileReference>> {
        self.sources.iter().find_map(|source| source.get_file(path))
    }

    fn files_in_path(&self, recursive: bool, path: &[&str]) -> Vec<Arc<dyn FileReference>> {
        self.sources
            .iter()
            .flat_map(|source| source.files_in_path(recursive, path))
            .collect()
    }

    fn subpaths(&self, path: &[&str]) -> BTreeSet<String> {
        self.sources
            .iter()
            .flat_map(|source| source.subpaths(path))
            .collect()
    }
}
