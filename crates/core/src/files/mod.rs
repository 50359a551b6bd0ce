//! A uniform, read-only view over directories, archives and embedded data.
//!
//! Module code never touches the OS filesystem directly; everything goes
//! through [`FileSource`], so directory-backed, zip-backed and host-embedded
//! content are interchangeable and composable.

use std::collections::BTreeSet;
use std::io;
use std::sync::Arc;

pub mod archive;
pub mod composite;
pub mod directory;
pub mod embedded;

pub use archive::ArchiveFileSource;
pub use composite::CompositeFileSource;
pub use directory::DirectoryFileSource;
pub use embedded::EmbeddedFileSource;

/// A handle to one file inside a [`FileSource`].
///
/// Contents are read lazily; holding a reference is cheap.
pub trait FileReference: Send + Sync {
    /// The file name (last path segment).
    fn name(&self) -> &str;

    /// The path segments relative to the source root, including the name.
    fn path(&self) -> &[String];

    /// Reads the file contents.
    fn read(&self) -> io::Result<Vec<u8>>;
}

/// A read-only tree of files.
pub trait FileSource: Send + Sync {
    /// Looks up a single file by its relative path segments.
    fn get_file(&self, path: &[&str]) -> Option<Arc<dyn FileReference>>;

    /// All files under `path`, optionally recursing into subpaths.
    fn files_in_path(&self, recursive: bool, path: &[&str]) -> Vec<Arc<dyn FileReference>>;

    /// The names of the immediate subpaths of `path`.
    fn subpaths(&self, path: &[&str]) -> BTreeSet<String>;

    /// Every file in the source.
    fn files(&self) -> Vec<Arc<dyn FileReference>> {
        self.files_in_path(true, &[])
    }
}

/// A source with no files. Used by modules that carry no resources.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyFileSource;

impl FileSource for EmptyFileSource {
    fn get_file(&self, _path: &[&str]) -> Option<Arc<dyn FileReference>> {
        None
    }

    fn files_in_path(&self, _recursive: bool, _path: &[&str]) -> Vec<Arc<dyn FileReference>> {
        Vec::new()
    }

    fn subpaths(&self, _path: &[&str]) -> BTreeSet<String> {
        BTreeSet::new()
    }
}

pub(crate) fn join_segments(path: &[&str]) -> String {
    path.join("/")
}
