//! A producer that reads asset data out of module file sources.

use crate::asset::AssetData;
use crate::error::{AssetError, Result};
use crate::producer::AssetDataProducer;
use loadstone_core::files::FileSource;
use loadstone_core::{Name, ResourceUrn};
use std::collections::{BTreeSet, HashMap};
use std::io;
use std::sync::Arc;
use tracing::warn;

/// Knows how to turn one family of files into asset data.
pub trait AssetFileFormat<D: AssetData>: Send + Sync {
    /// File extensions this format handles, without the dot.
    fn extensions(&self) -> &[&str];

    /// Derives the asset name from a file name, e.g. `cube.mesh` -> `cube`.
    fn asset_name(&self, filename: &str) -> Result<Name> {
        for extension in self.extensions() {
            if let Some(stem) = filename.strip_suffix(extension)
                && let Some(stem) = stem.strip_suffix('.')
                && !stem.is_empty()
            {
                return Ok(Name::from(stem));
            }
        }
        Err(AssetError::InvalidFilename {
            filename: filename.to_string(),
        })
    }

    /// Parses file contents into asset data.
    fn load(&self, urn: &ResourceUrn, bytes: &[u8]) -> io::Result<D>;
}

/// Supplies asset data from per-module file sources, e.g. the sources of an
/// active module environment.
///
/// Assets live under `assets/<folder>/`; the urn group is the module id and
/// the resource name comes from the file name via the format. Renames are
/// declared as a redirect table.
pub struct FileSourceProducer<D: AssetData> {
    folder: String,
    format: Arc<dyn AssetFileFormat<D>>,
    sources: Vec<(Name, Arc<dyn FileSource>)>,
    redirects: HashMap<ResourceUrn, ResourceUrn>,
}

impl<D: AssetData> FileSourceProducer<D> {
    pub fn new(folder: impl Into<String>, format: Arc<dyn AssetFileFormat<D>>) -> Self {
        Self {
            folder: folder.into(),
            format,
            sources: Vec::new(),
            redirects: HashMap::new(),
        }
    }

    /// Adds one module's file source. Earlier sources win for the same urn.
    pub fn with_source(mut self, module: impl Into<Name>, source: Arc<dyn FileSource>) -> Self {
        self.sources.push((module.into(), source));
        self
    }

    /// Declares a rename: requests for `from` are redirected to `to`.
    pub fn with_redirect(mut self, from: ResourceUrn, to: ResourceUrn) -> Self {
        self.redirects.insert(from, to);
        self
    }

    fn find_file(
        &self,
        urn: &ResourceUrn,
    ) -> Option<Arc<dyn loadstone_core::files::FileReference>> {
        let (_, source) = self
            .sources
            .iter()
            .find(|(module, _)| module == urn.group())?;
        self.format.extensions().iter().find_map(|extension| {
            let filename = format!("{}.{extension}", urn.resource());
            source.get_file(&["assets", self.folder.as_str(), filename.as_str()])
        })
    }
}

impl<D: AssetData> AssetDataProducer<D> for FileSourceProducer<D> {
    fn available_asset_urns(&self) -> BTreeSet<ResourceUrn> {
        let mut urns = BTreeSet::new();
        for (module, source) in &self.sources {
            for file in source.files_in_path(true, &["assets", self.folder.as_str()]) {
                match self.format.asset_name(file.name()) {
                    Ok(name) => {
                        urns.insert(ResourceUrn::new(module.clone(), name));
                    }
                    Err(error) => {
                        warn!(module = %module, file = file.name(), %error, "skipping unrecognized asset file");
                    }
                }
            }
        }
        urns
    }

    fn modules_providing(&self, resource: &Name) -> BTreeSet<Name> {
        self.sources
            .iter()
            .filter(|(module, _)| {
                self.find_file(&ResourceUrn::new(module.clone(), resource.clone()))
                    .is_some()
            })
            .map(|(module, _)| module.clone())
            .collect()
    }

    fn redirect(&self, urn: ResourceUrn) -> ResourceUrn {
        self.redirects.get(&urn).cloned().unwrap_or(urn)
    }

    fn get_asset_data(&self, urn: &ResourceUrn) -> io::Result<Option<D>> {
        let Some(file) = self.find_file(&urn.root_urn()) else {
            return Ok(None);
        };
        let bytes = file.read()?;
        self.format.load(urn, &bytes).map(Some)
    }
}
