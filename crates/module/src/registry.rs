//! A collection of modules indexed by id and version.

use crate::module::Module;
use indexmap::IndexMap;
use loadstone_core::{Name, Version};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::warn;

/// Modules keyed by `(id, version)`, with a derived latest-version index
/// that is maintained incrementally on add/remove.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    modules: IndexMap<(Name, Version), Arc<Module>>,
    latest: HashMap<Name, Version>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a module. A duplicate `(id, version)` is not an error: the first
    /// occurrence wins, the duplicate is logged and dropped.
    pub fn add(&mut self, module: Arc<Module>) -> bool {
        let key = (module.id().clone(), module.version());
        if self.modules.contains_key(&key) {
            warn!(module = %module.id(), version = %module.version(), "duplicate module discovered, keeping first");
            return false;
        }

        let is_latest = self
            .latest
            .get(module.id())
            .is_none_or(|&current| module.version() > current);
        if is_latest {
            self.latest.insert(module.id().clone(), module.version());
        }
        self.modules.insert(key, module);
        true
    }

    pub fn remove(&mut self, id: &Name, version: Version) -> Option<Arc<Module>> {
        let removed = self.modules.shift_remove(&(id.clone(), version))?;
        if self.latest.get(id) == Some(&version) {
            // only the removed id needs its latest entry recomputed
            let remaining = self
                .modules
                .keys()
                .filter(|(candidate, _)| candidate == id)
                .map(|&(_, v)| v)
                .max();
            match remaining {
                Some(v) => self.latest.insert(id.clone(), v),
                None => self.latest.remove(id),
            };
        }
        Some(removed)
    }

    pub fn get_module(&self, id: &Name, version: Version) -> Option<&Arc<Module>> {
        self.modules.get(&(id.clone(), version))
    }

    pub fn get_latest_module(&self, id: &Name) -> Option<&Arc<Module>> {
        let version = self.get_latest_module_version(id)?;
        self.get_module(id, version)
    }

    pub fn get_latest_module_version(&self, id: &Name) -> Option<Version> {
        self.latest.get(id).copied()
    }

    pub fn module_ids(&self) -> BTreeSet<Name> {
        self.latest.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Module>> {
        self.modules.values()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Keeps only modules satisfying `predicate`. The latest index is
    /// rebuilt from scratch; this is the one bulk operation that rescans.
    pub fn retain(&mut self, mut predicate: impl FnMut(&Arc<Module>) -> bool) {
        self.modules.retain(|_, module| predicate(module));
        self.latest.clear();
        for (id, version) in self.modules.keys() {
            let entry = self.latest.entry(id.clone()).or_insert(*version);
            if *version > *entry {
                *entry = *version;
            }
        }
    }

    pub fn clear(&mut self) {
        self.modules.clear();
        self.latest.clear();
    }
}
