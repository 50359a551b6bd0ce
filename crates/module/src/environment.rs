//! Composes a set of modules into an active, queryable environment.

use crate::error::{ModuleError, Result};
use crate::manifest::ModuleManifest;
use crate::module::Module;
use crate::sandbox::namespace::ModuleNamespace;
use crate::sandbox::{Permission, PermissionProviderFactory};
use loadstone_core::Name;
use loadstone_core::files::{CompositeFileSource, FileSource};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

pub use crate::sandbox::namespace::TypeResolution;

/// An immutable composition of modules: dependency-ordered, with a chained
/// visibility namespace per code-carrying module, a merged reflective index
/// and a composite view over all module resources.
///
/// Construction is single-threaded and one-shot; afterwards all queries are
/// safe for concurrent readers. [`ModuleEnvironment::close`] retires the
/// environment; a closed environment answers every query empty.
pub struct ModuleEnvironment {
    modules: Vec<Arc<Module>>,
    by_id: HashMap<Name, Arc<Module>>,
    namespaces: HashMap<Name, Arc<ModuleNamespace>>,
    type_index: HashMap<String, Name>,
    merged: ModuleManifest,
    dependencies: HashMap<Name, BTreeSet<Name>>,
    resources: Arc<dyn FileSource>,
    closed: AtomicBool,
    close_warned: AtomicBool,
}

impl std::fmt::Debug for ModuleEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleEnvironment")
            .field("by_id", &self.by_id)
            .field("type_index", &self.type_index)
            .field("dependencies", &self.dependencies)
            .field("closed", &self.closed)
            .field("close_warned", &self.close_warned)
            .finish_non_exhaustive()
    }
}

impl ModuleEnvironment {
    pub fn new(
        modules: Vec<Arc<Module>>,
        permissions: &dyn PermissionProviderFactory,
    ) -> Result<Self> {
        let by_id: HashMap<Name, Arc<Module>> = modules
            .iter()
            .map(|module| (module.id().clone(), Arc::clone(module)))
            .collect();

        let ordered = sort_by_dependencies(&by_id)?;

        // chain namespaces in dependency order; modules without code of
        // their own fall through to the previous link unchanged
        let mut namespaces = HashMap::new();
        let mut previous: Option<Arc<ModuleNamespace>> = None;
        for module in &ordered {
            if module.has_code() {
                let namespace = Arc::new(ModuleNamespace::new(
                    module.id().clone(),
                    previous.clone(),
                    module.manifest().types.iter().cloned().collect(),
                    permissions.create_provider(module),
                ));
                namespaces.insert(module.id().clone(), Arc::clone(&namespace));
                previous = Some(namespace);
            } else if let Some(link) = &previous {
                namespaces.insert(module.id().clone(), Arc::clone(link));
            }
        }

        // merge manifests; the first provider in dependency order wins the
        // type index
        let mut merged = ModuleManifest::default();
        let mut type_index = HashMap::new();
        for module in &ordered {
            for type_name in &module.manifest().types {
                type_index
                    .entry(type_name.clone())
                    .or_insert_with(|| module.id().clone());
            }
            merged.merge(module.manifest());
        }

        let dependencies = transitive_dependencies(&ordered, &by_id);

        let resources: Arc<dyn FileSource> = Arc::new(CompositeFileSource::new(
            ordered
                .iter()
                .map(|module| Arc::clone(module.resources()))
                .collect(),
        ));

        debug!(modules = ordered.len(), "module environment constructed");
        Ok(Self {
            modules: ordered,
            by_id,
            namespaces,
            type_index,
            merged,
            dependencies,
            resources,
            closed: AtomicBool::new(false),
            close_warned: AtomicBool::new(false),
        })
    }

    fn check_open(&self) -> bool {
        if !self.closed.load(Ordering::Acquire) {
            return true;
        }
        if !self.close_warned.swap(true, Ordering::AcqRel) {
            warn!("module environment queried after close");
        }
        false
    }

    /// All modules, dependencies before dependents.
    pub fn modules(&self) -> &[Arc<Module>] {
        if self.check_open() { &self.modules } else { &[] }
    }

    pub fn get(&self, id: &Name) -> Option<&Arc<Module>> {
        if !self.check_open() {
            return None;
        }
        self.by_id.get(id)
    }

    /// The module that provides `type_name`.
    ///
    /// The merged manifest index is authoritative; modules whose types are
    /// not manifest-listed (host-resident packages) are found through their
    /// membership predicate, consulted in dependency order, first match
    /// wins.
    pub fn get_module_providing(&self, type_name: &str) -> Option<Name> {
        if !self.check_open() {
            return None;
        }
        if let Some(id) = self.type_index.get(type_name) {
            return Some(id.clone());
        }
        self.modules
            .iter()
            .find(|module| {
                module
                    .type_predicate()
                    .is_some_and(|predicate| predicate(type_name))
            })
            .map(|module| module.id().clone())
    }

    pub fn get_subtypes_of(&self, interface: &str) -> BTreeSet<String> {
        if !self.check_open() {
            return BTreeSet::new();
        }
        self.merged.subtypes_of(interface)
    }

    pub fn get_types_tagged(&self, tag: &str) -> BTreeSet<String> {
        if !self.check_open() {
            return BTreeSet::new();
        }
        self.merged.types_tagged(tag)
    }

    /// The transitive dependency closure of `id`.
    pub fn dependencies_of(&self, id: &Name) -> BTreeSet<Name> {
        if !self.check_open() {
            return BTreeSet::new();
        }
        self.dependencies.get(id).cloned().unwrap_or_default()
    }

    /// Resolves `type_name` as seen by code of module `requesting`.
    pub fn resolve_type(&self, requesting: &Name, type_name: &str) -> Option<TypeResolution> {
        if !self.check_open() {
            return None;
        }
        self.namespaces.get(requesting)?.resolve_type(type_name)
    }

    /// Whether module `requesting` may exercise `permission` through
    /// `context_type`.
    pub fn check_permission(
        &self,
        requesting: &Name,
        permission: &Permission,
        context_type: &str,
    ) -> bool {
        self.check_open()
            && self
                .namespaces
                .get(requesting)
                .is_some_and(|namespace| namespace.check_permission(permission, context_type))
    }

    /// A composite file source over every module's resources, dependency
    /// order, first match wins.
    pub fn resources(&self) -> Option<&Arc<dyn FileSource>> {
        if self.check_open() {
            Some(&self.resources)
        } else {
            None
        }
    }

    /// Releases every namespace. Idempotent; never aborts part-way.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        for namespace in self.namespaces.values() {
            namespace.release();
        }
        debug!("module environment closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Drop for ModuleEnvironment {
    fn drop(&mut self) {
        self.close();
    }
}

/// Topologically sorts modules so every dependency precedes its dependents.
///
/// Kahn's algorithm with the ready set keyed by module id, so ties always
/// break alphabetically and the order is independent of input iteration
/// order. A dependency cycle is a named error, not a hang.
fn sort_by_dependencies(by_id: &HashMap<Name, Arc<Module>>) -> Result<Vec<Arc<Module>>> {
    let mut graph: DiGraph<Name, ()> = DiGraph::new();
    let mut nodes: BTreeMap<Name, NodeIndex> = BTreeMap::new();

    let mut ids: Vec<&Name> = by_id.keys().collect();
    ids.sort();
    for id in &ids {
        let index = graph.add_node((*id).clone());
        nodes.insert((*id).clone(), index);
    }

    for id in &ids {
        let module = &by_id[*id];
        for dependency in module.dependency_ids() {
            match nodes.get(dependency) {
                Some(&dep_index) => {
                    graph.add_edge(dep_index, nodes[*id], ());
                }
                None => {
                    // absent optional dependencies are normal; absent
                    // required ones are the caller's resolution problem
                    debug!(module = %id, dependency = %dependency, "dependency not in environment");
                }
            }
        }
    }

    let mut indegree: HashMap<NodeIndex, usize> = nodes
        .values()
        .map(|&index| {
            (
                index,
                graph
                    .neighbors_directed(index, petgraph::Direction::Incoming)
                    .count(),
            )
        })
        .collect();

    let mut ready: BTreeMap<Name, NodeIndex> = nodes
        .iter()
        .filter(|(_, index)| indegree[*index] == 0)
        .map(|(id, &index)| (id.clone(), index))
        .collect();

    let mut ordered = Vec::with_capacity(by_id.len());
    while let Some((id, index)) = ready.pop_first() {
        ordered.push(Arc::clone(&by_id[&id]));
        for successor in graph.neighbors_directed(index, petgraph::Direction::Outgoing) {
            let remaining = indegree.get_mut(&successor).unwrap();
            *remaining -= 1;
            if *remaining == 0 {
                ready.insert(graph[successor].clone(), successor);
            }
        }
    }

    if ordered.len() != by_id.len() {
        // alphabetically-first module still stuck on the cycle
        let stuck = nodes
            .iter()
            .find(|(_, index)| indegree[*index] > 0)
            .map(|(id, _)| id.clone())
            .unwrap_or_else(Name::empty);
        return Err(ModuleError::CyclicDependency { module: stuck });
    }

    Ok(ordered)
}

/// Propagates each dependency's own dependencies forward. Modules arrive
/// dependency-first, so every closure needed is already built.
fn transitive_dependencies(
    ordered: &[Arc<Module>],
    by_id: &HashMap<Name, Arc<Module>>,
) -> HashMap<Name, BTreeSet<Name>> {
    let mut closures: HashMap<Name, BTreeSet<Name>> = HashMap::new();
    for module in ordered {
        let mut closure = BTreeSet::new();
        for dependency in module.dependency_ids() {
            if by_id.contains_key(dependency) {
                closure.insert(dependency.clone());
                if let Some(transitive) = closures.get(dependency) {
                    closure.extend(transitive.iter().cloned());
                }
            }
        }
        closures.insert(module.id().clone(), closure);
    }
    closures
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{DependencyInfo, ModuleMetadata};
    use crate::sandbox::StandardPermissionProviderFactory;
    use loadstone_core::Version;
    use loadstone_core::files::EmptyFileSource;

    fn module(id: &str, dependencies: &[&str], types: &[&str]) -> Arc<Module> {
        let mut metadata = ModuleMetadata::new(id, Version::new(1, 0, 0));
        metadata.dependencies = dependencies
            .iter()
            .map(|dep| DependencyInfo::new(*dep, Version::new(1, 0, 0)))
            .collect();
        let mut manifest = ModuleManifest::default();
        manifest.types = types.iter().map(|t| t.to_string()).collect();
        Arc::new(Module::new(
            metadata,
            manifest,
            Arc::new(EmptyFileSource),
            None,
            Vec::new(),
        ))
    }

    fn environment(modules: Vec<Arc<Module>>) -> Result<ModuleEnvironment> {
        ModuleEnvironment::new(modules, &StandardPermissionProviderFactory::new())
    }

    fn order(environment: &ModuleEnvironment) -> Vec<String> {
        environment
            .modules()
            .iter()
            .map(|m| m.id().to_string())
            .collect()
    }

    #[test]
    fn test_dependencies_come_first_regardless_of_input_order() {
        let build = |modules: Vec<Arc<Module>>| order(&environment(modules).unwrap());

        let expected = vec!["c".to_string(), "b".to_string(), "a".to_string()];
        assert_eq!(
            build(vec![
                module("a", &["b"], &[]),
                module("b", &["c"], &[]),
                module("c", &[], &[]),
            ]),
            expected
        );
        assert_eq!(
            build(vec![
                module("c", &[], &[]),
                module("a", &["b"], &[]),
                module("b", &["c"], &[]),
            ]),
            expected
        );
    }

    #[test]
    fn test_independent_modules_order_alphabetically() {
        let env = environment(vec![
            module("zeta", &[], &[]),
            module("alpha", &[], &[]),
            module("mid", &[], &[]),
        ])
        .unwrap();
        assert_eq!(order(&env), vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_cycle_is_a_named_error() {
        let error = environment(vec![
            module("a", &["b"], &[]),
            module("b", &["a"], &[]),
        ])
        .unwrap_err();
        match error {
            ModuleError::CyclicDependency { module } => {
                assert_eq!(module, Name::from("a"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_transitive_dependency_closure() {
        let env = environment(vec![
            module("a", &["b"], &[]),
            module("b", &["c"], &[]),
            module("c", &[], &[]),
        ])
        .unwrap();
        assert_eq!(
            env.dependencies_of(&Name::from("a")),
            BTreeSet::from([Name::from("b"), Name::from("c")])
        );
        assert_eq!(
            env.dependencies_of(&Name::from("c")),
            BTreeSet::new()
        );
    }

    #[test]
    fn test_module_providing_prefers_manifest_over_predicate() {
        let mut metadata = ModuleMetadata::new("pkg", Version::new(1, 0, 0));
        metadata.dependencies = vec![DependencyInfo::new("base", Version::new(1, 0, 0))];
        let package = Arc::new(Module::new(
            metadata,
            ModuleManifest::default(),
            Arc::new(EmptyFileSource),
            Some(Arc::new(|name: &str| name.starts_with("pkg::"))),
            Vec::new(),
        ));

        let env = environment(vec![module("base", &[], &["base::Thing"]), package]).unwrap();
        assert_eq!(
            env.get_module_providing("base::Thing"),
            Some(Name::from("base"))
        );
        assert_eq!(
            env.get_module_providing("pkg::Anything"),
            Some(Name::from("pkg"))
        );
        assert_eq!(env.get_module_providing("nowhere::Thing"), None);
    }

    #[test]
    fn test_merged_reflective_index() {
        let mut manifest = ModuleManifest::default();
        manifest.types.insert("ext::Render".to_string());
        manifest
            .implementations
            .entry("core::System".to_string())
            .or_default()
            .insert("ext::Render".to_string());
        let ext = Arc::new(Module::new(
            ModuleMetadata::new("ext", Version::new(1, 0, 0)),
            manifest,
            Arc::new(EmptyFileSource),
            None,
            Vec::new(),
        ));

        let env = environment(vec![module("base", &[], &[]), ext]).unwrap();
        assert_eq!(
            env.get_subtypes_of("core::System"),
            BTreeSet::from(["ext::Render".to_string()])
        );
    }

    #[test]
    fn test_closed_environment_answers_empty() {
        let env = environment(vec![module("a", &[], &["a::Thing"])]).unwrap();
        env.close();
        assert!(env.modules().is_empty());
        assert_eq!(env.get_module_providing("a::Thing"), None);
        assert!(env.is_closed());
        // close is idempotent
        env.close();
    }
}
