//! The per-module permission model.
//!
//! Modules are untrusted: what host API surface they may touch, and which
//! privileged operations they may perform, is decided by named
//! [`PermissionSet`]s granted at environment construction. This replaces
//! ambient authority with capabilities handed to each module explicitly.

use crate::module::Module;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

pub mod namespace;

pub use namespace::ModuleNamespace;

/// A named privileged operation, e.g. `"io"` or `"spawn_thread"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Permission(String);

impl Permission {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Permission {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// The package prefix of a `::`-separated type path.
fn package_of(type_name: &str) -> Option<&str> {
    type_name.rfind("::").map(|idx| &type_name[..idx])
}

/// A grantable bundle of API surface and permissions.
///
/// API types/packages listed here become visible to the grantee module.
/// Permissions are either global, or scoped to an API surface: a scoped
/// permission may only be exercised while going through that surface.
#[derive(Debug, Clone, Default)]
pub struct PermissionSet {
    api_types: HashSet<String>,
    api_packages: HashSet<String>,
    granted: HashSet<Permission>,
    scoped_to_types: HashMap<Permission, HashSet<String>>,
    scoped_to_packages: HashMap<Permission, HashSet<String>>,
}

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_api_type(&mut self, type_name: impl Into<String>) {
        self.api_types.insert(type_name.into());
    }

    pub fn add_api_package(&mut self, package: impl Into<String>) {
        self.api_packages.insert(package.into());
    }

    /// Grants `permission` unconditionally.
    pub fn grant(&mut self, permission: impl Into<Permission>) {
        self.granted.insert(permission.into());
    }

    /// Grants `permission` only through `api_type`.
    pub fn grant_to_type(
        &mut self,
        permission: impl Into<Permission>,
        api_type: impl Into<String>,
    ) {
        let api_type = api_type.into();
        self.api_types.insert(api_type.clone());
        self.scoped_to_types
            .entry(permission.into())
            .or_default()
            .insert(api_type);
    }

    /// Grants `permission` only through types in `package`.
    pub fn grant_to_package(
        &mut self,
        permission: impl Into<Permission>,
        package: impl Into<String>,
    ) {
        let package = package.into();
        self.api_packages.insert(package.clone());
        self.scoped_to_packages
            .entry(permission.into())
            .or_default()
            .insert(package);
    }

    pub fn is_permitted_type(&self, type_name: &str) -> bool {
        if self.api_types.contains(type_name) {
            return true;
        }
        package_of(type_name).is_some_and(|package| self.api_packages.contains(package))
    }

    pub fn is_permitted(&self, permission: &Permission, context_type: &str) -> bool {
        if self.granted.contains(permission) {
            return true;
        }
        if self
            .scoped_to_types
            .get(permission)
            .is_some_and(|types| types.contains(context_type))
        {
            return true;
        }
        self.scoped_to_packages
            .get(permission)
            .zip(package_of(context_type))
            .is_some_and(|(packages, package)| packages.contains(package))
    }
}

/// Answers permission queries for one module.
pub trait PermissionProvider: Send + Sync {
    /// May the module's code reference `type_name`?
    fn is_permitted_type(&self, type_name: &str) -> bool;

    /// May the module exercise `permission` while going through
    /// `context_type`?
    fn is_permitted(&self, permission: &Permission, context_type: &str) -> bool;
}

/// Grants whatever any of the underlying sets grant.
pub struct SetPermissionProvider {
    sets: Vec<Arc<PermissionSet>>,
}

impl SetPermissionProvider {
    pub fn new(sets: Vec<Arc<PermissionSet>>) -> Self {
        Self { sets }
    }
}

impl PermissionProvider for SetPermissionProvider {
    fn is_permitted_type(&self, type_name: &str) -> bool {
        self.sets.iter().any(|set| set.is_permitted_type(type_name))
    }

    fn is_permitted(&self, permission: &Permission, context_type: &str) -> bool {
        self.sets
            .iter()
            .any(|set| set.is_permitted(permission, context_type))
    }
}

/// A module's own code is never gated against itself: everything matching
/// the membership predicate is permitted.
pub struct PredicatePermissionProvider {
    predicate: crate::module::TypePredicate,
}

impl PredicatePermissionProvider {
    pub fn new(predicate: crate::module::TypePredicate) -> Self {
        Self { predicate }
    }
}

impl PermissionProvider for PredicatePermissionProvider {
    fn is_permitted_type(&self, type_name: &str) -> bool {
        (self.predicate)(type_name)
    }

    fn is_permitted(&self, _permission: &Permission, context_type: &str) -> bool {
        (self.predicate)(context_type)
    }
}

struct CompositePermissionProvider {
    providers: Vec<Arc<dyn PermissionProvider>>,
}

impl PermissionProvider for CompositePermissionProvider {
    fn is_permitted_type(&self, type_name: &str) -> bool {
        self.providers.iter().any(|p| p.is_permitted_type(type_name))
    }

    fn is_permitted(&self, permission: &Permission, context_type: &str) -> bool {
        self.providers
            .iter()
            .any(|p| p.is_permitted(permission, context_type))
    }
}

/// Builds the [`PermissionProvider`] for each module of an environment.
pub trait PermissionProviderFactory: Send + Sync {
    fn create_provider(&self, module: &Module) -> Arc<dyn PermissionProvider>;
}

/// Registry of named permission sets plus a base set every module gets.
///
/// A module's `required_permissions` select additional sets by name;
/// unknown names are logged and skipped.
#[derive(Default)]
pub struct StandardPermissionProviderFactory {
    base: Arc<PermissionSet>,
    sets: HashMap<String, Arc<PermissionSet>>,
}

impl StandardPermissionProviderFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base(base: PermissionSet) -> Self {
        Self {
            base: Arc::new(base),
            sets: HashMap::new(),
        }
    }

    pub fn register_set(&mut self, name: impl Into<String>, set: PermissionSet) {
        self.sets.insert(name.into(), Arc::new(set));
    }
}

impl PermissionProviderFactory for StandardPermissionProviderFactory {
    fn create_provider(&self, module: &Module) -> Arc<dyn PermissionProvider> {
        let mut granted = vec![Arc::clone(&self.base)];
        for name in &module.metadata().required_permissions {
            match self.sets.get(name) {
                Some(set) => granted.push(Arc::clone(set)),
                None => {
                    warn!(module = %module.id(), set = name, "module requires an unknown permission set");
                }
            }
        }

        let mut providers: Vec<Arc<dyn PermissionProvider>> =
            vec![Arc::new(SetPermissionProvider::new(granted))];
        if let Some(predicate) = module.type_predicate() {
            providers.push(Arc::new(PredicatePermissionProvider::new(Arc::clone(
                predicate,
            ))));
        }
        Arc::new(CompositePermissionProvider { providers })
    }
}
