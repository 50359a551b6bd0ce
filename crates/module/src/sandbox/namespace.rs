//! Per-module type visibility, chained in dependency order.

use super::PermissionProvider;
use loadstone_core::Name;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// Where a type lookup landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeResolution {
    /// Supplied by the host's allow-listed API surface.
    HostApi,
    /// Supplied by the named module.
    Module(Name),
}

/// One link in an environment's visibility chain.
///
/// A namespace sees its own types unconditionally, allow-listed host API
/// types through its permission provider, and the types of its dependency
/// chain gated by the same provider. Dependents are never visible to their
/// dependencies.
pub struct ModuleNamespace {
    module: Name,
    parent: Option<Arc<ModuleNamespace>>,
    types: HashSet<String>,
    permissions: Arc<dyn PermissionProvider>,
    released: AtomicBool,
}

impl ModuleNamespace {
    pub fn new(
        module: Name,
        parent: Option<Arc<ModuleNamespace>>,
        types: HashSet<String>,
        permissions: Arc<dyn PermissionProvider>,
    ) -> Self {
        Self {
            module,
            parent,
            types,
            permissions,
            released: AtomicBool::new(false),
        }
    }

    pub fn module(&self) -> &Name {
        &self.module
    }

    /// Resolves `type_name` for code running in this namespace.
    ///
    /// A sandbox denial is a failed lookup, logged with the offending type
    /// and module; it never panics and never aborts the environment.
    pub fn resolve_type(&self, type_name: &str) -> Option<TypeResolution> {
        if self.is_released() {
            debug!(module = %self.module, type_name, "type lookup on released namespace");
            return None;
        }
        if self.types.contains(type_name) {
            return Some(TypeResolution::Module(self.module.clone()));
        }

        // walk the dependency chain for a module that owns the type
        let mut ancestor = self.parent.as_deref();
        while let Some(link) = ancestor {
            if link.types.contains(type_name) {
                return if self.permissions.is_permitted_type(type_name) {
                    Some(TypeResolution::Module(link.module.clone()))
                } else {
                    warn!(module = %self.module, type_name, "sandbox denied access to module type");
                    None
                };
            }
            ancestor = link.parent.as_deref();
        }

        // not module-provided; allow-listed host API is the last resort
        if self.permissions.is_permitted_type(type_name) {
            Some(TypeResolution::HostApi)
        } else {
            warn!(module = %self.module, type_name, "sandbox denied access to type");
            None
        }
    }

    /// Whether code in this namespace may exercise `permission` while going
    /// through `context_type`.
    pub fn check_permission(
        &self,
        permission: &super::Permission,
        context_type: &str,
    ) -> bool {
        let permitted = !self.is_released() && self.permissions.is_permitted(permission, context_type);
        if !permitted {
            warn!(module = %self.module, %permission, context_type, "sandbox denied permission");
        }
        permitted
    }

    pub fn release(&self) {
        self.released.store(true, Ordering::Release);
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }
}
