//! The asset runtime's context object.

use crate::asset::Asset;
use crate::asset_type::{AssetRef, AssetType};
use crate::error::{AssetError, Result};
use loadstone_core::{Name, ResourceUrn};
use std::any::{Any, TypeId};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Type-erased view of an [`AssetType`], for bulk maintenance.
trait AnyAssetType: Send + Sync {
    fn refresh(&self);
    fn process_disposal(&self) -> usize;
    fn close(&self);
    fn as_any(&self) -> &dyn Any;
}

impl<A: Asset> AnyAssetType for AssetType<A> {
    fn refresh(&self) {
        AssetType::refresh(self);
    }

    fn process_disposal(&self) -> usize {
        AssetType::process_disposal(self)
    }

    fn close(&self) {
        AssetType::close(self);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Owns the [`AssetType`] registries, keyed by the asset's Rust type.
///
/// Constructed explicitly by the host and passed by reference; asset types
/// are registered up front, at startup, rather than discovered at runtime.
/// Shut down explicitly (or on drop) to dispose everything.
#[derive(Default)]
pub struct AssetManager {
    types: HashMap<TypeId, Box<dyn AnyAssetType>>,
}

impl AssetManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the registry for asset type `A`. Re-registering replaces
    /// the previous registry without disposing its assets; callers that
    /// need that should close it first.
    pub fn register_type<A: Asset>(&mut self, assets: AssetType<A>) {
        self.types.insert(TypeId::of::<A>(), Box::new(assets));
        debug!(type_name = std::any::type_name::<A>(), "registered asset type");
    }

    pub fn get_type<A: Asset>(&self) -> Result<&AssetType<A>> {
        self.types
            .get(&TypeId::of::<A>())
            .and_then(|erased| erased.as_any().downcast_ref::<AssetType<A>>())
            .ok_or(AssetError::UnknownAssetType {
                type_name: std::any::type_name::<A>(),
            })
    }

    pub fn get_asset<A: Asset>(&self, urn: &ResourceUrn) -> Result<Option<AssetRef<A>>> {
        self.get_type::<A>()?.get_asset(urn)
    }

    pub fn load_asset<A: Asset>(&self, urn: ResourceUrn, data: A::Data) -> Result<AssetRef<A>> {
        self.get_type::<A>()?.load_asset(urn, data)
    }

    pub fn is_loaded<A: Asset>(&self, urn: &ResourceUrn) -> bool {
        self.get_type::<A>()
            .map(|assets| assets.is_loaded(urn))
            .unwrap_or(false)
    }

    pub fn loaded_asset_urns<A: Asset>(&self) -> BTreeSet<ResourceUrn> {
        self.get_type::<A>()
            .map(|assets| assets.loaded_asset_urns())
            .unwrap_or_default()
    }

    pub fn available_asset_urns<A: Asset>(&self) -> BTreeSet<ResourceUrn> {
        self.get_type::<A>()
            .map(|assets| assets.available_asset_urns())
            .unwrap_or_default()
    }

    pub fn resolve<A: Asset>(&self, input: &str, context: Option<&Name>) -> Vec<ResourceUrn> {
        self.get_type::<A>()
            .map(|assets| assets.resolve(input, context))
            .unwrap_or_default()
    }

    /// Re-resolves every loaded asset of every type against its producers.
    pub fn refresh_all(&self) {
        for assets in self.types.values() {
            assets.refresh();
        }
    }

    /// Drains every type's disposal queue. Returns how many assets were
    /// reclaimed since the last sweep.
    pub fn process_disposal(&self) -> usize {
        self.types
            .values()
            .map(|assets| assets.process_disposal())
            .sum()
    }

    /// Disposes everything. The manager stays usable only for queries that
    /// answer empty.
    pub fn shutdown(&self) {
        for assets in self.types.values() {
            assets.close();
        }
    }
}

impl Drop for AssetManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
