//! The user-facing asset contracts.

use crate::error::Result;
use loadstone_core::ResourceUrn;

/// An implementation-agnostic payload used to build or rebuild an asset.
///
/// Marker trait: asset data carries no behavior of its own, it is whatever a
/// producer hands to the factory.
pub trait AssetData: Send + Sync + 'static {}

/// A typed, urn-keyed, hot-reloadable resource.
///
/// Implementations hold the live form of the resource (GPU handles, decoded
/// buffers, ...). The runtime drives the lifecycle; implementors only say
/// how to swap contents on reload, how to snapshot data for instance copies
/// and how to tear down native handles.
pub trait Asset: Send + Sync + Sized + 'static {
    type Data: AssetData;

    /// Replaces this asset's contents in place. Identity (urn, handle)
    /// stays; content changes. This is the hot-reload path.
    fn reload(&mut self, data: Self::Data);

    /// Snapshots this asset's current state as data an independent copy can
    /// be built from. `None` means the type does not support direct
    /// copying; instances are then rebuilt from producer data instead.
    fn copy_data(&self) -> Option<Self::Data> {
        None
    }

    /// Tear-down hook, run exactly once when the asset is disposed.
    fn on_dispose(&mut self) {}
}

/// Builds assets from producer-supplied data.
pub trait AssetFactory<A: Asset>: Send + Sync {
    fn build(&self, urn: &ResourceUrn, data: A::Data) -> Result<A>;
}

/// Any `Fn(&ResourceUrn, Data) -> Result<A>` works as a factory.
impl<A, F> AssetFactory<A> for F
where
    A: Asset,
    F: Fn(&ResourceUrn, A::Data) -> Result<A> + Send + Sync,
{
    fn build(&self, urn: &ResourceUrn, data: A::Data) -> Result<A> {
        self(urn, data)
    }
}
