//! Pluggable sources of asset data.

use crate::asset::AssetData;
use loadstone_core::{Name, ResourceUrn};
use std::collections::BTreeSet;
use std::io;

/// Supplies [`AssetData`] for urns.
///
/// Producers are consulted strictly in registration order, for data and for
/// redirects alike; the first producer with data for a urn wins and later
/// ones are not asked. That order dependence is part of the contract: a
/// producer registered earlier overrides later ones.
pub trait AssetDataProducer<D: AssetData>: Send + Sync {
    /// The urns this producer can currently supply. Best effort: procedural
    /// producers may legitimately answer with nothing.
    fn available_asset_urns(&self) -> BTreeSet<ResourceUrn> {
        BTreeSet::new()
    }

    /// Which modules can supply a resource of this name. Drives partial-urn
    /// resolution.
    fn modules_providing(&self, _resource: &Name) -> BTreeSet<Name> {
        BTreeSet::new()
    }

    /// Maps a urn to its replacement, or returns it unchanged. Redirects
    /// are chased transitively across all producers until a fixed point.
    fn redirect(&self, urn: ResourceUrn) -> ResourceUrn {
        urn
    }

    /// The data for `urn`, or `None` if this producer has nothing for it.
    /// An `Err` is treated by the caller as "no data from this producer",
    /// logged, and the next producer is tried.
    fn get_asset_data(&self, urn: &ResourceUrn) -> io::Result<Option<D>>;
}
