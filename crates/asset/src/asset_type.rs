//! The per-Asset-subtype registry: load, cache, reload, dispose.

use crate::asset::{Asset, AssetFactory};
use crate::error::{AssetError, Result};
use crate::producer::AssetDataProducer;
use crate::resolve::{ContextPreferredStrategy, ResolutionStrategy};
use dashmap::DashMap;
use loadstone_core::{Name, ResourceUrn};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use tracing::{debug, warn};

/// Bound on redirect chasing; a chain this deep is a producer bug.
const MAX_REDIRECT_HOPS: usize = 32;

/// Records slots that were reclaimed by dropping their last handle, so a
/// later [`AssetType::process_disposal`] sweep can prune the bookkeeping.
#[derive(Default)]
struct DisposalQueue {
    pending: Mutex<Vec<ResourceUrn>>,
}

impl DisposalQueue {
    fn push(&self, urn: ResourceUrn) {
        self.pending.lock().unwrap().push(urn);
    }

    fn drain(&self) -> Vec<ResourceUrn> {
        std::mem::take(&mut *self.pending.lock().unwrap())
    }
}

/// Shared storage for one loaded asset. Identity lives here: every handle
/// to the same urn points at the same slot.
struct AssetSlot<A: Asset> {
    urn: ResourceUrn,
    contents: RwLock<Option<A>>,
    disposed: AtomicBool,
    queue: Arc<DisposalQueue>,
}

impl<A: Asset> AssetSlot<A> {
    fn new(urn: ResourceUrn, asset: A, queue: Arc<DisposalQueue>) -> Self {
        Self {
            urn,
            contents: RwLock::new(Some(asset)),
            disposed: AtomicBool::new(false),
            queue,
        }
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Runs the tear-down hook exactly once. Returns whether this call did
    /// the transition.
    fn dispose(&self) -> bool {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return false;
        }
        if let Some(mut asset) = self.contents.write().unwrap().take() {
            asset.on_dispose();
        }
        true
    }

    fn reload(&self, data: A::Data) -> Result<()> {
        let mut contents = self.contents.write().unwrap();
        match contents.as_mut() {
            Some(asset) if !self.is_disposed() => {
                asset.reload(data);
                Ok(())
            }
            _ => Err(AssetError::Disposed {
                urn: self.urn.clone(),
            }),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&A) -> R) -> Result<R> {
        let contents = self.contents.read().unwrap();
        match contents.as_ref() {
            Some(asset) if !self.is_disposed() => Ok(f(asset)),
            _ => Err(AssetError::Disposed {
                urn: self.urn.clone(),
            }),
        }
    }
}

impl<A: Asset> Drop for AssetSlot<A> {
    fn drop(&mut self) {
        // reclaimed without an explicit dispose: run the hook now and leave
        // a note for the next disposal sweep
        if !self.disposed.swap(true, Ordering::AcqRel) {
            if let Some(asset) = self.contents.get_mut().unwrap().as_mut() {
                asset.on_dispose();
            }
            self.queue.push(self.urn.clone());
        }
    }
}

/// A shared handle to a loaded asset.
///
/// Handles are cheap to clone and all point at the same underlying slot.
/// Once disposed, the asset stays disposed: reads and reloads fail with
/// [`AssetError::Disposed`].
pub struct AssetRef<A: Asset> {
    slot: Arc<AssetSlot<A>>,
    owner: Weak<AssetTypeState<A>>,
}

impl<A: Asset> AssetRef<A> {
    pub fn urn(&self) -> &ResourceUrn {
        &self.slot.urn
    }

    pub fn is_disposed(&self) -> bool {
        self.slot.is_disposed()
    }

    /// Runs `f` against the asset contents under a read lock.
    pub fn with<R>(&self, f: impl FnOnce(&A) -> R) -> Result<R> {
        self.slot.with(f)
    }

    /// Swaps the asset's contents in place, keeping its identity.
    pub fn reload(&self, data: A::Data) -> Result<()> {
        self.slot.reload(data)
    }

    /// Disposes the asset and tells the owning type to forget it.
    /// Idempotent.
    pub fn dispose(&self) {
        if self.slot.dispose()
            && let Some(state) = self.owner.upgrade()
        {
            state.on_asset_disposed(&self.slot.urn);
        }
    }

    /// Builds an independent copy of this asset, with the instance urn.
    pub fn create_instance(&self) -> Result<Option<AssetRef<A>>> {
        let state = self.owner.upgrade().ok_or(AssetError::TypeClosed {
            type_name: std::any::type_name::<A>(),
        })?;
        AssetType { state }.create_instance(self)
    }

    fn same_slot(&self, other: &AssetRef<A>) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }

    /// Whether two handles point at the same underlying asset.
    pub fn same_asset(left: &AssetRef<A>, right: &AssetRef<A>) -> bool {
        left.same_slot(right)
    }
}

impl<A: Asset> Clone for AssetRef<A> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
            owner: Weak::clone(&self.owner),
        }
    }
}

impl<A: Asset> fmt::Debug for AssetRef<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetRef")
            .field("urn", &self.slot.urn)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Per-urn mutual exclusion for loads. Created lazily, removed from the
/// lock map once no thread is queued on it, so the map never grows without
/// bound.
#[derive(Default)]
struct UrnLock {
    guard: Mutex<()>,
    waiters: AtomicUsize,
}

struct AssetTypeState<A: Asset> {
    factory: Box<dyn AssetFactory<A>>,
    producers: RwLock<Vec<Arc<dyn AssetDataProducer<A::Data>>>>,
    strategy: RwLock<Arc<dyn ResolutionStrategy>>,
    loaded: DashMap<ResourceUrn, Arc<AssetSlot<A>>>,
    instances: Mutex<HashMap<ResourceUrn, Vec<Weak<AssetSlot<A>>>>>,
    locks: Mutex<HashMap<ResourceUrn, Arc<UrnLock>>>,
    queue: Arc<DisposalQueue>,
    closed: AtomicBool,
}

impl<A: Asset> AssetTypeState<A> {
    fn on_asset_disposed(&self, urn: &ResourceUrn) {
        if urn.is_instance() {
            self.prune_instances(&urn.parent_urn());
        } else {
            self.loaded.remove_if(urn, |_, slot| slot.is_disposed());
            self.dispose_instances_of(urn);
        }
    }

    /// Drops dead and disposed entries from a parent's instance list.
    fn prune_instances(&self, parent: &ResourceUrn) {
        let mut instances = self.instances.lock().unwrap();
        if let Some(children) = instances.get_mut(parent) {
            children.retain(|weak| weak.upgrade().is_some_and(|slot| !slot.is_disposed()));
            if children.is_empty() {
                instances.remove(parent);
            }
        }
    }

    /// Disposes every live instance derived from `parent`.
    fn dispose_instances_of(&self, parent: &ResourceUrn) {
        let children = self.instances.lock().unwrap().remove(parent);
        for weak in children.into_iter().flatten() {
            if let Some(slot) = weak.upgrade() {
                slot.dispose();
            }
        }
    }
}

/// The registry for exactly one [`Asset`] subtype.
///
/// Thread-safe throughout: lookups are non-blocking reads on concurrent
/// maps, and loads racing on the same urn serialize through a per-urn lock
/// so the factory builds a given urn at most once concurrently.
pub struct AssetType<A: Asset> {
    state: Arc<AssetTypeState<A>>,
}

impl<A: Asset> Clone for AssetType<A> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<A: Asset> AssetType<A> {
    pub fn new(factory: impl AssetFactory<A> + 'static) -> Self {
        Self {
            state: Arc::new(AssetTypeState {
                factory: Box::new(factory),
                producers: RwLock::new(Vec::new()),
                strategy: RwLock::new(Arc::new(ContextPreferredStrategy)),
                loaded: DashMap::new(),
                instances: Mutex::new(HashMap::new()),
                locks: Mutex::new(HashMap::new()),
                queue: Arc::new(DisposalQueue::default()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Appends a producer. Registration order is consultation order.
    pub fn add_producer(&self, producer: Arc<dyn AssetDataProducer<A::Data>>) {
        self.state.producers.write().unwrap().push(producer);
    }

    pub fn with_producer(self, producer: Arc<dyn AssetDataProducer<A::Data>>) -> Self {
        self.add_producer(producer);
        self
    }

    pub fn set_resolution_strategy(&self, strategy: Arc<dyn ResolutionStrategy>) {
        *self.state.strategy.write().unwrap() = strategy;
    }

    fn check_open(&self) -> Result<()> {
        if self.state.closed.load(Ordering::Acquire) {
            Err(AssetError::TypeClosed {
                type_name: std::any::type_name::<A>(),
            })
        } else {
            Ok(())
        }
    }

    fn handle(&self, slot: Arc<AssetSlot<A>>) -> AssetRef<A> {
        AssetRef {
            slot,
            owner: Arc::downgrade(&self.state),
        }
    }

    /// The asset for `urn`, loading it from producers if needed.
    ///
    /// Instance urns always yield an independent copy; normal urns follow
    /// redirects to the canonical urn and are deduplicated against the
    /// loaded map. `Ok(None)` means no producer has data, which is a
    /// negative result, not an error.
    pub fn get_asset(&self, urn: &ResourceUrn) -> Result<Option<AssetRef<A>>> {
        self.check_open()?;
        if urn.is_instance() {
            let Some(parent) = self.get_asset(&urn.parent_urn())? else {
                return Ok(None);
            };
            return self.create_instance(&parent);
        }

        let canonical = self.follow_redirects(urn);
        if let Some(slot) = self.state.loaded.get(&canonical) {
            return Ok(Some(self.handle(Arc::clone(slot.value()))));
        }
        let original = (*urn != canonical).then(|| urn.clone());
        match self.fetch_data(&canonical, original.as_ref()) {
            Some(data) => self.load_asset(canonical, data).map(Some),
            None => Ok(None),
        }
    }

    /// Loads or reloads `urn` with explicit data.
    ///
    /// For a normal urn at most one caller runs the factory; concurrent
    /// callers block on the per-urn lock and observe the winner's asset,
    /// reloading it with their data in turn. Instance urns always build a
    /// fresh, never-deduplicated asset tracked only by a weak reference.
    pub fn load_asset(&self, urn: ResourceUrn, data: A::Data) -> Result<AssetRef<A>> {
        self.check_open()?;
        if urn.is_instance() {
            return self.build_instance(urn, data);
        }

        if let Some(slot) = self.state.loaded.get(&urn) {
            let slot = Arc::clone(slot.value());
            slot.reload(data)?;
            return Ok(self.handle(slot));
        }

        let lock = self.acquire_urn_lock(&urn);
        let guard = lock.guard.lock().unwrap();
        let result = match self.state.loaded.get(&urn).map(|s| Arc::clone(s.value())) {
            Some(slot) => slot.reload(data).map(|_| self.handle(slot)),
            None => self.state.factory.build(&urn, data).map(|asset| {
                let slot = Arc::new(AssetSlot::new(
                    urn.clone(),
                    asset,
                    Arc::clone(&self.state.queue),
                ));
                self.state.loaded.insert(urn.clone(), Arc::clone(&slot));
                self.handle(slot)
            }),
        };
        drop(guard);
        self.release_urn_lock(&urn, lock);
        result
    }

    fn build_instance(&self, urn: ResourceUrn, data: A::Data) -> Result<AssetRef<A>> {
        let asset = self.state.factory.build(&urn, data)?;
        let slot = Arc::new(AssetSlot::new(
            urn.clone(),
            asset,
            Arc::clone(&self.state.queue),
        ));
        self.state
            .instances
            .lock()
            .unwrap()
            .entry(urn.parent_urn())
            .or_default()
            .push(Arc::downgrade(&slot));
        Ok(self.handle(slot))
    }

    /// An independent copy of `asset` under its instance urn, from the
    /// asset's own data snapshot when the type supports copying, otherwise
    /// rebuilt from producer data.
    pub fn create_instance(&self, asset: &AssetRef<A>) -> Result<Option<AssetRef<A>>> {
        self.check_open()?;
        let instance_urn = asset.urn().instance_urn();
        if let Some(data) = asset.with(|a| a.copy_data())? {
            return self.load_asset(instance_urn, data).map(Some);
        }
        match self.fetch_data(asset.urn(), None) {
            Some(data) => self.load_asset(instance_urn, data).map(Some),
            None => {
                debug!(urn = %asset.urn(), "no data available to instantiate asset");
                Ok(None)
            }
        }
    }

    /// Asks every producer, registration order, first data wins. A failing
    /// producer is logged and skipped, it never aborts the loop.
    fn fetch_data(&self, urn: &ResourceUrn, original: Option<&ResourceUrn>) -> Option<A::Data> {
        let producers = self.state.producers.read().unwrap();
        for producer in producers.iter() {
            match producer.get_asset_data(urn) {
                Ok(Some(data)) => return Some(data),
                Ok(None) => continue,
                Err(error) => match original {
                    Some(original) => {
                        warn!(urn = %urn, redirected_from = %original, %error, "producer failed to supply asset data");
                    }
                    None => {
                        warn!(urn = %urn, %error, "producer failed to supply asset data");
                    }
                },
            }
        }
        None
    }

    /// Chases redirects across all producers to a fixed point.
    fn follow_redirects(&self, urn: &ResourceUrn) -> ResourceUrn {
        let producers = self.state.producers.read().unwrap();
        let mut current = urn.clone();
        for _ in 0..MAX_REDIRECT_HOPS {
            let mut next = current.clone();
            for producer in producers.iter() {
                next = producer.redirect(next);
            }
            if next == current {
                return current;
            }
            debug!(from = %current, to = %next, "following asset redirect");
            current = next;
        }
        warn!(urn = %urn, target = %current, "redirect chain did not converge");
        current
    }

    /// Re-resolves every loaded asset against the current producers:
    /// redirected or data-less assets are disposed (with their instances),
    /// the rest reload in place. This is how swapping the active module set
    /// invalidates stale content without a restart.
    pub fn refresh(&self) {
        if self.check_open().is_err() {
            return;
        }
        let snapshot: Vec<(ResourceUrn, Arc<AssetSlot<A>>)> = self
            .state
            .loaded
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();
        for (urn, slot) in snapshot {
            let target = self.follow_redirects(&urn);
            if target != urn {
                debug!(from = %urn, to = %target, "asset redirected away, disposing");
                self.dispose(&urn);
                continue;
            }
            match self.fetch_data(&urn, None) {
                Some(data) => {
                    if let Err(error) = slot.reload(data) {
                        debug!(urn = %urn, %error, "skipping refresh of disposed asset");
                    }
                }
                None => {
                    debug!(urn = %urn, "no producer supplies asset anymore, disposing");
                    self.dispose(&urn);
                }
            }
        }
    }

    /// Disposes the asset under `urn` and, for a normal urn, every live
    /// instance derived from it.
    pub fn dispose(&self, urn: &ResourceUrn) {
        if urn.is_instance() {
            let parent = urn.parent_urn();
            let candidates: Vec<Arc<AssetSlot<A>>> = {
                let instances = self.state.instances.lock().unwrap();
                instances
                    .get(&parent)
                    .into_iter()
                    .flatten()
                    .filter_map(Weak::upgrade)
                    .filter(|slot| slot.urn == *urn)
                    .collect()
            };
            for slot in candidates {
                slot.dispose();
            }
            self.state.prune_instances(&parent);
            return;
        }
        if let Some((_, slot)) = self.state.loaded.remove(urn) {
            slot.dispose();
        }
        self.state.dispose_instances_of(urn);
    }

    /// Drains the queue of assets reclaimed by handle drops and prunes dead
    /// instance bookkeeping. Safe to call from any thread; typically driven
    /// by one maintenance tick.
    pub fn process_disposal(&self) -> usize {
        let reclaimed = self.state.queue.drain();
        for urn in &reclaimed {
            debug!(urn = %urn, "asset reclaimed");
        }
        let mut instances = self.state.instances.lock().unwrap();
        instances.retain(|_, children| {
            children.retain(|weak| weak.upgrade().is_some_and(|slot| !slot.is_disposed()));
            !children.is_empty()
        });
        reclaimed.len()
    }

    pub fn is_loaded(&self, urn: &ResourceUrn) -> bool {
        self.state.loaded.contains_key(urn)
    }

    pub fn loaded_asset_urns(&self) -> BTreeSet<ResourceUrn> {
        self.state
            .loaded
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Everything the registered producers can currently supply.
    pub fn available_asset_urns(&self) -> BTreeSet<ResourceUrn> {
        let producers = self.state.producers.read().unwrap();
        producers
            .iter()
            .flat_map(|producer| producer.available_asset_urns())
            .collect()
    }

    /// Expands a possibly-partial urn string into candidate urns.
    ///
    /// A fully valid urn string is its own sole candidate. Otherwise the
    /// producers are asked which modules supply the resource name and the
    /// resolution strategy narrows the set against `context`.
    pub fn resolve(&self, input: &str, context: Option<&Name>) -> Vec<ResourceUrn> {
        if self.check_open().is_err() {
            return Vec::new();
        }
        if ResourceUrn::is_valid(input) {
            // cannot fail, validity was just checked
            return vec![input.parse().expect("validated urn")];
        }

        let (body, instance) = match input.strip_suffix("!instance") {
            Some(body) => (body, true),
            None => (input, false),
        };
        let (resource, fragment) = match body.split_once('#') {
            Some((resource, fragment)) => (resource, Some(fragment)),
            None => (body, None),
        };

        let resource = Name::from(resource);
        let candidates: BTreeSet<Name> = {
            let producers = self.state.producers.read().unwrap();
            producers
                .iter()
                .flat_map(|producer| producer.modules_providing(&resource))
                .collect()
        };
        let narrowed = self.state.strategy.read().unwrap().resolve(context, candidates);

        narrowed
            .into_iter()
            .map(|module| {
                let urn = match fragment {
                    Some(fragment) => ResourceUrn::with_fragment(module, resource.clone(), fragment),
                    None => ResourceUrn::new(module, resource.clone()),
                };
                if instance { urn.instance_urn() } else { urn }
            })
            .collect()
    }

    /// Disposes everything and refuses further loads. Terminal.
    pub fn close(&self) {
        if self.state.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let urns: Vec<ResourceUrn> = self
            .state
            .loaded
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        for urn in urns {
            self.dispose(&urn);
        }
        let instances = std::mem::take(&mut *self.state.instances.lock().unwrap());
        for weak in instances.into_values().flatten() {
            if let Some(slot) = weak.upgrade() {
                slot.dispose();
            }
        }
        debug!(type_name = std::any::type_name::<A>(), "asset type closed");
    }

    fn acquire_urn_lock(&self, urn: &ResourceUrn) -> Arc<UrnLock> {
        let mut locks = self.state.locks.lock().unwrap();
        let lock = Arc::clone(
            locks
                .entry(urn.clone())
                .or_insert_with(|| Arc::new(UrnLock::default())),
        );
        // counted while the map mutex is held, so release can tell whether
        // anyone is still queued before dropping the entry
        lock.waiters.fetch_add(1, Ordering::SeqCst);
        lock
    }

    fn release_urn_lock(&self, urn: &ResourceUrn, lock: Arc<UrnLock>) {
        lock.waiters.fetch_sub(1, Ordering::SeqCst);
        let mut locks = self.state.locks.lock().unwrap();
        if let Some(current) = locks.get(urn)
            && Arc::ptr_eq(current, &lock)
            && lock.waiters.load(Ordering::SeqCst) == 0
        {
            locks.remove(urn);
        }
    }

    #[cfg(test)]
    fn pending_urn_locks(&self) -> usize {
        self.state.locks.lock().unwrap().len()
    }
}

impl<A: Asset> fmt::Debug for AssetType<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetType")
            .field("asset", &std::any::type_name::<A>())
            .field("loaded", &self.state.loaded.len())
            .finish()
    }
}
