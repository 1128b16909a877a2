//! Per-unit resolution cache.
//!
//! Each compiled unit gets at most one resolution for as long as it lives.
//! The outcome is stored write-once: either the owning function (holding a
//! strong reference so it outlives the lookup) or a negative [`CacheEntry::NoOwner`]
//! sentinel so ownerless units are never rescanned. A negative entry stays
//! stale if a function is later bound to the unit.
//!
//! Entries are released when the host reports the unit destroyed, through
//! the [`UnitObserver`] impl.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;

use callguard_core::{FunctionObject, UnitId, UnitObserver};

/// The memoized outcome of resolving one unit.
#[derive(Debug, Clone)]
pub enum CacheEntry {
    /// Resolution ran and found no function referrer.
    NoOwner,
    /// The owning function. The cache holds one strong reference.
    Owner(Arc<FunctionObject>),
}

impl CacheEntry {
    pub fn owner(&self) -> Option<&Arc<FunctionObject>> {
        match self {
            CacheEntry::NoOwner => None,
            CacheEntry::Owner(function) => Some(function),
        }
    }
}

impl From<Option<Arc<FunctionObject>>> for CacheEntry {
    fn from(owner: Option<Arc<FunctionObject>>) -> Self {
        owner.map_or(CacheEntry::NoOwner, CacheEntry::Owner)
    }
}

/// Per-unit state: the resolution outcome and whether a contract fault has
/// already been reported for the unit.
#[derive(Default)]
struct Slot {
    entry: OnceLock<CacheEntry>,
    faulted: AtomicBool,
}

/// Write-once side table keyed by unit.
///
/// The host must not destroy a unit while a call of it is in flight. A
/// lookup for a unit that was already destroyed creates a slot that is never
/// released, since no further destruction notice will arrive for it.
#[derive(Default)]
pub struct ResolutionCache {
    slots: DashMap<UnitId, Arc<Slot>>,
    resolutions: AtomicU64,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached entry for `unit`, running `resolve` on first use.
    ///
    /// Concurrent first calls for the same unit run `resolve` once; the others
    /// wait for its result. The map shard is not locked while `resolve` runs.
    pub fn get_or_resolve<F>(&self, unit: UnitId, resolve: F) -> CacheEntry
    where
        F: FnOnce() -> Option<Arc<FunctionObject>>,
    {
        let slot = self.slots.entry(unit).or_default().clone();
        slot.entry.get_or_init(|| {
            self.resolutions.fetch_add(1, Ordering::Relaxed);
            CacheEntry::from(resolve())
        })
        .clone()
    }

    /// The entry for `unit`, if resolution has completed.
    pub fn peek(&self, unit: UnitId) -> Option<CacheEntry> {
        self.slots.get(&unit).and_then(|slot| slot.entry.get().cloned())
    }

    /// Records a contract fault for `unit`. Returns true only for the first
    /// fault since the unit's slot was created.
    pub fn mark_faulted(&self, unit: UnitId) -> bool {
        self.slots
            .get(&unit)
            .is_some_and(|slot| !slot.faulted.swap(true, Ordering::Relaxed))
    }

    /// Drops the entry for `unit`, releasing any owner reference.
    pub fn release(&self, unit: UnitId) -> bool {
        self.slots.remove(&unit).is_some()
    }

    /// Number of units with a slot.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Total resolutions performed since creation.
    pub fn resolutions(&self) -> u64 {
        self.resolutions.load(Ordering::Relaxed)
    }
}

impl UnitObserver for ResolutionCache {
    fn on_unit_destroyed(&self, unit: UnitId) {
        if self.release(unit) {
            tracing::trace!(%unit, "released cached resolution");
        }
    }
}
