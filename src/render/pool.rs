//! Reuse pool for renderable cell units.
//!
//! Handles are keyed by a stable string (usually [`cell_key`]) while active
//! and kept unkeyed on a free list while pooled. The pool never knows what a
//! handle is; the rendering layer supplies a [`CellLifecycle`] that creates,
//! recycles, cleans up and destroys them.
//!
//! `max_size` is a soft cap. [`CellPool::acquire`] always succeeds and may
//! overshoot it; [`CellPool::release`] restores the bound by destroying
//! handles instead of pooling them.

use std::collections::hash_map::Entry;
use std::collections::HashSet;
use std::hash::BuildHasher;

use rustc_hash::FxHashMap;
use serde::Serialize;

/// Callbacks supplied by the rendering layer.
pub trait CellLifecycle {
    type Handle;

    /// Build a fresh handle.
    fn create(&mut self) -> Self::Handle;

    /// Prepare a pooled handle for reuse under `key`.
    fn recycle(&mut self, _handle: &mut Self::Handle, _key: &str) {}

    /// Called when a handle leaves the active set.
    fn cleanup(&mut self, _handle: &mut Self::Handle) {}

    /// Called for handles the pool drops for good.
    fn destroy(&mut self, _handle: Self::Handle) {}
}

/// Pool counters for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStats {
    pub active: usize,
    pub pooled: usize,
    pub total: usize,
    /// Lifetime count of `create` calls.
    pub created: u64,
    /// Lifetime count of handles taken back off the free list.
    pub reused: u64,
    /// Lifetime count of `destroy` calls.
    pub destroyed: u64,
}

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    created: u64,
    reused: u64,
    destroyed: u64,
}

/// Composite key for the cell at `(row, col)`.
pub fn cell_key(row: usize, col: usize) -> String {
    format!("{row}-{col}")
}

pub struct CellPool<L: CellLifecycle> {
    lifecycle: L,
    active: FxHashMap<String, L::Handle>,
    available: Vec<L::Handle>,
    max_size: usize,
    counters: Counters,
}

impl<L: CellLifecycle> CellPool<L> {
    /// Create a pool holding `min(initial_size, max_size)` ready handles.
    pub fn new(mut lifecycle: L, initial_size: usize, max_size: usize) -> Self {
        let initial = initial_size.min(max_size);
        let available: Vec<_> = (0..initial).map(|_| lifecycle.create()).collect();
        tracing::debug!(initial, max_size, "cell pool created");
        Self {
            lifecycle,
            active: FxHashMap::default(),
            available,
            max_size,
            counters: Counters {
                created: initial as u64,
                ..Counters::default()
            },
        }
    }

    /// Handle for `key`, activating one if needed.
    ///
    /// Idempotent while `key` stays active. Otherwise a pooled handle is
    /// recycled, or a new one is created when the free list is empty (even
    /// past `max_size`).
    pub fn acquire(&mut self, key: &str) -> &mut L::Handle {
        let total = self.active.len() + self.available.len();
        let Self {
            lifecycle,
            active,
            available,
            max_size,
            counters,
        } = self;

        match active.entry(key.to_owned()) {
            Entry::Occupied(slot) => slot.into_mut(),
            Entry::Vacant(slot) => {
                let handle = if let Some(mut handle) = available.pop() {
                    lifecycle.recycle(&mut handle, key);
                    counters.reused += 1;
                    handle
                } else {
                    if total >= *max_size {
                        tracing::trace!(key, total, max_size = *max_size, "cell pool over capacity");
                    }
                    counters.created += 1;
                    lifecycle.create()
                };
                slot.insert(handle)
            }
        }
    }

    /// Move `key` back to the free list, or destroy its handle if the pool is
    /// at capacity. Returns `false` if `key` was not active.
    pub fn release(&mut self, key: &str) -> bool {
        let Some(mut handle) = self.active.remove(key) else {
            return false;
        };
        self.lifecycle.cleanup(&mut handle);
        if self.active.len() + self.available.len() >= self.max_size {
            self.lifecycle.destroy(handle);
            self.counters.destroyed += 1;
        } else {
            self.available.push(handle);
        }
        true
    }

    /// Release every active key not in `keep`. Returns how many were released.
    pub fn release_except<S: BuildHasher>(&mut self, keep: &HashSet<String, S>) -> usize {
        let doomed: Vec<String> = self
            .active
            .keys()
            .filter(|key| !keep.contains(key.as_str()))
            .cloned()
            .collect();
        for key in &doomed {
            self.release(key);
        }
        doomed.len()
    }

    /// Clean up and destroy every handle, active and pooled.
    pub fn clear(&mut self) {
        let active = self.active.len();
        let pooled = self.available.len();
        for (_, mut handle) in self.active.drain() {
            self.lifecycle.cleanup(&mut handle);
            self.lifecycle.destroy(handle);
        }
        for handle in self.available.drain(..) {
            self.lifecycle.destroy(handle);
        }
        self.counters.destroyed += (active + pooled) as u64;
        tracing::debug!(active, pooled, "cell pool cleared");
    }

    /// Destroy pooled handles, keeping active ones. Returns how many went.
    pub fn shrink_to_fit(&mut self) -> usize {
        let dropped = self.available.len();
        for handle in self.available.drain(..) {
            self.lifecycle.destroy(handle);
        }
        self.counters.destroyed += dropped as u64;
        dropped
    }

    pub fn get(&self, key: &str) -> Option<&L::Handle> {
        self.active.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut L::Handle> {
        self.active.get_mut(key)
    }

    pub fn is_active(&self, key: &str) -> bool {
        self.active.contains_key(key)
    }

    /// Active keys, in no particular order.
    pub fn active_keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.active.keys().map(String::as_str)
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn lifecycle(&self) -> &L {
        &self.lifecycle
    }

    pub fn lifecycle_mut(&mut self) -> &mut L {
        &mut self.lifecycle
    }

    pub fn stats(&self) -> PoolStats {
        let active = self.active.len();
        let pooled = self.available.len();
        PoolStats {
            active,
            pooled,
            total: active + pooled,
            created: self.counters.created,
            reused: self.counters.reused,
            destroyed: self.counters.destroyed,
        }
    }
}

impl<L> std::fmt::Debug for CellPool<L>
where
    L: CellLifecycle,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CellPool")
            .field("stats", &self.stats())
            .field("max_size", &self.max_size)
            .finish_non_exhaustive()
    }
}
