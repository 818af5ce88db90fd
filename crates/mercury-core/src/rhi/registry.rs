// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Per-device generational arena mapping handles to frontend records.

use super::handle::{Handle, ResourceKind};

/// A dense arena of records addressed by [`Handle<K>`].
///
/// Freed indices go on a free list and are recycled with an incremented
/// generation, which keeps stale handles detectably invalid.
#[derive(Debug)]
pub struct ResourceRegistry<K, R> {
    /// Every slot that was ever allocated, with its current generation.
    slots: Vec<(u32, Option<R>)>,
    /// Indices available for reuse.
    free_indices: Vec<u32>,
    live: usize,
    _kind: std::marker::PhantomData<fn() -> K>,
}

impl<K: ResourceKind, R> Default for ResourceRegistry<K, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: ResourceKind, R> ResourceRegistry<K, R> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_indices: Vec::new(),
            live: 0,
            _kind: std::marker::PhantomData,
        }
    }

    /// Stores `record` and returns its handle.
    ///
    /// A recycled index gets its generation bumped; a fresh one is appended
    /// with generation zero.
    pub fn allocate(&mut self, record: R) -> Handle<K> {
        self.live += 1;
        if let Some(index) = self.free_indices.pop() {
            let (generation, slot) = &mut self.slots[index as usize];
            *generation = generation.wrapping_add(1);
            *slot = Some(record);
            Handle::from_raw_parts(index, *generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push((0, Some(record)));
            Handle::from_raw_parts(index, 0)
        }
    }

    /// Returns `true` if `handle` refers to a live record of this registry.
    pub fn is_valid(&self, handle: Handle<K>) -> bool {
        self.lookup(handle).is_some()
    }

    fn lookup(&self, handle: Handle<K>) -> Option<&R> {
        if handle.is_invalid() {
            return None;
        }
        self.slots
            .get(handle.index() as usize)
            .and_then(|(generation, record)| {
                if *generation == handle.generation() {
                    record.as_ref()
                } else {
                    None
                }
            })
    }

    /// Returns the record for `handle`, logging a warning when it is stale.
    pub fn get(&self, handle: Handle<K>) -> Option<&R> {
        let record = self.lookup(handle);
        if record.is_none() {
            log::warn!("ResourceRegistry: lookup of invalid {} {:?}", K::NAME, handle);
        }
        record
    }

    /// Mutable variant of [`get`](Self::get).
    pub fn get_mut(&mut self, handle: Handle<K>) -> Option<&mut R> {
        let found = self.is_valid(handle);
        if !found {
            log::warn!("ResourceRegistry: lookup of invalid {} {:?}", K::NAME, handle);
            return None;
        }
        self.slots
            .get_mut(handle.index() as usize)
            .and_then(|(_, record)| record.as_mut())
    }

    /// Removes and returns the record for `handle`.
    ///
    /// A stale or never-issued handle is a logged no-op.
    pub fn remove(&mut self, handle: Handle<K>) -> Option<R> {
        if !self.is_valid(handle) {
            log::warn!(
                "ResourceRegistry: ignoring release of invalid {} {:?}",
                K::NAME,
                handle
            );
            return None;
        }
        let record = self.slots[handle.index() as usize].1.take();
        self.free_indices.push(handle.index());
        self.live -= 1;
        record
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.live
    }

    /// Returns `true` when no record is live.
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Iterates over live `(handle, record)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (Handle<K>, &R)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, (generation, record))| {
                record
                    .as_ref()
                    .map(|record| (Handle::from_raw_parts(index as u32, *generation), record))
            })
    }

    /// Removes every live record, yielding them with their handles.
    pub fn drain(&mut self) -> Vec<(Handle<K>, R)> {
        let mut drained = Vec::with_capacity(self.live);
        for (index, (generation, record)) in self.slots.iter_mut().enumerate() {
            if let Some(record) = record.take() {
                drained.push((Handle::from_raw_parts(index as u32, *generation), record));
                self.free_indices.push(index as u32);
            }
        }
        self.live = 0;
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rhi::handle::kind;

    type Registry = ResourceRegistry<kind::Buffer, &'static str>;

    #[test]
    fn allocated_handles_are_valid_until_removed() {
        let mut registry = Registry::new();
        let a = registry.allocate("a");
        let b = registry.allocate("b");

        assert!(registry.is_valid(a));
        assert!(registry.is_valid(b));
        assert_eq!(registry.get(a), Some(&"a"));

        assert_eq!(registry.remove(a), Some("a"));
        assert!(!registry.is_valid(a));
        assert!(registry.is_valid(b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn recycled_index_does_not_alias_stale_handle() {
        let mut registry = Registry::new();
        let stale = registry.allocate("old");
        registry.remove(stale);

        let fresh = registry.allocate("new");
        assert_eq!(fresh.index(), stale.index());
        assert_ne!(fresh.generation(), stale.generation());
        assert!(!registry.is_valid(stale));
        assert_eq!(registry.get(stale), None);
        assert_eq!(registry.get(fresh), Some(&"new"));
    }

    #[test]
    fn never_issued_values_are_invalid() {
        let mut registry = Registry::new();
        registry.allocate("a");

        assert!(!registry.is_valid(Handle::INVALID));
        assert!(!registry.is_valid(Handle::from_raw_parts(42, 0)));
        assert!(!registry.is_valid(Handle::from_raw_parts(0, 9)));
    }

    #[test]
    fn double_remove_is_a_no_op() {
        let mut registry = Registry::new();
        let a = registry.allocate("a");
        assert!(registry.remove(a).is_some());
        assert!(registry.remove(a).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn drain_returns_live_records_only() {
        let mut registry = Registry::new();
        let a = registry.allocate("a");
        let b = registry.allocate("b");
        registry.remove(a);

        let drained = registry.drain();
        assert_eq!(drained, vec![(b, "b")]);
        assert!(registry.is_empty());
        assert!(!registry.is_valid(b));
    }
}
