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

//! Defines data structures related to GPU buffer resources.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

bitflags! {
    /// A set of flags describing the allowed usages of a buffer.
    ///
    /// Backends use them to pick the memory heap and to validate bindings.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct BufferUsage: u32 {
        /// The buffer can be the source of a copy.
        const COPY_SRC = 1 << 0;
        /// The buffer can be the destination of a copy or a CPU write.
        const COPY_DST = 1 << 1;
        /// The buffer can be bound as a vertex buffer.
        const VERTEX = 1 << 2;
        /// The buffer can be bound as an index buffer.
        const INDEX = 1 << 3;
        /// The buffer can be bound as a uniform buffer.
        const UNIFORM = 1 << 4;
        /// The buffer can be bound as a storage buffer.
        const STORAGE = 1 << 5;
        /// The buffer can be used for indirect draws.
        const INDIRECT = 1 << 6;
    }
}

/// A descriptor used to create a buffer.
#[derive(Debug, Clone)]
pub struct BufferDescriptor<'a> {
    /// An optional debug label for the buffer.
    pub label: Option<Cow<'a, str>>,
    /// The requested size of the buffer in bytes. Writes are bounds-checked
    /// against this value, not against the backend-aligned size.
    pub size: u64,
    /// How the buffer will be used.
    pub usage: BufferUsage,
    /// Contents copied into the buffer at creation. Must not exceed `size`.
    pub initial_data: Option<Cow<'a, [u8]>>,
}

impl<'a> BufferDescriptor<'a> {
    /// A buffer of `size` bytes with the given usage and no initial data.
    pub fn new(size: u64, usage: BufferUsage) -> Self {
        Self {
            label: None,
            size,
            usage,
            initial_data: None,
        }
    }

    /// Sets the debug label.
    pub fn with_label(mut self, label: impl Into<Cow<'a, str>>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Sets the initial contents.
    pub fn with_data(mut self, data: impl Into<Cow<'a, [u8]>>) -> Self {
        self.initial_data = Some(data.into());
        self
    }
}

/// What a backend reports after allocating a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferAllocation {
    /// Size actually reserved, rounded up to the backend's alignment.
    pub aligned_size: u64,
    /// Whether the allocation has a persistent CPU mapping.
    pub host_visible: bool,
    /// GPU virtual address, on backends that expose one.
    pub gpu_address: Option<u64>,
}

/// Public information about a live buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferInfo {
    /// Requested size in bytes.
    pub size: u64,
    /// Usage flags.
    pub usage: BufferUsage,
    /// Backend allocation details.
    pub allocation: BufferAllocation,
}

/// Range check shared by every buffer write: `true` when `[offset, offset + len)` lies within `capacity`.
pub fn range_in_bounds(offset: u64, len: u64, capacity: u64) -> bool {
    offset
        .checked_add(len)
        .map(|end| end <= capacity)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_checks() {
        assert!(range_in_bounds(0, 64, 256));
        assert!(range_in_bounds(192, 64, 256));
        assert!(!range_in_bounds(224, 64, 256));
        assert!(range_in_bounds(256, 0, 256));
        assert!(!range_in_bounds(u64::MAX, 2, 256));
    }

    #[test]
    fn descriptor_builder() {
        let desc = BufferDescriptor::new(16, BufferUsage::UNIFORM | BufferUsage::COPY_DST)
            .with_label("camera")
            .with_data(vec![0u8; 16]);
        assert_eq!(desc.label.as_deref(), Some("camera"));
        assert!(desc.usage.contains(BufferUsage::UNIFORM));
        assert_eq!(desc.initial_data.map(|d| d.len()), Some(16));
    }

    #[test]
    fn usage_masks_combine_and_serialize_by_name() {
        let usage = BufferUsage::VERTEX | BufferUsage::COPY_DST;
        assert!(usage.contains(BufferUsage::VERTEX));
        assert!(!usage.contains(BufferUsage::INDEX));
        assert!(usage.intersects(BufferUsage::COPY_DST | BufferUsage::UNIFORM));
        assert!(BufferUsage::default().is_empty());
        assert_eq!(format!("{usage:?}"), "BufferUsage(COPY_DST | VERTEX)");

        let json = serde_json::to_string(&usage).unwrap();
        assert_eq!(json, "\"COPY_DST | VERTEX\"");
        assert_eq!(serde_json::from_str::<BufferUsage>(&json).unwrap(), usage);
    }
}
