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

//! Binding layouts and the resources written into parameter blocks.
//!
//! A [`BindingSetLayoutDescriptor`] declares the slots of one binding set. The
//! device compiles it once per `(descriptor, set index)` into a
//! `ParameterBlockLayoutHandle`; parameter blocks are binding tables bound to
//! exactly one such layout and rewritten wholesale by
//! `Device::update_parameter_block`.

use super::texture::SamplerDescriptor;
use crate::rhi::error::ResourceError;
use crate::rhi::handle::{BufferHandle, TextureHandle};
use std::fmt;

/// Maximum number of binding sets a pipeline layout can reference.
pub const MAX_BINDING_SETS: usize = 4;

/// Default number of descriptors of each [`ShaderResourceType`] in the shared pool.
pub const DEFAULT_DESCRIPTOR_POOL_CAPACITY: u32 = 10_000;

/// The kind of resource a binding slot expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderResourceType {
    /// Uniform (constant) buffer.
    UniformBuffer,
    /// Read-only storage buffer.
    ReadOnlyBuffer,
    /// Read-write storage buffer.
    RWBuffer,
    /// Sampled 2D image with its sampler.
    SampledImage2D,
    /// Read-write storage image.
    RWImage,
}

impl ShaderResourceType {
    /// Every resource type, in pool order.
    pub const ALL: [ShaderResourceType; 5] = [
        ShaderResourceType::UniformBuffer,
        ShaderResourceType::ReadOnlyBuffer,
        ShaderResourceType::RWBuffer,
        ShaderResourceType::SampledImage2D,
        ShaderResourceType::RWImage,
    ];

    /// Position of this type in [`Self::ALL`].
    pub fn pool_index(self) -> usize {
        match self {
            ShaderResourceType::UniformBuffer => 0,
            ShaderResourceType::ReadOnlyBuffer => 1,
            ShaderResourceType::RWBuffer => 2,
            ShaderResourceType::SampledImage2D => 3,
            ShaderResourceType::RWImage => 4,
        }
    }

    /// Returns `true` for the three buffer kinds.
    pub fn is_buffer(self) -> bool {
        matches!(
            self,
            ShaderResourceType::UniformBuffer
                | ShaderResourceType::ReadOnlyBuffer
                | ShaderResourceType::RWBuffer
        )
    }
}

impl fmt::Display for ShaderResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One declared binding slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingSlot {
    /// Binding number inside the set.
    pub slot: u32,
    /// Resource type the slot expects.
    pub kind: ShaderResourceType,
}

/// The ordered slot list of one binding set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BindingSetLayoutDescriptor {
    /// Slots in declaration order.
    pub slots: Vec<BindingSlot>,
}

impl BindingSetLayoutDescriptor {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a slot.
    pub fn with_slot(mut self, slot: u32, kind: ShaderResourceType) -> Self {
        self.slots.push(BindingSlot { slot, kind });
        self
    }

    /// Returns `true` when the set declares no slot.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of slots of each resource type, indexed by [`ShaderResourceType::pool_index`].
    pub fn descriptor_counts(&self) -> [u32; 5] {
        let mut counts = [0u32; 5];
        for slot in &self.slots {
            counts[slot.kind.pool_index()] += 1;
        }
        counts
    }

    /// Rejects duplicate slot numbers.
    pub fn validate(&self) -> Result<(), ResourceError> {
        for (i, a) in self.slots.iter().enumerate() {
            if self.slots[i + 1..].iter().any(|b| b.slot == a.slot) {
                return Err(ResourceError::InvalidDescriptor(format!(
                    "binding slot {} is declared more than once",
                    a.slot
                )));
            }
        }
        Ok(())
    }
}

/// A resource written into one slot of a parameter block.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterBlockResource {
    /// A buffer range.
    Buffer {
        /// The buffer.
        buffer: BufferHandle,
        /// Byte offset of the range.
        offset: u64,
        /// Byte size of the range; 0 means "to the end of the buffer".
        size: u64,
    },
    /// A sampled texture with its sampler state.
    Texture {
        /// The texture.
        texture: TextureHandle,
        /// Sampler used for this binding.
        sampler: SamplerDescriptor,
    },
    /// A read-write storage image.
    RwImage {
        /// The texture.
        texture: TextureHandle,
    },
    /// Nothing bound.
    Empty,
}

impl ParameterBlockResource {
    /// Returns `true` if this variant can be written to a slot of type `kind`.
    pub fn accepts(&self, kind: ShaderResourceType) -> bool {
        match self {
            ParameterBlockResource::Buffer { .. } => kind.is_buffer(),
            ParameterBlockResource::Texture { .. } => kind == ShaderResourceType::SampledImage2D,
            ParameterBlockResource::RwImage { .. } => kind == ShaderResourceType::RWImage,
            ParameterBlockResource::Empty => true,
        }
    }

    /// Short variant name, for diagnostics.
    pub fn variant_name(&self) -> &'static str {
        match self {
            ParameterBlockResource::Buffer { .. } => "Buffer",
            ParameterBlockResource::Texture { .. } => "Texture",
            ParameterBlockResource::RwImage { .. } => "RwImage",
            ParameterBlockResource::Empty => "Empty",
        }
    }
}

/// One validated slot write handed to a backend.
#[derive(Debug, Clone, Copy)]
pub struct SlotWrite<'a> {
    /// Declared binding slot.
    pub binding: BindingSlot,
    /// Resource to write; `Empty` leaves the slot unbound.
    pub resource: &'a ParameterBlockResource,
}

/// The shared, fixed-capacity descriptor pool budget.
///
/// Each parameter block reserves one descriptor per declared slot for as long
/// as it lives.
#[derive(Debug, Clone)]
pub struct DescriptorPool {
    capacity: u32,
    used: [u32; 5],
}

impl DescriptorPool {
    /// A pool holding `capacity` descriptors of each type.
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            used: [0; 5],
        }
    }

    /// Reserves `counts` descriptors, or reports the first exhausted type.
    pub fn reserve(&mut self, counts: &[u32; 5]) -> Result<(), ResourceError> {
        for kind in ShaderResourceType::ALL {
            let i = kind.pool_index();
            if self.used[i] + counts[i] > self.capacity {
                return Err(ResourceError::PoolExhausted {
                    kind,
                    capacity: self.capacity,
                });
            }
        }
        for (used, count) in self.used.iter_mut().zip(counts) {
            *used += count;
        }
        Ok(())
    }

    /// Returns previously reserved descriptors.
    pub fn release(&mut self, counts: &[u32; 5]) {
        for (used, count) in self.used.iter_mut().zip(counts) {
            *used = used.saturating_sub(*count);
        }
    }

    /// Descriptors of `kind` currently reserved.
    pub fn used(&self, kind: ShaderResourceType) -> u32 {
        self.used[kind.pool_index()]
    }

    /// Per-type capacity.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variants_match_slot_types() {
        let buffer = ParameterBlockResource::Buffer {
            buffer: BufferHandle::INVALID,
            offset: 0,
            size: 0,
        };
        assert!(buffer.accepts(ShaderResourceType::UniformBuffer));
        assert!(buffer.accepts(ShaderResourceType::RWBuffer));
        assert!(!buffer.accepts(ShaderResourceType::SampledImage2D));

        let texture = ParameterBlockResource::Texture {
            texture: TextureHandle::INVALID,
            sampler: SamplerDescriptor::default(),
        };
        assert!(texture.accepts(ShaderResourceType::SampledImage2D));
        assert!(!texture.accepts(ShaderResourceType::RWImage));

        assert!(ParameterBlockResource::Empty.accepts(ShaderResourceType::RWImage));
    }

    #[test]
    fn duplicate_slots_are_rejected() {
        let desc = BindingSetLayoutDescriptor::new()
            .with_slot(0, ShaderResourceType::UniformBuffer)
            .with_slot(0, ShaderResourceType::SampledImage2D);
        assert!(matches!(
            desc.validate(),
            Err(ResourceError::InvalidDescriptor(_))
        ));
    }

    #[test]
    fn pool_reserves_until_exhausted() {
        let mut pool = DescriptorPool::new(2);
        let one_uniform = BindingSetLayoutDescriptor::new()
            .with_slot(0, ShaderResourceType::UniformBuffer)
            .descriptor_counts();

        assert!(pool.reserve(&one_uniform).is_ok());
        assert!(pool.reserve(&one_uniform).is_ok());
        match pool.reserve(&one_uniform) {
            Err(ResourceError::PoolExhausted { kind, capacity }) => {
                assert_eq!(kind, ShaderResourceType::UniformBuffer);
                assert_eq!(capacity, 2);
            }
            other => panic!("expected PoolExhausted, got {other:?}"),
        }
        assert_eq!(pool.used(ShaderResourceType::UniformBuffer), 2);

        pool.release(&one_uniform);
        assert!(pool.reserve(&one_uniform).is_ok());
    }
}
