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

//! Typed generational handles for every resource kind owned by a [`Device`].
//!
//! A handle is an `index` into a per-kind arena plus the `generation` of the
//! slot at the time it was issued. Destroying a resource bumps the slot's
//! generation, so a stale handle can never alias a newer resource that happens
//! to reuse the same index.
//!
//! [`Device`]: crate::rhi::Device

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Identifies which arena a handle belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKindId {
    /// GPU buffer.
    Buffer,
    /// GPU texture.
    Texture,
    /// Shader module.
    Shader,
    /// Rasterization pipeline state object.
    Pipeline,
    /// Compiled binding set layout.
    ParameterBlockLayout,
    /// Binding table instance.
    ParameterBlock,
}

/// Implemented by the zero-sized marker types that parameterize [`Handle`].
pub trait ResourceKind: 'static {
    /// The arena this kind lives in.
    const KIND: ResourceKindId;
    /// A short human-readable name used in log messages.
    const NAME: &'static str;
}

/// Marker types for each resource kind.
pub mod kind {
    use super::{ResourceKind, ResourceKindId};

    macro_rules! resource_kinds {
        ($($(#[$meta:meta])* $name:ident => $kind:ident, $label:literal;)*) => {
            $(
                $(#[$meta])*
                #[derive(Debug)]
                pub enum $name {}

                impl ResourceKind for $name {
                    const KIND: ResourceKindId = ResourceKindId::$kind;
                    const NAME: &'static str = $label;
                }
            )*
        };
    }

    resource_kinds! {
        /// Marker for buffer handles.
        Buffer => Buffer, "buffer";
        /// Marker for texture handles.
        Texture => Texture, "texture";
        /// Marker for shader module handles.
        Shader => Shader, "shader module";
        /// Marker for pipeline handles.
        Pipeline => Pipeline, "pipeline";
        /// Marker for parameter block layout handles.
        ParameterBlockLayout => ParameterBlockLayout, "parameter block layout";
        /// Marker for parameter block handles.
        ParameterBlock => ParameterBlock, "parameter block";
    }
}

/// A typed, generational reference to a resource owned by a device.
pub struct Handle<K> {
    index: u32,
    generation: u32,
    _kind: PhantomData<fn() -> K>,
}

impl<K> Handle<K> {
    /// The sentinel value. It is never issued by a registry.
    pub const INVALID: Self = Self {
        index: u32::MAX,
        generation: 0,
        _kind: PhantomData,
    };

    /// Reassembles a handle from its raw parts.
    ///
    /// Registries are the only producers of live handles; this exists for
    /// backends that key native tables by handle and for tests.
    pub const fn from_raw_parts(index: u32, generation: u32) -> Self {
        Self {
            index,
            generation,
            _kind: PhantomData,
        }
    }

    /// Slot index inside the owning arena.
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Generation of the slot when this handle was issued.
    pub const fn generation(&self) -> u32 {
        self.generation
    }

    /// Returns `true` for the [`Handle::INVALID`] sentinel.
    pub const fn is_invalid(&self) -> bool {
        self.index == u32::MAX
    }
}

impl<K> Clone for Handle<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for Handle<K> {}

impl<K> PartialEq for Handle<K> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<K> Eq for Handle<K> {}

impl<K> Hash for Handle<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<K> Default for Handle<K> {
    fn default() -> Self {
        Self::INVALID
    }
}

impl<K: ResourceKind> fmt::Debug for Handle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_invalid() {
            write!(f, "Handle<{}>(INVALID)", K::NAME)
        } else {
            write!(f, "Handle<{}>({}v{})", K::NAME, self.index, self.generation)
        }
    }
}

/// Handle to a GPU buffer.
pub type BufferHandle = Handle<kind::Buffer>;
/// Handle to a GPU texture.
pub type TextureHandle = Handle<kind::Texture>;
/// Handle to a shader module.
pub type ShaderHandle = Handle<kind::Shader>;
/// Handle to a rasterization pipeline state object.
pub type PsoHandle = Handle<kind::Pipeline>;
/// Handle to a compiled, immutable binding set layout.
pub type ParameterBlockLayoutHandle = Handle<kind::ParameterBlockLayout>;
/// Handle to a binding table instance.
pub type ParameterBlockHandle = Handle<kind::ParameterBlock>;
