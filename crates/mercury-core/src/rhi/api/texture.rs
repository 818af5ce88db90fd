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

//! Texture and sampler descriptions.

use super::format::TextureFormat;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

bitflags! {
    /// Allowed usages of a texture.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct TextureUsage: u32 {
        /// Source of a copy.
        const COPY_SRC = 1 << 0;
        /// Destination of a copy or upload.
        const COPY_DST = 1 << 1;
        /// Sampled from shaders.
        const SAMPLED = 1 << 2;
        /// Read-write storage image.
        const STORAGE = 1 << 3;
        /// Render target attachment.
        const RENDER_TARGET = 1 << 4;
    }
}

/// A descriptor used to create a 2D texture.
#[derive(Debug, Clone)]
pub struct TextureDescriptor<'a> {
    /// Debug label.
    pub label: Option<Cow<'a, str>>,
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Number of mip levels, at least 1.
    pub mip_levels: u32,
    /// Texel format.
    pub format: TextureFormat,
    /// Usage flags.
    pub usage: TextureUsage,
}

impl TextureDescriptor<'_> {
    /// Byte size of mip level 0, when the format has a fixed texel size.
    pub fn level0_size(&self) -> Option<u64> {
        self.format
            .bytes_per_texel()
            .map(|bpt| u64::from(self.width) * u64::from(self.height) * u64::from(bpt))
    }
}

/// Layout state a texture's image is in, tracked by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureLayout {
    /// Contents undefined; the state right after creation.
    #[default]
    Undefined,
    /// Ready to receive an upload.
    TransferDestination,
    /// Ready to be sampled.
    ShaderReadOnly,
    /// Read-write storage access.
    General,
}

/// Texel filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    /// Nearest texel.
    Nearest,
    /// Linear interpolation.
    #[default]
    Linear,
}

/// Behavior outside the `[0, 1]` coordinate range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressMode {
    /// Clamp to the edge texel.
    #[default]
    ClampToEdge,
    /// Tile.
    Repeat,
    /// Tile with mirroring.
    MirrorRepeat,
}

/// Sampler state attached to a sampled texture binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SamplerDescriptor {
    /// Magnification filter.
    pub mag_filter: FilterMode,
    /// Minification filter.
    pub min_filter: FilterMode,
    /// Filter between mip levels.
    pub mipmap_filter: FilterMode,
    /// Address mode for all axes.
    pub address_mode: AddressMode,
}

impl SamplerDescriptor {
    /// Nearest filtering, clamped.
    pub const NEAREST: Self = Self {
        mag_filter: FilterMode::Nearest,
        min_filter: FilterMode::Nearest,
        mipmap_filter: FilterMode::Nearest,
        address_mode: AddressMode::ClampToEdge,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level0_size_uses_texel_size() {
        let desc = TextureDescriptor {
            label: None,
            width: 4,
            height: 2,
            mip_levels: 1,
            format: TextureFormat::Rgba8Unorm,
            usage: TextureUsage::SAMPLED | TextureUsage::COPY_DST,
        };
        assert_eq!(desc.level0_size(), Some(32));
    }

    #[test]
    fn default_sampler_is_linear_clamped() {
        let sampler = SamplerDescriptor::default();
        assert_eq!(sampler.min_filter, FilterMode::Linear);
        assert_eq!(sampler.address_mode, AddressMode::ClampToEdge);
    }
}
