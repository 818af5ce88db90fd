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

//! Pixel, index and vertex attribute formats.

use serde::{Deserialize, Serialize};

/// Texel formats understood by every backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureFormat {
    /// 8-bit single channel, normalized.
    R8Unorm,
    /// 8-bit two channels, normalized.
    Rg8Unorm,
    /// 8-bit RGBA, normalized.
    Rgba8Unorm,
    /// 8-bit RGBA, sRGB encoded.
    Rgba8UnormSrgb,
    /// 8-bit BGRA, normalized.
    Bgra8Unorm,
    /// 8-bit BGRA, sRGB encoded.
    Bgra8UnormSrgb,
    /// 16-bit float single channel.
    R16Float,
    /// 16-bit float RGBA.
    Rgba16Float,
    /// 32-bit float single channel.
    R32Float,
    /// 32-bit unsigned integer single channel.
    R32Uint,
    /// 32-bit signed integer single channel.
    R32Sint,
    /// 32-bit float two channels.
    Rg32Float,
    /// 32-bit float RGBA.
    Rgba32Float,
    /// 16-bit depth.
    Depth16Unorm,
    /// Depth with at least 24 bits of precision.
    Depth24Plus,
    /// Depth with at least 24 bits of precision and 8 bits of stencil.
    Depth24PlusStencil8,
    /// 32-bit float depth.
    Depth32Float,
}

impl TextureFormat {
    /// Size of one texel in bytes, or `None` for depth formats whose
    /// in-memory layout is backend defined.
    pub fn bytes_per_texel(self) -> Option<u32> {
        match self {
            TextureFormat::R8Unorm => Some(1),
            TextureFormat::Rg8Unorm | TextureFormat::R16Float | TextureFormat::Depth16Unorm => {
                Some(2)
            }
            TextureFormat::Rgba8Unorm
            | TextureFormat::Rgba8UnormSrgb
            | TextureFormat::Bgra8Unorm
            | TextureFormat::Bgra8UnormSrgb
            | TextureFormat::R32Float
            | TextureFormat::R32Uint
            | TextureFormat::R32Sint
            | TextureFormat::Depth32Float => Some(4),
            TextureFormat::Rgba16Float | TextureFormat::Rg32Float => Some(8),
            TextureFormat::Rgba32Float => Some(16),
            TextureFormat::Depth24Plus | TextureFormat::Depth24PlusStencil8 => None,
        }
    }

    /// Returns `true` for depth and depth-stencil formats.
    pub fn is_depth(self) -> bool {
        matches!(
            self,
            TextureFormat::Depth16Unorm
                | TextureFormat::Depth24Plus
                | TextureFormat::Depth24PlusStencil8
                | TextureFormat::Depth32Float
        )
    }

    /// Returns `true` if the format carries a stencil aspect.
    pub fn has_stencil(self) -> bool {
        matches!(self, TextureFormat::Depth24PlusStencil8)
    }

    /// Returns `true` for sRGB-encoded color formats.
    pub fn is_srgb(self) -> bool {
        matches!(
            self,
            TextureFormat::Rgba8UnormSrgb | TextureFormat::Bgra8UnormSrgb
        )
    }
}

/// Element type of an index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexFormat {
    /// 16-bit indices.
    Uint16,
    /// 32-bit indices.
    Uint32,
}

impl IndexFormat {
    /// Size of one index in bytes.
    pub fn size(self) -> u64 {
        match self {
            IndexFormat::Uint16 => 2,
            IndexFormat::Uint32 => 4,
        }
    }
}

/// Format of a single vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VertexFormat {
    /// One 32-bit float.
    Float32,
    /// Two 32-bit floats.
    Float32x2,
    /// Three 32-bit floats.
    Float32x3,
    /// Four 32-bit floats.
    Float32x4,
    /// One 32-bit unsigned integer.
    Uint32,
    /// Four normalized bytes.
    Unorm8x4,
}

impl VertexFormat {
    /// Size of the attribute in bytes.
    pub fn size(self) -> u64 {
        match self {
            VertexFormat::Float32 | VertexFormat::Uint32 | VertexFormat::Unorm8x4 => 4,
            VertexFormat::Float32x2 => 8,
            VertexFormat::Float32x3 => 12,
            VertexFormat::Float32x4 => 16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_formats_are_classified() {
        assert!(TextureFormat::Depth32Float.is_depth());
        assert!(!TextureFormat::Depth32Float.has_stencil());
        assert!(TextureFormat::Depth24PlusStencil8.has_stencil());
        assert!(!TextureFormat::Bgra8UnormSrgb.is_depth());
    }

    #[test]
    fn texel_sizes() {
        assert_eq!(TextureFormat::Rgba8Unorm.bytes_per_texel(), Some(4));
        assert_eq!(TextureFormat::Rgba32Float.bytes_per_texel(), Some(16));
        assert_eq!(TextureFormat::Depth24Plus.bytes_per_texel(), None);
    }

    #[test]
    fn formats_serialize_as_snake_case() {
        let json = serde_json::to_string(&TextureFormat::Bgra8UnormSrgb).unwrap();
        assert_eq!(json, "\"bgra8_unorm_srgb\"");
    }
}
