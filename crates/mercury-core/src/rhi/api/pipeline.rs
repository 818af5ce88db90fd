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

//! Rasterization pipeline state descriptions.

use super::format::VertexFormat;
use super::parameter_block::{BindingSetLayoutDescriptor, MAX_BINDING_SETS};
use crate::rhi::handle::{ParameterBlockLayoutHandle, ShaderHandle};

/// How vertices are assembled into primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    /// Independent points.
    PointList,
    /// Independent lines.
    LineList,
    /// Connected lines.
    LineStrip,
    /// Independent triangles.
    #[default]
    TriangleList,
    /// Connected triangles.
    TriangleStrip,
}

/// How polygons are rasterized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PolygonMode {
    /// Filled.
    #[default]
    Fill,
    /// Edges only.
    Line,
    /// Vertices only.
    Point,
}

/// Which faces are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    /// No culling.
    None,
    /// Cull front faces.
    Front,
    /// Cull back faces.
    #[default]
    Back,
}

/// Winding order of front faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrontFace {
    /// Counter-clockwise.
    #[default]
    Ccw,
    /// Clockwise.
    Cw,
}

/// Preset color blending modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendMode {
    /// `src * a + dst * (1 - a)`.
    Alpha,
    /// `src * 1 + dst * (1 - a)`.
    PremultipliedAlpha,
    /// `src + dst`.
    Additive,
}

/// Depth comparison function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompareFunction {
    /// Never passes.
    Never,
    /// Passes if less.
    #[default]
    Less,
    /// Passes if equal.
    Equal,
    /// Passes if less or equal.
    LessEqual,
    /// Passes if greater.
    Greater,
    /// Passes if not equal.
    NotEqual,
    /// Passes if greater or equal.
    GreaterEqual,
    /// Always passes.
    Always,
}

/// Depth testing state. Absent means depth is disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DepthState {
    /// Comparison function.
    pub compare: CompareFunction,
    /// Whether passing fragments write depth.
    pub write_enabled: bool,
}

/// Whether a vertex buffer advances per vertex or per instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VertexStepMode {
    /// Per vertex.
    #[default]
    Vertex,
    /// Per instance.
    Instance,
}

/// One attribute inside a vertex buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    /// Shader input location.
    pub location: u32,
    /// Attribute format.
    pub format: VertexFormat,
    /// Byte offset inside one element.
    pub offset: u64,
}

/// Layout of one bound vertex buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexBufferLayout {
    /// Distance in bytes between two elements.
    pub stride: u64,
    /// Step mode.
    pub step_mode: VertexStepMode,
    /// Attributes read from this buffer.
    pub attributes: Vec<VertexAttribute>,
}

/// The binding interface of a pipeline: up to four sets plus push constants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct PipelineLayoutDescriptor {
    /// Binding sets by set index. Empty sets are not part of the layout.
    pub sets: [BindingSetLayoutDescriptor; MAX_BINDING_SETS],
    /// Size in bytes of the push-constant range, 0 for none.
    pub push_constant_size: u32,
}

impl PipelineLayoutDescriptor {
    /// Sets the descriptor of binding set `index`.
    pub fn with_set(mut self, index: usize, set: BindingSetLayoutDescriptor) -> Self {
        self.sets[index] = set;
        self
    }

    /// Sets the push-constant range size.
    pub fn with_push_constants(mut self, size: u32) -> Self {
        self.push_constant_size = size;
        self
    }

    /// Computes the compacted offset of every non-empty set.
    ///
    /// The n-th non-empty set (by index) is placed at offset n in the merged
    /// native layout.
    pub fn set_offsets(&self) -> [Option<u32>; MAX_BINDING_SETS] {
        let mut offsets = [None; MAX_BINDING_SETS];
        let mut next = 0u32;
        for (index, set) in self.sets.iter().enumerate() {
            if !set.is_empty() {
                offsets[index] = Some(next);
                next += 1;
            }
        }
        offsets
    }
}

/// A descriptor used to create or rebuild a rasterization pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterizePipelineDescriptor {
    /// Debug label.
    pub label: Option<String>,
    /// Vertex stage module; `Handle::INVALID` to omit.
    pub vertex_shader: ShaderHandle,
    /// Fragment stage module; `Handle::INVALID` to omit.
    pub fragment_shader: ShaderHandle,
    /// Binding interface.
    pub layout: PipelineLayoutDescriptor,
    /// Primitive topology.
    pub topology: PrimitiveTopology,
    /// Polygon rasterization mode.
    pub polygon_mode: PolygonMode,
    /// Face culling.
    pub cull_mode: CullMode,
    /// Front face winding.
    pub front_face: FrontFace,
    /// Color blending, `None` to disable.
    pub blend: Option<BlendMode>,
    /// Depth testing, `None` to disable.
    pub depth: Option<DepthState>,
    /// Vertex buffer layouts; empty for pull-style shaders.
    pub vertex_buffers: Vec<VertexBufferLayout>,
}

impl Default for RasterizePipelineDescriptor {
    fn default() -> Self {
        Self {
            label: None,
            vertex_shader: ShaderHandle::INVALID,
            fragment_shader: ShaderHandle::INVALID,
            layout: PipelineLayoutDescriptor::default(),
            topology: PrimitiveTopology::TriangleList,
            polygon_mode: PolygonMode::Fill,
            cull_mode: CullMode::Back,
            front_face: FrontFace::Ccw,
            blend: None,
            depth: None,
            vertex_buffers: Vec::new(),
        }
    }
}

impl RasterizePipelineDescriptor {
    /// The label, or a placeholder for diagnostics.
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or("<unnamed pipeline>")
    }
}

/// One shader stage as handed to a backend.
#[derive(Debug, Clone, Copy)]
pub struct ShaderStageRef<'a> {
    /// The module.
    pub module: ShaderHandle,
    /// Entry point inside the module.
    pub entry_point: &'a str,
}

/// A fully resolved pipeline description handed to a backend.
///
/// Stages whose module was omitted are `None`; set layouts are listed in
/// offset order.
#[derive(Debug, Clone)]
pub struct NativePipelineDescriptor<'a> {
    /// The user descriptor.
    pub desc: &'a RasterizePipelineDescriptor,
    /// Vertex stage, if any.
    pub vertex: Option<ShaderStageRef<'a>>,
    /// Fragment stage, if any.
    pub fragment: Option<ShaderStageRef<'a>>,
    /// Compiled set layouts in offset order.
    pub set_layouts: Vec<ParameterBlockLayoutHandle>,
    /// Push-constant range size.
    pub push_constant_size: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rhi::api::parameter_block::ShaderResourceType;

    #[test]
    fn defaults() {
        let desc = RasterizePipelineDescriptor::default();
        assert_eq!(desc.topology, PrimitiveTopology::TriangleList);
        assert_eq!(desc.cull_mode, CullMode::Back);
        assert_eq!(desc.front_face, FrontFace::Ccw);
        assert_eq!(desc.polygon_mode, PolygonMode::Fill);
        assert!(desc.blend.is_none());
        assert!(desc.depth.is_none());
    }

    #[test]
    fn set_offsets_are_compacted() {
        let uniform = BindingSetLayoutDescriptor::new()
            .with_slot(0, ShaderResourceType::UniformBuffer);
        let layout = PipelineLayoutDescriptor::default()
            .with_set(0, uniform.clone())
            .with_set(2, uniform);
        assert_eq!(layout.set_offsets(), [Some(0), None, Some(1), None]);
    }
}
