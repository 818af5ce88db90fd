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

//! Rasterization pipelines and the recipes they are rebuilt from.

use super::conversions::IntoWgpu;
use super::resources::{validated, LayoutEntry, ShaderEntry, PUSH_CONSTANT_STRIDE};
use super::surface::TargetFormats;
use mercury_core::rhi::{
    CompareFunction, NativePipelineDescriptor, ParameterBlockLayoutHandle, PipelineError,
    RasterizePipelineDescriptor, ShaderHandle, ShaderStage,
};
use std::collections::HashMap;

/// An owned copy of everything a pipeline was built from.
///
/// Pipelines are built against the surface format; when the surface changes
/// format they are rebuilt from their recipe.
#[derive(Debug, Clone)]
pub struct PipelineRecipe {
    pub desc: RasterizePipelineDescriptor,
    pub vertex: Option<(ShaderHandle, String)>,
    pub fragment: Option<(ShaderHandle, String)>,
    pub set_layouts: Vec<ParameterBlockLayoutHandle>,
    pub push_constant_size: u32,
}

impl PipelineRecipe {
    pub fn from_native(desc: &NativePipelineDescriptor<'_>) -> Self {
        Self {
            desc: desc.desc.clone(),
            vertex: desc.vertex.map(|s| (s.module, s.entry_point.to_owned())),
            fragment: desc.fragment.map(|s| (s.module, s.entry_point.to_owned())),
            set_layouts: desc.set_layouts.clone(),
            push_constant_size: desc.push_constant_size,
        }
    }
}

#[derive(Debug)]
pub struct PipelineEntry {
    pub pipeline: wgpu::RenderPipeline,
    /// Bind group index of the push-constant arena, if the pipeline has push constants.
    pub push_group: Option<u32>,
    pub recipe: PipelineRecipe,
    pub formats: TargetFormats,
}

/// Native objects a pipeline build reads.
pub struct PipelineInputs<'a> {
    pub shaders: &'a HashMap<ShaderHandle, ShaderEntry>,
    pub layouts: &'a HashMap<ParameterBlockLayoutHandle, LayoutEntry>,
    pub push_layout: &'a wgpu::BindGroupLayout,
    pub formats: TargetFormats,
    pub max_bind_groups: u32,
}

fn stage_module<'a>(
    inputs: &PipelineInputs<'a>,
    label: &str,
    stage_ref: &Option<(ShaderHandle, String)>,
    stage: ShaderStage,
) -> Result<Option<&'a ShaderEntry>, PipelineError> {
    let Some((handle, _)) = stage_ref else {
        return Ok(None);
    };
    match inputs.shaders.get(handle) {
        Some(entry) if entry.stage == stage => Ok(Some(entry)),
        _ => Err(PipelineError::InvalidShaderModule {
            label: label.to_owned(),
            stage,
        }),
    }
}

pub fn build_pipeline(
    device: &wgpu::Device,
    recipe: PipelineRecipe,
    inputs: &PipelineInputs<'_>,
) -> Result<PipelineEntry, PipelineError> {
    let desc = &recipe.desc;
    let label = desc.display_label().to_owned();

    let vertex = stage_module(inputs, &label, &recipe.vertex, ShaderStage::Vertex)?.ok_or_else(
        || PipelineError::StageRequired {
            label: label.clone(),
            stage: ShaderStage::Vertex,
        },
    )?;
    let fragment = stage_module(inputs, &label, &recipe.fragment, ShaderStage::Fragment)?;

    // --- Layout ---
    if u64::from(recipe.push_constant_size) > PUSH_CONSTANT_STRIDE {
        return Err(PipelineError::LayoutCreationFailed(format!(
            "push constants of {} bytes exceed the {PUSH_CONSTANT_STRIDE}-byte limit",
            recipe.push_constant_size
        )));
    }
    let push_group = (recipe.push_constant_size > 0).then_some(recipe.set_layouts.len() as u32);
    let required = recipe.set_layouts.len() as u32 + u32::from(push_group.is_some());
    if required > inputs.max_bind_groups {
        return Err(PipelineError::TooManyBindingGroups {
            label,
            required,
            available: inputs.max_bind_groups,
        });
    }

    let mut group_layouts = Vec::with_capacity(required as usize);
    for handle in &recipe.set_layouts {
        let entry = inputs.layouts.get(handle).ok_or_else(|| {
            PipelineError::LayoutCreationFailed(format!(
                "binding set layout {handle:?} of '{label}' does not exist"
            ))
        })?;
        group_layouts.push(&entry.layout);
    }
    if push_group.is_some() {
        group_layouts.push(inputs.push_layout);
    }

    let layout = validated(device, || {
        device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&label),
            bind_group_layouts: &group_layouts,
            immediate_size: 0,
        })
    })
    .map_err(PipelineError::LayoutCreationFailed)?;

    // --- Fixed function ---
    let attributes: Vec<Vec<wgpu::VertexAttribute>> = desc
        .vertex_buffers
        .iter()
        .map(|buffer| {
            buffer
                .attributes
                .iter()
                .map(|a| wgpu::VertexAttribute {
                    format: a.format.into_wgpu(),
                    offset: a.offset,
                    shader_location: a.location,
                })
                .collect()
        })
        .collect();
    let vertex_buffers: Vec<wgpu::VertexBufferLayout<'_>> = desc
        .vertex_buffers
        .iter()
        .zip(&attributes)
        .map(|(buffer, attributes)| wgpu::VertexBufferLayout {
            array_stride: buffer.stride,
            step_mode: buffer.step_mode.into_wgpu(),
            attributes,
        })
        .collect();

    let targets = [Some(wgpu::ColorTargetState {
        format: inputs.formats.color,
        blend: desc.blend.map(IntoWgpu::into_wgpu),
        write_mask: wgpu::ColorWrites::ALL,
    })];

    // Render passes always carry the depth target when one is configured.
    let depth_stencil = inputs.formats.depth.map(|format| wgpu::DepthStencilState {
        format,
        depth_write_enabled: desc.depth.is_some_and(|d| d.write_enabled),
        depth_compare: desc
            .depth
            .map_or(CompareFunction::Always, |d| d.compare)
            .into_wgpu(),
        stencil: wgpu::StencilState::default(),
        bias: wgpu::DepthBiasState::default(),
    });

    let pipeline = validated(device, || {
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&label),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &vertex.module,
                entry_point: Some(recipe.vertex.as_ref().map_or("main", |(_, e)| e.as_str())),
                compilation_options: Default::default(),
                buffers: &vertex_buffers,
            },
            fragment: fragment.map(|fragment| wgpu::FragmentState {
                module: &fragment.module,
                entry_point: Some(recipe.fragment.as_ref().map_or("main", |(_, e)| e.as_str())),
                compilation_options: Default::default(),
                targets: &targets,
            }),
            primitive: wgpu::PrimitiveState {
                topology: desc.topology.into_wgpu(),
                strip_index_format: None,
                front_face: desc.front_face.into_wgpu(),
                cull_mode: desc.cull_mode.into_wgpu(),
                polygon_mode: desc.polygon_mode.into_wgpu(),
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil,
            multisample: wgpu::MultisampleState {
                count: inputs.formats.samples,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview_mask: None,
            cache: None,
        })
    })
    .map_err(|details| PipelineError::CompilationFailed {
        label: label.clone(),
        details,
    })?;

    log::debug!("WgpuBackend: built pipeline '{label}' for {:?}.", inputs.formats.color);
    Ok(PipelineEntry {
        pipeline,
        push_group,
        formats: inputs.formats,
        recipe,
    })
}
