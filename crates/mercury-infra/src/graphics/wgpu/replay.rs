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

//! Translates recorded command streams into WGPU encoder calls.

use super::conversions::IntoWgpu;
use super::pipeline::PipelineEntry;
use super::resources::{BlockEntry, BufferEntry, PushConstantArena};
use super::surface::FrameTargets;
use mercury_core::rhi::{
    BufferHandle, ClearValues, CommandStream, ParameterBlockHandle, PsoHandle, RecordedCommand,
};
use std::collections::HashMap;

/// The backend tables a replay reads.
pub struct ReplayTables<'a> {
    pub pipelines: &'a HashMap<PsoHandle, PipelineEntry>,
    pub blocks: &'a HashMap<ParameterBlockHandle, BlockEntry>,
    pub buffers: &'a HashMap<BufferHandle, BufferEntry>,
}

/// Byte slices of every `PushConstants` command, in recording order.
pub fn push_constant_writes(stream: &CommandStream) -> Vec<&[u8]> {
    stream
        .commands()
        .iter()
        .filter_map(|command| match command {
            RecordedCommand::PushConstants { data } => Some(stream.push_constant_data(data)),
            _ => None,
        })
        .collect()
}

/// Records a frame: one render pass that clears the targets, then the stream.
pub fn encode_frame(
    encoder: &mut wgpu::CommandEncoder,
    targets: &FrameTargets,
    clear: ClearValues,
    stream: &CommandStream,
    tables: &ReplayTables<'_>,
    push: &PushConstantArena,
    push_offsets: &[u32],
) {
    let [r, g, b, a] = clear.color.map(f64::from);
    let store = if targets.resolve.is_some() {
        wgpu::StoreOp::Discard
    } else {
        wgpu::StoreOp::Store
    };
    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("Mercury Frame Pass"),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: &targets.color,
            resolve_target: targets.resolve.as_ref(),
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                store,
            },
            depth_slice: None,
        })],
        depth_stencil_attachment: targets.depth.as_ref().map(|view| {
            wgpu::RenderPassDepthStencilAttachment {
                view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(clear.depth),
                    store: wgpu::StoreOp::Discard,
                }),
                stencil_ops: targets.depth_has_stencil.then_some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(clear.stencil),
                    store: wgpu::StoreOp::Discard,
                }),
            }
        }),
        timestamp_writes: None,
        occlusion_query_set: None,
        multiview_mask: None,
    });

    let mut push_offsets = push_offsets.iter().copied();
    let mut last_push = 0u32;
    let mut push_group: Option<u32> = None;
    let mut pipeline_bound = false;

    for command in stream.commands() {
        match command {
            RecordedCommand::SetViewport(v) => {
                pass.set_viewport(v.x, v.y, v.width, v.height, v.min_depth, v.max_depth);
            }
            RecordedCommand::SetScissor(s) => {
                // WGPU rejects rectangles outside the target; clamp them.
                let x = s.x.min(targets.width);
                let y = s.y.min(targets.height);
                let width = s.width.min(targets.width - x);
                let height = s.height.min(targets.height - y);
                pass.set_scissor_rect(x, y, width, height);
            }
            RecordedCommand::BindPipeline(handle) => match tables.pipelines.get(handle) {
                Some(entry) => {
                    pass.set_pipeline(&entry.pipeline);
                    push_group = entry.push_group;
                    if let Some(group) = push_group {
                        pass.set_bind_group(group, push.bind_group(), &[last_push]);
                    }
                    pipeline_bound = true;
                }
                None => {
                    log::warn!("WgpuBackend: skipping bind of missing pipeline {handle:?}.");
                    pipeline_bound = false;
                }
            },
            RecordedCommand::BindParameterBlock { offset, block, .. } => {
                match tables.blocks.get(block) {
                    Some(entry) => pass.set_bind_group(*offset, &entry.bind_group, &[]),
                    None => log::warn!("WgpuBackend: skipping bind of missing block {block:?}."),
                }
            }
            RecordedCommand::PushConstants { .. } => {
                last_push = push_offsets.next().unwrap_or(0);
                if let Some(group) = push_group {
                    pass.set_bind_group(group, push.bind_group(), &[last_push]);
                }
            }
            RecordedCommand::SetVertexBuffer {
                slot,
                buffer,
                offset,
            } => match tables.buffers.get(buffer) {
                Some(entry) => pass.set_vertex_buffer(*slot, entry.buffer.slice(*offset..)),
                None => log::warn!("WgpuBackend: skipping missing vertex buffer {buffer:?}."),
            },
            RecordedCommand::SetIndexBuffer {
                buffer,
                offset,
                format,
            } => match tables.buffers.get(buffer) {
                Some(entry) => {
                    pass.set_index_buffer(entry.buffer.slice(*offset..), format.into_wgpu())
                }
                None => log::warn!("WgpuBackend: skipping missing index buffer {buffer:?}."),
            },
            RecordedCommand::Draw {
                vertex_count,
                instance_count,
                first_vertex,
                first_instance,
            } => {
                if pipeline_bound {
                    pass.draw(
                        *first_vertex..first_vertex + vertex_count,
                        *first_instance..first_instance + instance_count,
                    );
                }
            }
            RecordedCommand::DrawIndexed {
                index_count,
                instance_count,
                first_index,
                base_vertex,
                first_instance,
            } => {
                if pipeline_bound {
                    pass.draw_indexed(
                        *first_index..first_index + index_count,
                        *base_vertex,
                        *first_instance..first_instance + instance_count,
                    );
                }
            }
            RecordedCommand::CopyBufferToBuffer { .. } => {
                log::warn!("WgpuBackend: buffer copies cannot run inside a render pass; skipped.");
            }
        }
    }
}

/// Records a transfer list. Only buffer copies are meaningful outside a render pass.
pub fn encode_transfer(
    encoder: &mut wgpu::CommandEncoder,
    stream: &CommandStream,
    buffers: &HashMap<BufferHandle, BufferEntry>,
) {
    for command in stream.commands() {
        match command {
            RecordedCommand::CopyBufferToBuffer {
                source,
                source_offset,
                destination,
                destination_offset,
                size,
            } => match (buffers.get(source), buffers.get(destination)) {
                (Some(src), Some(dst)) => encoder.copy_buffer_to_buffer(
                    &src.buffer,
                    *source_offset,
                    &dst.buffer,
                    *destination_offset,
                    *size,
                ),
                _ => log::warn!(
                    "WgpuBackend: skipping copy between missing buffers {source:?} -> {destination:?}."
                ),
            },
            other => log::warn!("WgpuBackend: {other:?} ignored in a transfer submission."),
        }
    }
}
