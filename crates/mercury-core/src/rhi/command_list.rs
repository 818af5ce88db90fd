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

//! Validated command recording.
//!
//! A [`CommandList`] checks every verb against the device's registries and
//! the bound pipeline, then appends it to a backend-neutral
//! [`CommandStream`]. The stream is replayed by the backend at submission.

use super::api::buffer::range_in_bounds;
use super::api::command::{
    ClearValues, CommandListKind, CommandListState, CommandStream, RecordedCommand, ScissorRect,
    Viewport,
};
use super::api::format::IndexFormat;
use super::device::{Device, PipelineBinding};
use super::error::RecordingError;
use super::handle::{BufferHandle, ParameterBlockHandle, PsoHandle};
use std::mem;

/// Where a list's stream came from and must go back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ListOrigin {
    /// A frame slot's pool.
    Frame {
        slot: usize,
        entry: usize,
        epoch: u64,
    },
    /// A transfer context's pool.
    Transfer {
        context: usize,
        entry: usize,
        epoch: u64,
    },
}

#[derive(Debug, Clone, Copy)]
struct BoundPipeline {
    handle: PsoHandle,
    binding: PipelineBinding,
}

/// A command list being recorded.
///
/// Lists are handed out by [`Device::acquire_next_image`] (graphics) and by
/// [`Device::submit_one_time_commands`] (transfer). A list borrows its device
/// and cannot outlive it. Dropping a list that was never submitted returns its
/// storage to the pool and logs a warning.
#[derive(Debug)]
pub struct CommandList<'d> {
    device: &'d Device,
    origin: ListOrigin,
    kind: CommandListKind,
    state: CommandListState,
    stream: CommandStream,
    clear: Option<ClearValues>,
    bound: Option<BoundPipeline>,
    viewport_set: bool,
    scissor_set: bool,
    index_buffer_set: bool,
    released: bool,
}

impl<'d> CommandList<'d> {
    pub(crate) fn new(
        device: &'d Device,
        origin: ListOrigin,
        kind: CommandListKind,
        stream: CommandStream,
        clear: Option<ClearValues>,
    ) -> Self {
        Self {
            device,
            origin,
            kind,
            state: CommandListState::Recording,
            stream,
            clear,
            bound: None,
            viewport_set: false,
            scissor_set: false,
            index_buffer_set: false,
            released: false,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> CommandListState {
        self.state
    }

    /// Whether this is a frame or a transfer list.
    pub fn kind(&self) -> CommandListKind {
        self.kind
    }

    /// The commands recorded so far.
    pub fn stream(&self) -> &CommandStream {
        &self.stream
    }

    /// Pipeline bound by the last successful [`set_pso`](Self::set_pso).
    pub fn bound_pipeline(&self) -> Option<PsoHandle> {
        self.bound.map(|b| b.handle)
    }

    fn ensure_recording(&self, verb: &'static str) -> Result<(), RecordingError> {
        if self.state != CommandListState::Recording {
            return Err(RecordingError::InvalidRecordingState {
                verb,
                state: self.state,
            });
        }
        Ok(())
    }

    fn ensure_kind(&self, verb: &'static str, kind: CommandListKind) -> Result<(), RecordingError> {
        self.ensure_recording(verb)?;
        if self.kind != kind {
            return Err(RecordingError::WrongListKind {
                verb,
                kind: self.kind,
            });
        }
        Ok(())
    }

    fn bound(&self, verb: &'static str) -> Result<BoundPipeline, RecordingError> {
        self.bound.ok_or(RecordingError::NoPipelineBound { verb })
    }

    /// Binds a pipeline. Binding the pipeline that is already bound records
    /// nothing.
    pub fn set_pso(&mut self, pso: PsoHandle) -> Result<(), RecordingError> {
        self.ensure_kind("set_pso", CommandListKind::Graphics)?;
        if self.bound.is_some_and(|b| b.handle == pso) {
            return Ok(());
        }
        let binding = self
            .device
            .pipeline_binding(pso)
            .ok_or(RecordingError::InvalidPipeline)?;
        self.stream.push(RecordedCommand::BindPipeline(pso));
        self.bound = Some(BoundPipeline {
            handle: pso,
            binding,
        });
        Ok(())
    }

    /// Binds `block` at binding set `set_index` of the bound pipeline.
    ///
    /// The block's layout must be the one the pipeline compiled for that set.
    pub fn set_parameter_block(
        &mut self,
        set_index: u32,
        block: ParameterBlockHandle,
    ) -> Result<(), RecordingError> {
        const VERB: &str = "set_parameter_block";
        self.ensure_kind(VERB, CommandListKind::Graphics)?;
        let bound = self.bound(VERB)?;
        let offset = bound
            .binding
            .offset_of(set_index)
            .ok_or(RecordingError::SetNotInLayout { set_index })?;
        let layout = self
            .device
            .parameter_block_layout(block)
            .ok_or(RecordingError::InvalidResource("parameter block"))?;
        if bound.binding.layout_of(set_index) != Some(layout) {
            return Err(RecordingError::LayoutMismatch { set_index });
        }
        self.stream.push(RecordedCommand::BindParameterBlock {
            set_index,
            offset,
            block,
        });
        Ok(())
    }

    /// Writes `data` into the bound pipeline's push-constant range at offset 0.
    pub fn push_constants(&mut self, data: &[u8]) -> Result<(), RecordingError> {
        const VERB: &str = "push_constants";
        self.ensure_kind(VERB, CommandListKind::Graphics)?;
        let bound = self.bound(VERB)?;
        let capacity = bound.binding.push_constant_size;
        if data.len() > capacity as usize {
            return Err(RecordingError::PushConstantsTooLarge {
                size: data.len(),
                capacity,
            });
        }
        if !data.is_empty() {
            self.stream.push_constants(data);
        }
        Ok(())
    }

    /// [`push_constants`](Self::push_constants) for a plain-old-data value.
    pub fn push_constants_pod<T: bytemuck::Pod>(&mut self, value: &T) -> Result<(), RecordingError> {
        self.push_constants(bytemuck::bytes_of(value))
    }

    /// Sets the viewport.
    pub fn set_viewport(&mut self, viewport: Viewport) -> Result<(), RecordingError> {
        self.ensure_kind("set_viewport", CommandListKind::Graphics)?;
        self.stream.push(RecordedCommand::SetViewport(viewport));
        self.viewport_set = true;
        Ok(())
    }

    /// Sets the scissor rectangle.
    pub fn set_scissor(&mut self, scissor: ScissorRect) -> Result<(), RecordingError> {
        self.ensure_kind("set_scissor", CommandListKind::Graphics)?;
        self.stream.push(RecordedCommand::SetScissor(scissor));
        self.scissor_set = true;
        Ok(())
    }

    /// Binds `buffer` as the vertex buffer of `slot`.
    pub fn set_vertex_buffer(
        &mut self,
        slot: u32,
        buffer: BufferHandle,
        offset: u64,
    ) -> Result<(), RecordingError> {
        self.ensure_kind("set_vertex_buffer", CommandListKind::Graphics)?;
        let info = self
            .device
            .buffer_info(buffer)
            .ok_or(RecordingError::InvalidResource("buffer"))?;
        if offset > info.size {
            return Err(RecordingError::BufferRangeOutOfBounds);
        }
        self.stream.push(RecordedCommand::SetVertexBuffer {
            slot,
            buffer,
            offset,
        });
        Ok(())
    }

    /// Binds the index buffer.
    pub fn set_index_buffer(
        &mut self,
        buffer: BufferHandle,
        offset: u64,
        format: IndexFormat,
    ) -> Result<(), RecordingError> {
        self.ensure_kind("set_index_buffer", CommandListKind::Graphics)?;
        let info = self
            .device
            .buffer_info(buffer)
            .ok_or(RecordingError::InvalidResource("buffer"))?;
        if offset > info.size {
            return Err(RecordingError::BufferRangeOutOfBounds);
        }
        self.stream.push(RecordedCommand::SetIndexBuffer {
            buffer,
            offset,
            format,
        });
        self.index_buffer_set = true;
        Ok(())
    }

    fn ensure_drawable(&self, verb: &'static str) -> Result<(), RecordingError> {
        self.ensure_kind(verb, CommandListKind::Graphics)?;
        self.bound(verb)?;
        if !self.viewport_set {
            return Err(RecordingError::ViewportNotSet);
        }
        if !self.scissor_set {
            return Err(RecordingError::ScissorNotSet);
        }
        Ok(())
    }

    /// Records a non-indexed draw.
    pub fn draw(
        &mut self,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) -> Result<(), RecordingError> {
        self.ensure_drawable("draw")?;
        self.stream.push(RecordedCommand::Draw {
            vertex_count,
            instance_count,
            first_vertex,
            first_instance,
        });
        Ok(())
    }

    /// Records an indexed draw using the bound index buffer.
    pub fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        base_vertex: i32,
        first_instance: u32,
    ) -> Result<(), RecordingError> {
        self.ensure_drawable("draw_indexed")?;
        if !self.index_buffer_set {
            return Err(RecordingError::IndexBufferNotSet);
        }
        self.stream.push(RecordedCommand::DrawIndexed {
            index_count,
            instance_count,
            first_index,
            base_vertex,
            first_instance,
        });
        Ok(())
    }

    /// Copies `size` bytes between two buffers. Transfer lists only.
    pub fn copy_buffer_to_buffer(
        &mut self,
        source: BufferHandle,
        source_offset: u64,
        destination: BufferHandle,
        destination_offset: u64,
        size: u64,
    ) -> Result<(), RecordingError> {
        self.ensure_kind("copy_buffer_to_buffer", CommandListKind::Transfer)?;
        let src = self
            .device
            .buffer_info(source)
            .ok_or(RecordingError::InvalidResource("source buffer"))?;
        let dst = self
            .device
            .buffer_info(destination)
            .ok_or(RecordingError::InvalidResource("destination buffer"))?;
        if !range_in_bounds(source_offset, size, src.size)
            || !range_in_bounds(destination_offset, size, dst.size)
        {
            return Err(RecordingError::BufferRangeOutOfBounds);
        }
        self.stream.push(RecordedCommand::CopyBufferToBuffer {
            source,
            source_offset,
            destination,
            destination_offset,
            size,
        });
        Ok(())
    }

    /// Ends recording. Closing a closed list is a no-op.
    pub fn close(&mut self) -> Result<(), RecordingError> {
        match self.state {
            CommandListState::Recording => {
                self.state = CommandListState::Closed;
                Ok(())
            }
            CommandListState::Closed => Ok(()),
            state => Err(RecordingError::InvalidRecordingState {
                verb: "close",
                state,
            }),
        }
    }

    pub(crate) fn origin(&self) -> ListOrigin {
        self.origin
    }

    pub(crate) fn clear_values(&self) -> Option<ClearValues> {
        self.clear
    }

    /// Takes the stream for submission; the list no longer owns pool storage.
    pub(crate) fn take_for_submission(&mut self) -> CommandStream {
        self.released = true;
        self.state = CommandListState::Submitted;
        mem::take(&mut self.stream)
    }
}

impl Drop for CommandList<'_> {
    fn drop(&mut self) {
        if !self.released {
            let stream = mem::take(&mut self.stream);
            self.device.abandon_list(self.origin, stream);
        }
    }
}
