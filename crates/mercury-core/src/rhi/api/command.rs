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

//! The backend-neutral command stream produced by a command list.
//!
//! Recording verbs are validated by the frontend and appended to a
//! [`CommandStream`]; backends replay the stream into native command buffers
//! at submission.

use super::format::IndexFormat;
use crate::rhi::handle::{BufferHandle, ParameterBlockHandle, PsoHandle};
use std::ops::Range;

/// A viewport rectangle with its depth range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Left edge in pixels.
    pub x: f32,
    /// Top edge in pixels.
    pub y: f32,
    /// Width in pixels.
    pub width: f32,
    /// Height in pixels.
    pub height: f32,
    /// Near depth.
    pub min_depth: f32,
    /// Far depth.
    pub max_depth: f32,
}

impl Viewport {
    /// A viewport covering a `width` x `height` target with depth `[0, 1]`.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// A scissor rectangle in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScissorRect {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
}

impl ScissorRect {
    /// A scissor covering a `width` x `height` target.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }
}

/// Values the swapchain target is cleared to at the start of a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearValues {
    /// RGBA clear color.
    pub color: [f32; 4],
    /// Depth clear value.
    pub depth: f32,
    /// Stencil clear value.
    pub stencil: u32,
}

impl Default for ClearValues {
    fn default() -> Self {
        Self {
            color: [0.0, 0.0, 0.0, 1.0],
            depth: 1.0,
            stencil: 0,
        }
    }
}

/// What a command list records into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandListKind {
    /// Draws into the swapchain target of the current frame.
    Graphics,
    /// Copies outside of any render pass.
    Transfer,
}

/// Lifecycle of a command list inside its pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CommandListState {
    /// Available for recording.
    #[default]
    Free,
    /// Accepting commands.
    Recording,
    /// Recording finished, not yet submitted.
    Closed,
    /// Handed to the GPU; reusable after the pool is reset.
    Submitted,
}

/// A single validated command.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    /// Sets the viewport.
    SetViewport(Viewport),
    /// Sets the scissor rectangle.
    SetScissor(ScissorRect),
    /// Binds a pipeline and its layout.
    BindPipeline(PsoHandle),
    /// Binds a parameter block at the pipeline's offset for `set_index`.
    BindParameterBlock {
        /// Set index as declared by the pipeline layout.
        set_index: u32,
        /// Resolved offset in the merged native layout.
        offset: u32,
        /// The block.
        block: ParameterBlockHandle,
    },
    /// Writes push constants at offset 0; the bytes live in the stream's arena.
    PushConstants {
        /// Byte range inside [`CommandStream::push_constant_bytes`].
        data: Range<usize>,
    },
    /// Binds a vertex buffer to a slot.
    SetVertexBuffer {
        /// Vertex buffer slot.
        slot: u32,
        /// Buffer.
        buffer: BufferHandle,
        /// Byte offset.
        offset: u64,
    },
    /// Binds the index buffer.
    SetIndexBuffer {
        /// Buffer.
        buffer: BufferHandle,
        /// Byte offset.
        offset: u64,
        /// Index format.
        format: IndexFormat,
    },
    /// Non-indexed draw.
    Draw {
        /// Number of vertices.
        vertex_count: u32,
        /// Number of instances.
        instance_count: u32,
        /// First vertex.
        first_vertex: u32,
        /// First instance.
        first_instance: u32,
    },
    /// Indexed draw.
    DrawIndexed {
        /// Number of indices.
        index_count: u32,
        /// Number of instances.
        instance_count: u32,
        /// First index.
        first_index: u32,
        /// Value added to each index.
        base_vertex: i32,
        /// First instance.
        first_instance: u32,
    },
    /// Buffer to buffer copy.
    CopyBufferToBuffer {
        /// Source buffer.
        source: BufferHandle,
        /// Source offset.
        source_offset: u64,
        /// Destination buffer.
        destination: BufferHandle,
        /// Destination offset.
        destination_offset: u64,
        /// Bytes to copy.
        size: u64,
    },
}

/// An append-only list of commands plus the push-constant bytes they reference.
///
/// Streams are recycled by their pool, so the allocations survive from one
/// frame to the next.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandStream {
    commands: Vec<RecordedCommand>,
    push_constant_bytes: Vec<u8>,
}

impl CommandStream {
    /// Creates an empty stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a command.
    pub fn push(&mut self, command: RecordedCommand) {
        self.commands.push(command);
    }

    /// Copies `bytes` into the arena and appends a [`RecordedCommand::PushConstants`].
    pub fn push_constants(&mut self, bytes: &[u8]) {
        let start = self.push_constant_bytes.len();
        self.push_constant_bytes.extend_from_slice(bytes);
        self.commands.push(RecordedCommand::PushConstants {
            data: start..start + bytes.len(),
        });
    }

    /// The recorded commands, in recording order.
    pub fn commands(&self) -> &[RecordedCommand] {
        &self.commands
    }

    /// Bytes referenced by a push-constant command.
    pub fn push_constant_data(&self, range: &Range<usize>) -> &[u8] {
        self.push_constant_bytes
            .get(range.clone())
            .unwrap_or_default()
    }

    /// Every push-constant byte recorded so far.
    pub fn push_constant_bytes(&self) -> &[u8] {
        &self.push_constant_bytes
    }

    /// Number of commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns `true` when nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Forgets every command, keeping the allocations.
    pub fn clear(&mut self) {
        self.commands.clear();
        self.push_constant_bytes.clear();
    }
}
