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

//! CPU-side stand-ins for the native objects of the null backend.

use mercury_core::rhi::{
    BindingSlot, BufferHandle, BufferUsage, ClearValues, CommandListKind, CommandStream,
    ParameterBlockHandle, ParameterBlockLayoutHandle, ParameterBlockResource, PsoHandle,
    RecordedCommand, ShaderHandle, ShaderStage, SwapchainInfo, TextureFormat, TextureHandle,
    TextureLayout, TimelineId, TimelineSignal,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A submission as the null "GPU" received it.
#[derive(Debug, Clone, PartialEq)]
pub struct NullSubmission {
    /// Graphics or transfer.
    pub kind: CommandListKind,
    /// The replayed commands, push-constant bytes included.
    pub stream: CommandStream,
    /// Clear values of a frame submission.
    pub clear: Option<ClearValues>,
    /// Value signaled on completion.
    pub signal: TimelineSignal,
}

impl NullSubmission {
    /// The recorded commands.
    pub fn commands(&self) -> &[RecordedCommand] {
        self.stream.commands()
    }

    /// Number of `BindPipeline` commands.
    pub fn pipeline_binds(&self) -> usize {
        self.commands()
            .iter()
            .filter(|c| matches!(c, RecordedCommand::BindPipeline(_)))
            .count()
    }
}

/// Counts how many stand-in objects were released.
#[derive(Debug)]
pub(crate) struct NullNativeObject {
    released: Arc<AtomicUsize>,
}

impl NullNativeObject {
    pub(crate) fn new(released: &Arc<AtomicUsize>) -> Self {
        Self {
            released: released.clone(),
        }
    }
}

impl Drop for NullNativeObject {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug)]
pub(crate) struct NullBuffer {
    pub(crate) data: Vec<u8>,
    pub(crate) usage: BufferUsage,
}

#[derive(Debug)]
pub(crate) struct NullTexture {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) format: TextureFormat,
    pub(crate) levels: Vec<Vec<u8>>,
    pub(crate) transitions: Vec<(TextureLayout, TextureLayout)>,
}

#[derive(Debug)]
pub(crate) struct NullShader {
    pub(crate) stage: ShaderStage,
    pub(crate) entry_point: String,
    pub(crate) versions: u32,
}

#[derive(Debug)]
pub(crate) struct NullPipeline {
    pub(crate) label: String,
    pub(crate) set_layouts: Vec<ParameterBlockLayoutHandle>,
    pub(crate) push_constant_size: u32,
    pub(crate) builds: u32,
}

#[derive(Debug)]
pub(crate) struct NullLayout {
    pub(crate) set_index: u32,
    pub(crate) slots: Vec<BindingSlot>,
}

#[derive(Debug)]
pub(crate) struct NullBlock {
    pub(crate) layout: ParameterBlockLayoutHandle,
    pub(crate) resources: Vec<ParameterBlockResource>,
    pub(crate) writes: u32,
}

#[derive(Debug)]
pub(crate) struct NullSwapchain {
    pub(crate) info: SwapchainInfo,
    pub(crate) next_image: u32,
    pub(crate) acquired: Option<u32>,
    pub(crate) outdated: bool,
}

/// Everything the null backend owns, shared with [`NullProbe`](super::NullProbe).
#[derive(Debug, Default)]
pub(crate) struct NullState {
    pub(crate) instance_ready: bool,
    pub(crate) device_adapter: Option<usize>,

    pub(crate) buffers: HashMap<BufferHandle, NullBuffer>,
    pub(crate) textures: HashMap<TextureHandle, NullTexture>,
    pub(crate) shaders: HashMap<ShaderHandle, NullShader>,
    pub(crate) pipelines: HashMap<PsoHandle, NullPipeline>,
    pub(crate) layouts: HashMap<ParameterBlockLayoutHandle, NullLayout>,
    pub(crate) blocks: HashMap<ParameterBlockHandle, NullBlock>,

    pub(crate) timelines: HashMap<TimelineId, u64>,
    pub(crate) next_timeline: u32,
    /// Submissions the "GPU" has not finished yet (deferred completion only).
    pub(crate) in_flight: VecDeque<(CommandListKind, Vec<TimelineSignal>)>,

    pub(crate) swapchain: Option<NullSwapchain>,
    pub(crate) submissions: Vec<NullSubmission>,
    pub(crate) presents: u64,
    pub(crate) resizes: u32,
    pub(crate) wait_idles: u32,
    pub(crate) frames_in_flight_at_acquire: Vec<usize>,

    pub(crate) released: Arc<AtomicUsize>,
}

impl NullState {
    /// Marks the oldest in-flight submission complete.
    pub(crate) fn complete_next(&mut self) -> bool {
        let Some((_, signals)) = self.in_flight.pop_front() else {
            return false;
        };
        for signal in signals {
            if let Some(value) = self.timelines.get_mut(&signal.timeline) {
                *value = (*value).max(signal.value);
            }
        }
        true
    }

    /// Completes in-flight submissions in order until `timeline` reaches `value`.
    pub(crate) fn complete_until(&mut self, timeline: TimelineId, value: u64) -> bool {
        loop {
            if self.timelines.get(&timeline).copied().unwrap_or(0) >= value {
                return true;
            }
            if !self.complete_next() {
                return false;
            }
        }
    }

    pub(crate) fn complete_all(&mut self) {
        while self.complete_next() {}
    }

    pub(crate) fn frames_in_flight(&self) -> usize {
        self.in_flight
            .iter()
            .filter(|(kind, _)| *kind == CommandListKind::Graphics)
            .count()
    }

    pub(crate) fn native_object(&self) -> NullNativeObject {
        NullNativeObject::new(&self.released)
    }
}
