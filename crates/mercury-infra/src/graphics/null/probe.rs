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

use super::state::{NullState, NullSubmission};
use mercury_core::rhi::{
    BindingSlot, BufferHandle, BufferUsage, CommandListKind, ParameterBlockHandle,
    ParameterBlockLayoutHandle, ParameterBlockResource, PsoHandle, ShaderHandle, ShaderStage,
    SwapchainInfo, TextureHandle, TextureLayout, TimelineId,
};
use mercury_core::utils::sync::lock;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, MutexGuard};

/// Read access to what a [`NullBackend`](super::NullBackend) received, plus
/// control over when its "GPU" finishes work.
#[derive(Debug, Clone)]
pub struct NullProbe {
    state: Arc<Mutex<NullState>>,
}

impl NullProbe {
    pub(crate) fn new(state: Arc<Mutex<NullState>>) -> Self {
        Self { state }
    }

    fn state(&self) -> MutexGuard<'_, NullState> {
        lock(&self.state)
    }

    /// Adapter the device was created on.
    pub fn device_adapter(&self) -> Option<usize> {
        self.state().device_adapter
    }

    // --- Resources ---

    /// Current contents of a native buffer.
    pub fn buffer_contents(&self, handle: BufferHandle) -> Option<Vec<u8>> {
        self.state().buffers.get(&handle).map(|b| b.data.clone())
    }

    /// Usage the native buffer was created with.
    pub fn buffer_usage(&self, handle: BufferHandle) -> Option<BufferUsage> {
        self.state().buffers.get(&handle).map(|b| b.usage)
    }

    /// Bytes last uploaded to a mip level; empty until the first upload.
    pub fn texture_level(&self, handle: TextureHandle, mip_level: u32) -> Option<Vec<u8>> {
        self.state()
            .textures
            .get(&handle)
            .and_then(|t| t.levels.get(mip_level as usize).cloned())
    }

    /// Layout transitions issued for a texture, oldest first.
    pub fn texture_transitions(&self, handle: TextureHandle) -> Vec<(TextureLayout, TextureLayout)> {
        self.state()
            .textures
            .get(&handle)
            .map(|t| t.transitions.clone())
            .unwrap_or_default()
    }

    /// Stage and number of compilations of a shader module.
    pub fn shader_versions(&self, handle: ShaderHandle) -> Option<(ShaderStage, u32)> {
        self.state()
            .shaders
            .get(&handle)
            .map(|s| (s.stage, s.versions))
    }

    /// How many times the native pipeline behind `handle` was built.
    pub fn pipeline_builds(&self, handle: PsoHandle) -> Option<u32> {
        self.state().pipelines.get(&handle).map(|p| p.builds)
    }

    /// Label the native pipeline was last built with.
    pub fn pipeline_label(&self, handle: PsoHandle) -> Option<String> {
        self.state().pipelines.get(&handle).map(|p| p.label.clone())
    }

    /// Compacted layouts and push-constant size the pipeline was built with.
    pub fn pipeline_layout(
        &self,
        handle: PsoHandle,
    ) -> Option<(Vec<ParameterBlockLayoutHandle>, u32)> {
        self.state()
            .pipelines
            .get(&handle)
            .map(|p| (p.set_layouts.clone(), p.push_constant_size))
    }

    /// Set index and slots of a native layout.
    pub fn layout(&self, handle: ParameterBlockLayoutHandle) -> Option<(u32, Vec<BindingSlot>)> {
        self.state()
            .layouts
            .get(&handle)
            .map(|l| (l.set_index, l.slots.clone()))
    }

    /// Number of native layouts alive.
    pub fn layout_count(&self) -> usize {
        self.state().layouts.len()
    }

    /// Resources wired into a binding table, one per slot.
    pub fn block_resources(&self, handle: ParameterBlockHandle) -> Option<Vec<ParameterBlockResource>> {
        self.state()
            .blocks
            .get(&handle)
            .map(|b| b.resources.clone())
    }

    /// Layout and write count of a binding table.
    pub fn block_info(&self, handle: ParameterBlockHandle) -> Option<(ParameterBlockLayoutHandle, u32)> {
        self.state()
            .blocks
            .get(&handle)
            .map(|b| (b.layout, b.writes))
    }

    /// Number of native objects of every kind still alive.
    pub fn live_objects(&self) -> usize {
        let state = self.state();
        state.buffers.len()
            + state.textures.len()
            + state.shaders.len()
            + state.pipelines.len()
            + state.layouts.len()
            + state.blocks.len()
    }

    /// Number of retired native objects that were dropped.
    pub fn released_objects(&self) -> usize {
        self.state().released.load(Ordering::SeqCst)
    }

    // --- Submissions and frames ---

    /// Every submission, oldest first.
    pub fn submissions(&self) -> Vec<NullSubmission> {
        self.state().submissions.clone()
    }

    /// Submissions of one kind, oldest first.
    pub fn submissions_of(&self, kind: CommandListKind) -> Vec<NullSubmission> {
        self.state()
            .submissions
            .iter()
            .filter(|s| s.kind == kind)
            .cloned()
            .collect()
    }

    /// The most recent frame submission.
    pub fn last_frame(&self) -> Option<NullSubmission> {
        self.state()
            .submissions
            .iter()
            .rev()
            .find(|s| s.kind == CommandListKind::Graphics)
            .cloned()
    }

    /// Number of presents.
    pub fn presents(&self) -> u64 {
        self.state().presents
    }

    /// Number of swapchain rebuilds.
    pub fn resizes(&self) -> u32 {
        self.state().resizes
    }

    /// Number of wait-idle calls.
    pub fn wait_idles(&self) -> u32 {
        self.state().wait_idles
    }

    /// The swapchain as the backend last configured it.
    pub fn swapchain_info(&self) -> Option<SwapchainInfo> {
        self.state().swapchain.as_ref().map(|s| s.info)
    }

    /// Frame submissions still in flight at each successful acquire.
    pub fn frames_in_flight_at_acquire(&self) -> Vec<usize> {
        self.state().frames_in_flight_at_acquire.clone()
    }

    /// Submissions of any kind not yet completed.
    pub fn in_flight(&self) -> usize {
        self.state().in_flight.len()
    }

    /// Last value signaled on a timeline.
    pub fn timeline_value(&self, timeline: TimelineId) -> Option<u64> {
        self.state().timelines.get(&timeline).copied()
    }

    // --- Control ---

    /// Completes the oldest in-flight submission. Returns `false` when
    /// nothing was in flight.
    pub fn complete_next(&self) -> bool {
        self.state().complete_next()
    }

    /// Completes every in-flight submission.
    pub fn complete_all(&self) {
        self.state().complete_all();
    }

    /// Makes the next acquire and present report an outdated surface.
    pub fn mark_surface_outdated(&self) {
        if let Some(swapchain) = self.state().swapchain.as_mut() {
            swapchain.outdated = true;
        }
    }
}
