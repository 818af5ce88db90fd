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

//! Defines the `GraphicsBackend` trait, the contract every native API implements.

use crate::platform::NativeWindowHandle;
use crate::rhi::api::{
    AdapterInfo, BindingSetLayoutDescriptor, BufferAllocation, BufferDescriptor,
    NativePipelineDescriptor, RetiredObject, ShaderModuleDescriptor, SlotWrite,
    Submission, SwapchainInfo, TextureDescriptor, TextureLayout, TimelineId,
};
use crate::rhi::config::{BackendKind, GraphicsConfig, SwapchainConfig};
use crate::rhi::error::{PipelineError, RenderError, ResourceError, ShaderError, SlotRejection};
use crate::rhi::handle::{
    BufferHandle, ParameterBlockHandle, ParameterBlockLayoutHandle, PsoHandle, ShaderHandle,
    TextureHandle,
};
use std::fmt::Debug;
use std::time::Duration;

/// Outcome of a parameter block write that reached the backend.
#[derive(Debug, Default)]
pub struct ParameterBlockWriteOutcome {
    /// The previous native binding table, if the backend replaced it.
    pub retired: Option<RetiredObject>,
    /// Slots the backend could not wire; they were left empty.
    pub rejected: Vec<SlotRejection>,
}

/// The native half of the RHI.
///
/// The frontend [`Device`](crate::rhi::Device) validates every call, owns the
/// handle registries and decides *when* native objects are created and
/// released. A backend only translates: it keeps its native objects in tables
/// keyed by the handles it is given and never exposes native types outside its
/// own module.
///
/// The frontend calls a destruction method only once the GPU can no longer
/// reference the object, so submissions recorded before the handle was
/// destroyed still resolve it. The method removes the native object from the
/// backend's tables and hands it back as a [`RetiredObject`].
///
/// All methods take `&self`: backends guard their state internally so the
/// device can be shared across threads.
pub trait GraphicsBackend: Send + Sync + Debug + 'static {
    /// Which implementation this is.
    fn kind(&self) -> BackendKind;

    /// Short uppercase name of the backend, e.g. `"NULL"`.
    fn name(&self) -> &'static str;

    // --- Bootstrap ---

    /// Creates the native instance.
    fn initialize_instance(&self, config: &GraphicsConfig) -> Result<(), RenderError>;

    /// Lists the adapters visible to the instance, in enumeration order.
    fn enumerate_adapters(&self) -> Vec<AdapterInfo>;

    /// Creates the logical device and its queues on adapter `adapter_index`.
    fn create_device(&self, adapter_index: usize, config: &GraphicsConfig)
        -> Result<(), RenderError>;

    /// Releases the device and the instance. Every resource has already been
    /// destroyed by the frontend.
    fn shutdown(&self);

    // --- Buffers ---

    /// Allocates a buffer for `handle`, uploading `desc.initial_data` if present.
    fn create_buffer(
        &self,
        handle: BufferHandle,
        desc: &BufferDescriptor<'_>,
    ) -> Result<BufferAllocation, ResourceError>;

    /// Writes `data` at `offset`. The range was bounds-checked by the frontend.
    fn write_buffer(
        &self,
        handle: BufferHandle,
        offset: u64,
        data: &[u8],
    ) -> Result<(), ResourceError>;

    /// Removes the buffer from the backend tables.
    fn destroy_buffer(&self, handle: BufferHandle) -> Option<RetiredObject>;

    // --- Textures ---

    /// Creates a texture with its default view.
    fn create_texture(
        &self,
        handle: TextureHandle,
        desc: &TextureDescriptor<'_>,
    ) -> Result<(), ResourceError>;

    /// Uploads the full contents of `mip_level`.
    fn write_texture(
        &self,
        handle: TextureHandle,
        mip_level: u32,
        data: &[u8],
    ) -> Result<(), ResourceError>;

    /// Transitions the texture image between layouts. Backends with implicit
    /// barriers ignore it.
    fn transition_texture(&self, handle: TextureHandle, from: TextureLayout, to: TextureLayout) {
        let _ = (handle, from, to);
    }

    /// Removes the texture from the backend tables.
    fn destroy_texture(&self, handle: TextureHandle) -> Option<RetiredObject>;

    // --- Shaders and pipelines ---

    /// Compiles a shader module. When `handle` already has a module (update),
    /// the previous one is returned for retirement.
    fn create_shader_module(
        &self,
        handle: ShaderHandle,
        desc: &ShaderModuleDescriptor<'_>,
    ) -> Result<Option<RetiredObject>, ShaderError>;

    /// Removes the shader module from the backend tables.
    fn destroy_shader_module(&self, handle: ShaderHandle) -> Option<RetiredObject>;

    /// Builds a pipeline. When `handle` already has one (rebuild in place),
    /// the previous one is returned for retirement.
    fn create_pipeline(
        &self,
        handle: PsoHandle,
        desc: &NativePipelineDescriptor<'_>,
    ) -> Result<Option<RetiredObject>, PipelineError>;

    /// Removes the pipeline from the backend tables.
    fn destroy_pipeline(&self, handle: PsoHandle) -> Option<RetiredObject>;

    // --- Parameter blocks ---

    /// Compiles a binding set layout for set `set_index`.
    fn create_parameter_block_layout(
        &self,
        handle: ParameterBlockLayoutHandle,
        set_index: u32,
        desc: &BindingSetLayoutDescriptor,
    ) -> Result<(), ResourceError>;

    /// Removes the layout from the backend tables.
    fn destroy_parameter_block_layout(
        &self,
        handle: ParameterBlockLayoutHandle,
    ) -> Option<RetiredObject>;

    /// Allocates an empty binding table for `layout`.
    fn create_parameter_block(
        &self,
        handle: ParameterBlockHandle,
        layout: ParameterBlockLayoutHandle,
    ) -> Result<(), ResourceError>;

    /// Rewrites every slot of the binding table.
    ///
    /// `writes` covers each declared slot exactly once, in declaration order;
    /// slots the frontend rejected arrive as `Empty`.
    fn write_parameter_block(
        &self,
        handle: ParameterBlockHandle,
        writes: &[SlotWrite<'_>],
    ) -> Result<ParameterBlockWriteOutcome, ResourceError>;

    /// Removes the binding table from the backend tables.
    fn destroy_parameter_block(&self, handle: ParameterBlockHandle) -> Option<RetiredObject>;

    // --- Synchronization ---

    /// Creates a timeline semaphore starting at `initial_value`.
    fn create_timeline(&self, initial_value: u64) -> Result<TimelineId, RenderError>;

    /// Last value the GPU has signaled on `timeline`.
    fn timeline_value(&self, timeline: TimelineId) -> u64;

    /// Blocks until `timeline` reaches `value`.
    ///
    /// Returns `Ok(false)` if `timeout` elapsed first; `None` waits forever.
    fn wait_timeline(
        &self,
        timeline: TimelineId,
        value: u64,
        timeout: Option<Duration>,
    ) -> Result<bool, RenderError>;

    /// Raises `timeline` to `value` from the host. Never lowers it.
    fn signal_timeline(&self, timeline: TimelineId, value: u64) -> Result<(), RenderError>;

    /// Releases a timeline semaphore.
    fn destroy_timeline(&self, timeline: TimelineId);

    /// Blocks until every queue is idle.
    fn wait_idle(&self) -> Result<(), RenderError>;

    /// Processes completed work without blocking.
    fn poll(&self);

    // --- Swapchain ---

    /// Creates the swapchain and its depth/MSAA targets for `window`.
    fn create_swapchain(
        &self,
        window: &NativeWindowHandle,
        width: u32,
        height: u32,
        config: &SwapchainConfig,
    ) -> Result<SwapchainInfo, RenderError>;

    /// Recreates the swapchain images and targets at a new size. The frontend
    /// has already waited for the device to be idle.
    fn resize_swapchain(&self, width: u32, height: u32) -> Result<SwapchainInfo, RenderError>;

    /// Releases the swapchain.
    fn destroy_swapchain(&self);

    /// Acquires the next presentable image and returns its index.
    fn acquire_image(&self) -> Result<u32, RenderError>;

    /// Replays and submits a closed command list.
    fn submit(&self, submission: &Submission<'_>) -> Result<(), RenderError>;

    /// Presents the image acquired by the last [`acquire_image`](Self::acquire_image).
    fn present(&self) -> Result<(), RenderError>;
}
