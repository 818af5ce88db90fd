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

//! The backend-agnostic device frontend.
//!
//! [`Device`] owns the handle registries, validates every call before it
//! reaches the [`GraphicsBackend`], paces frames against the GPU and defers
//! the release of native objects until the GPU is done with them.
//!
//! Lock order: `resources`, then `swapchain`, then `transfers`, then
//! `retirement`. Completion callbacks run and retired objects are dropped
//! with no lock held.

use super::api::adapter::{select_adapter, AdapterInfo};
use super::api::buffer::{range_in_bounds, BufferDescriptor, BufferInfo, BufferUsage};
use super::api::command::{
    ClearValues, CommandListKind, CommandListState, CommandStream, ScissorRect, Viewport,
};
use super::api::parameter_block::{
    BindingSetLayoutDescriptor, BindingSlot, DescriptorPool, ParameterBlockResource,
    ShaderResourceType, SlotWrite, MAX_BINDING_SETS,
};
use super::api::pipeline::{
    NativePipelineDescriptor, RasterizePipelineDescriptor, ShaderStageRef,
};
use super::api::shader::{ShaderModuleDescriptor, ShaderStage};
use super::api::sync::{RetiredObject, Submission, SwapchainInfo, TimelineId, TimelineSignal};
use super::api::texture::{TextureDescriptor, TextureLayout, TextureUsage};
use super::command_list::{CommandList, ListOrigin};
use super::config::{BackendKind, GraphicsConfig};
use super::error::{
    PipelineError, RecordingError, RenderError, ResourceError, ShaderError, SlotRejection,
};
use super::frame::FramePacer;
use super::handle::{
    kind, BufferHandle, Handle, ParameterBlockHandle, ParameterBlockLayoutHandle, PsoHandle,
    ResourceKind, ResourceKindId, ShaderHandle, TextureHandle,
};
use super::lifecycle::GraphicsState;
use super::registry::ResourceRegistry;
use super::retirement::{DestroyedHandle, RetireStamp, Retiree, RetirementQueue};
use super::semaphore::TimelineSemaphore;
use super::traits::GraphicsBackend;
use super::transfer::{CompletionCallback, TransferRing};
use crate::platform::Platform;
use crate::utils::sync::lock;
use std::fmt;
use std::sync::{Arc, Mutex};

#[derive(Debug)]
struct BufferRecord {
    label: Option<String>,
    info: BufferInfo,
}

#[derive(Debug)]
struct TextureRecord {
    label: Option<String>,
    width: u32,
    height: u32,
    usage: TextureUsage,
    level0_size: Option<u64>,
    layout: TextureLayout,
}

#[derive(Debug)]
struct ShaderRecord {
    label: String,
    stage: ShaderStage,
    entry_point: String,
}

#[derive(Debug)]
struct LayoutRecord {
    set_index: u32,
    desc: BindingSetLayoutDescriptor,
    counts: [u32; 5],
}

#[derive(Debug)]
struct BlockRecord {
    layout: ParameterBlockLayoutHandle,
    counts: [u32; 5],
    contents: Vec<ParameterBlockResource>,
}

/// How a pipeline's binding sets map onto its native layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PipelineBinding {
    set_offsets: [Option<u32>; MAX_BINDING_SETS],
    set_layouts: [ParameterBlockLayoutHandle; MAX_BINDING_SETS],
    pub(crate) push_constant_size: u32,
}

impl PipelineBinding {
    pub(crate) fn offset_of(&self, set_index: u32) -> Option<u32> {
        self.set_offsets.get(set_index as usize).copied().flatten()
    }

    pub(crate) fn layout_of(&self, set_index: u32) -> Option<ParameterBlockLayoutHandle> {
        self.set_layouts
            .get(set_index as usize)
            .copied()
            .filter(|h| !h.is_invalid())
    }

    fn ordered_layouts(&self) -> Vec<ParameterBlockLayoutHandle> {
        self.set_layouts
            .iter()
            .copied()
            .filter(|h| !h.is_invalid())
            .collect()
    }
}

#[derive(Debug)]
struct PipelineRecord {
    desc: RasterizePipelineDescriptor,
    binding: PipelineBinding,
}

#[derive(Debug)]
struct ResourceTables {
    buffers: ResourceRegistry<kind::Buffer, BufferRecord>,
    textures: ResourceRegistry<kind::Texture, TextureRecord>,
    shaders: ResourceRegistry<kind::Shader, ShaderRecord>,
    pipelines: ResourceRegistry<kind::Pipeline, PipelineRecord>,
    layouts: ResourceRegistry<kind::ParameterBlockLayout, LayoutRecord>,
    blocks: ResourceRegistry<kind::ParameterBlock, BlockRecord>,
    descriptor_pool: DescriptorPool,
}

#[derive(Debug)]
struct SwapchainState {
    pacer: FramePacer,
    info: SwapchainInfo,
    needs_rebuild: bool,
    recording: bool,
    image_index: u32,
}

fn transition(current: &mut GraphicsState, next: GraphicsState) -> bool {
    if *current == next {
        return true;
    }
    if !current.can_transition_to(next) {
        log::error!("Device: refusing state transition {current:?} -> {next:?}");
        return false;
    }
    log::info!("Device: {current:?} -> {next:?}");
    *current = next;
    true
}

/// The RHI device: resource factory, frame pacer and submission point.
///
/// Every method takes `&self`; state is guarded internally so a device can
/// be shared, although calls are expected from a single logical thread.
pub struct Device {
    backend: Box<dyn GraphicsBackend>,
    platform: Arc<dyn Platform>,
    config: GraphicsConfig,
    adapter: AdapterInfo,
    adapter_index: usize,
    transfer_timeline: TimelineId,
    state: Mutex<GraphicsState>,
    clear: Mutex<ClearValues>,
    resources: Mutex<ResourceTables>,
    swapchain: Mutex<Option<SwapchainState>>,
    transfers: Mutex<TransferRing>,
    retirement: Mutex<RetirementQueue>,
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("backend", &self.backend.name())
            .field("adapter", &self.adapter.name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Device {
    /// Brings `backend` up to `DeviceReady`.
    ///
    /// Creates the instance, selects an adapter according to
    /// `config.adapter` and creates the logical device. A failure to create
    /// the native device is unrecoverable and goes through
    /// [`Platform::fatal_fail`].
    pub fn new(
        backend: Box<dyn GraphicsBackend>,
        platform: Arc<dyn Platform>,
        mut config: GraphicsConfig,
    ) -> Result<Self, RenderError> {
        config
            .validate()
            .map_err(|e| RenderError::InvalidConfig(e.to_string()))?;

        log::info!("Device: bootstrapping the {} backend", backend.name());
        let mut state = GraphicsState::Uninitialized;

        backend.initialize_instance(&config)?;
        transition(&mut state, GraphicsState::InstanceReady);

        let adapters = backend.enumerate_adapters();
        for (index, adapter) in adapters.iter().enumerate() {
            log::info!("Device: adapter {index}: {adapter}");
        }
        let adapter_index = select_adapter(&adapters, &config.adapter);
        let adapter = adapters
            .get(adapter_index)
            .cloned()
            .unwrap_or_else(|| AdapterInfo::new("<no adapter>", Default::default(), 0));
        log::info!("Device: selected adapter {adapter_index} '{}'", adapter.name);
        transition(&mut state, GraphicsState::AdapterAcquired);

        if let Err(err) = backend.create_device(adapter_index, &config) {
            let reason = format!("device creation failed: {err}");
            log::error!("Device: {reason}");
            platform.fatal_fail(&reason);
        }
        transition(&mut state, GraphicsState::DeviceReady);

        let transfer_timeline = match backend.create_timeline(0) {
            Ok(timeline) => timeline,
            Err(err) => platform.fatal_fail(&format!("transfer timeline creation failed: {err}")),
        };

        let swap = &config.swapchain;
        let clear = ClearValues {
            color: swap.clear_color,
            depth: swap.clear_depth,
            stencil: swap.clear_stencil,
        };
        let resources = ResourceTables {
            buffers: ResourceRegistry::new(),
            textures: ResourceRegistry::new(),
            shaders: ResourceRegistry::new(),
            pipelines: ResourceRegistry::new(),
            layouts: ResourceRegistry::new(),
            blocks: ResourceRegistry::new(),
            descriptor_pool: DescriptorPool::new(config.descriptor_pool_capacity),
        };
        let ring = TransferRing::new(transfer_timeline, config.transfer_ring_size as usize);

        Ok(Self {
            backend,
            platform,
            adapter,
            adapter_index,
            transfer_timeline,
            state: Mutex::new(state),
            clear: Mutex::new(clear),
            resources: Mutex::new(resources),
            swapchain: Mutex::new(None),
            transfers: Mutex::new(ring),
            retirement: Mutex::new(RetirementQueue::new()),
            config,
        })
    }

    fn fatal(&self, context: &str, err: impl fmt::Display) -> ! {
        let reason = format!("{context}: {err}");
        log::error!("Device: {reason}");
        self.platform.fatal_fail(&reason)
    }

    fn set_state(&self, next: GraphicsState) -> bool {
        transition(&mut lock(&self.state), next)
    }

    fn require_device(&self, operation: &'static str) -> Result<(), RenderError> {
        let state = self.state();
        if state.has_device() {
            Ok(())
        } else {
            Err(RenderError::InvalidState { operation, state })
        }
    }

    // --- Introspection ---

    /// Current lifecycle state.
    pub fn state(&self) -> GraphicsState {
        *lock(&self.state)
    }

    /// Short name of the active backend, `"NULL"` or `"WGPU"`.
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Which backend is active.
    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// The selected adapter.
    pub fn adapter_info(&self) -> &AdapterInfo {
        &self.adapter
    }

    /// Enumeration index of the selected adapter.
    pub fn adapter_index(&self) -> usize {
        self.adapter_index
    }

    /// The validated configuration the device was created with.
    pub fn config(&self) -> &GraphicsConfig {
        &self.config
    }

    /// Number of frames in flight (N).
    pub fn frames_in_flight(&self) -> usize {
        self.config.swapchain.frames_in_flight as usize
    }

    /// Active frame slot, while a swapchain exists.
    pub fn frame_cursor(&self) -> Option<usize> {
        lock(&self.swapchain).as_ref().map(|sc| sc.pacer.cursor())
    }

    /// Frames presented since the swapchain was created.
    pub fn frames_submitted(&self) -> u64 {
        lock(&self.swapchain)
            .as_ref()
            .map_or(0, |sc| sc.pacer.frames_submitted())
    }

    /// Current swapchain description.
    pub fn swapchain_info(&self) -> Option<SwapchainInfo> {
        lock(&self.swapchain).as_ref().map(|sc| sc.info)
    }

    /// Index of the image acquired by the last successful acquire.
    pub fn current_image_index(&self) -> Option<u32> {
        lock(&self.swapchain).as_ref().map(|sc| sc.image_index)
    }

    /// Native objects waiting for the GPU before they are released.
    pub fn pending_retirements(&self) -> usize {
        lock(&self.retirement).len()
    }

    /// One-time submissions not yet observed complete.
    pub fn transfers_in_flight(&self) -> usize {
        lock(&self.transfers).in_flight()
    }

    /// Descriptors of `kind` reserved by live parameter blocks.
    pub fn descriptor_pool_usage(&self, kind: ShaderResourceType) -> u32 {
        lock(&self.resources).descriptor_pool.used(kind)
    }

    /// Returns `true` if `handle` refers to a live resource of this device.
    pub fn is_valid<K: ResourceKind>(&self, handle: Handle<K>) -> bool {
        let tables = lock(&self.resources);
        let (index, generation) = (handle.index(), handle.generation());
        match K::KIND {
            ResourceKindId::Buffer => tables
                .buffers
                .is_valid(Handle::from_raw_parts(index, generation)),
            ResourceKindId::Texture => tables
                .textures
                .is_valid(Handle::from_raw_parts(index, generation)),
            ResourceKindId::Shader => tables
                .shaders
                .is_valid(Handle::from_raw_parts(index, generation)),
            ResourceKindId::Pipeline => tables
                .pipelines
                .is_valid(Handle::from_raw_parts(index, generation)),
            ResourceKindId::ParameterBlockLayout => tables
                .layouts
                .is_valid(Handle::from_raw_parts(index, generation)),
            ResourceKindId::ParameterBlock => tables
                .blocks
                .is_valid(Handle::from_raw_parts(index, generation)),
        }
    }

    // --- Retirement ---

    fn retire(&self, retiree: impl Into<Retiree>) {
        let frame_value = lock(&self.swapchain)
            .as_ref()
            .map(|sc| sc.pacer.retire_value(sc.recording));
        let transfer_value = lock(&self.transfers).retire_value();
        lock(&self.retirement).push(
            RetireStamp {
                frame_value,
                transfer_value,
            },
            retiree,
        );
    }

    fn retire_opt(&self, object: Option<RetiredObject>) {
        if let Some(object) = object {
            self.retire(object);
        }
    }

    fn process_retirements(&self) {
        let frame_completed = lock(&self.swapchain)
            .as_ref()
            .map(|sc| self.backend.timeline_value(sc.pacer.timeline()));
        let transfer_completed = self.backend.timeline_value(self.transfer_timeline);
        let released = lock(&self.retirement).collect(frame_completed, transfer_completed);
        if !released.is_empty() {
            log::trace!("Device: released {} retired object(s)", released.len());
        }
        self.release(released);
    }

    fn flush_retirements(&self) {
        let released = lock(&self.retirement).flush();
        self.release(released);
    }

    /// Drops detached objects and destroys the native side of retired
    /// handles.
    fn release(&self, retirees: Vec<Retiree>) {
        for retiree in retirees {
            match retiree {
                Retiree::Object(object) => drop(object),
                Retiree::Handle(handle) => drop(match handle {
                    DestroyedHandle::Buffer(h) => self.backend.destroy_buffer(h),
                    DestroyedHandle::Texture(h) => self.backend.destroy_texture(h),
                    DestroyedHandle::Shader(h) => self.backend.destroy_shader_module(h),
                    DestroyedHandle::Pipeline(h) => self.backend.destroy_pipeline(h),
                    DestroyedHandle::ParameterBlockLayout(h) => {
                        self.backend.destroy_parameter_block_layout(h)
                    }
                    DestroyedHandle::ParameterBlock(h) => self.backend.destroy_parameter_block(h),
                }),
            }
        }
    }

    fn fire_completed_transfers(&self) {
        let completed = self.backend.timeline_value(self.transfer_timeline);
        let due = lock(&self.transfers).collect_completed(completed);
        for callback in due {
            callback();
        }
    }

    // --- Buffers ---

    /// Creates a buffer, uploading `desc.initial_data` when present.
    pub fn create_buffer(&self, desc: &BufferDescriptor<'_>) -> Result<BufferHandle, ResourceError> {
        if desc.size == 0 {
            return Err(ResourceError::InvalidDescriptor(
                "buffer size must be non-zero".to_owned(),
            ));
        }
        if let Some(data) = desc.initial_data.as_deref() {
            if data.len() as u64 > desc.size {
                return Err(ResourceError::OutOfBounds {
                    offset: 0,
                    size: data.len() as u64,
                    capacity: desc.size,
                });
            }
        }

        let mut tables = lock(&self.resources);
        let handle = tables.buffers.allocate(BufferRecord {
            label: desc.label.as_deref().map(str::to_owned),
            info: BufferInfo {
                size: desc.size,
                usage: desc.usage,
                allocation: Default::default(),
            },
        });
        match self.backend.create_buffer(handle, desc) {
            Ok(allocation) => {
                if let Some(record) = tables.buffers.get_mut(handle) {
                    record.info.allocation = allocation;
                }
                log::debug!(
                    "Device: created buffer {:?} '{}' ({} bytes, {:?})",
                    handle,
                    desc.label.as_deref().unwrap_or(""),
                    desc.size,
                    desc.usage
                );
                Ok(handle)
            }
            Err(err) => {
                tables.buffers.remove(handle);
                log::error!("Device: failed to create buffer: {err}");
                Err(err)
            }
        }
    }

    /// Writes `data` at `offset`. A range past the end of the buffer is
    /// rejected and leaves the contents untouched.
    pub fn update_buffer(
        &self,
        handle: BufferHandle,
        offset: u64,
        data: &[u8],
    ) -> Result<(), ResourceError> {
        let tables = lock(&self.resources);
        let record = tables.buffers.get(handle).ok_or(ResourceError::InvalidHandle)?;
        let size = data.len() as u64;
        if !range_in_bounds(offset, size, record.info.size) {
            log::warn!(
                "Device: write of {size} bytes at offset {offset} overflows buffer {handle:?} ({} bytes)",
                record.info.size
            );
            return Err(ResourceError::OutOfBounds {
                offset,
                size,
                capacity: record.info.size,
            });
        }
        if data.is_empty() {
            return Ok(());
        }
        self.backend.write_buffer(handle, offset, data)
    }

    /// Size, usage and allocation details of a live buffer.
    pub fn buffer_info(&self, handle: BufferHandle) -> Option<BufferInfo> {
        lock(&self.resources).buffers.get(handle).map(|r| r.info)
    }

    /// Destroys a buffer. The handle is invalid immediately; the native
    /// allocation is released once the GPU no longer uses it.
    pub fn destroy_buffer(&self, handle: BufferHandle) -> Result<(), ResourceError> {
        let record = lock(&self.resources)
            .buffers
            .remove(handle)
            .ok_or(ResourceError::InvalidHandle)?;
        log::debug!(
            "Device: destroying buffer {handle:?} '{}'",
            record.label.as_deref().unwrap_or("")
        );
        self.retire(DestroyedHandle::Buffer(handle));
        Ok(())
    }

    // --- Textures ---

    /// Creates a 2D texture. Its contents are undefined until
    /// [`update_texture`](Self::update_texture).
    pub fn create_texture(
        &self,
        desc: &TextureDescriptor<'_>,
    ) -> Result<TextureHandle, ResourceError> {
        if desc.width == 0 || desc.height == 0 || desc.mip_levels == 0 {
            return Err(ResourceError::InvalidDescriptor(format!(
                "texture extent {}x{} with {} mip level(s)",
                desc.width, desc.height, desc.mip_levels
            )));
        }
        let mut tables = lock(&self.resources);
        let handle = tables.textures.allocate(TextureRecord {
            label: desc.label.as_deref().map(str::to_owned),
            width: desc.width,
            height: desc.height,
            usage: desc.usage,
            level0_size: desc.level0_size(),
            layout: TextureLayout::Undefined,
        });
        if let Err(err) = self.backend.create_texture(handle, desc) {
            tables.textures.remove(handle);
            log::error!("Device: failed to create texture: {err}");
            return Err(err);
        }
        log::debug!(
            "Device: created texture {:?} '{}' {}x{} {:?}",
            handle,
            desc.label.as_deref().unwrap_or(""),
            desc.width,
            desc.height,
            desc.format
        );
        Ok(handle)
    }

    /// Uploads the full contents of mip level 0 and leaves the texture ready
    /// for sampling.
    pub fn update_texture(&self, handle: TextureHandle, data: &[u8]) -> Result<(), ResourceError> {
        let mut tables = lock(&self.resources);
        let record = tables
            .textures
            .get_mut(handle)
            .ok_or(ResourceError::InvalidHandle)?;
        if let Some(expected) = record.level0_size {
            let size = data.len() as u64;
            if size > expected {
                return Err(ResourceError::OutOfBounds {
                    offset: 0,
                    size,
                    capacity: expected,
                });
            }
            if size < expected {
                return Err(ResourceError::InvalidDescriptor(format!(
                    "texture {handle:?} ({}x{}) needs {expected} bytes, got {size}",
                    record.width, record.height
                )));
            }
        }
        self.backend
            .transition_texture(handle, record.layout, TextureLayout::TransferDestination);
        record.layout = TextureLayout::TransferDestination;
        self.backend.write_texture(handle, 0, data)?;
        let ready = if record.usage.contains(TextureUsage::SAMPLED) {
            TextureLayout::ShaderReadOnly
        } else {
            TextureLayout::General
        };
        self.backend.transition_texture(handle, record.layout, ready);
        record.layout = ready;
        Ok(())
    }

    /// Current layout of a live texture's image.
    pub fn texture_layout(&self, handle: TextureHandle) -> Option<TextureLayout> {
        lock(&self.resources).textures.get(handle).map(|r| r.layout)
    }

    /// Destroys a texture.
    pub fn destroy_texture(&self, handle: TextureHandle) -> Result<(), ResourceError> {
        let record = lock(&self.resources)
            .textures
            .remove(handle)
            .ok_or(ResourceError::InvalidHandle)?;
        log::debug!(
            "Device: destroying texture {handle:?} '{}'",
            record.label.as_deref().unwrap_or("")
        );
        self.retire(DestroyedHandle::Texture(handle));
        Ok(())
    }

    // --- Shaders ---

    /// Wraps shader code in a backend module.
    ///
    /// Compilation failures are fatal; an unsupported source kind is returned
    /// as [`ShaderError::UnsupportedSource`].
    pub fn create_shader_module(
        &self,
        desc: &ShaderModuleDescriptor<'_>,
    ) -> Result<ShaderHandle, ResourceError> {
        if desc.source.is_empty() {
            return Err(ShaderError::EmptySource {
                label: desc.display_label().to_owned(),
            }
            .into());
        }
        let mut tables = lock(&self.resources);
        let handle = tables.shaders.allocate(ShaderRecord {
            label: desc.display_label().to_owned(),
            stage: desc.stage,
            entry_point: desc.entry_point.to_string(),
        });
        match self.backend.create_shader_module(handle, desc) {
            Ok(previous) => {
                drop(tables);
                self.retire_opt(previous);
                log::debug!(
                    "Device: created {:?} shader {handle:?} '{}' ({})",
                    desc.stage,
                    desc.display_label(),
                    desc.source.kind_name()
                );
                Ok(handle)
            }
            Err(err) => {
                tables.shaders.remove(handle);
                drop(tables);
                self.shader_failure(err)
            }
        }
    }

    fn shader_failure<T>(&self, err: ShaderError) -> Result<T, ResourceError> {
        if let ShaderError::CompilationFailed { .. } = err {
            self.fatal("shader compilation failed", &err);
        }
        log::error!("Device: {err}");
        Err(err.into())
    }

    /// Replaces the code of an existing module. Pipelines built from it keep
    /// the old code until they are rebuilt with
    /// [`update_pipeline_state`](Self::update_pipeline_state).
    pub fn update_shader_module(
        &self,
        handle: ShaderHandle,
        desc: &ShaderModuleDescriptor<'_>,
    ) -> Result<(), ResourceError> {
        if desc.source.is_empty() {
            return Err(ShaderError::EmptySource {
                label: desc.display_label().to_owned(),
            }
            .into());
        }
        let mut tables = lock(&self.resources);
        if !tables.shaders.is_valid(handle) {
            log::warn!("Device: update of invalid shader module {handle:?}");
            return Err(ResourceError::InvalidHandle);
        }
        match self.backend.create_shader_module(handle, desc) {
            Ok(previous) => {
                if let Some(record) = tables.shaders.get_mut(handle) {
                    record.label = desc.display_label().to_owned();
                    record.stage = desc.stage;
                    record.entry_point = desc.entry_point.to_string();
                }
                drop(tables);
                self.retire_opt(previous);
                log::debug!("Device: updated shader {handle:?} '{}'", desc.display_label());
                Ok(())
            }
            Err(err) => {
                drop(tables);
                self.shader_failure(err)
            }
        }
    }

    /// Destroys a shader module. Pipelines built from it stay usable.
    pub fn destroy_shader_module(&self, handle: ShaderHandle) -> Result<(), ResourceError> {
        let record = lock(&self.resources)
            .shaders
            .remove(handle)
            .ok_or(ResourceError::InvalidHandle)?;
        log::debug!("Device: destroying shader {handle:?} '{}'", record.label);
        self.retire(DestroyedHandle::Shader(handle));
        Ok(())
    }

    // --- Parameter block layouts ---

    /// Compiles (or returns the cached) layout of binding set `set_index`.
    pub fn create_parameter_block_layout(
        &self,
        desc: &BindingSetLayoutDescriptor,
        set_index: u32,
    ) -> Result<ParameterBlockLayoutHandle, ResourceError> {
        let mut tables = lock(&self.resources);
        self.layout_for(&mut tables, desc, set_index)
    }

    fn layout_for(
        &self,
        tables: &mut ResourceTables,
        desc: &BindingSetLayoutDescriptor,
        set_index: u32,
    ) -> Result<ParameterBlockLayoutHandle, ResourceError> {
        if desc.is_empty() {
            log::warn!("Device: rejecting empty layout for set {set_index}");
            return Err(ResourceError::InvalidDescriptor(format!(
                "binding set {set_index} declares no slots"
            )));
        }
        if set_index as usize >= MAX_BINDING_SETS {
            return Err(ResourceError::InvalidDescriptor(format!(
                "set index {set_index} exceeds the maximum of {}",
                MAX_BINDING_SETS - 1
            )));
        }
        desc.validate()?;

        if let Some((handle, _)) = tables
            .layouts
            .iter()
            .find(|(_, r)| r.set_index == set_index && r.desc == *desc)
        {
            return Ok(handle);
        }

        let handle = tables.layouts.allocate(LayoutRecord {
            set_index,
            desc: desc.clone(),
            counts: desc.descriptor_counts(),
        });
        if let Err(err) = self
            .backend
            .create_parameter_block_layout(handle, set_index, desc)
        {
            tables.layouts.remove(handle);
            log::error!("Device: failed to create layout for set {set_index}: {err}");
            return Err(err);
        }
        log::debug!(
            "Device: created layout {handle:?} for set {set_index} ({} slot(s))",
            desc.slots.len()
        );
        Ok(handle)
    }

    /// Destroys a layout. Blocks and pipelines created from it keep working;
    /// later requests for the same descriptor compile a new layout.
    pub fn destroy_parameter_block_layout(
        &self,
        handle: ParameterBlockLayoutHandle,
    ) -> Result<(), ResourceError> {
        lock(&self.resources)
            .layouts
            .remove(handle)
            .ok_or(ResourceError::InvalidHandle)?;
        self.retire(DestroyedHandle::ParameterBlockLayout(handle));
        Ok(())
    }

    // --- Parameter blocks ---

    /// Allocates an empty binding table for `layout`, reserving one
    /// descriptor per slot from the shared pool.
    pub fn create_parameter_block(
        &self,
        layout: ParameterBlockLayoutHandle,
    ) -> Result<ParameterBlockHandle, ResourceError> {
        let mut tables = lock(&self.resources);
        let (counts, slot_count) = {
            let record = tables
                .layouts
                .get(layout)
                .ok_or(ResourceError::InvalidHandle)?;
            (record.counts, record.desc.slots.len())
        };
        if let Err(err) = tables.descriptor_pool.reserve(&counts) {
            log::error!("Device: {err}");
            return Err(err);
        }
        let handle = tables.blocks.allocate(BlockRecord {
            layout,
            counts,
            contents: vec![ParameterBlockResource::Empty; slot_count],
        });
        if let Err(err) = self.backend.create_parameter_block(handle, layout) {
            tables.blocks.remove(handle);
            tables.descriptor_pool.release(&counts);
            log::error!("Device: failed to create parameter block: {err}");
            return Err(err);
        }
        log::debug!("Device: created parameter block {handle:?} with layout {layout:?}");
        Ok(handle)
    }

    /// Rewrites every slot of a parameter block.
    ///
    /// `resources` lists one entry per declared slot in declaration order;
    /// missing trailing entries are `Empty`. Slots that fail validation are
    /// left empty and reported through [`ResourceError::SlotsRejected`].
    pub fn update_parameter_block(
        &self,
        handle: ParameterBlockHandle,
        resources: &[ParameterBlockResource],
    ) -> Result<(), ResourceError> {
        let mut guard = lock(&self.resources);
        let ResourceTables {
            buffers,
            textures,
            layouts,
            blocks,
            ..
        } = &mut *guard;

        let layout = blocks.get(handle).ok_or(ResourceError::InvalidHandle)?.layout;
        let slots = &layouts
            .get(layout)
            .ok_or(ResourceError::InvalidHandle)?
            .desc
            .slots;
        if resources.len() > slots.len() {
            return Err(ResourceError::InvalidDescriptor(format!(
                "{} resources for a layout of {} slot(s)",
                resources.len(),
                slots.len()
            )));
        }

        let mut rejected = Vec::new();
        let mut contents = Vec::with_capacity(slots.len());
        for (i, binding) in slots.iter().enumerate() {
            let resource = resources.get(i).unwrap_or(&ParameterBlockResource::Empty);
            match validate_slot(buffers, textures, binding, resource) {
                Ok(()) => contents.push(resource.clone()),
                Err(reason) => {
                    log::warn!(
                        "Device: parameter block {handle:?} slot {}: {reason}",
                        binding.slot
                    );
                    rejected.push(SlotRejection {
                        slot: binding.slot,
                        reason,
                    });
                    contents.push(ParameterBlockResource::Empty);
                }
            }
        }

        let writes: Vec<SlotWrite<'_>> = slots
            .iter()
            .zip(&contents)
            .map(|(binding, resource)| SlotWrite {
                binding: *binding,
                resource,
            })
            .collect();
        let outcome = self.backend.write_parameter_block(handle, &writes)?;

        for rejection in &outcome.rejected {
            log::warn!(
                "Device: backend left parameter block {handle:?} slot {} empty: {}",
                rejection.slot,
                rejection.reason
            );
            if let Some(i) = slots.iter().position(|b| b.slot == rejection.slot) {
                contents[i] = ParameterBlockResource::Empty;
            }
        }
        rejected.extend(outcome.rejected);

        if let Some(block) = blocks.get_mut(handle) {
            block.contents = contents;
        }
        drop(guard);
        self.retire_opt(outcome.retired);

        if rejected.is_empty() {
            Ok(())
        } else {
            Err(ResourceError::SlotsRejected(rejected))
        }
    }

    /// What each slot of a live block currently holds.
    pub fn parameter_block_contents(
        &self,
        handle: ParameterBlockHandle,
    ) -> Option<Vec<ParameterBlockResource>> {
        lock(&self.resources)
            .blocks
            .get(handle)
            .map(|b| b.contents.clone())
    }

    pub(crate) fn parameter_block_layout(
        &self,
        handle: ParameterBlockHandle,
    ) -> Option<ParameterBlockLayoutHandle> {
        lock(&self.resources).blocks.get(handle).map(|b| b.layout)
    }

    /// Destroys a parameter block and returns its descriptors to the pool.
    pub fn destroy_parameter_block(&self, handle: ParameterBlockHandle) -> Result<(), ResourceError> {
        {
            let mut tables = lock(&self.resources);
            let block = tables
                .blocks
                .remove(handle)
                .ok_or(ResourceError::InvalidHandle)?;
            tables.descriptor_pool.release(&block.counts);
        }
        self.retire(DestroyedHandle::ParameterBlock(handle));
        Ok(())
    }

    // --- Pipelines ---

    /// Builds a rasterization pipeline.
    ///
    /// Layouts of the non-empty binding sets are created or fetched from the
    /// cache and compacted into the pipeline's native layout. Compile
    /// failures are fatal.
    pub fn create_rasterize_pipeline(
        &self,
        desc: &RasterizePipelineDescriptor,
    ) -> Result<PsoHandle, ResourceError> {
        let mut tables = lock(&self.resources);
        let binding = self.resolve_pipeline_binding(&mut tables, desc)?;
        let handle = tables.pipelines.allocate(PipelineRecord {
            desc: desc.clone(),
            binding,
        });
        match self.build_pipeline(&tables, handle, desc, &binding) {
            Ok(previous) => {
                drop(tables);
                self.retire_opt(previous);
                log::debug!(
                    "Device: created pipeline {handle:?} '{}'",
                    desc.display_label()
                );
                Ok(handle)
            }
            Err(err) => {
                tables.pipelines.remove(handle);
                drop(tables);
                self.pipeline_failure(err)
            }
        }
    }

    /// Rebuilds a pipeline in place from a new descriptor. The handle stays
    /// valid; the previous native object is retired.
    pub fn update_pipeline_state(
        &self,
        handle: PsoHandle,
        desc: &RasterizePipelineDescriptor,
    ) -> Result<(), ResourceError> {
        let mut tables = lock(&self.resources);
        if !tables.pipelines.is_valid(handle) {
            log::warn!("Device: update of invalid pipeline {handle:?}");
            return Err(ResourceError::InvalidHandle);
        }
        let binding = self.resolve_pipeline_binding(&mut tables, desc)?;
        match self.build_pipeline(&tables, handle, desc, &binding) {
            Ok(previous) => {
                if let Some(record) = tables.pipelines.get_mut(handle) {
                    record.desc = desc.clone();
                    record.binding = binding;
                }
                drop(tables);
                self.retire_opt(previous);
                log::debug!(
                    "Device: rebuilt pipeline {handle:?} '{}'",
                    desc.display_label()
                );
                Ok(())
            }
            Err(err) => {
                drop(tables);
                self.pipeline_failure(err)
            }
        }
    }

    fn pipeline_failure<T>(&self, err: PipelineError) -> Result<T, ResourceError> {
        if let PipelineError::CompilationFailed { .. } = err {
            self.fatal("pipeline compilation failed", &err);
        }
        log::error!("Device: {err}");
        Err(err.into())
    }

    fn resolve_pipeline_binding(
        &self,
        tables: &mut ResourceTables,
        desc: &RasterizePipelineDescriptor,
    ) -> Result<PipelineBinding, ResourceError> {
        let mut set_layouts = [ParameterBlockLayoutHandle::INVALID; MAX_BINDING_SETS];
        for (index, set) in desc.layout.sets.iter().enumerate() {
            if !set.is_empty() {
                set_layouts[index] = self.layout_for(tables, set, index as u32)?;
            }
        }
        Ok(PipelineBinding {
            set_offsets: desc.layout.set_offsets(),
            set_layouts,
            push_constant_size: desc.layout.push_constant_size,
        })
    }

    fn build_pipeline(
        &self,
        tables: &ResourceTables,
        handle: PsoHandle,
        desc: &RasterizePipelineDescriptor,
        binding: &PipelineBinding,
    ) -> Result<Option<RetiredObject>, PipelineError> {
        let label = desc.display_label();
        let vertex = stage_ref(tables, desc.vertex_shader, ShaderStage::Vertex, label)?;
        let fragment = stage_ref(tables, desc.fragment_shader, ShaderStage::Fragment, label)?;
        if vertex.is_none() && fragment.is_none() {
            return Err(PipelineError::NoShaderStages {
                label: label.to_owned(),
            });
        }
        let native = NativePipelineDescriptor {
            desc,
            vertex,
            fragment,
            set_layouts: binding.ordered_layouts(),
            push_constant_size: binding.push_constant_size,
        };
        self.backend.create_pipeline(handle, &native)
    }

    /// Compacted set offsets of a live pipeline, indexed by set index.
    pub fn pipeline_set_offsets(&self, handle: PsoHandle) -> Option<[Option<u32>; MAX_BINDING_SETS]> {
        lock(&self.resources)
            .pipelines
            .get(handle)
            .map(|p| p.binding.set_offsets)
    }

    /// Layout a pipeline compiled for binding set `set_index`.
    pub fn pipeline_set_layout(
        &self,
        handle: PsoHandle,
        set_index: u32,
    ) -> Option<ParameterBlockLayoutHandle> {
        lock(&self.resources)
            .pipelines
            .get(handle)
            .and_then(|p| p.binding.layout_of(set_index))
    }

    pub(crate) fn pipeline_binding(&self, handle: PsoHandle) -> Option<PipelineBinding> {
        lock(&self.resources).pipelines.get(handle).map(|p| p.binding)
    }

    /// Destroys a pipeline.
    pub fn destroy_pipeline(&self, handle: PsoHandle) -> Result<(), ResourceError> {
        let record = lock(&self.resources)
            .pipelines
            .remove(handle)
            .ok_or(ResourceError::InvalidHandle)?;
        log::debug!(
            "Device: destroying pipeline {handle:?} '{}'",
            record.desc.display_label()
        );
        self.retire(DestroyedHandle::Pipeline(handle));
        Ok(())
    }

    // --- Swapchain and frames ---

    /// Creates the swapchain for the platform's current window.
    ///
    /// Does nothing if one already exists.
    pub fn create_swapchain(&self) -> Result<(), RenderError> {
        let state = self.state();
        if state.has_swapchain() {
            return Ok(());
        }
        if state != GraphicsState::DeviceReady {
            return Err(RenderError::InvalidState {
                operation: "create a swapchain",
                state,
            });
        }
        let window = self
            .platform
            .current_native_window_handle()
            .ok_or_else(|| RenderError::SurfaceUnavailable("no native window".to_owned()))?;
        if !self.platform.is_queue_support_present(0) {
            return Err(RenderError::SurfaceUnavailable(
                "the graphics queue cannot present to this window".to_owned(),
            ));
        }
        let (width, height) = self.platform.actual_window_size();
        if width == 0 || height == 0 {
            return Err(RenderError::SurfaceUnavailable(
                "window has zero area".to_owned(),
            ));
        }

        let frames = self.frames_in_flight();
        let timeline = self
            .backend
            .create_timeline(FramePacer::initial_timeline_value(frames))?;
        let info = match self
            .backend
            .create_swapchain(&window, width, height, &self.config.swapchain)
        {
            Ok(info) => info,
            Err(err) => {
                self.backend.destroy_timeline(timeline);
                log::error!("Device: swapchain creation failed: {err}");
                return Err(err);
            }
        };
        log::info!(
            "Device: swapchain {}x{} {:?}, {} image(s), {frames} frame(s) in flight",
            info.width,
            info.height,
            info.color_format,
            info.image_count
        );
        *lock(&self.swapchain) = Some(SwapchainState {
            pacer: FramePacer::new(timeline, frames),
            info,
            needs_rebuild: false,
            recording: false,
            image_index: 0,
        });
        self.set_state(GraphicsState::SwapchainReady);
        Ok(())
    }

    /// Waits for the GPU and releases the swapchain.
    pub fn destroy_swapchain(&self) -> Result<(), RenderError> {
        let Some(swapchain) = lock(&self.swapchain).take() else {
            return Ok(());
        };
        if swapchain.recording {
            log::warn!("Device: destroying the swapchain while a frame is being recorded");
        }
        if let Err(err) = self.backend.wait_idle() {
            self.fatal("wait-idle before swapchain teardown failed", err);
        }
        self.fire_completed_transfers();
        self.flush_retirements();
        self.backend.destroy_swapchain();
        self.backend.destroy_timeline(swapchain.pacer.timeline());
        log::info!(
            "Device: swapchain released after {} frame(s)",
            swapchain.pacer.frames_submitted()
        );
        self.set_state(GraphicsState::DeviceReady);
        Ok(())
    }

    /// Requests a swapchain rebuild at the next acquire.
    pub fn resize(&self) {
        if let Some(sc) = lock(&self.swapchain).as_mut() {
            sc.needs_rebuild = true;
        }
    }

    /// Sets the colour the frame target is cleared to from the next acquire on.
    pub fn set_clear_color(&self, color: [f32; 4]) {
        lock(&self.clear).color = color;
    }

    /// Sets all clear values from the next acquire on.
    pub fn set_clear_values(&self, clear: ClearValues) {
        *lock(&self.clear) = clear;
    }

    /// Current clear values.
    pub fn clear_values(&self) -> ClearValues {
        *lock(&self.clear)
    }

    /// Starts a frame.
    ///
    /// Rebuilds the swapchain if the window size changed, blocks until the
    /// active slot's previous frame has retired, recycles the slot's pool and
    /// acquires the next image. The returned list has the clear values and a
    /// full-window viewport and scissor recorded.
    pub fn acquire_next_image(&self) -> Result<CommandList<'_>, RenderError> {
        let state = self.state();
        if !state.has_swapchain() {
            return Err(RenderError::InvalidState {
                operation: "acquire a swapchain image",
                state,
            });
        }
        let (width, height) = self.platform.actual_window_size();

        let (allocation, slot, info) = {
            let mut guard = lock(&self.swapchain);
            let sc = guard.as_mut().ok_or(RenderError::InvalidState {
                operation: "acquire a swapchain image",
                state,
            })?;
            if sc.recording {
                return Err(RenderError::FrameInProgress);
            }
            if width == 0 || height == 0 {
                return Err(RenderError::SurfaceUnavailable(
                    "window has zero area".to_owned(),
                ));
            }
            if sc.needs_rebuild || (width, height) != (sc.info.width, sc.info.height) {
                log::info!(
                    "Device: resizing swapchain {}x{} -> {width}x{height}, waiting for the GPU",
                    sc.info.width,
                    sc.info.height
                );
                if let Err(err) = self.backend.wait_idle() {
                    self.fatal("wait-idle before resize failed", err);
                }
                sc.info = self.backend.resize_swapchain(width, height)?;
                sc.needs_rebuild = false;
            }

            let wait = sc.pacer.wait_value();
            match self.backend.wait_timeline(sc.pacer.timeline(), wait, None) {
                Ok(true) => {}
                Ok(false) => return Err(RenderError::Timeout),
                Err(err) => self.fatal("frame timeline wait failed", err),
            }
            sc.pacer.active_slot_mut().pool.reset();

            match self.backend.acquire_image() {
                Ok(index) => sc.image_index = index,
                Err(RenderError::SurfaceUnavailable(reason)) => {
                    log::warn!("Device: surface unavailable, skipping frame: {reason}");
                    sc.needs_rebuild = true;
                    return Err(RenderError::SurfaceUnavailable(reason));
                }
                Err(err) => self.fatal("swapchain acquire failed", err),
            }

            sc.recording = true;
            let slot = sc.pacer.cursor();
            (sc.pacer.active_slot_mut().pool.allocate(), slot, sc.info)
        };

        self.process_retirements();
        if self.state() == GraphicsState::SwapchainReady {
            self.set_state(GraphicsState::Running);
        }

        let mut list = CommandList::new(
            self,
            ListOrigin::Frame {
                slot,
                entry: allocation.entry,
                epoch: allocation.epoch,
            },
            CommandListKind::Graphics,
            allocation.stream,
            Some(self.clear_values()),
        );
        list.set_viewport(Viewport::full(info.width, info.height))?;
        list.set_scissor(ScissorRect::full(info.width, info.height))?;
        Ok(list)
    }

    /// Submits the frame's list and presents the acquired image.
    pub fn present(&self, mut list: CommandList<'_>) -> Result<(), RenderError> {
        let ListOrigin::Frame { slot, entry, epoch } = list.origin() else {
            return Err(RecordingError::WrongListKind {
                verb: "present",
                kind: list.kind(),
            }
            .into());
        };
        list.close()?;
        let clear = list.clear_values();
        let stream = list.take_for_submission();

        let mut guard = lock(&self.swapchain);
        let sc = guard.as_mut().ok_or(RenderError::InvalidState {
            operation: "present",
            state: self.state(),
        })?;
        if !sc.recording || sc.pacer.cursor() != slot {
            return Err(RecordingError::InvalidRecordingState {
                verb: "present",
                state: CommandListState::Submitted,
            }
            .into());
        }

        let signal = TimelineSignal {
            timeline: sc.pacer.timeline(),
            value: sc.pacer.signal_value(),
        };
        let submission = Submission {
            kind: CommandListKind::Graphics,
            stream: &stream,
            clear,
            signal,
            semaphore_signal: None,
        };
        if let Err(err) = self.backend.submit(&submission) {
            self.fatal("frame submission failed", err);
        }
        let presented = self.backend.present();
        sc.pacer.advance();
        sc.recording = false;
        if let Some(frame) = sc.pacer.slot_mut(slot) {
            frame
                .pool
                .give_back(entry, epoch, stream, CommandListState::Submitted);
        }

        match presented {
            Ok(()) => Ok(()),
            Err(RenderError::SurfaceUnavailable(reason)) => {
                log::warn!("Device: present reported an outdated surface: {reason}");
                sc.needs_rebuild = true;
                Ok(())
            }
            Err(err) => self.fatal("present failed", err),
        }
    }

    pub(crate) fn abandon_list(&self, origin: ListOrigin, stream: CommandStream) {
        log::warn!("Device: command list dropped without being submitted");
        match origin {
            ListOrigin::Frame { slot, entry, epoch } => {
                if let Some(sc) = lock(&self.swapchain).as_mut() {
                    sc.recording = false;
                    if let Some(frame) = sc.pacer.slot_mut(slot) {
                        frame.pool.give_back(entry, epoch, stream, CommandListState::Free);
                    }
                }
            }
            ListOrigin::Transfer {
                context,
                entry,
                epoch,
            } => {
                let mut ring = lock(&self.transfers);
                if let Some(pool) = ring.pool_mut(context) {
                    pool.give_back(entry, epoch, stream, CommandListState::Free);
                }
                ring.abandon(context);
            }
        }
    }

    // --- Transfers ---

    /// Records and submits a one-time list on the transfer ring.
    ///
    /// `record` fills the list. If every context of the ring is busy this
    /// polls the backend, sleeping 1 ms between attempts. `on_finish` fires
    /// exactly once, from the first [`tick`](Self::tick) (or wait) after the
    /// GPU completes the work.
    pub fn submit_one_time_commands<F>(
        &self,
        record: F,
        on_finish: Option<CompletionCallback>,
    ) -> Result<(), RenderError>
    where
        F: FnOnce(&mut CommandList<'_>) -> Result<(), RecordingError>,
    {
        self.submit_transfer(record, on_finish, None)
    }

    /// Like [`submit_one_time_commands`](Self::submit_one_time_commands), and
    /// also raises `semaphore` to `value` once the GPU completes the work.
    pub fn submit_one_time_commands_signaling<F>(
        &self,
        record: F,
        on_finish: Option<CompletionCallback>,
        semaphore: &TimelineSemaphore<'_>,
        value: u64,
    ) -> Result<(), RenderError>
    where
        F: FnOnce(&mut CommandList<'_>) -> Result<(), RecordingError>,
    {
        if !semaphore.belongs_to(self) {
            return Err(RenderError::SubmissionFailed(
                "timeline semaphore belongs to another device".to_owned(),
            ));
        }
        let signal = TimelineSignal {
            timeline: semaphore.id(),
            value,
        };
        self.submit_transfer(record, on_finish, Some(signal))
    }

    fn submit_transfer<F>(
        &self,
        record: F,
        on_finish: Option<CompletionCallback>,
        semaphore_signal: Option<TimelineSignal>,
    ) -> Result<(), RenderError>
    where
        F: FnOnce(&mut CommandList<'_>) -> Result<(), RecordingError>,
    {
        self.require_device("submit one-time commands")?;

        let mut saturated = false;
        let reserved = loop {
            let completed = self.backend.timeline_value(self.transfer_timeline);
            if let Some(reserved) = lock(&self.transfers).reserve(completed) {
                break reserved;
            }
            if !saturated {
                log::debug!("Device: transfer ring saturated, waiting for a free context");
                saturated = true;
            }
            self.backend.poll();
            self.platform.sleep(1);
        };
        if let Some(overdue) = reserved.overdue {
            overdue();
        }

        let allocation = {
            let mut ring = lock(&self.transfers);
            match ring.pool_mut(reserved.index) {
                Some(pool) => pool.allocate(),
                None => {
                    ring.abandon(reserved.index);
                    return Err(RenderError::SubmissionFailed(format!(
                        "transfer context {} does not exist",
                        reserved.index
                    )));
                }
            }
        };
        let (entry, epoch) = (allocation.entry, allocation.epoch);
        let mut list = CommandList::new(
            self,
            ListOrigin::Transfer {
                context: reserved.index,
                entry,
                epoch,
            },
            CommandListKind::Transfer,
            allocation.stream,
            None,
        );
        record(&mut list)?;
        list.close()?;
        let stream = list.take_for_submission();

        let mut ring = lock(&self.transfers);
        let value = ring.next_signal_value();
        let submission = Submission {
            kind: CommandListKind::Transfer,
            stream: &stream,
            clear: None,
            signal: TimelineSignal {
                timeline: self.transfer_timeline,
                value,
            },
            semaphore_signal,
        };
        if let Err(err) = self.backend.submit(&submission) {
            ring.abandon(reserved.index);
            drop(ring);
            self.fatal("one-time submission failed", err);
        }
        ring.submitted(reserved.index, value, on_finish);
        if let Some(pool) = ring.pool_mut(reserved.index) {
            pool.give_back(entry, epoch, stream, CommandListState::Submitted);
        }
        log::trace!(
            "Device: one-time submission on context {} signals {value}",
            reserved.index
        );
        Ok(())
    }

    // --- Timeline semaphores ---

    /// Creates a timeline semaphore starting at `initial_value`. It is
    /// released when dropped.
    pub fn create_timeline_semaphore(
        &self,
        initial_value: u64,
    ) -> Result<TimelineSemaphore<'_>, RenderError> {
        self.require_device("create a timeline semaphore")?;
        let id = self.backend.create_timeline(initial_value)?;
        log::debug!("Device: created timeline semaphore {id:?} at {initial_value}");
        Ok(TimelineSemaphore::new(self, id))
    }

    pub(crate) fn backend(&self) -> &dyn GraphicsBackend {
        self.backend.as_ref()
    }

    /// Blocks until every submission of `kind` made so far has completed,
    /// then fires due transfer callbacks and releases retired objects.
    ///
    /// Waiting on the graphics queue without a swapchain returns at once.
    pub fn wait_queue_idle(&self, kind: CommandListKind) -> Result<(), RenderError> {
        self.require_device("wait for a queue")?;
        let target = match kind {
            CommandListKind::Graphics => lock(&self.swapchain)
                .as_ref()
                .map(|sc| (sc.pacer.timeline(), sc.pacer.last_signal_value())),
            CommandListKind::Transfer => {
                Some((self.transfer_timeline, lock(&self.transfers).last_signaled()))
            }
        };
        if let Some((timeline, value)) = target {
            log::debug!("Device: waiting for the {kind:?} queue to reach {value}");
            if !self.backend.wait_timeline(timeline, value, None)? {
                return Err(RenderError::Timeout);
            }
        }
        self.fire_completed_transfers();
        self.process_retirements();
        Ok(())
    }

    // --- Maintenance ---

    /// Per-frame housekeeping.
    ///
    /// Polls the backend, fires completed transfer callbacks, releases
    /// retired objects, and creates or tears down the swapchain as the
    /// platform window appears or disappears.
    pub fn tick(&self) {
        self.backend.poll();
        self.fire_completed_transfers();
        self.process_retirements();

        let state = self.state();
        let has_window = self.platform.current_native_window_handle().is_some();
        if has_window && state == GraphicsState::DeviceReady {
            if let Err(err) = self.create_swapchain() {
                log::debug!("Device: swapchain not created yet: {err}");
            }
        } else if !has_window && state.has_swapchain() {
            log::info!("Device: window is gone, releasing the swapchain");
            if let Err(err) = self.destroy_swapchain() {
                log::error!("Device: swapchain teardown failed: {err}");
            }
        }
    }

    /// Blocks until the GPU is idle, then fires every transfer callback and
    /// releases every retired object.
    pub fn wait_idle(&self) -> Result<(), RenderError> {
        self.require_device("wait for the GPU")?;
        self.backend.wait_idle()?;
        self.fire_completed_transfers();
        self.flush_retirements();
        Ok(())
    }

    /// Tears the device down: waits for the GPU, releases the swapchain and
    /// every live resource, then the native device. Called from `Drop`.
    pub fn shutdown(&self) {
        if !self.state().has_device() {
            return;
        }
        log::info!("Device: shutting down");
        if let Err(err) = self.destroy_swapchain() {
            log::error!("Device: swapchain teardown failed: {err}");
        }
        if let Err(err) = self.backend.wait_idle() {
            log::error!("Device: wait-idle during shutdown failed: {err}");
        }
        self.fire_completed_transfers();
        self.flush_retirements();
        self.release_live_resources();
        self.backend.destroy_timeline(self.transfer_timeline);
        self.backend.shutdown();
        self.set_state(GraphicsState::Uninitialized);
    }

    fn release_live_resources(&self) {
        let mut tables = lock(&self.resources);
        let blocks = tables.blocks.drain();
        let pipelines = tables.pipelines.drain();
        let layouts = tables.layouts.drain();
        let shaders = tables.shaders.drain();
        let textures = tables.textures.drain();
        let buffers = tables.buffers.drain();
        tables.descriptor_pool = DescriptorPool::new(self.config.descriptor_pool_capacity);
        drop(tables);

        macro_rules! release {
            ($records:expr, $destroy:ident, $name:literal) => {
                if !$records.is_empty() {
                    log::warn!(
                        "Device: releasing {} live {}(s) at shutdown",
                        $records.len(),
                        $name
                    );
                }
                for (handle, _) in $records {
                    drop(self.backend.$destroy(handle));
                }
            };
        }
        release!(blocks, destroy_parameter_block, "parameter block");
        release!(pipelines, destroy_pipeline, "pipeline");
        release!(layouts, destroy_parameter_block_layout, "parameter block layout");
        release!(shaders, destroy_shader_module, "shader module");
        release!(textures, destroy_texture, "texture");
        release!(buffers, destroy_buffer, "buffer");
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn stage_ref<'t>(
    tables: &'t ResourceTables,
    module: ShaderHandle,
    stage: ShaderStage,
    label: &str,
) -> Result<Option<ShaderStageRef<'t>>, PipelineError> {
    if module.is_invalid() {
        return Ok(None);
    }
    match tables.shaders.get(module) {
        Some(record) if record.stage == stage => Ok(Some(ShaderStageRef {
            module,
            entry_point: &record.entry_point,
        })),
        _ => Err(PipelineError::InvalidShaderModule {
            label: label.to_owned(),
            stage,
        }),
    }
}

fn validate_slot(
    buffers: &ResourceRegistry<kind::Buffer, BufferRecord>,
    textures: &ResourceRegistry<kind::Texture, TextureRecord>,
    binding: &BindingSlot,
    resource: &ParameterBlockResource,
) -> Result<(), ResourceError> {
    if !resource.accepts(binding.kind) {
        return Err(ResourceError::InvalidDescriptor(format!(
            "{} cannot fill a {} slot",
            resource.variant_name(),
            binding.kind
        )));
    }
    match resource {
        ParameterBlockResource::Buffer {
            buffer,
            offset,
            size,
        } => {
            let record = buffers.get(*buffer).ok_or(ResourceError::InvalidHandle)?;
            let capacity = record.info.size;
            let window = if *size == 0 {
                capacity.saturating_sub(*offset)
            } else {
                *size
            };
            if *offset >= capacity || !range_in_bounds(*offset, window, capacity) {
                return Err(ResourceError::OutOfBounds {
                    offset: *offset,
                    size: window,
                    capacity,
                });
            }
            let required = if binding.kind == ShaderResourceType::UniformBuffer {
                BufferUsage::UNIFORM
            } else {
                BufferUsage::STORAGE
            };
            if !record.info.usage.contains(required) {
                return Err(ResourceError::InvalidDescriptor(format!(
                    "buffer {buffer:?} lacks {required:?} usage for a {} slot",
                    binding.kind
                )));
            }
            Ok(())
        }
        ParameterBlockResource::Texture { texture, .. } => {
            let record = textures.get(*texture).ok_or(ResourceError::InvalidHandle)?;
            if !record.usage.contains(TextureUsage::SAMPLED) {
                return Err(ResourceError::InvalidDescriptor(format!(
                    "texture {texture:?} lacks SAMPLED usage"
                )));
            }
            if record.layout == TextureLayout::Undefined {
                log::warn!("Device: texture {texture:?} is bound before its first upload");
            }
            Ok(())
        }
        ParameterBlockResource::RwImage { texture } => {
            let record = textures.get(*texture).ok_or(ResourceError::InvalidHandle)?;
            if !record.usage.contains(TextureUsage::STORAGE) {
                return Err(ResourceError::InvalidDescriptor(format!(
                    "texture {texture:?} lacks STORAGE usage"
                )));
            }
            Ok(())
        }
        ParameterBlockResource::Empty => Ok(()),
    }
}
