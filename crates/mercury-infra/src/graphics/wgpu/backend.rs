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

use super::context::{WgpuDeviceContext, WgpuInstanceContext};
use super::conversions::{IntoWgpu, STORAGE_IMAGE_FORMAT};
use super::pipeline::{build_pipeline, PipelineEntry, PipelineInputs, PipelineRecipe};
use super::replay::{encode_frame, encode_transfer, push_constant_writes, ReplayTables};
use super::resources::{
    self, BlockEntry, BufferEntry, DummyResources, LayoutEntry, PushConstantArena, ResolvedSlot,
    SamplerCache, ShaderEntry, TextureEntry, COPY_ALIGNMENT,
};
use super::surface::{TargetFormats, WgpuSurface};
use super::timeline::{self, TimelineTable};
use mercury_core::platform::NativeWindowHandle;
use mercury_core::rhi::{
    AdapterInfo, BackendKind, BindingSetLayoutDescriptor, BufferAllocation, BufferDescriptor,
    BufferHandle, CommandListKind, GraphicsBackend, GraphicsConfig, NativePipelineDescriptor,
    ParameterBlockHandle, ParameterBlockLayoutHandle, ParameterBlockResource,
    ParameterBlockWriteOutcome, PipelineError, PsoHandle, RenderError, ResourceError,
    RetiredObject, ShaderError, ShaderHandle, ShaderModuleDescriptor, ShaderResourceType,
    SlotRejection, SlotWrite, Submission, SwapchainConfig, SwapchainInfo, TextureDescriptor,
    TextureHandle, TimelineId,
};
use mercury_core::utils::sync::lock;
use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Sleep between two polls while blocking on the GPU.
const WAIT_SLICE: Duration = Duration::from_micros(200);

/// Objects that only exist once the logical device does.
#[derive(Debug)]
struct DeviceState {
    ctx: WgpuDeviceContext,
    dummies: DummyResources,
    push: Mutex<PushConstantArena>,
}

/// The WGPU implementation of [`GraphicsBackend`].
///
/// Native objects live in one table per kind, keyed by the frontend's
/// handles. When several tables are needed at once they are locked in the
/// order: shaders, layouts, push constants, pipelines, blocks, buffers,
/// textures, samplers.
#[derive(Debug)]
pub struct WgpuBackend {
    instance: Mutex<Option<WgpuInstanceContext>>,
    device: Mutex<Option<Arc<DeviceState>>>,
    formats: Mutex<Option<TargetFormats>>,

    buffers: Mutex<HashMap<BufferHandle, BufferEntry>>,
    textures: Mutex<HashMap<TextureHandle, TextureEntry>>,
    shaders: Mutex<HashMap<ShaderHandle, ShaderEntry>>,
    pipelines: Mutex<HashMap<PsoHandle, PipelineEntry>>,
    layouts: Mutex<HashMap<ParameterBlockLayoutHandle, LayoutEntry>>,
    blocks: Mutex<HashMap<ParameterBlockHandle, BlockEntry>>,
    samplers: Mutex<SamplerCache>,

    timelines: Mutex<TimelineTable>,
    surface: Mutex<Option<WgpuSurface>>,
}

impl Default for WgpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl WgpuBackend {
    /// Creates a backend with no instance yet.
    pub fn new() -> Self {
        Self {
            instance: Mutex::new(None),
            device: Mutex::new(None),
            formats: Mutex::new(None),
            buffers: Mutex::new(HashMap::new()),
            textures: Mutex::new(HashMap::new()),
            shaders: Mutex::new(HashMap::new()),
            pipelines: Mutex::new(HashMap::new()),
            layouts: Mutex::new(HashMap::new()),
            blocks: Mutex::new(HashMap::new()),
            samplers: Mutex::new(SamplerCache::default()),
            timelines: Mutex::new(TimelineTable::default()),
            surface: Mutex::new(None),
        }
    }

    fn device_state(&self) -> Option<Arc<DeviceState>> {
        lock(&self.device).clone()
    }

    fn require_device(&self) -> Result<Arc<DeviceState>, ResourceError> {
        self.device_state().ok_or_else(|| {
            ResourceError::BackendAllocationFailure("the WGPU device does not exist".to_owned())
        })
    }

    fn require_device_for_render(&self) -> Result<Arc<DeviceState>, RenderError> {
        self.device_state()
            .ok_or_else(|| RenderError::FatalNativeError("the WGPU device does not exist".to_owned()))
    }

    fn target_formats(&self) -> TargetFormats {
        lock(&self.formats).unwrap_or_else(|| TargetFormats::from_config(&SwapchainConfig::default()))
    }

    /// Rebuilds every pipeline that was built for other target formats.
    fn rebuild_pipelines(&self, state: &DeviceState, formats: TargetFormats) {
        let shaders = lock(&self.shaders);
        let layouts = lock(&self.layouts);
        let push = lock(&state.push);
        let mut pipelines = lock(&self.pipelines);
        let inputs = PipelineInputs {
            shaders: &shaders,
            layouts: &layouts,
            push_layout: &push.layout,
            formats,
            max_bind_groups: state.ctx.limits.max_bind_groups,
        };

        let stale: Vec<PsoHandle> = pipelines
            .iter()
            .filter(|(_, entry)| entry.formats != formats)
            .map(|(handle, _)| *handle)
            .collect();
        for handle in stale {
            let Some(recipe) = pipelines.get(&handle).map(|e| e.recipe.clone()) else {
                continue;
            };
            match build_pipeline(&state.ctx.device, recipe, &inputs) {
                Ok(entry) => {
                    pipelines.insert(handle, entry);
                }
                Err(e) => log::error!("WgpuBackend: failed to rebuild pipeline {handle:?}: {e}"),
            }
        }
    }

    /// Looks up the native objects behind one slot write.
    fn resolve_slot(
        &self,
        state: &DeviceState,
        kind: ShaderResourceType,
        resource: &ParameterBlockResource,
        buffers: &HashMap<BufferHandle, BufferEntry>,
        textures: &HashMap<TextureHandle, TextureEntry>,
        samplers: &mut SamplerCache,
    ) -> Result<ResolvedSlot, ResourceError> {
        match resource {
            ParameterBlockResource::Buffer {
                buffer,
                offset,
                size,
            } => {
                let entry = buffers.get(buffer).ok_or(ResourceError::InvalidHandle)?;
                let limits = &state.ctx.limits;
                let alignment = if kind == ShaderResourceType::UniformBuffer {
                    limits.min_uniform_buffer_offset_alignment
                } else {
                    limits.min_storage_buffer_offset_alignment
                };
                if offset % u64::from(alignment) != 0 {
                    return Err(ResourceError::InvalidDescriptor(format!(
                        "binding offset {offset} is not a multiple of {alignment}"
                    )));
                }
                Ok(ResolvedSlot::Buffer {
                    buffer: entry.buffer.clone(),
                    offset: *offset,
                    size: NonZeroU64::new(*size),
                })
            }
            ParameterBlockResource::Texture { texture, sampler } => {
                let entry = textures.get(texture).ok_or(ResourceError::InvalidHandle)?;
                if entry.format.is_depth() {
                    return Err(ResourceError::InvalidDescriptor(format!(
                        "depth texture {:?} cannot be sampled as a color image",
                        entry.format
                    )));
                }
                Ok(ResolvedSlot::Texture {
                    view: entry.view.clone(),
                    sampler: samplers.get_or_create(&state.ctx.device, sampler),
                })
            }
            ParameterBlockResource::RwImage { texture } => {
                let entry = textures.get(texture).ok_or(ResourceError::InvalidHandle)?;
                let format: wgpu::TextureFormat = entry.format.into_wgpu();
                if format != STORAGE_IMAGE_FORMAT {
                    return Err(ResourceError::UnimplementedResourceKind(
                        ShaderResourceType::RWImage,
                    ));
                }
                Ok(ResolvedSlot::StorageImage {
                    view: entry.view.clone(),
                })
            }
            ParameterBlockResource::Empty => Ok(ResolvedSlot::Empty),
        }
    }

    /// Polls until `done` holds or `deadline` passes.
    fn poll_until(
        &self,
        state: &DeviceState,
        deadline: Option<Instant>,
        mut done: impl FnMut(&TimelineTable) -> bool,
    ) -> bool {
        loop {
            state.ctx.poll();
            if done(&*lock(&self.timelines)) {
                return true;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return false;
            }
            std::thread::sleep(WAIT_SLICE);
        }
    }
}

impl GraphicsBackend for WgpuBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Wgpu
    }

    fn name(&self) -> &'static str {
        "WGPU"
    }

    // --- Bootstrap ---

    fn initialize_instance(&self, config: &GraphicsConfig) -> Result<(), RenderError> {
        let context = WgpuInstanceContext::new(config)
            .map_err(|e| RenderError::InitializationFailed(format!("{e:#}")))?;
        *lock(&self.instance) = Some(context);
        *lock(&self.formats) = Some(TargetFormats::from_config(&config.swapchain));
        Ok(())
    }

    fn enumerate_adapters(&self) -> Vec<AdapterInfo> {
        lock(&self.instance)
            .as_ref()
            .map(WgpuInstanceContext::adapter_infos)
            .unwrap_or_default()
    }

    fn create_device(
        &self,
        adapter_index: usize,
        config: &GraphicsConfig,
    ) -> Result<(), RenderError> {
        let adapter = lock(&self.instance)
            .as_ref()
            .and_then(|i| i.adapters.get(adapter_index).cloned())
            .ok_or_else(|| {
                RenderError::InitializationFailed(format!("adapter {adapter_index} does not exist"))
            })?;
        let ctx = WgpuDeviceContext::new(adapter)
            .map_err(|e| RenderError::InitializationFailed(format!("{e:#}")))?;
        let dummies = DummyResources::new(&ctx.device);
        let push = Mutex::new(PushConstantArena::new(&ctx.device));
        *lock(&self.device) = Some(Arc::new(DeviceState { ctx, dummies, push }));
        *lock(&self.formats) = Some(TargetFormats::from_config(&config.swapchain));
        log::info!("WgpuBackend: device ready.");
        Ok(())
    }

    fn shutdown(&self) {
        *lock(&self.surface) = None;
        lock(&self.blocks).clear();
        lock(&self.pipelines).clear();
        lock(&self.layouts).clear();
        lock(&self.shaders).clear();
        lock(&self.textures).clear();
        lock(&self.buffers).clear();
        lock(&self.samplers).clear();
        lock(&self.timelines).complete_all();
        *lock(&self.device) = None;
        *lock(&self.instance) = None;
        log::info!("WgpuBackend: shut down.");
    }

    // --- Buffers ---

    fn create_buffer(
        &self,
        handle: BufferHandle,
        desc: &BufferDescriptor<'_>,
    ) -> Result<BufferAllocation, ResourceError> {
        let state = self.require_device()?;
        let entry = resources::create_buffer(&state.ctx.device, desc)?;
        let aligned_size = entry.buffer.size();
        lock(&self.buffers).insert(handle, entry);
        Ok(BufferAllocation {
            aligned_size,
            host_visible: false,
            gpu_address: None,
        })
    }

    fn write_buffer(
        &self,
        handle: BufferHandle,
        offset: u64,
        data: &[u8],
    ) -> Result<(), ResourceError> {
        if data.is_empty() {
            return Ok(());
        }
        if offset % COPY_ALIGNMENT != 0 || data.len() as u64 % COPY_ALIGNMENT != 0 {
            return Err(ResourceError::InvalidDescriptor(format!(
                "buffer writes must be {COPY_ALIGNMENT}-byte aligned (offset {offset}, {} bytes)",
                data.len()
            )));
        }
        let state = self.require_device()?;
        let buffers = lock(&self.buffers);
        let entry = buffers.get(&handle).ok_or(ResourceError::InvalidHandle)?;
        state.ctx.queue.write_buffer(&entry.buffer, offset, data);
        Ok(())
    }

    fn destroy_buffer(&self, handle: BufferHandle) -> Option<RetiredObject> {
        lock(&self.buffers)
            .remove(&handle)
            .map(|entry| RetiredObject::new("buffer", entry))
    }

    // --- Textures ---

    fn create_texture(
        &self,
        handle: TextureHandle,
        desc: &TextureDescriptor<'_>,
    ) -> Result<(), ResourceError> {
        let state = self.require_device()?;
        let entry = resources::create_texture(&state.ctx.device, desc)?;
        lock(&self.textures).insert(handle, entry);
        Ok(())
    }

    fn write_texture(
        &self,
        handle: TextureHandle,
        mip_level: u32,
        data: &[u8],
    ) -> Result<(), ResourceError> {
        let state = self.require_device()?;
        let textures = lock(&self.textures);
        let entry = textures.get(&handle).ok_or(ResourceError::InvalidHandle)?;
        resources::write_texture_level(&state.ctx.queue, entry, mip_level, data)
    }

    fn destroy_texture(&self, handle: TextureHandle) -> Option<RetiredObject> {
        lock(&self.textures)
            .remove(&handle)
            .map(|entry| RetiredObject::new("texture", entry))
    }

    // --- Shaders and pipelines ---

    fn create_shader_module(
        &self,
        handle: ShaderHandle,
        desc: &ShaderModuleDescriptor<'_>,
    ) -> Result<Option<RetiredObject>, ShaderError> {
        let state = self
            .require_device()
            .map_err(|e| ShaderError::CompilationFailed {
                label: desc.display_label().to_owned(),
                details: e.to_string(),
            })?;
        let entry = resources::create_shader_module(&state.ctx.device, desc)?;
        Ok(lock(&self.shaders)
            .insert(handle, entry)
            .map(|previous| RetiredObject::new("shader module", previous)))
    }

    fn destroy_shader_module(&self, handle: ShaderHandle) -> Option<RetiredObject> {
        lock(&self.shaders)
            .remove(&handle)
            .map(|entry| RetiredObject::new("shader module", entry))
    }

    fn create_pipeline(
        &self,
        handle: PsoHandle,
        desc: &NativePipelineDescriptor<'_>,
    ) -> Result<Option<RetiredObject>, PipelineError> {
        let state = self
            .require_device()
            .map_err(|e| PipelineError::LayoutCreationFailed(e.to_string()))?;
        let formats = self.target_formats();
        let entry = {
            let shaders = lock(&self.shaders);
            let layouts = lock(&self.layouts);
            let push = lock(&state.push);
            let inputs = PipelineInputs {
                shaders: &shaders,
                layouts: &layouts,
                push_layout: &push.layout,
                formats,
                max_bind_groups: state.ctx.limits.max_bind_groups,
            };
            build_pipeline(&state.ctx.device, PipelineRecipe::from_native(desc), &inputs)?
        };
        Ok(lock(&self.pipelines)
            .insert(handle, entry)
            .map(|previous| RetiredObject::new("pipeline", previous)))
    }

    fn destroy_pipeline(&self, handle: PsoHandle) -> Option<RetiredObject> {
        lock(&self.pipelines)
            .remove(&handle)
            .map(|entry| RetiredObject::new("pipeline", entry))
    }

    // --- Parameter blocks ---

    fn create_parameter_block_layout(
        &self,
        handle: ParameterBlockLayoutHandle,
        set_index: u32,
        desc: &BindingSetLayoutDescriptor,
    ) -> Result<(), ResourceError> {
        let state = self.require_device()?;
        let entry = resources::create_bind_group_layout(&state.ctx.device, set_index, desc)?;
        lock(&self.layouts).insert(handle, entry);
        Ok(())
    }

    fn destroy_parameter_block_layout(
        &self,
        handle: ParameterBlockLayoutHandle,
    ) -> Option<RetiredObject> {
        lock(&self.layouts)
            .remove(&handle)
            .map(|entry| RetiredObject::new("parameter block layout", entry))
    }

    fn create_parameter_block(
        &self,
        handle: ParameterBlockHandle,
        layout: ParameterBlockLayoutHandle,
    ) -> Result<(), ResourceError> {
        let state = self.require_device()?;
        let bind_group = {
            let layouts = lock(&self.layouts);
            let entry = layouts.get(&layout).ok_or(ResourceError::InvalidHandle)?;
            let empty = vec![ResolvedSlot::Empty; entry.slots.len()];
            resources::create_bind_group(&state.ctx.device, entry, &empty, &state.dummies)?
        };
        lock(&self.blocks).insert(handle, BlockEntry { layout, bind_group });
        Ok(())
    }

    fn write_parameter_block(
        &self,
        handle: ParameterBlockHandle,
        writes: &[SlotWrite<'_>],
    ) -> Result<ParameterBlockWriteOutcome, ResourceError> {
        let state = self.require_device()?;
        let layout = lock(&self.blocks)
            .get(&handle)
            .map(|block| block.layout)
            .ok_or(ResourceError::InvalidHandle)?;

        let mut rejected = Vec::new();
        let bind_group = {
            let layouts = lock(&self.layouts);
            let layout_entry = layouts.get(&layout).ok_or(ResourceError::InvalidHandle)?;
            let buffers = lock(&self.buffers);
            let textures = lock(&self.textures);
            let mut samplers = lock(&self.samplers);

            let mut resolved = Vec::with_capacity(layout_entry.slots.len());
            for slot in &layout_entry.slots {
                let Some(write) = writes.iter().find(|w| w.binding.slot == slot.slot) else {
                    resolved.push(ResolvedSlot::Empty);
                    continue;
                };
                match self.resolve_slot(
                    &state,
                    slot.kind,
                    write.resource,
                    &buffers,
                    &textures,
                    &mut samplers,
                ) {
                    Ok(native) => resolved.push(native),
                    Err(reason) => {
                        log::warn!(
                            "WgpuBackend: slot {} of block {handle:?} left empty: {reason}",
                            slot.slot
                        );
                        rejected.push(SlotRejection {
                            slot: slot.slot,
                            reason,
                        });
                        resolved.push(ResolvedSlot::Empty);
                    }
                }
            }
            resources::create_bind_group(&state.ctx.device, layout_entry, &resolved, &state.dummies)?
        };

        let mut blocks = lock(&self.blocks);
        let block = blocks.get_mut(&handle).ok_or(ResourceError::InvalidHandle)?;
        let previous = std::mem::replace(&mut block.bind_group, bind_group);
        Ok(ParameterBlockWriteOutcome {
            retired: Some(RetiredObject::new("bind group", previous)),
            rejected,
        })
    }

    fn destroy_parameter_block(&self, handle: ParameterBlockHandle) -> Option<RetiredObject> {
        lock(&self.blocks)
            .remove(&handle)
            .map(|entry| RetiredObject::new("parameter block", entry))
    }

    // --- Synchronization ---

    fn create_timeline(&self, initial_value: u64) -> Result<TimelineId, RenderError> {
        Ok(lock(&self.timelines).create(initial_value))
    }

    fn timeline_value(&self, timeline: TimelineId) -> u64 {
        if let Some(state) = self.device_state() {
            state.ctx.poll();
        }
        lock(&self.timelines).completed(timeline).unwrap_or(0)
    }

    fn wait_timeline(
        &self,
        timeline: TimelineId,
        value: u64,
        timeout: Option<Duration>,
    ) -> Result<bool, RenderError> {
        {
            let timelines = lock(&self.timelines);
            let (Some(completed), Some(submitted)) =
                (timelines.completed(timeline), timelines.submitted(timeline))
            else {
                return Err(RenderError::FatalNativeError(format!(
                    "wait on unknown timeline {timeline:?}"
                )));
            };
            if completed >= value {
                return Ok(true);
            }
            if submitted < value {
                log::error!(
                    "WgpuBackend: timeline {timeline:?} can never reach {value}, only {submitted} was submitted"
                );
                return Ok(false);
            }
        }
        let state = self.require_device_for_render()?;
        let deadline = timeout.map(|t| Instant::now() + t);
        Ok(self.poll_until(&state, deadline, |timelines| {
            timelines.completed(timeline).is_none_or(|v| v >= value)
        }))
    }

    fn signal_timeline(&self, timeline: TimelineId, value: u64) -> Result<(), RenderError> {
        if lock(&self.timelines).signal_host(timeline, value) {
            Ok(())
        } else {
            Err(RenderError::FatalNativeError(format!(
                "signal of unknown timeline {timeline:?}"
            )))
        }
    }

    fn destroy_timeline(&self, timeline: TimelineId) {
        lock(&self.timelines).destroy(timeline);
    }

    fn wait_idle(&self) -> Result<(), RenderError> {
        let Some(state) = self.device_state() else {
            return Ok(());
        };
        self.poll_until(&state, None, TimelineTable::all_complete);
        Ok(())
    }

    fn poll(&self) {
        if let Some(state) = self.device_state() {
            state.ctx.poll();
        }
    }

    // --- Swapchain ---

    fn create_swapchain(
        &self,
        window: &NativeWindowHandle,
        width: u32,
        height: u32,
        config: &SwapchainConfig,
    ) -> Result<SwapchainInfo, RenderError> {
        let state = self.require_device_for_render()?;
        let surface = {
            let instance = lock(&self.instance);
            let instance = instance.as_ref().ok_or_else(|| {
                RenderError::FatalNativeError("the WGPU instance does not exist".to_owned())
            })?;
            WgpuSurface::new(
                &instance.instance,
                &state.ctx.adapter,
                &state.ctx.device,
                window,
                width,
                height,
                config,
            )?
        };

        let formats = surface.formats();
        let previous = lock(&self.formats).replace(formats);
        if previous != Some(formats) {
            self.rebuild_pipelines(&state, formats);
        }
        let info = surface.info();
        *lock(&self.surface) = Some(surface);
        Ok(info)
    }

    fn resize_swapchain(&self, width: u32, height: u32) -> Result<SwapchainInfo, RenderError> {
        let state = self.require_device_for_render()?;
        let mut surface = lock(&self.surface);
        let surface = surface
            .as_mut()
            .ok_or_else(|| RenderError::SurfaceUnavailable("no swapchain".to_owned()))?;
        surface.resize(&state.ctx.device, width, height);
        Ok(surface.info())
    }

    fn destroy_swapchain(&self) {
        *lock(&self.surface) = None;
    }

    fn acquire_image(&self) -> Result<u32, RenderError> {
        lock(&self.surface)
            .as_mut()
            .ok_or_else(|| RenderError::SurfaceUnavailable("no swapchain".to_owned()))?
            .acquire()
    }

    fn submit(&self, submission: &Submission<'_>) -> Result<(), RenderError> {
        let state = self.require_device_for_render()?;
        let counters = {
            let mut timelines = lock(&self.timelines);
            submission
                .signals()
                .map(|signal| {
                    timelines
                        .submit(signal.timeline, signal.value)
                        .map(|counter| (counter, signal.value))
                        .ok_or_else(|| {
                            RenderError::SubmissionFailed(format!(
                                "unknown timeline {:?}",
                                signal.timeline
                            ))
                        })
                })
                .collect::<Result<Vec<_>, _>>()?
        };

        let device = &state.ctx.device;
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some(match submission.kind {
                CommandListKind::Graphics => "Mercury Frame Encoder",
                CommandListKind::Transfer => "Mercury Transfer Encoder",
            }),
        });

        let encoded = match submission.kind {
            CommandListKind::Graphics => {
                let targets = lock(&self.surface).as_ref().and_then(WgpuSurface::frame_targets);
                match targets {
                    Some(targets) => {
                        let mut push = lock(&state.push);
                        let pushes = push_constant_writes(submission.stream);
                        let offsets = push.stage(device, &state.ctx.queue, &pushes);
                        let pipelines = lock(&self.pipelines);
                        let blocks = lock(&self.blocks);
                        let buffers = lock(&self.buffers);
                        let tables = ReplayTables {
                            pipelines: &pipelines,
                            blocks: &blocks,
                            buffers: &buffers,
                        };
                        encode_frame(
                            &mut encoder,
                            &targets,
                            submission.clear.unwrap_or_default(),
                            submission.stream,
                            &tables,
                            &push,
                            &offsets,
                        );
                        Ok(())
                    }
                    None => Err(RenderError::SubmissionFailed(
                        "frame submitted without an acquired image".to_owned(),
                    )),
                }
            }
            CommandListKind::Transfer => {
                encode_transfer(&mut encoder, submission.stream, &lock(&self.buffers));
                Ok(())
            }
        };

        let submitted = encoded.and_then(|()| {
            resources::validated(&state.ctx.device, || {
                state.ctx.queue.submit(Some(encoder.finish()));
            })
            .map_err(RenderError::SubmissionFailed)
        });
        if let Err(e) = submitted {
            // Nothing will run, so nothing would ever signal the values.
            for (counter, value) in &counters {
                timeline::signal(counter, *value);
            }
            return Err(e);
        }

        state.ctx.queue.on_submitted_work_done(move || {
            for (counter, value) in &counters {
                timeline::signal(counter, *value);
            }
        });
        Ok(())
    }

    fn present(&self) -> Result<(), RenderError> {
        lock(&self.surface)
            .as_mut()
            .ok_or_else(|| RenderError::SurfaceUnavailable("no swapchain".to_owned()))?
            .present()
    }
}
