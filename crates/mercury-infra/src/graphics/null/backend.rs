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

use super::probe::NullProbe;
use super::state::{
    NullBlock, NullBuffer, NullLayout, NullPipeline, NullShader, NullState, NullSubmission,
    NullSwapchain, NullTexture,
};
use mercury_core::platform::NativeWindowHandle;
use mercury_core::rhi::{
    AdapterInfo, AdapterType, BackendKind, BindingSetLayoutDescriptor, BufferAllocation,
    BufferDescriptor, BufferHandle, CommandListKind, GraphicsBackend, GraphicsConfig,
    NativePipelineDescriptor, ParameterBlockHandle, ParameterBlockLayoutHandle,
    ParameterBlockResource, ParameterBlockWriteOutcome, PipelineError, PsoHandle,
    RecordedCommand, RenderError, ResourceError, RetiredObject, ShaderError, ShaderHandle,
    ShaderModuleDescriptor, ShaderResourceType, ShaderSource, ShaderStage, SlotRejection, SlotWrite,
    Submission, SwapchainConfig, SwapchainInfo, TextureDescriptor, TextureHandle, TextureLayout,
    TimelineId,
};
use mercury_core::utils::sync::lock;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// When submitted work completes on the null "GPU".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NullCompletion {
    /// Every submission signals its timeline as soon as it is submitted.
    #[default]
    Immediate,
    /// Submissions stay in flight until a wait needs them, the device idles,
    /// or the test completes them through [`NullProbe`].
    Deferred,
}

/// Behaviour knobs of the null backend.
#[derive(Debug, Clone)]
pub struct NullBackendOptions {
    /// Adapters reported by `enumerate_adapters`.
    pub adapters: Vec<AdapterInfo>,
    /// Completion model of submitted work.
    pub completion: NullCompletion,
    /// Binding kinds `write_parameter_block` refuses.
    pub unimplemented_kinds: Vec<ShaderResourceType>,
    /// Number of presentable images.
    pub swapchain_images: u32,
    /// WGSL sources containing this marker fail to compile.
    pub compile_error_marker: Option<String>,
    /// `initialize_instance` fails.
    pub fail_instance: bool,
    /// `create_device` fails.
    pub fail_device: bool,
}

impl Default for NullBackendOptions {
    fn default() -> Self {
        let mut adapter = AdapterInfo::new("Mercury Null Adapter", AdapterType::Cpu, 0);
        adapter.backend = "null".to_owned();
        adapter.driver = "mercury-null".to_owned();
        Self {
            adapters: vec![adapter],
            completion: NullCompletion::Immediate,
            unimplemented_kinds: Vec::new(),
            swapchain_images: 3,
            compile_error_marker: None,
            fail_instance: false,
            fail_device: false,
        }
    }
}

/// A backend that performs no GPU work.
///
/// Resources live in CPU memory, buffer copies are executed at submission and
/// timelines advance according to [`NullCompletion`]. A [`NullProbe`] obtained
/// from [`probe`](Self::probe) observes everything the backend received.
#[derive(Debug)]
pub struct NullBackend {
    options: NullBackendOptions,
    state: Arc<Mutex<NullState>>,
}

impl Default for NullBackend {
    fn default() -> Self {
        Self::new(NullBackendOptions::default())
    }
}

impl NullBackend {
    /// Creates a null backend.
    pub fn new(options: NullBackendOptions) -> Self {
        Self {
            options,
            state: Arc::new(Mutex::new(NullState::default())),
        }
    }

    /// An observer sharing this backend's state.
    pub fn probe(&self) -> NullProbe {
        NullProbe::new(self.state.clone())
    }

    fn state(&self) -> MutexGuard<'_, NullState> {
        lock(&self.state)
    }

    fn retired(&self, state: &NullState, label: &'static str) -> RetiredObject {
        RetiredObject::new(label, state.native_object())
    }

    fn replay(state: &mut NullState, submission: &Submission<'_>) -> Result<(), RenderError> {
        for command in submission.stream.commands() {
            match command {
                RecordedCommand::BindPipeline(pso) => {
                    if !state.pipelines.contains_key(pso) {
                        return Err(missing("pipeline", pso));
                    }
                }
                RecordedCommand::BindParameterBlock { block, .. } => {
                    if !state.blocks.contains_key(block) {
                        return Err(missing("parameter block", block));
                    }
                }
                RecordedCommand::SetVertexBuffer { buffer, .. }
                | RecordedCommand::SetIndexBuffer { buffer, .. } => {
                    if !state.buffers.contains_key(buffer) {
                        return Err(missing("buffer", buffer));
                    }
                }
                RecordedCommand::CopyBufferToBuffer {
                    source,
                    source_offset,
                    destination,
                    destination_offset,
                    size,
                } => {
                    let bytes = state
                        .buffers
                        .get(source)
                        .and_then(|b| {
                            b.data
                                .get(*source_offset as usize..(*source_offset + *size) as usize)
                        })
                        .map(<[u8]>::to_vec)
                        .ok_or_else(|| {
                            RenderError::SubmissionFailed(format!(
                                "copy source {source:?} is missing or too small"
                            ))
                        })?;
                    let target = state
                        .buffers
                        .get_mut(destination)
                        .and_then(|b| {
                            b.data.get_mut(
                                *destination_offset as usize
                                    ..(*destination_offset + *size) as usize,
                            )
                        })
                        .ok_or_else(|| {
                            RenderError::SubmissionFailed(format!(
                                "copy destination {destination:?} is missing or too small"
                            ))
                        })?;
                    target.copy_from_slice(&bytes);
                }
                _ => {}
            }
        }
        Ok(())
    }
}

fn missing(kind: &str, handle: &dyn std::fmt::Debug) -> RenderError {
    RenderError::SubmissionFailed(format!("submission references missing {kind} {handle:?}"))
}

impl GraphicsBackend for NullBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Null
    }

    fn name(&self) -> &'static str {
        "NULL"
    }

    fn initialize_instance(&self, _config: &GraphicsConfig) -> Result<(), RenderError> {
        if self.options.fail_instance {
            return Err(RenderError::InitializationFailed(
                "null instance refused to start".to_owned(),
            ));
        }
        self.state().instance_ready = true;
        log::info!("NullBackend: instance ready");
        Ok(())
    }

    fn enumerate_adapters(&self) -> Vec<AdapterInfo> {
        self.options.adapters.clone()
    }

    fn create_device(
        &self,
        adapter_index: usize,
        _config: &GraphicsConfig,
    ) -> Result<(), RenderError> {
        let mut state = self.state();
        if !state.instance_ready {
            return Err(RenderError::InitializationFailed(
                "instance is not initialized".to_owned(),
            ));
        }
        if self.options.fail_device {
            return Err(RenderError::InitializationFailed(
                "null device creation failed".to_owned(),
            ));
        }
        state.device_adapter = Some(adapter_index);
        log::info!("NullBackend: device created on adapter {adapter_index}");
        Ok(())
    }

    fn shutdown(&self) {
        let mut state = self.state();
        state.device_adapter = None;
        state.instance_ready = false;
        log::info!("NullBackend: shut down");
    }

    fn create_buffer(
        &self,
        handle: BufferHandle,
        desc: &BufferDescriptor<'_>,
    ) -> Result<BufferAllocation, ResourceError> {
        let mut data = vec![0u8; desc.size as usize];
        if let Some(initial) = desc.initial_data.as_deref() {
            data[..initial.len()].copy_from_slice(initial);
        }
        self.state().buffers.insert(
            handle,
            NullBuffer {
                data,
                usage: desc.usage,
            },
        );
        Ok(BufferAllocation {
            aligned_size: desc.size.next_multiple_of(4),
            host_visible: true,
            gpu_address: None,
        })
    }

    fn write_buffer(
        &self,
        handle: BufferHandle,
        offset: u64,
        data: &[u8],
    ) -> Result<(), ResourceError> {
        let mut state = self.state();
        let buffer = state
            .buffers
            .get_mut(&handle)
            .ok_or(ResourceError::InvalidHandle)?;
        let capacity = buffer.data.len() as u64;
        let start = offset as usize;
        let target = buffer
            .data
            .get_mut(start..start + data.len())
            .ok_or(ResourceError::OutOfBounds {
                offset,
                size: data.len() as u64,
                capacity,
            })?;
        target.copy_from_slice(data);
        Ok(())
    }

    fn destroy_buffer(&self, handle: BufferHandle) -> Option<RetiredObject> {
        let mut state = self.state();
        state.buffers.remove(&handle)?;
        Some(self.retired(&state, "buffer"))
    }

    fn create_texture(
        &self,
        handle: TextureHandle,
        desc: &TextureDescriptor<'_>,
    ) -> Result<(), ResourceError> {
        self.state().textures.insert(
            handle,
            NullTexture {
                width: desc.width,
                height: desc.height,
                format: desc.format,
                levels: vec![Vec::new(); desc.mip_levels as usize],
                transitions: Vec::new(),
            },
        );
        Ok(())
    }

    fn write_texture(
        &self,
        handle: TextureHandle,
        mip_level: u32,
        data: &[u8],
    ) -> Result<(), ResourceError> {
        let mut state = self.state();
        let texture = state
            .textures
            .get_mut(&handle)
            .ok_or(ResourceError::InvalidHandle)?;
        if let Some(bpt) = texture.format.bytes_per_texel() {
            let width = u64::from((texture.width >> mip_level).max(1));
            let height = u64::from((texture.height >> mip_level).max(1));
            let expected = width * height * u64::from(bpt);
            if data.len() as u64 != expected {
                return Err(ResourceError::OutOfBounds {
                    offset: 0,
                    size: data.len() as u64,
                    capacity: expected,
                });
            }
        }
        let level = texture
            .levels
            .get_mut(mip_level as usize)
            .ok_or_else(|| ResourceError::InvalidDescriptor(format!("no mip level {mip_level}")))?;
        level.clear();
        level.extend_from_slice(data);
        Ok(())
    }

    fn transition_texture(&self, handle: TextureHandle, from: TextureLayout, to: TextureLayout) {
        if let Some(texture) = self.state().textures.get_mut(&handle) {
            texture.transitions.push((from, to));
        }
    }

    fn destroy_texture(&self, handle: TextureHandle) -> Option<RetiredObject> {
        let mut state = self.state();
        state.textures.remove(&handle)?;
        Some(self.retired(&state, "texture"))
    }

    fn create_shader_module(
        &self,
        handle: ShaderHandle,
        desc: &ShaderModuleDescriptor<'_>,
    ) -> Result<Option<RetiredObject>, ShaderError> {
        if let (Some(marker), ShaderSource::Wgsl(source)) =
            (&self.options.compile_error_marker, &desc.source)
        {
            if source.contains(marker.as_str()) {
                return Err(ShaderError::CompilationFailed {
                    label: desc.display_label().to_owned(),
                    details: format!("source contains '{marker}'"),
                });
            }
        }
        let mut state = self.state();
        let versions = state.shaders.get(&handle).map_or(0, |s| s.versions);
        let previous = state.shaders.insert(
            handle,
            NullShader {
                stage: desc.stage,
                entry_point: desc.entry_point.to_string(),
                versions: versions + 1,
            },
        );
        Ok(previous.map(|_| self.retired(&state, "shader module")))
    }

    fn destroy_shader_module(&self, handle: ShaderHandle) -> Option<RetiredObject> {
        let mut state = self.state();
        state.shaders.remove(&handle)?;
        Some(self.retired(&state, "shader module"))
    }

    fn create_pipeline(
        &self,
        handle: PsoHandle,
        desc: &NativePipelineDescriptor<'_>,
    ) -> Result<Option<RetiredObject>, PipelineError> {
        let label = desc.desc.display_label();
        let mut state = self.state();
        for (stage_ref, stage) in [
            (desc.vertex, ShaderStage::Vertex),
            (desc.fragment, ShaderStage::Fragment),
        ] {
            let Some(stage_ref) = stage_ref else {
                continue;
            };
            let known = state.shaders.get(&stage_ref.module).is_some_and(|s| {
                s.stage == stage && s.entry_point == stage_ref.entry_point
            });
            if !known {
                return Err(PipelineError::InvalidShaderModule {
                    label: label.to_owned(),
                    stage,
                });
            }
        }
        if let Some(missing) = desc
            .set_layouts
            .iter()
            .find(|layout| !state.layouts.contains_key(layout))
        {
            return Err(PipelineError::LayoutCreationFailed(format!(
                "layout {missing:?} of pipeline '{label}' does not exist"
            )));
        }
        let builds = state.pipelines.get(&handle).map_or(0, |p| p.builds);
        let previous = state.pipelines.insert(
            handle,
            NullPipeline {
                label: label.to_owned(),
                set_layouts: desc.set_layouts.clone(),
                push_constant_size: desc.push_constant_size,
                builds: builds + 1,
            },
        );
        Ok(previous.map(|_| self.retired(&state, "pipeline")))
    }

    fn destroy_pipeline(&self, handle: PsoHandle) -> Option<RetiredObject> {
        let mut state = self.state();
        state.pipelines.remove(&handle)?;
        Some(self.retired(&state, "pipeline"))
    }

    fn create_parameter_block_layout(
        &self,
        handle: ParameterBlockLayoutHandle,
        set_index: u32,
        desc: &BindingSetLayoutDescriptor,
    ) -> Result<(), ResourceError> {
        self.state().layouts.insert(
            handle,
            NullLayout {
                set_index,
                slots: desc.slots.clone(),
            },
        );
        Ok(())
    }

    fn destroy_parameter_block_layout(
        &self,
        handle: ParameterBlockLayoutHandle,
    ) -> Option<RetiredObject> {
        let mut state = self.state();
        state.layouts.remove(&handle)?;
        Some(self.retired(&state, "parameter block layout"))
    }

    fn create_parameter_block(
        &self,
        handle: ParameterBlockHandle,
        layout: ParameterBlockLayoutHandle,
    ) -> Result<(), ResourceError> {
        let mut state = self.state();
        let slots = state
            .layouts
            .get(&layout)
            .map(|l| l.slots.len())
            .ok_or(ResourceError::InvalidHandle)?;
        state.blocks.insert(
            handle,
            NullBlock {
                layout,
                resources: vec![ParameterBlockResource::Empty; slots],
                writes: 0,
            },
        );
        Ok(())
    }

    fn write_parameter_block(
        &self,
        handle: ParameterBlockHandle,
        writes: &[SlotWrite<'_>],
    ) -> Result<ParameterBlockWriteOutcome, ResourceError> {
        let mut state = self.state();
        let mut rejected = Vec::new();
        let mut resources = Vec::with_capacity(writes.len());
        for write in writes {
            let empty = matches!(write.resource, ParameterBlockResource::Empty);
            if !empty && self.options.unimplemented_kinds.contains(&write.binding.kind) {
                rejected.push(SlotRejection {
                    slot: write.binding.slot,
                    reason: ResourceError::UnimplementedResourceKind(write.binding.kind),
                });
                resources.push(ParameterBlockResource::Empty);
                continue;
            }
            let present = match write.resource {
                ParameterBlockResource::Buffer { buffer, .. } => {
                    state.buffers.contains_key(buffer)
                }
                ParameterBlockResource::Texture { texture, .. }
                | ParameterBlockResource::RwImage { texture } => {
                    state.textures.contains_key(texture)
                }
                ParameterBlockResource::Empty => true,
            };
            if present {
                resources.push(write.resource.clone());
            } else {
                rejected.push(SlotRejection {
                    slot: write.binding.slot,
                    reason: ResourceError::InvalidHandle,
                });
                resources.push(ParameterBlockResource::Empty);
            }
        }
        let block = state
            .blocks
            .get_mut(&handle)
            .ok_or(ResourceError::InvalidHandle)?;
        block.resources = resources;
        block.writes += 1;
        Ok(ParameterBlockWriteOutcome {
            retired: None,
            rejected,
        })
    }

    fn destroy_parameter_block(&self, handle: ParameterBlockHandle) -> Option<RetiredObject> {
        let mut state = self.state();
        state.blocks.remove(&handle)?;
        Some(self.retired(&state, "parameter block"))
    }

    fn create_timeline(&self, initial_value: u64) -> Result<TimelineId, RenderError> {
        let mut state = self.state();
        let id = TimelineId(state.next_timeline);
        state.next_timeline += 1;
        state.timelines.insert(id, initial_value);
        Ok(id)
    }

    fn timeline_value(&self, timeline: TimelineId) -> u64 {
        self.state().timelines.get(&timeline).copied().unwrap_or(0)
    }

    fn wait_timeline(
        &self,
        timeline: TimelineId,
        value: u64,
        timeout: Option<Duration>,
    ) -> Result<bool, RenderError> {
        let mut state = self.state();
        if !state.timelines.contains_key(&timeline) {
            return Err(RenderError::FatalNativeError(format!(
                "wait on unknown timeline {timeline:?}"
            )));
        }
        if state.complete_until(timeline, value) {
            return Ok(true);
        }
        if timeout.is_none() {
            log::error!(
                "NullBackend: timeline {timeline:?} can never reach {value}, nothing is in flight"
            );
        }
        Ok(false)
    }

    fn signal_timeline(&self, timeline: TimelineId, value: u64) -> Result<(), RenderError> {
        let mut state = self.state();
        let current = state.timelines.get_mut(&timeline).ok_or_else(|| {
            RenderError::FatalNativeError(format!("signal of unknown timeline {timeline:?}"))
        })?;
        *current = (*current).max(value);
        Ok(())
    }

    fn destroy_timeline(&self, timeline: TimelineId) {
        let mut state = self.state();
        state.timelines.remove(&timeline);
        for (_, signals) in state.in_flight.iter_mut() {
            signals.retain(|signal| signal.timeline != timeline);
        }
        state.in_flight.retain(|(_, signals)| !signals.is_empty());
    }

    fn wait_idle(&self) -> Result<(), RenderError> {
        let mut state = self.state();
        state.complete_all();
        state.wait_idles += 1;
        Ok(())
    }

    fn poll(&self) {}

    fn create_swapchain(
        &self,
        _window: &NativeWindowHandle,
        width: u32,
        height: u32,
        config: &SwapchainConfig,
    ) -> Result<SwapchainInfo, RenderError> {
        let info = SwapchainInfo {
            width,
            height,
            image_count: self.options.swapchain_images,
            color_format: config.color_format,
            depth_format: config.depth_format,
            samples: config.msaa_samples,
        };
        self.state().swapchain = Some(NullSwapchain {
            info,
            next_image: 0,
            acquired: None,
            outdated: false,
        });
        Ok(info)
    }

    fn resize_swapchain(&self, width: u32, height: u32) -> Result<SwapchainInfo, RenderError> {
        let mut state = self.state();
        let swapchain = state
            .swapchain
            .as_mut()
            .ok_or_else(|| RenderError::SurfaceUnavailable("no swapchain".to_owned()))?;
        swapchain.info.width = width;
        swapchain.info.height = height;
        swapchain.outdated = false;
        swapchain.acquired = None;
        let info = swapchain.info;
        state.resizes += 1;
        Ok(info)
    }

    fn destroy_swapchain(&self) {
        self.state().swapchain = None;
    }

    fn acquire_image(&self) -> Result<u32, RenderError> {
        let mut state = self.state();
        let in_flight = state.frames_in_flight();
        let swapchain = state
            .swapchain
            .as_mut()
            .ok_or_else(|| RenderError::SurfaceUnavailable("no swapchain".to_owned()))?;
        if swapchain.outdated {
            return Err(RenderError::SurfaceUnavailable(
                "swapchain is outdated".to_owned(),
            ));
        }
        let index = swapchain.next_image;
        swapchain.next_image = (index + 1) % swapchain.info.image_count.max(1);
        swapchain.acquired = Some(index);
        state.frames_in_flight_at_acquire.push(in_flight);
        Ok(index)
    }

    fn submit(&self, submission: &Submission<'_>) -> Result<(), RenderError> {
        let mut state = self.state();
        if let Some(unknown) = submission
            .signals()
            .find(|signal| !state.timelines.contains_key(&signal.timeline))
        {
            return Err(RenderError::SubmissionFailed(format!(
                "unknown timeline {:?}",
                unknown.timeline
            )));
        }
        Self::replay(&mut state, submission)?;
        state.submissions.push(NullSubmission {
            kind: submission.kind,
            stream: submission.stream.clone(),
            clear: submission.clear,
            signal: submission.signal,
        });
        match self.options.completion {
            NullCompletion::Immediate => {
                for signal in submission.signals() {
                    let value = state.timelines.entry(signal.timeline).or_insert(0);
                    *value = (*value).max(signal.value);
                }
            }
            NullCompletion::Deferred => {
                let signals = submission.signals().collect();
                state.in_flight.push_back((submission.kind, signals));
            }
        }
        if submission.kind == CommandListKind::Transfer {
            log::trace!(
                "NullBackend: transfer submission signals {}",
                submission.signal.value
            );
        }
        Ok(())
    }

    fn present(&self) -> Result<(), RenderError> {
        let mut state = self.state();
        let swapchain = state
            .swapchain
            .as_mut()
            .ok_or_else(|| RenderError::SurfaceUnavailable("no swapchain".to_owned()))?;
        if swapchain.acquired.take().is_none() {
            return Err(RenderError::FatalNativeError(
                "present without an acquired image".to_owned(),
            ));
        }
        let outdated = swapchain.outdated;
        state.presents += 1;
        if outdated {
            return Err(RenderError::SurfaceUnavailable(
                "swapchain is outdated".to_owned(),
            ));
        }
        Ok(())
    }
}
