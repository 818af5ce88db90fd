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

// Mercury testbed
// Draws a triangle through the device frontend: one-time vertex upload,
// a uniform parameter block, push constants and the paced frame loop.

use std::mem;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use mercury_core::rhi::{
    BindingSetLayoutDescriptor, BufferDescriptor, BufferHandle, BufferUsage, Device,
    GraphicsConfig, ParameterBlockHandle, ParameterBlockResource, PipelineLayoutDescriptor,
    PsoHandle, RasterizePipelineDescriptor, RenderError, ShaderModuleDescriptor,
    ShaderResourceType, ShaderStage, VertexAttribute, VertexBufferLayout, VertexFormat,
    VertexStepMode,
};
use mercury_infra::{WinitPlatform, WinitWindowBuilder};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

/// Environment variable pointing at a JSON graphics configuration.
const CONFIG_ENV: &str = "MERCURY_GRAPHICS_CONFIG";

const SHADER_SOURCE: &str = include_str!("shaders/triangle.wgsl");

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct Vertex {
    position: [f32; 3],
    color: [f32; 3],
}

impl Vertex {
    fn layout() -> VertexBufferLayout {
        VertexBufferLayout {
            stride: mem::size_of::<Vertex>() as u64,
            step_mode: VertexStepMode::Vertex,
            attributes: vec![
                // @location(0) in shader: position
                VertexAttribute {
                    location: 0,
                    format: VertexFormat::Float32x3,
                    offset: 0,
                },
                // @location(1) in shader: color
                VertexAttribute {
                    location: 1,
                    format: VertexFormat::Float32x3,
                    offset: mem::size_of::<[f32; 3]>() as u64,
                },
            ],
        }
    }
}

const VERTICES: &[Vertex] = &[
    Vertex {
        position: [0.0, 0.5, 0.0],
        color: [1.0, 0.0, 0.0],
    },
    Vertex {
        position: [-0.5, -0.5, 0.0],
        color: [0.0, 1.0, 0.0],
    },
    Vertex {
        position: [0.5, -0.5, 0.0],
        color: [0.0, 0.0, 1.0],
    },
];

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct Globals {
    offset: [f32; 2],
    scale: f32,
    _pad: f32,
}

/// Handles to the GPU objects the testbed draws with.
struct Scene {
    pipeline: PsoHandle,
    vertex_buffer: BufferHandle,
    globals: BufferHandle,
    globals_block: ParameterBlockHandle,
}

impl Scene {
    fn new(device: &Device) -> Result<Self> {
        let vs = device.create_shader_module(
            &ShaderModuleDescriptor::wgsl(ShaderStage::Vertex, SHADER_SOURCE)
                .with_label("triangle.vs")
                .with_entry_point("vs_main"),
        )?;
        let fs = device.create_shader_module(
            &ShaderModuleDescriptor::wgsl(ShaderStage::Fragment, SHADER_SOURCE)
                .with_label("triangle.fs")
                .with_entry_point("fs_main"),
        )?;

        let globals_set =
            BindingSetLayoutDescriptor::new().with_slot(0, ShaderResourceType::UniformBuffer);
        let pipeline = device.create_rasterize_pipeline(&RasterizePipelineDescriptor {
            label: Some("triangle".to_owned()),
            vertex_shader: vs,
            fragment_shader: fs,
            layout: PipelineLayoutDescriptor::default()
                .with_set(0, globals_set.clone())
                .with_push_constants(mem::size_of::<[f32; 4]>() as u32),
            vertex_buffers: vec![Vertex::layout()],
            ..RasterizePipelineDescriptor::default()
        })?;
        // The pipeline keeps its own copy of the compiled stages.
        device.destroy_shader_module(vs)?;
        device.destroy_shader_module(fs)?;

        let vertex_bytes: &[u8] = bytemuck::cast_slice(VERTICES);
        let size = vertex_bytes.len() as u64;
        let staging = device.create_buffer(
            &BufferDescriptor::new(size, BufferUsage::COPY_SRC)
                .with_label("triangle staging")
                .with_data(vertex_bytes),
        )?;
        let vertex_buffer = device.create_buffer(
            &BufferDescriptor::new(size, BufferUsage::VERTEX | BufferUsage::COPY_DST)
                .with_label("triangle vertices"),
        )?;
        device.submit_one_time_commands(
            |list| list.copy_buffer_to_buffer(staging, 0, vertex_buffer, 0, size),
            Some(Box::new(|| log::info!("Testbed: vertex upload complete"))),
        )?;
        // Released once the copy has retired.
        device.destroy_buffer(staging)?;

        let globals = device.create_buffer(
            &BufferDescriptor::new(mem::size_of::<Globals>() as u64, BufferUsage::UNIFORM)
                .with_label("globals"),
        )?;
        let layout = device.create_parameter_block_layout(&globals_set, 0)?;
        let globals_block = device.create_parameter_block(layout)?;
        device.update_parameter_block(
            globals_block,
            &[ParameterBlockResource::Buffer {
                buffer: globals,
                offset: 0,
                size: 0,
            }],
        )?;

        Ok(Self {
            pipeline,
            vertex_buffer,
            globals,
            globals_block,
        })
    }

    fn draw(&self, device: &Device, seconds: f32) -> Result<(), RenderError> {
        let globals = Globals {
            offset: [0.25 * seconds.cos(), 0.25 * seconds.sin()],
            scale: 1.0,
            _pad: 0.0,
        };
        device.update_buffer(self.globals, 0, bytemuck::bytes_of(&globals))?;

        let mut list = device.acquire_next_image()?;
        list.set_pso(self.pipeline)?;
        list.set_parameter_block(0, self.globals_block)?;
        let pulse = 0.75 + 0.25 * (seconds * 2.0).sin();
        list.push_constants_pod(&[pulse, pulse, pulse, 1.0f32])?;
        list.set_vertex_buffer(0, self.vertex_buffer, 0)?;
        list.draw(VERTICES.len() as u32, 1, 0, 0)?;
        device.present(list)
    }
}

struct Testbed {
    config: GraphicsConfig,
    platform: Arc<WinitPlatform>,
    window: Option<Arc<Window>>,
    scene: Option<Scene>,
    device: Option<Device>,
    started: Instant,
}

impl Testbed {
    fn new(config: GraphicsConfig) -> Self {
        Self {
            config,
            platform: Arc::new(WinitPlatform::new()),
            window: None,
            scene: None,
            device: None,
            started: Instant::now(),
        }
    }

    fn initialize(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window = WinitWindowBuilder::new()
            .with_title("Mercury Testbed")
            .with_dimensions(1024, 768)
            .build(event_loop)
            .context("failed to create the testbed window")?;
        self.platform.set_window(window.clone());

        let device = mercury_infra::create_device(self.platform.clone(), self.config.clone())
            .context("failed to bring up the graphics device")?;
        log::info!(
            "Testbed: running on {} with adapter '{}'",
            device.backend_name(),
            device.adapter_info().name
        );
        device.create_swapchain()?;
        device.set_clear_color([0.02, 0.03, 0.05, 1.0]);

        self.scene = Some(Scene::new(&device)?);
        self.device = Some(device);
        self.window = Some(window);
        Ok(())
    }

    fn redraw(&mut self) {
        let (Some(device), Some(scene)) = (self.device.as_ref(), self.scene.as_ref()) else {
            return;
        };
        device.tick();
        match scene.draw(device, self.started.elapsed().as_secs_f32()) {
            Ok(()) => log::trace!("Testbed: frame {} presented", device.frames_submitted()),
            // Minimized or mid-resize; the device rebuilds the swapchain on its own.
            Err(RenderError::SurfaceUnavailable(reason)) => {
                log::debug!("Testbed: skipping frame: {reason}")
            }
            Err(err) => log::error!("Testbed: rendering error: {err}"),
        }
    }
}

impl Drop for Testbed {
    fn drop(&mut self) {
        log::info!("Testbed: shutting down");
        if let Some(device) = self.device.take() {
            device.shutdown();
        }
        self.platform.clear_window();
    }
}

impl ApplicationHandler for Testbed {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(err) = self.initialize(event_loop) {
            log::error!("Testbed: initialization failed: {err:#}");
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, id: WindowId, event: WindowEvent) {
        if self.window.as_ref().map(|w| w.id()) != Some(id) {
            return;
        }
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Testbed: close requested, exiting event loop...");
                if let Some(device) = self.device.as_ref() {
                    if let Err(err) = device.wait_idle() {
                        log::warn!("Testbed: wait-idle before exit failed: {err}");
                    }
                }
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                log::info!("Testbed: window resized to {}x{}", size.width, size.height);
                if let Some(device) = self.device.as_ref() {
                    device.resize();
                }
            }
            WindowEvent::RedrawRequested => self.redraw(),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }
}

fn load_config() -> Result<GraphicsConfig> {
    match std::env::var(CONFIG_ENV) {
        Ok(path) => GraphicsConfig::load(&path)
            .with_context(|| format!("failed to load the graphics configuration from '{path}'")),
        Err(_) => Ok(GraphicsConfig::default()),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let config = load_config()?;
    log::info!("Testbed: backend {:?}", config.backend);

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = Testbed::new(config);
    event_loop.run_app(&mut app)?;
    Ok(())
}
