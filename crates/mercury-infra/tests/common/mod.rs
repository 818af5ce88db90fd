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

//! Shared fixtures for the device integration tests.

#![allow(dead_code)]

use mercury_core::platform::{NativeWindowHandle, Platform};
use mercury_core::rhi::{
    BackendKind, BindingSetLayoutDescriptor, Device, GraphicsConfig, PipelineLayoutDescriptor,
    PsoHandle, RasterizePipelineDescriptor, ShaderHandle, ShaderModuleDescriptor, ShaderStage,
};
use mercury_core::utils::sync::lock;
use mercury_infra::{NullBackend, NullBackendOptions, NullCompletion, NullProbe};
use raw_window_handle::{
    DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, RawWindowHandle,
    WebWindowHandle, WindowHandle,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

pub const TRIANGLE_VS: &str = "@vertex fn main() -> @builtin(position) vec4<f32> { return vec4<f32>(0.0); }";
pub const TRIANGLE_FS: &str = "@fragment fn main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }";

/// A window the null backend never dereferences.
#[derive(Debug)]
pub struct FakeWindow;

impl HasWindowHandle for FakeWindow {
    fn window_handle(&self) -> Result<WindowHandle<'_>, HandleError> {
        let raw = RawWindowHandle::Web(WebWindowHandle::new(1));
        // SAFETY: the handle is only passed to the null backend, which ignores it.
        Ok(unsafe { WindowHandle::borrow_raw(raw) })
    }
}

impl HasDisplayHandle for FakeWindow {
    fn display_handle(&self) -> Result<DisplayHandle<'_>, HandleError> {
        Ok(DisplayHandle::web())
    }
}

/// A platform whose window can be opened, resized and closed by the test.
///
/// `fatal_fail` panics so fatal paths can be asserted with `#[should_panic]`.
pub struct TestPlatform {
    window: Mutex<Option<NativeWindowHandle>>,
    size: Mutex<(u32, u32)>,
    sleeps: AtomicU64,
}

impl TestPlatform {
    pub fn windowed(width: u32, height: u32) -> Arc<Self> {
        Arc::new(Self {
            window: Mutex::new(Some(Arc::new(FakeWindow))),
            size: Mutex::new((width, height)),
            sleeps: AtomicU64::new(0),
        })
    }

    pub fn headless() -> Arc<Self> {
        Arc::new(Self {
            window: Mutex::new(None),
            size: Mutex::new((0, 0)),
            sleeps: AtomicU64::new(0),
        })
    }

    pub fn set_size(&self, width: u32, height: u32) {
        *lock(&self.size) = (width, height);
    }

    pub fn open_window(&self) {
        *lock(&self.window) = Some(Arc::new(FakeWindow));
    }

    pub fn close_window(&self) {
        *lock(&self.window) = None;
    }

    pub fn sleeps(&self) -> u64 {
        self.sleeps.load(Ordering::SeqCst)
    }
}

impl Platform for TestPlatform {
    fn current_native_window_handle(&self) -> Option<NativeWindowHandle> {
        lock(&self.window).clone()
    }

    fn actual_window_size(&self) -> (u32, u32) {
        *lock(&self.size)
    }

    fn sleep(&self, _ms: u64) {
        self.sleeps.fetch_add(1, Ordering::SeqCst);
    }

    fn fatal_fail(&self, reason: &str) -> ! {
        panic!("fatal graphics error: {reason}");
    }
}

/// A null-backend configuration with `frames` frames in flight.
pub fn null_config(frames: u32) -> GraphicsConfig {
    let mut config = GraphicsConfig {
        backend: BackendKind::Null,
        validation: false,
        ..GraphicsConfig::default()
    };
    config.swapchain.frames_in_flight = frames;
    config
}

/// Brings up a device on a fresh null backend.
pub fn device_with(
    options: NullBackendOptions,
    config: GraphicsConfig,
    platform: Arc<TestPlatform>,
) -> (Device, NullProbe) {
    let backend = NullBackend::new(options);
    let probe = backend.probe();
    let device = Device::new(Box::new(backend), platform, config).expect("device bring-up");
    (device, probe)
}

/// A headless device whose submissions complete immediately.
pub fn headless_device() -> (Device, NullProbe) {
    device_with(
        NullBackendOptions::default(),
        null_config(3),
        TestPlatform::headless(),
    )
}

/// A windowed device with a swapchain, `frames` frames in flight and the
/// given completion model.
pub fn windowed_device(frames: u32, completion: NullCompletion) -> (Device, NullProbe, Arc<TestPlatform>) {
    let platform = TestPlatform::windowed(800, 600);
    let options = NullBackendOptions {
        completion,
        ..NullBackendOptions::default()
    };
    let (device, probe) = device_with(options, null_config(frames), platform.clone());
    device.create_swapchain().expect("swapchain");
    (device, probe, platform)
}

/// Compiles the trivial vertex and fragment modules.
pub fn triangle_shaders(device: &Device) -> (ShaderHandle, ShaderHandle) {
    let vs = device
        .create_shader_module(
            &ShaderModuleDescriptor::wgsl(ShaderStage::Vertex, TRIANGLE_VS).with_label("triangle.vs"),
        )
        .expect("vertex module");
    let fs = device
        .create_shader_module(
            &ShaderModuleDescriptor::wgsl(ShaderStage::Fragment, TRIANGLE_FS)
                .with_label("triangle.fs"),
        )
        .expect("fragment module");
    (vs, fs)
}

/// A pipeline descriptor over the trivial shaders with the given layout.
pub fn pipeline_desc(
    vs: ShaderHandle,
    fs: ShaderHandle,
    layout: PipelineLayoutDescriptor,
) -> RasterizePipelineDescriptor {
    RasterizePipelineDescriptor {
        label: Some("test pipeline".to_owned()),
        vertex_shader: vs,
        fragment_shader: fs,
        layout,
        ..RasterizePipelineDescriptor::default()
    }
}

/// A pipeline with set 0 as given and a 64-byte push-constant range.
pub fn pipeline_with_set0(device: &Device, set0: BindingSetLayoutDescriptor) -> PsoHandle {
    let (vs, fs) = triangle_shaders(device);
    let layout = PipelineLayoutDescriptor::default()
        .with_set(0, set0)
        .with_push_constants(64);
    device
        .create_rasterize_pipeline(&pipeline_desc(vs, fs, layout))
        .expect("pipeline")
}
