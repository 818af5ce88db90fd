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

//! The presentable surface and the render targets that go with it.

use super::conversions::{from_wgpu_texture_format, IntoWgpu};
use mercury_core::platform::NativeWindowHandle;
use mercury_core::rhi::{PresentMode, RenderError, SwapchainConfig, SwapchainInfo, TextureFormat};

/// Views a frame submission renders into.
#[derive(Debug, Clone)]
pub struct FrameTargets {
    /// Multisampled target when MSAA is on, the surface image otherwise.
    pub color: wgpu::TextureView,
    /// Surface image the MSAA target resolves into.
    pub resolve: Option<wgpu::TextureView>,
    pub depth: Option<wgpu::TextureView>,
    pub depth_has_stencil: bool,
    pub width: u32,
    pub height: u32,
}

/// Formats and sample count pipelines must be built against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetFormats {
    pub color: wgpu::TextureFormat,
    pub depth: Option<wgpu::TextureFormat>,
    pub samples: u32,
}

impl TargetFormats {
    /// What the configuration asks for, before a surface exists.
    pub fn from_config(config: &SwapchainConfig) -> Self {
        Self {
            color: config.color_format.into_wgpu(),
            depth: config.depth_format.map(IntoWgpu::into_wgpu),
            samples: config.msaa_samples.max(1),
        }
    }
}

#[derive(Debug)]
pub struct WgpuSurface {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    formats: TargetFormats,
    image_count: u32,
    depth_view: Option<wgpu::TextureView>,
    msaa_view: Option<wgpu::TextureView>,
    current: Option<(wgpu::SurfaceTexture, wgpu::TextureView)>,
    next_image: u32,
}

impl WgpuSurface {
    /// Creates and configures a surface for `window`.
    pub fn new(
        instance: &wgpu::Instance,
        adapter: &wgpu::Adapter,
        device: &wgpu::Device,
        window: &NativeWindowHandle,
        width: u32,
        height: u32,
        swapchain: &SwapchainConfig,
    ) -> Result<Self, RenderError> {
        let surface = instance
            .create_surface(window.clone())
            .map_err(|e| RenderError::SurfaceUnavailable(format!("failed to create surface: {e}")))?;

        let caps = surface.get_capabilities(adapter);
        let requested: wgpu::TextureFormat = swapchain.color_format.into_wgpu();
        let color = if caps.formats.contains(&requested) {
            requested
        } else {
            let fallback = caps
                .formats
                .iter()
                .copied()
                .find(|f| f.is_srgb() && from_wgpu_texture_format(*f).is_some())
                .or_else(|| caps.formats.first().copied())
                .ok_or_else(|| {
                    RenderError::SurfaceUnavailable(
                        "the adapter cannot present to this window".to_owned(),
                    )
                })?;
            log::warn!(
                "WgpuBackend: surface does not support {requested:?}, using {fallback:?}."
            );
            fallback
        };

        let requested_mode = swapchain.present_mode.into_wgpu();
        let present_mode = if caps.present_modes.contains(&requested_mode) {
            requested_mode
        } else {
            log::warn!(
                "WgpuBackend: present mode {:?} unsupported, falling back to Fifo.",
                swapchain.present_mode
            );
            PresentMode::Fifo.into_wgpu()
        };

        let samples = supported_samples(adapter, color, swapchain.msaa_samples);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: color,
            width: width.max(1),
            height: height.max(1),
            present_mode,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: swapchain.frames_in_flight,
        };

        let mut surface = Self {
            surface,
            config,
            formats: TargetFormats {
                color,
                depth: swapchain.depth_format.map(IntoWgpu::into_wgpu),
                samples,
            },
            image_count: swapchain.frames_in_flight + 1,
            depth_view: None,
            msaa_view: None,
            current: None,
            next_image: 0,
        };
        surface.configure(device);
        log::info!(
            "WgpuBackend: surface configured at {}x{} ({:?}, {:?}, {} sample(s)).",
            surface.config.width,
            surface.config.height,
            color,
            present_mode,
            samples
        );
        Ok(surface)
    }

    fn configure(&mut self, device: &wgpu::Device) {
        self.current = None;
        self.surface.configure(device, &self.config);
        let size = wgpu::Extent3d {
            width: self.config.width,
            height: self.config.height,
            depth_or_array_layers: 1,
        };
        self.depth_view = self.formats.depth.map(|format| {
            attachment(device, "Mercury Depth Target", size, format, self.formats.samples)
        });
        self.msaa_view = (self.formats.samples > 1).then(|| {
            attachment(
                device,
                "Mercury MSAA Target",
                size,
                self.formats.color,
                self.formats.samples,
            )
        });
    }

    /// Reconfigures the surface and its targets at a new size.
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.config.width = width.max(1);
        self.config.height = height.max(1);
        log::info!(
            "WgpuBackend: resizing surface to {}x{}.",
            self.config.width,
            self.config.height
        );
        self.configure(device);
    }

    pub fn formats(&self) -> TargetFormats {
        self.formats
    }

    pub fn info(&self) -> SwapchainInfo {
        SwapchainInfo {
            width: self.config.width,
            height: self.config.height,
            image_count: self.image_count,
            color_format: from_wgpu_texture_format(self.formats.color)
                .unwrap_or(TextureFormat::Bgra8UnormSrgb),
            depth_format: self.formats.depth.and_then(from_wgpu_texture_format),
            samples: self.formats.samples,
        }
    }

    /// Acquires the next surface image.
    pub fn acquire(&mut self) -> Result<u32, RenderError> {
        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::OutOfMemory) => {
                return Err(RenderError::FatalNativeError(
                    "out of memory while acquiring a surface image".to_owned(),
                ))
            }
            Err(e) => return Err(RenderError::SurfaceUnavailable(e.to_string())),
        };
        if frame.suboptimal {
            log::debug!("WgpuBackend: acquired a suboptimal surface image.");
        }
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        self.current = Some((frame, view));
        let index = self.next_image;
        self.next_image = (self.next_image + 1) % self.image_count;
        Ok(index)
    }

    /// Render targets of the acquired image, if one is held.
    pub fn frame_targets(&self) -> Option<FrameTargets> {
        let (_, view) = self.current.as_ref()?;
        let (color, resolve) = match &self.msaa_view {
            Some(msaa) => (msaa.clone(), Some(view.clone())),
            None => (view.clone(), None),
        };
        Some(FrameTargets {
            color,
            resolve,
            depth: self.depth_view.clone(),
            depth_has_stencil: self
                .formats
                .depth
                .is_some_and(|format| format.has_stencil_aspect()),
            width: self.config.width,
            height: self.config.height,
        })
    }

    /// Presents the acquired image.
    pub fn present(&mut self) -> Result<(), RenderError> {
        let (frame, _) = self.current.take().ok_or_else(|| {
            RenderError::SubmissionFailed("present without an acquired image".to_owned())
        })?;
        frame.present();
        Ok(())
    }
}

fn supported_samples(adapter: &wgpu::Adapter, format: wgpu::TextureFormat, requested: u32) -> u32 {
    let requested = requested.max(1);
    if requested == 1 {
        return 1;
    }
    let features = adapter.get_texture_format_features(format);
    if features.flags.sample_count_supported(requested) {
        requested
    } else {
        log::warn!("WgpuBackend: {requested}x MSAA unsupported for {format:?}, disabling it.");
        1
    }
}

fn attachment(
    device: &wgpu::Device,
    label: &str,
    size: wgpu::Extent3d,
    format: wgpu::TextureFormat,
    samples: u32,
) -> wgpu::TextureView {
    device
        .create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: samples,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        })
        .create_view(&wgpu::TextureViewDescriptor::default())
}
