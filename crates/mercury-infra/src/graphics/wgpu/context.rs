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

//! Instance, adapter and device bootstrap.

use super::conversions::adapter_info;
use anyhow::{Context, Result};
use mercury_core::rhi::{AdapterInfo, GraphicsConfig};
use std::sync::Arc;

/// The WGPU instance and the adapters it exposes.
#[derive(Debug)]
pub struct WgpuInstanceContext {
    pub instance: wgpu::Instance,
    pub adapters: Vec<wgpu::Adapter>,
}

impl WgpuInstanceContext {
    /// Creates the instance and discovers its adapters.
    pub fn new(config: &GraphicsConfig) -> Result<Self> {
        let flags = if config.validation {
            wgpu::InstanceFlags::debugging()
        } else {
            wgpu::InstanceFlags::empty()
        };
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            flags,
            ..Default::default()
        });
        log::info!("WgpuBackend: instance created (validation: {}).", config.validation);

        let adapters = pollster::block_on(discover_adapters(&instance));
        if adapters.is_empty() {
            log::warn!("WgpuBackend: no adapter is available.");
        }
        Ok(Self { instance, adapters })
    }

    /// Mercury descriptions of the discovered adapters, in discovery order.
    pub fn adapter_infos(&self) -> Vec<AdapterInfo> {
        self.adapters
            .iter()
            .map(|adapter| adapter_info(&adapter.get_info()))
            .collect()
    }
}

/// Requests one adapter per power preference, then the fallback adapter,
/// and keeps each distinct one.
async fn discover_adapters(instance: &wgpu::Instance) -> Vec<wgpu::Adapter> {
    let requests = [
        (wgpu::PowerPreference::HighPerformance, false),
        (wgpu::PowerPreference::LowPower, false),
        (wgpu::PowerPreference::None, true),
    ];

    let mut adapters: Vec<wgpu::Adapter> = Vec::new();
    for (power_preference, force_fallback_adapter) in requests {
        let request = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference,
                compatible_surface: None,
                force_fallback_adapter,
            })
            .await;
        let adapter = match request {
            Ok(adapter) => adapter,
            Err(e) => {
                log::debug!("WgpuBackend: no adapter for {power_preference:?}: {e}");
                continue;
            }
        };
        let info = adapter.get_info();
        let known = adapters.iter().any(|a| {
            let other = a.get_info();
            other.name == info.name && other.backend == info.backend && other.device == info.device
        });
        if !known {
            log::info!(
                "WgpuBackend: found adapter \"{}\" ({:?}, {:?}).",
                info.name,
                info.device_type,
                info.backend
            );
            adapters.push(adapter);
        }
    }
    adapters
}

/// The logical device and its queue.
#[derive(Debug)]
pub struct WgpuDeviceContext {
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub limits: wgpu::Limits,
}

impl WgpuDeviceContext {
    /// Creates the logical device on `adapter`.
    pub fn new(adapter: wgpu::Adapter) -> Result<Self> {
        let info = adapter.get_info();
        log::info!("WgpuBackend: creating device on \"{}\".", info.name);

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("Mercury Logical Device"),
            required_features: wgpu::Features::empty(),
            required_limits: adapter.limits(),
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
            memory_hints: wgpu::MemoryHints::default(),
            trace: wgpu::Trace::Off,
        }))
        .with_context(|| format!("failed to create a logical device on \"{}\"", info.name))?;

        // Errors outside of an explicit error scope are logged instead of panicking.
        device.on_uncaptured_error(Arc::new(|e| {
            log::error!("WgpuBackend: uncaptured WGPU error: {e}");
        }));

        let limits = device.limits();
        log::debug!("WgpuBackend: device limits: {limits:?}");
        Ok(Self {
            adapter,
            device,
            queue,
            limits,
        })
    }

    /// Processes finished work without blocking.
    pub fn poll(&self) {
        if let Err(e) = self.device.poll(wgpu::PollType::Poll) {
            log::warn!("WgpuBackend: failed to poll device: {e:?}");
        }
    }
}
