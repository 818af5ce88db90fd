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

//! # Mercury Infra
//!
//! Concrete implementations of the contracts defined in `mercury-core`: the
//! null and wgpu graphics backends and a winit-based platform.

#![warn(missing_docs)]

pub mod graphics;
pub mod platform;

pub use graphics::create_backend;
pub use graphics::null::{NullBackend, NullBackendOptions, NullCompletion, NullProbe};
pub use graphics::wgpu::WgpuBackend;
pub use platform::winit::{WinitPlatform, WinitWindowBuilder};

use mercury_core::platform::Platform;
use mercury_core::rhi::{Device, GraphicsConfig, RenderError};
use std::sync::Arc;

/// Creates the backend selected by `config.backend` and brings a device up on it.
pub fn create_device(
    platform: Arc<dyn Platform>,
    config: GraphicsConfig,
) -> Result<Device, RenderError> {
    let backend = create_backend(config.backend);
    Device::new(backend, platform, config)
}
