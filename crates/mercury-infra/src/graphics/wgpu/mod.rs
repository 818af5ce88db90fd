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

//! The WGPU backend.
//!
//! Vulkan-style concepts the RHI exposes are emulated where WGPU lacks them:
//! timelines ride on `on_submitted_work_done`, push constants on a dynamically
//! offset uniform buffer bound after the pipeline's own binding sets, and
//! layout transitions are implicit.

mod backend;
mod context;
mod conversions;
mod pipeline;
mod replay;
mod resources;
mod surface;
mod timeline;

pub use self::backend::WgpuBackend;
pub use self::conversions::{IntoWgpu, SAMPLER_BINDING_OFFSET};
pub use self::resources::PUSH_CONSTANT_STRIDE;
