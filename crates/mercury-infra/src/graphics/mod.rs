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

//! Concrete graphics backends.

pub mod null;
pub mod wgpu;

use mercury_core::rhi::{BackendKind, GraphicsBackend};

/// Instantiates the backend named by `kind` with its default settings.
pub fn create_backend(kind: BackendKind) -> Box<dyn GraphicsBackend> {
    match kind {
        BackendKind::Null => Box::new(self::null::NullBackend::default()),
        BackendKind::Wgpu => Box::new(self::wgpu::WgpuBackend::new()),
    }
}
