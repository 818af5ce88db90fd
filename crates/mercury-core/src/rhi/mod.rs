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

//! The render hardware interface.
//!
//! Application code talks to a [`Device`] and records into [`CommandList`]s;
//! a [`GraphicsBackend`] translates validated calls into a native API.

pub mod api;
pub mod command_list;
pub mod command_pool;
pub mod config;
pub mod device;
pub mod error;
pub mod frame;
pub mod handle;
pub mod lifecycle;
pub mod registry;
pub mod retirement;
pub mod semaphore;
pub mod traits;
pub mod transfer;

pub use self::api::*;
pub use self::command_list::CommandList;
pub use self::config::{BackendKind, ConfigError, GraphicsConfig, PresentMode, SwapchainConfig};
pub use self::device::Device;
pub use self::error::*;
pub use self::handle::*;
pub use self::lifecycle::GraphicsState;
pub use self::registry::ResourceRegistry;
pub use self::semaphore::TimelineSemaphore;
pub use self::traits::*;
pub use self::transfer::CompletionCallback;
