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

//! # Mercury Core
//!
//! Foundational crate of the Mercury render hardware interface (RHI).
//!
//! It owns the contracts every graphics backend implements, the generational
//! handle registry, and the backend-agnostic [`rhi::Device`] frontend that
//! validates calls, paces frames and defers destruction before anything reaches
//! a native API.

#![warn(missing_docs)]

pub mod platform;
pub mod rhi;
pub mod utils;

pub use platform::{NativeWindowHandle, Platform, WindowHandle};
pub use rhi::*;
