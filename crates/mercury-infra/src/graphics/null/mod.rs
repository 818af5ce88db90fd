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

//! A headless, instrumented backend.
//!
//! It satisfies the whole [`GraphicsBackend`](mercury_core::rhi::GraphicsBackend)
//! contract without a GPU, which makes it the backend of choice for tests and
//! offscreen tools.

mod backend;
mod probe;
mod state;

pub use self::backend::{NullBackend, NullBackendOptions, NullCompletion};
pub use self::probe::NullProbe;
pub use self::state::NullSubmission;
