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

//! Services the RHI consumes from the host application.

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::sync::Arc;

/// A trait that abstracts over any type that can provide raw window and display handles.
///
/// This is used to pass window information to the graphics backend for surface creation
/// without coupling the RHI to a specific windowing library.
pub trait WindowHandle: HasWindowHandle + HasDisplayHandle {}
impl<T: HasWindowHandle + HasDisplayHandle> WindowHandle for T {}

/// A thread-safe, reference-counted handle to a native window.
pub type NativeWindowHandle = Arc<dyn WindowHandle + Send + Sync>;

/// Host services used by the device: windowing, sleeping and fatal error reporting.
pub trait Platform: Send + Sync {
    /// The window to present to, or `None` when there is none (headless, or
    /// the window was closed).
    fn current_native_window_handle(&self) -> Option<NativeWindowHandle>;

    /// Current drawable size of the window in physical pixels.
    fn actual_window_size(&self) -> (u32, u32);

    /// Blocks the calling thread for `ms` milliseconds.
    fn sleep(&self, ms: u64) {
        std::thread::sleep(std::time::Duration::from_millis(ms));
    }

    /// Whether queue family `queue_index` can present to the current window.
    fn is_queue_support_present(&self, queue_index: u32) -> bool {
        let _ = queue_index;
        true
    }

    /// Reports an unrecoverable native error and terminates.
    fn fatal_fail(&self, reason: &str) -> !;
}

/// A platform with no window, for offscreen tools and tests.
///
/// `fatal_fail` panics so that callers (and tests) can observe it.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadlessPlatform;

impl Platform for HeadlessPlatform {
    fn current_native_window_handle(&self) -> Option<NativeWindowHandle> {
        None
    }

    fn actual_window_size(&self) -> (u32, u32) {
        (0, 0)
    }

    fn fatal_fail(&self, reason: &str) -> ! {
        log::error!("HeadlessPlatform: fatal graphics error: {reason}");
        panic!("fatal graphics error: {reason}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headless_has_no_window() {
        let platform = HeadlessPlatform;
        assert!(platform.current_native_window_handle().is_none());
        assert_eq!(platform.actual_window_size(), (0, 0));
        assert!(platform.is_queue_support_present(0));
    }

    #[test]
    #[should_panic(expected = "fatal graphics error: device lost")]
    fn headless_fatal_fail_panics() {
        HeadlessPlatform.fatal_fail("device lost");
    }
}
