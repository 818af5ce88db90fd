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

//! A `winit`-based implementation of the `Platform` trait.

use mercury_core::platform::{NativeWindowHandle, Platform};
use mercury_core::utils::sync::lock;
use std::sync::{Arc, Mutex};
use winit::{dpi::LogicalSize, error::OsError, event_loop::ActiveEventLoop, window::Window};

/// A builder for the window a device presents to.
#[derive(Debug, Clone)]
pub struct WinitWindowBuilder {
    title: String,
    width: u32,
    height: u32,
}

impl WinitWindowBuilder {
    /// Creates a new `WinitWindowBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            title: "Mercury".to_string(),
            width: 1024,
            height: 768,
        }
    }

    /// Sets the title of the window to be built.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Sets the initial inner dimensions of the window to be built.
    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Builds the window using the provided `winit` event loop.
    ///
    /// # Errors
    /// Returns an `OsError` if the underlying `winit` window creation fails.
    pub fn build(self, event_loop: &ActiveEventLoop) -> Result<Arc<Window>, OsError> {
        log::info!(
            "Building window with title: '{}' and size: {}x{}",
            self.title,
            self.width,
            self.height
        );

        let window_attributes = Window::default_attributes()
            .with_title(self.title)
            .with_inner_size(LogicalSize::new(self.width, self.height))
            .with_visible(true);

        let window = event_loop.create_window(window_attributes)?;

        log::info!("Winit window created successfully (id: {:?}).", window.id());
        Ok(Arc::new(window))
    }
}

impl Default for WinitWindowBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Platform services backed by a `winit` window.
///
/// The window is attached once the event loop has created it and detached
/// when it closes; in between the device presents to it.
#[derive(Debug, Default)]
pub struct WinitPlatform {
    window: Mutex<Option<Arc<Window>>>,
}

impl WinitPlatform {
    /// Creates a platform with no window attached.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a platform presenting to `window`.
    pub fn with_window(window: Arc<Window>) -> Self {
        Self {
            window: Mutex::new(Some(window)),
        }
    }

    /// Attaches the window to present to.
    pub fn set_window(&self, window: Arc<Window>) {
        *lock(&self.window) = Some(window);
    }

    /// Detaches the window, e.g. once it was closed.
    pub fn clear_window(&self) {
        *lock(&self.window) = None;
    }

    /// The attached window.
    pub fn window(&self) -> Option<Arc<Window>> {
        lock(&self.window).clone()
    }
}

impl Platform for WinitPlatform {
    fn current_native_window_handle(&self) -> Option<NativeWindowHandle> {
        self.window().map(|window| window as NativeWindowHandle)
    }

    fn actual_window_size(&self) -> (u32, u32) {
        self.window()
            .map(|window| {
                let size = window.inner_size();
                (size.width, size.height)
            })
            .unwrap_or((0, 0))
    }

    fn fatal_fail(&self, reason: &str) -> ! {
        log::error!("WinitPlatform: fatal graphics error: {reason}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detached_platform_reports_no_window() {
        let platform = WinitPlatform::new();
        assert!(platform.current_native_window_handle().is_none());
        assert_eq!(platform.actual_window_size(), (0, 0));
    }

    #[test]
    fn builder_settings_are_kept() {
        let builder = WinitWindowBuilder::new()
            .with_title("Triangle")
            .with_dimensions(640, 480);
        assert_eq!(builder.title, "Triangle");
        assert_eq!((builder.width, builder.height), (640, 480));
    }
}
