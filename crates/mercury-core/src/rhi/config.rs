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

//! Graphics configuration, loadable from JSON.

use crate::rhi::api::adapter::AdapterSelection;
use crate::rhi::api::format::TextureFormat;
use crate::rhi::api::parameter_block::DEFAULT_DESCRIPTOR_POOL_CAPACITY;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Which graphics backend implementation to instantiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Headless instrumented backend.
    Null,
    /// Native GPU backend through wgpu.
    #[default]
    Wgpu,
}

/// Presentation mode of the swapchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentMode {
    /// Present immediately, may tear.
    Immediate,
    /// Replace the queued image, no tearing.
    Mailbox,
    /// Vertical sync.
    #[default]
    Fifo,
}

/// Swapchain and frame pacing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwapchainConfig {
    /// Number of frames the CPU may record ahead of the GPU (at least 2).
    pub frames_in_flight: u32,
    /// Preferred format of the presentable images.
    pub color_format: TextureFormat,
    /// Depth target format, `None` for no depth target.
    pub depth_format: Option<TextureFormat>,
    /// MSAA sample count: 1, 2, 4 or 8.
    pub msaa_samples: u32,
    /// Presentation mode.
    pub present_mode: PresentMode,
    /// Initial clear color.
    pub clear_color: [f32; 4],
    /// Depth clear value.
    pub clear_depth: f32,
    /// Stencil clear value.
    pub clear_stencil: u32,
}

impl Default for SwapchainConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: 3,
            color_format: TextureFormat::Bgra8UnormSrgb,
            depth_format: Some(TextureFormat::Depth32Float),
            msaa_samples: 1,
            present_mode: PresentMode::Fifo,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            clear_depth: 1.0,
            clear_stencil: 0,
        }
    }
}

/// Complete graphics configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphicsConfig {
    /// Backend to instantiate.
    pub backend: BackendKind,
    /// Adapter selection.
    pub adapter: AdapterSelection,
    /// Enables native API validation layers.
    pub validation: bool,
    /// Swapchain settings.
    pub swapchain: SwapchainConfig,
    /// Descriptors of each resource type in the shared parameter block pool.
    pub descriptor_pool_capacity: u32,
    /// Number of contexts in the one-time transfer ring.
    pub transfer_ring_size: u32,
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            adapter: AdapterSelection::default(),
            validation: cfg!(debug_assertions),
            swapchain: SwapchainConfig::default(),
            descriptor_pool_capacity: DEFAULT_DESCRIPTOR_POOL_CAPACITY,
            transfer_ring_size: 64,
        }
    }
}

/// An error raised while loading a configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// The file could not be read.
    Io {
        /// Path that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// The JSON is malformed or does not match the schema.
    Parse(serde_json::Error),
    /// A value is out of its accepted range.
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "Failed to read graphics config '{}': {source}", path.display())
            }
            ConfigError::Parse(err) => write!(f, "Failed to parse graphics config: {err}"),
            ConfigError::Invalid(msg) => write!(f, "Invalid graphics config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse(err) => Some(err),
            ConfigError::Invalid(_) => None,
        }
    }
}

impl GraphicsConfig {
    /// Parses a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let mut config: GraphicsConfig = serde_json::from_str(json).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("GraphicsConfig: loaded '{}'", path.display());
        Self::from_json_str(&json)
    }

    /// Serializes the configuration to pretty JSON.
    pub fn to_json_string(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Normalizes recoverable values and rejects the rest.
    ///
    /// `frames_in_flight` below 2 is raised to 2. The MSAA count must be 1, 2,
    /// 4 or 8 and the pool and ring sizes must be non-zero.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.swapchain.frames_in_flight < 2 {
            log::warn!(
                "GraphicsConfig: frames_in_flight {} is below 2, using 2",
                self.swapchain.frames_in_flight
            );
            self.swapchain.frames_in_flight = 2;
        }
        if !matches!(self.swapchain.msaa_samples, 1 | 2 | 4 | 8) {
            return Err(ConfigError::Invalid(format!(
                "msaa_samples must be 1, 2, 4 or 8 (got {})",
                self.swapchain.msaa_samples
            )));
        }
        if self.swapchain.color_format.is_depth() {
            return Err(ConfigError::Invalid(format!(
                "color_format {:?} is a depth format",
                self.swapchain.color_format
            )));
        }
        if let Some(depth) = self.swapchain.depth_format {
            if !depth.is_depth() {
                return Err(ConfigError::Invalid(format!(
                    "depth_format {depth:?} is not a depth format"
                )));
            }
        }
        if self.descriptor_pool_capacity == 0 || self.transfer_ring_size == 0 {
            return Err(ConfigError::Invalid(
                "descriptor_pool_capacity and transfer_ring_size must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rhi::api::adapter::AdapterPreference;

    #[test]
    fn missing_fields_take_defaults() {
        let config = GraphicsConfig::from_json_str(
            r#"{ "backend": "null", "adapter": { "preference": "high_performance" } }"#,
        )
        .unwrap();
        assert_eq!(config.backend, BackendKind::Null);
        assert_eq!(config.adapter.preference, AdapterPreference::HighPerformance);
        assert_eq!(config.adapter.index, None);
        assert_eq!(config.swapchain.frames_in_flight, 3);
        assert_eq!(config.descriptor_pool_capacity, 10_000);
        assert_eq!(config.transfer_ring_size, 64);
    }

    #[test]
    fn frames_in_flight_is_clamped() {
        let config =
            GraphicsConfig::from_json_str(r#"{ "swapchain": { "frames_in_flight": 1 } }"#).unwrap();
        assert_eq!(config.swapchain.frames_in_flight, 2);
    }

    #[test]
    fn invalid_msaa_is_rejected() {
        let err = GraphicsConfig::from_json_str(r#"{ "swapchain": { "msaa_samples": 3 } }"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn unknown_backend_is_a_parse_error() {
        let err = GraphicsConfig::from_json_str(r#"{ "backend": "glide" }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn json_round_trip_preserves_values() {
        let mut config = GraphicsConfig::default();
        config.adapter.index = Some(1);
        config.swapchain.clear_color = [0.02, 0.03, 0.05, 1.0];
        let parsed = GraphicsConfig::from_json_str(&config.to_json_string()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = GraphicsConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(format!("{err}").contains("/definitely/not/here.json"));
    }
}
