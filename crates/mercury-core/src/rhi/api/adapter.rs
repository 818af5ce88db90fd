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

//! Physical adapter description and the selection heuristic.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of physical device behind an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AdapterType {
    /// GPU integrated with the CPU (shared memory).
    Integrated,
    /// Dedicated GPU with its own memory.
    Discrete,
    /// Virtualized GPU.
    Virtual,
    /// Software rasterizer running on the CPU.
    Cpu,
    /// Anything else.
    #[default]
    Unknown,
}

/// The hardware vendor of an adapter, derived from its PCI vendor id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AdapterVendor {
    /// Advanced Micro Devices.
    Amd,
    /// NVIDIA.
    Nvidia,
    /// Intel.
    Intel,
    /// Arm (Mali).
    Arm,
    /// Apple silicon.
    Apple,
    /// Qualcomm (Adreno).
    Qualcomm,
    /// Imagination Technologies (PowerVR).
    Imagination,
    /// Unrecognized vendor id.
    #[default]
    Unknown,
}

impl AdapterVendor {
    /// Maps a PCI vendor id to a vendor.
    pub fn from_pci_id(vendor_id: u32) -> Self {
        match vendor_id {
            0x1002 | 0x1022 => AdapterVendor::Amd,
            0x10DE => AdapterVendor::Nvidia,
            0x8086 => AdapterVendor::Intel,
            0x13B5 => AdapterVendor::Arm,
            0x106B => AdapterVendor::Apple,
            0x5143 => AdapterVendor::Qualcomm,
            0x1010 => AdapterVendor::Imagination,
            _ => AdapterVendor::Unknown,
        }
    }
}

impl fmt::Display for AdapterVendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AdapterVendor::Amd => "AMD",
            AdapterVendor::Nvidia => "NVIDIA",
            AdapterVendor::Intel => "Intel",
            AdapterVendor::Arm => "ARM",
            AdapterVendor::Apple => "Apple",
            AdapterVendor::Qualcomm => "Qualcomm",
            AdapterVendor::Imagination => "Imagination",
            AdapterVendor::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

/// Optional pipeline features an adapter may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AdapterFeatures {
    /// Geometry shader stage support.
    pub geometry_shader: bool,
    /// Tessellation shader stage support.
    pub tessellation_shader: bool,
    /// Barycentric coordinates readable in fragment shaders.
    pub barycentrics: bool,
}

/// Backend-neutral description of one physical adapter.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AdapterInfo {
    /// Device name, e.g. "NVIDIA GeForce RTX 3080".
    pub name: String,
    /// Physical device type.
    pub adapter_type: AdapterType,
    /// Vendor derived from `vendor_id`.
    pub vendor: AdapterVendor,
    /// PCI vendor id.
    pub vendor_id: u32,
    /// PCI device id.
    pub device_id: u32,
    /// Driver name and version string.
    pub driver: String,
    /// Native API the adapter is exposed through (e.g. "Vulkan").
    pub backend: String,
    /// Optional features.
    pub features: AdapterFeatures,
}

impl AdapterInfo {
    /// Convenience constructor used by backends and tests.
    pub fn new(name: impl Into<String>, adapter_type: AdapterType, vendor_id: u32) -> Self {
        Self {
            name: name.into(),
            adapter_type,
            vendor: AdapterVendor::from_pci_id(vendor_id),
            vendor_id,
            ..Default::default()
        }
    }
}

impl fmt::Display for AdapterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({:?}, vendor {} 0x{:04X}, device 0x{:04X}, backend {}, driver {})",
            self.name,
            self.adapter_type,
            self.vendor,
            self.vendor_id,
            self.device_id,
            self.backend,
            self.driver
        )
    }
}

/// Which kind of adapter to favor when no explicit index is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterPreference {
    /// First enumerated adapter.
    #[default]
    Any,
    /// Highest scoring adapter.
    HighPerformance,
    /// Lowest scoring adapter.
    LowPower,
}

/// Inputs of [`select_adapter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterSelection {
    /// Forces a specific enumeration index when set.
    pub index: Option<usize>,
    /// Preference used when `index` is unset.
    pub preference: AdapterPreference,
}

/// Performance score of an adapter: discrete 1000, integrated 200, else 0.
pub fn adapter_score(info: &AdapterInfo) -> u32 {
    match info.adapter_type {
        AdapterType::Discrete => 1000,
        AdapterType::Integrated => 200,
        _ => 0,
    }
}

/// Picks the enumeration index of the adapter to use.
///
/// An in-range explicit index wins unconditionally. Otherwise `Any` takes the
/// first adapter, `HighPerformance` the best score and `LowPower` the worst,
/// ties going to the lowest index. With no adapters at all this logs an error
/// and returns 0.
pub fn select_adapter(adapters: &[AdapterInfo], selection: &AdapterSelection) -> usize {
    if adapters.is_empty() {
        log::error!("AdapterSelector: no adapters found, falling back to index 0");
        return 0;
    }

    if let Some(index) = selection.index {
        if index < adapters.len() {
            log::info!("AdapterSelector: using explicitly configured adapter {index}");
            return index;
        }
        log::warn!(
            "AdapterSelector: configured adapter index {index} is out of range ({} adapters), ignoring it",
            adapters.len()
        );
    }

    let scored = adapters.iter().enumerate().map(|(i, a)| (i, adapter_score(a)));
    let chosen = match selection.preference {
        AdapterPreference::Any => Some(0),
        // `max_by_key` keeps the last maximum, so compare on (score, reversed index).
        AdapterPreference::HighPerformance => scored
            .max_by_key(|&(i, score)| (score, std::cmp::Reverse(i)))
            .map(|(i, _)| i),
        AdapterPreference::LowPower => scored.min_by_key(|&(i, score)| (score, i)).map(|(i, _)| i),
    }
    .unwrap_or(0);

    log::info!(
        "AdapterSelector: selected adapter {chosen} '{}' for preference {:?}",
        adapters[chosen].name,
        selection.preference
    );
    chosen
}
