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

//! Integration tests for device bring-up: configuration, adapter selection
//! and failure handling.

mod common;

use common::{device_with, null_config, TestPlatform};
use mercury_core::rhi::{
    AdapterInfo, AdapterPreference, AdapterType, BackendKind, Device, GraphicsConfig,
    GraphicsState, RenderError,
};
use mercury_infra::{NullBackend, NullBackendOptions};

fn two_adapters(discrete_first: bool) -> Vec<AdapterInfo> {
    let discrete = AdapterInfo::new("Discrete GPU", AdapterType::Discrete, 0x10DE);
    let integrated = AdapterInfo::new("Integrated GPU", AdapterType::Integrated, 0x8086);
    if discrete_first {
        vec![discrete, integrated]
    } else {
        vec![integrated, discrete]
    }
}

fn options_with(adapters: Vec<AdapterInfo>) -> NullBackendOptions {
    NullBackendOptions {
        adapters,
        ..NullBackendOptions::default()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Adapter selection
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_high_performance_picks_the_discrete_adapter_in_any_order() {
    for (discrete_first, expected) in [(true, 0), (false, 1)] {
        let mut config = null_config(3);
        config.adapter.preference = AdapterPreference::HighPerformance;
        let (device, probe) = device_with(
            options_with(two_adapters(discrete_first)),
            config,
            TestPlatform::headless(),
        );

        assert_eq!(device.adapter_index(), expected);
        assert_eq!(device.adapter_info().adapter_type, AdapterType::Discrete);
        assert_eq!(device.adapter_info().name, "Discrete GPU");
        assert_eq!(probe.device_adapter(), Some(expected));
    }
}

#[test]
fn test_low_power_picks_the_integrated_adapter() {
    let mut config = null_config(3);
    config.adapter.preference = AdapterPreference::LowPower;
    let (device, _probe) = device_with(
        options_with(two_adapters(true)),
        config,
        TestPlatform::headless(),
    );
    assert_eq!(device.adapter_index(), 1);
    assert_eq!(device.adapter_info().adapter_type, AdapterType::Integrated);
}

#[test]
fn test_explicit_adapter_index_wins_over_preference() {
    let mut config = null_config(3);
    config.adapter.preference = AdapterPreference::HighPerformance;
    config.adapter.index = Some(1);
    let (device, probe) = device_with(
        options_with(two_adapters(true)),
        config,
        TestPlatform::headless(),
    );
    assert_eq!(device.adapter_index(), 1);
    assert_eq!(probe.device_adapter(), Some(1));
}

#[test]
fn test_out_of_range_adapter_index_is_ignored() {
    let mut config = null_config(3);
    config.adapter.preference = AdapterPreference::HighPerformance;
    config.adapter.index = Some(7);
    let (device, _probe) = device_with(
        options_with(two_adapters(false)),
        config,
        TestPlatform::headless(),
    );
    assert_eq!(device.adapter_index(), 1);
}

#[test]
fn test_missing_adapters_fall_back_to_index_zero() {
    let (device, probe) = device_with(
        options_with(Vec::new()),
        null_config(3),
        TestPlatform::headless(),
    );
    assert_eq!(device.adapter_index(), 0);
    assert_eq!(device.adapter_info().name, "<no adapter>");
    assert_eq!(probe.device_adapter(), Some(0));
}

// ─────────────────────────────────────────────────────────────────────────────
// Bring-up
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_bring_up_reaches_device_ready() {
    let (device, _probe) = device_with(
        NullBackendOptions::default(),
        null_config(3),
        TestPlatform::headless(),
    );
    assert_eq!(device.state(), GraphicsState::DeviceReady);
    assert_eq!(device.backend_name(), "NULL");
    assert_eq!(device.backend_kind(), BackendKind::Null);
    assert_eq!(device.frames_in_flight(), 3);
    assert_eq!(device.adapter_info().adapter_type, AdapterType::Cpu);
}

#[test]
fn test_instance_failure_is_reported() {
    let backend = NullBackend::new(NullBackendOptions {
        fail_instance: true,
        ..NullBackendOptions::default()
    });
    let probe = backend.probe();
    let result = Device::new(Box::new(backend), TestPlatform::headless(), null_config(3));
    assert!(matches!(result, Err(RenderError::InitializationFailed(_))));
    assert_eq!(probe.device_adapter(), None);
}

#[test]
#[should_panic(expected = "device creation failed")]
fn test_device_creation_failure_is_fatal() {
    let options = NullBackendOptions {
        fail_device: true,
        ..NullBackendOptions::default()
    };
    let _ = device_with(options, null_config(3), TestPlatform::headless());
}

#[test]
fn test_invalid_msaa_is_rejected_before_bring_up() {
    let backend = NullBackend::new(NullBackendOptions::default());
    let probe = backend.probe();
    let mut config = null_config(3);
    config.swapchain.msaa_samples = 3;
    let result = Device::new(Box::new(backend), TestPlatform::headless(), config);
    assert!(matches!(result, Err(RenderError::InvalidConfig(_))));
    assert_eq!(probe.device_adapter(), None);
}

#[test]
fn test_single_frame_in_flight_is_raised_to_two() {
    let (device, _probe) = device_with(
        NullBackendOptions::default(),
        null_config(1),
        TestPlatform::headless(),
    );
    assert_eq!(device.frames_in_flight(), 2);
    assert_eq!(device.config().swapchain.frames_in_flight, 2);
}

#[test]
fn test_create_device_follows_the_configured_backend() {
    let json = r#"{
        "backend": "null",
        "adapter": { "preference": "high_performance" },
        "validation": false,
        "swapchain": { "frames_in_flight": 2, "clear_color": [0.5, 0.5, 0.5, 1.0] },
        "transfer_ring_size": 8
    }"#;
    let config = GraphicsConfig::from_json_str(json).unwrap();
    let device = mercury_infra::create_device(TestPlatform::headless(), config).unwrap();

    assert_eq!(device.backend_kind(), BackendKind::Null);
    assert_eq!(device.frames_in_flight(), 2);
    assert_eq!(device.config().transfer_ring_size, 8);
    assert_eq!(device.clear_values().color, [0.5, 0.5, 0.5, 1.0]);
    assert_eq!(device.config().descriptor_pool_capacity, 10_000);
}

#[test]
fn test_dropping_the_device_shuts_the_backend_down() {
    let backend = NullBackend::new(NullBackendOptions::default());
    let probe = backend.probe();
    let device = Device::new(Box::new(backend), TestPlatform::headless(), null_config(2)).unwrap();
    assert_eq!(probe.device_adapter(), Some(0));
    drop(device);
    assert_eq!(probe.device_adapter(), None);
}
