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

//! Integration tests for buffer, texture and shader resources driven through
//! the device frontend on the null backend.

mod common;

use common::headless_device;
use mercury_core::rhi::{
    BufferDescriptor, BufferHandle, BufferUsage, PsoHandle, ResourceError, ShaderError,
    ShaderModuleDescriptor, ShaderStage, TextureDescriptor, TextureFormat, TextureHandle,
    TextureLayout, TextureUsage,
};

fn texture_desc(usage: TextureUsage, format: TextureFormat) -> TextureDescriptor<'static> {
    TextureDescriptor {
        label: Some("test texture".into()),
        width: 4,
        height: 4,
        mip_levels: 1,
        format,
        usage,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handle validity
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_handles_are_valid_until_destroyed() {
    let (device, _probe) = headless_device();
    let buffers: Vec<BufferHandle> = (0..4)
        .map(|i| {
            device
                .create_buffer(&BufferDescriptor::new(64 * (i + 1), BufferUsage::VERTEX))
                .unwrap()
        })
        .collect();
    let texture = device
        .create_texture(&texture_desc(TextureUsage::SAMPLED, TextureFormat::Rgba8Unorm))
        .unwrap();

    for buffer in &buffers {
        assert!(device.is_valid(*buffer));
    }
    assert!(device.is_valid(texture));

    device.destroy_buffer(buffers[1]).unwrap();
    assert!(!device.is_valid(buffers[1]));
    assert!(device.is_valid(buffers[0]));
    assert!(device.is_valid(buffers[2]));

    device.destroy_texture(texture).unwrap();
    assert!(!device.is_valid(texture));
}

#[test]
fn test_never_issued_handles_are_invalid() {
    let (device, _probe) = headless_device();
    assert!(!device.is_valid(BufferHandle::INVALID));
    assert!(!device.is_valid(TextureHandle::INVALID));
    assert!(!device.is_valid(PsoHandle::INVALID));
    assert!(!device.is_valid(BufferHandle::from_raw_parts(42, 0)));
}

#[test]
fn test_stale_handle_stays_invalid_after_slot_reuse() {
    let (device, _probe) = headless_device();
    let first = device
        .create_buffer(&BufferDescriptor::new(16, BufferUsage::UNIFORM))
        .unwrap();
    device.destroy_buffer(first).unwrap();
    let second = device
        .create_buffer(&BufferDescriptor::new(16, BufferUsage::UNIFORM))
        .unwrap();

    assert_eq!(first.index(), second.index(), "the freed slot should be reused");
    assert!(!device.is_valid(first));
    assert!(device.is_valid(second));
    assert_eq!(device.destroy_buffer(first), Err(ResourceError::InvalidHandle));
    assert_eq!(
        device.update_buffer(first, 0, &[0; 4]),
        Err(ResourceError::InvalidHandle)
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Buffers
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_buffer_writes_respect_capacity() {
    let (device, probe) = headless_device();
    let buffer = device
        .create_buffer(&BufferDescriptor::new(256, BufferUsage::UNIFORM | BufferUsage::COPY_DST))
        .unwrap();

    device.update_buffer(buffer, 0, &[1; 64]).unwrap();
    device.update_buffer(buffer, 192, &[2; 64]).unwrap();
    assert_eq!(
        device.update_buffer(buffer, 224, &[3; 64]),
        Err(ResourceError::OutOfBounds {
            offset: 224,
            size: 64,
            capacity: 256
        })
    );

    let contents = probe.buffer_contents(buffer).unwrap();
    assert_eq!(contents.len(), 256);
    assert!(contents[..64].iter().all(|&b| b == 1));
    assert!(contents[64..192].iter().all(|&b| b == 0));
    assert!(contents[192..].iter().all(|&b| b == 2));
}

#[test]
fn test_overflowing_write_leaves_neighbours_untouched() {
    let (device, probe) = headless_device();
    let left = device
        .create_buffer(&BufferDescriptor::new(32, BufferUsage::STORAGE).with_data(vec![7u8; 32]))
        .unwrap();
    let right = device
        .create_buffer(&BufferDescriptor::new(32, BufferUsage::STORAGE).with_data(vec![9u8; 32]))
        .unwrap();

    assert!(device.update_buffer(left, 16, &[0; 32]).is_err());
    assert!(device.update_buffer(left, u64::MAX, &[0; 2]).is_err());

    assert_eq!(probe.buffer_contents(left).unwrap(), vec![7u8; 32]);
    assert_eq!(probe.buffer_contents(right).unwrap(), vec![9u8; 32]);
}

#[test]
fn test_buffer_creation_validates_its_descriptor() {
    let (device, _probe) = headless_device();
    assert!(matches!(
        device.create_buffer(&BufferDescriptor::new(0, BufferUsage::VERTEX)),
        Err(ResourceError::InvalidDescriptor(_))
    ));
    assert!(matches!(
        device.create_buffer(&BufferDescriptor::new(4, BufferUsage::VERTEX).with_data(vec![0u8; 8])),
        Err(ResourceError::OutOfBounds { capacity: 4, .. })
    ));
}

#[test]
fn test_buffer_info_reports_size_and_usage() {
    let (device, probe) = headless_device();
    let buffer = device
        .create_buffer(
            &BufferDescriptor::new(100, BufferUsage::INDEX)
                .with_label("indices")
                .with_data(vec![5u8; 10]),
        )
        .unwrap();
    let info = device.buffer_info(buffer).unwrap();
    assert_eq!(info.size, 100);
    assert_eq!(info.usage, BufferUsage::INDEX);
    assert_eq!(info.allocation.aligned_size, 100);
    assert_eq!(probe.buffer_usage(buffer), Some(BufferUsage::INDEX));
    assert_eq!(&probe.buffer_contents(buffer).unwrap()[..10], &[5u8; 10]);
}

// ─────────────────────────────────────────────────────────────────────────────
// Textures
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_texture_upload_transitions_to_shader_read() {
    let (device, probe) = headless_device();
    let texture = device
        .create_texture(&texture_desc(
            TextureUsage::SAMPLED | TextureUsage::COPY_DST,
            TextureFormat::Rgba8Unorm,
        ))
        .unwrap();
    assert_eq!(device.texture_layout(texture), Some(TextureLayout::Undefined));

    let texels: Vec<u8> = (0..64).collect();
    device.update_texture(texture, &texels).unwrap();

    assert_eq!(device.texture_layout(texture), Some(TextureLayout::ShaderReadOnly));
    assert_eq!(
        probe.texture_transitions(texture),
        vec![
            (TextureLayout::Undefined, TextureLayout::TransferDestination),
            (TextureLayout::TransferDestination, TextureLayout::ShaderReadOnly),
        ]
    );
    assert_eq!(probe.texture_level(texture, 0), Some(texels));
}

#[test]
fn test_storage_texture_upload_ends_in_general_layout() {
    let (device, _probe) = headless_device();
    let texture = device
        .create_texture(&texture_desc(
            TextureUsage::STORAGE | TextureUsage::COPY_DST,
            TextureFormat::R32Float,
        ))
        .unwrap();
    device.update_texture(texture, &[0; 64]).unwrap();
    assert_eq!(device.texture_layout(texture), Some(TextureLayout::General));
}

#[test]
fn test_texture_upload_must_cover_level_zero_exactly() {
    let (device, probe) = headless_device();
    let texture = device
        .create_texture(&texture_desc(TextureUsage::SAMPLED, TextureFormat::Rgba8Unorm))
        .unwrap();

    assert!(matches!(
        device.update_texture(texture, &[0; 63]),
        Err(ResourceError::InvalidDescriptor(_))
    ));
    assert!(matches!(
        device.update_texture(texture, &[0; 65]),
        Err(ResourceError::OutOfBounds { capacity: 64, .. })
    ));
    assert_eq!(device.texture_layout(texture), Some(TextureLayout::Undefined));
    assert!(probe.texture_transitions(texture).is_empty());
}

#[test]
fn test_texture_with_zero_extent_is_rejected() {
    let (device, _probe) = headless_device();
    let mut desc = texture_desc(TextureUsage::SAMPLED, TextureFormat::Rgba8Unorm);
    desc.width = 0;
    assert!(matches!(
        device.create_texture(&desc),
        Err(ResourceError::InvalidDescriptor(_))
    ));
}

// ─────────────────────────────────────────────────────────────────────────────
// Shaders
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_shader_update_recompiles_and_retires_the_old_module() {
    let (device, probe) = headless_device();
    let module = device
        .create_shader_module(&ShaderModuleDescriptor::wgsl(ShaderStage::Vertex, "// v1"))
        .unwrap();
    assert_eq!(probe.shader_versions(module), Some((ShaderStage::Vertex, 1)));

    device
        .update_shader_module(
            module,
            &ShaderModuleDescriptor::wgsl(ShaderStage::Vertex, "// v2").with_entry_point("vs_main"),
        )
        .unwrap();
    assert_eq!(probe.shader_versions(module), Some((ShaderStage::Vertex, 2)));
    assert_eq!(device.pending_retirements(), 1);

    device.tick();
    assert_eq!(device.pending_retirements(), 0);
    assert_eq!(probe.released_objects(), 1);
}

#[test]
fn test_empty_shader_source_is_rejected() {
    let (device, probe) = headless_device();
    let result = device.create_shader_module(
        &ShaderModuleDescriptor::wgsl(ShaderStage::Fragment, "").with_label("empty.fs"),
    );
    assert_eq!(
        result,
        Err(ResourceError::Shader(ShaderError::EmptySource {
            label: "empty.fs".to_owned()
        }))
    );
    assert_eq!(probe.live_objects(), 0);
}

#[test]
fn test_update_of_destroyed_shader_fails() {
    let (device, _probe) = headless_device();
    let module = device
        .create_shader_module(&ShaderModuleDescriptor::wgsl(ShaderStage::Vertex, "// v1"))
        .unwrap();
    device.destroy_shader_module(module).unwrap();
    assert_eq!(
        device.update_shader_module(
            module,
            &ShaderModuleDescriptor::wgsl(ShaderStage::Vertex, "// v2")
        ),
        Err(ResourceError::InvalidHandle)
    );
}

#[test]
fn test_shutdown_releases_live_resources() {
    let (device, probe) = headless_device();
    device
        .create_buffer(&BufferDescriptor::new(16, BufferUsage::VERTEX))
        .unwrap();
    device
        .create_texture(&texture_desc(TextureUsage::SAMPLED, TextureFormat::R8Unorm))
        .unwrap();
    assert_eq!(probe.live_objects(), 2);

    device.shutdown();
    assert_eq!(probe.live_objects(), 0);
    assert!(!device.state().has_device());
}
