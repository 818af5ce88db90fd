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

//! Integration tests for parameter block layouts, blocks and their binding
//! into recorded frames.

mod common;

use common::{
    device_with, headless_device, null_config, pipeline_desc, pipeline_with_set0,
    triangle_shaders, windowed_device, TestPlatform,
};
use mercury_core::rhi::{
    BindingSetLayoutDescriptor, BindingSlot, BufferDescriptor, BufferHandle, BufferUsage, Device,
    ParameterBlockResource, PipelineLayoutDescriptor, RecordedCommand, RecordingError,
    ResourceError, SamplerDescriptor, ShaderResourceType, SlotRejection, TextureDescriptor,
    TextureFormat, TextureHandle, TextureUsage,
};
use mercury_infra::{NullBackendOptions, NullCompletion};

fn uniform_set() -> BindingSetLayoutDescriptor {
    BindingSetLayoutDescriptor::new().with_slot(0, ShaderResourceType::UniformBuffer)
}

fn uniform_buffer(device: &Device, size: u64) -> BufferHandle {
    device
        .create_buffer(&BufferDescriptor::new(size, BufferUsage::UNIFORM | BufferUsage::COPY_DST))
        .unwrap()
}

fn texture(device: &Device, usage: TextureUsage, format: TextureFormat) -> TextureHandle {
    device
        .create_texture(&TextureDescriptor {
            label: None,
            width: 2,
            height: 2,
            mip_levels: 1,
            format,
            usage,
        })
        .unwrap()
}

fn whole(buffer: BufferHandle) -> ParameterBlockResource {
    ParameterBlockResource::Buffer {
        buffer,
        offset: 0,
        size: 0,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Layouts
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_layouts_are_cached_per_descriptor_and_set_index() {
    let (device, probe) = headless_device();
    let a = device.create_parameter_block_layout(&uniform_set(), 0).unwrap();
    let b = device.create_parameter_block_layout(&uniform_set(), 0).unwrap();
    let c = device.create_parameter_block_layout(&uniform_set(), 1).unwrap();

    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(probe.layout_count(), 2);
    assert_eq!(
        probe.layout(c),
        Some((
            1,
            vec![BindingSlot {
                slot: 0,
                kind: ShaderResourceType::UniformBuffer
            }]
        ))
    );
}

#[test]
fn test_invalid_layouts_are_rejected() {
    let (device, probe) = headless_device();
    assert!(matches!(
        device.create_parameter_block_layout(&BindingSetLayoutDescriptor::new(), 0),
        Err(ResourceError::InvalidDescriptor(_))
    ));
    assert!(matches!(
        device.create_parameter_block_layout(&uniform_set(), 4),
        Err(ResourceError::InvalidDescriptor(_))
    ));
    let duplicate = uniform_set().with_slot(0, ShaderResourceType::ReadOnlyBuffer);
    assert!(matches!(
        device.create_parameter_block_layout(&duplicate, 0),
        Err(ResourceError::InvalidDescriptor(_))
    ));
    assert_eq!(probe.layout_count(), 0);
}

#[test]
fn test_pipelines_share_cached_set_layouts() {
    let (device, probe) = headless_device();
    let first = pipeline_with_set0(&device, uniform_set());
    let second = pipeline_with_set0(&device, uniform_set());

    let layout = device.pipeline_set_layout(first, 0).unwrap();
    assert_eq!(device.pipeline_set_layout(second, 0), Some(layout));
    assert_eq!(
        device.create_parameter_block_layout(&uniform_set(), 0),
        Ok(layout)
    );
    assert_eq!(probe.pipeline_layout(first), Some((vec![layout], 64)));
    assert_eq!(probe.layout_count(), 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// Blocks
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_block_contents_round_trip_slot_for_slot() {
    let (device, probe) = headless_device();
    let set = BindingSetLayoutDescriptor::new()
        .with_slot(0, ShaderResourceType::UniformBuffer)
        .with_slot(1, ShaderResourceType::ReadOnlyBuffer)
        .with_slot(2, ShaderResourceType::SampledImage2D)
        .with_slot(3, ShaderResourceType::RWImage);
    let layout = device.create_parameter_block_layout(&set, 0).unwrap();
    let block = device.create_parameter_block(layout).unwrap();

    let uniforms = uniform_buffer(&device, 256);
    let storage = device
        .create_buffer(&BufferDescriptor::new(128, BufferUsage::STORAGE))
        .unwrap();
    let sampled = texture(&device, TextureUsage::SAMPLED, TextureFormat::Rgba8Unorm);
    let image = texture(&device, TextureUsage::STORAGE, TextureFormat::R32Float);

    let resources = vec![
        whole(uniforms),
        ParameterBlockResource::Buffer {
            buffer: storage,
            offset: 16,
            size: 32,
        },
        ParameterBlockResource::Texture {
            texture: sampled,
            sampler: SamplerDescriptor::NEAREST,
        },
        ParameterBlockResource::RwImage { texture: image },
    ];
    device.update_parameter_block(block, &resources).unwrap();

    assert_eq!(device.parameter_block_contents(block), Some(resources.clone()));
    assert_eq!(probe.block_resources(block), Some(resources));
    assert_eq!(probe.block_info(block), Some((layout, 1)));
}

#[test]
fn test_missing_trailing_resources_leave_slots_empty() {
    let (device, _probe) = headless_device();
    let set = uniform_set().with_slot(1, ShaderResourceType::UniformBuffer);
    let layout = device.create_parameter_block_layout(&set, 0).unwrap();
    let block = device.create_parameter_block(layout).unwrap();
    let buffer = uniform_buffer(&device, 64);

    device.update_parameter_block(block, &[whole(buffer)]).unwrap();
    assert_eq!(
        device.parameter_block_contents(block),
        Some(vec![whole(buffer), ParameterBlockResource::Empty])
    );

    // The whole table is rewritten on every update.
    device.update_parameter_block(block, &[]).unwrap();
    assert_eq!(
        device.parameter_block_contents(block),
        Some(vec![ParameterBlockResource::Empty; 2])
    );
}

#[test]
fn test_bad_slots_are_left_empty_and_reported() {
    let (device, _probe) = headless_device();
    let set = BindingSetLayoutDescriptor::new()
        .with_slot(0, ShaderResourceType::UniformBuffer)
        .with_slot(1, ShaderResourceType::UniformBuffer)
        .with_slot(2, ShaderResourceType::UniformBuffer)
        .with_slot(3, ShaderResourceType::RWBuffer)
        .with_slot(4, ShaderResourceType::UniformBuffer);
    let layout = device.create_parameter_block_layout(&set, 0).unwrap();
    let block = device.create_parameter_block(layout).unwrap();

    let good = uniform_buffer(&device, 256);
    let dead = uniform_buffer(&device, 256);
    device.destroy_buffer(dead).unwrap();
    let sampled = texture(&device, TextureUsage::SAMPLED, TextureFormat::Rgba8Unorm);

    let result = device.update_parameter_block(
        block,
        &[
            whole(good),
            ParameterBlockResource::Texture {
                texture: sampled,
                sampler: SamplerDescriptor::default(),
            },
            whole(dead),
            whole(good),
            ParameterBlockResource::Buffer {
                buffer: good,
                offset: 300,
                size: 16,
            },
        ],
    );

    let rejected = match result {
        Err(ResourceError::SlotsRejected(rejected)) => rejected,
        other => panic!("expected rejected slots, got {other:?}"),
    };
    let slots: Vec<u32> = rejected.iter().map(|r| r.slot).collect();
    assert_eq!(slots, vec![1, 2, 3, 4]);
    assert!(matches!(rejected[0].reason, ResourceError::InvalidDescriptor(_)));
    assert_eq!(rejected[1].reason, ResourceError::InvalidHandle);
    assert!(matches!(rejected[2].reason, ResourceError::InvalidDescriptor(_)));
    assert!(matches!(rejected[3].reason, ResourceError::OutOfBounds { .. }));

    let mut expected = vec![ParameterBlockResource::Empty; 5];
    expected[0] = whole(good);
    assert_eq!(device.parameter_block_contents(block), Some(expected));
}

#[test]
fn test_backend_unimplemented_kinds_are_rejected_per_slot() {
    let options = NullBackendOptions {
        unimplemented_kinds: vec![ShaderResourceType::RWImage],
        ..NullBackendOptions::default()
    };
    let (device, probe) = device_with(options, null_config(3), TestPlatform::headless());
    let set = uniform_set().with_slot(1, ShaderResourceType::RWImage);
    let layout = device.create_parameter_block_layout(&set, 0).unwrap();
    let block = device.create_parameter_block(layout).unwrap();
    let buffer = uniform_buffer(&device, 64);
    let image = texture(&device, TextureUsage::STORAGE, TextureFormat::R32Float);

    let result = device.update_parameter_block(
        block,
        &[whole(buffer), ParameterBlockResource::RwImage { texture: image }],
    );
    assert_eq!(
        result,
        Err(ResourceError::SlotsRejected(vec![SlotRejection {
            slot: 1,
            reason: ResourceError::UnimplementedResourceKind(ShaderResourceType::RWImage),
        }]))
    );
    let expected = vec![whole(buffer), ParameterBlockResource::Empty];
    assert_eq!(device.parameter_block_contents(block), Some(expected.clone()));
    assert_eq!(probe.block_resources(block), Some(expected));
}

#[test]
fn test_more_resources_than_slots_is_an_error() {
    let (device, _probe) = headless_device();
    let layout = device.create_parameter_block_layout(&uniform_set(), 0).unwrap();
    let block = device.create_parameter_block(layout).unwrap();
    let buffer = uniform_buffer(&device, 64);
    assert!(matches!(
        device.update_parameter_block(block, &[whole(buffer), whole(buffer)]),
        Err(ResourceError::InvalidDescriptor(_))
    ));
}

#[test]
fn test_descriptor_pool_exhaustion_and_recovery() {
    let mut config = null_config(3);
    config.descriptor_pool_capacity = 2;
    let (device, _probe) = device_with(
        NullBackendOptions::default(),
        config,
        TestPlatform::headless(),
    );
    let layout = device.create_parameter_block_layout(&uniform_set(), 0).unwrap();

    let first = device.create_parameter_block(layout).unwrap();
    let _second = device.create_parameter_block(layout).unwrap();
    assert_eq!(device.descriptor_pool_usage(ShaderResourceType::UniformBuffer), 2);
    assert_eq!(
        device.create_parameter_block(layout),
        Err(ResourceError::PoolExhausted {
            kind: ShaderResourceType::UniformBuffer,
            capacity: 2
        })
    );

    device.destroy_parameter_block(first).unwrap();
    assert_eq!(device.descriptor_pool_usage(ShaderResourceType::UniformBuffer), 1);
    assert!(device.create_parameter_block(layout).is_ok());
}

#[test]
fn test_block_needs_a_live_layout() {
    let (device, _probe) = headless_device();
    let layout = device.create_parameter_block_layout(&uniform_set(), 0).unwrap();
    device.destroy_parameter_block_layout(layout).unwrap();
    assert_eq!(
        device.create_parameter_block(layout),
        Err(ResourceError::InvalidHandle)
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Binding into a frame
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_uniform_block_is_recorded_at_the_pipeline_set_offset() {
    let (device, probe, _platform) = windowed_device(3, NullCompletion::Immediate);
    let pso = pipeline_with_set0(&device, uniform_set());
    let layout = device.create_parameter_block_layout(&uniform_set(), 0).unwrap();
    let block = device.create_parameter_block(layout).unwrap();
    let buffer = uniform_buffer(&device, 256);
    device.update_parameter_block(block, &[whole(buffer)]).unwrap();

    let mut list = device.acquire_next_image().unwrap();
    list.set_pso(pso).unwrap();
    list.set_parameter_block(0, block).unwrap();
    list.draw(3, 1, 0, 0).unwrap();
    device.present(list).unwrap();

    let frame = probe.last_frame().unwrap();
    assert!(frame.commands().contains(&RecordedCommand::BindParameterBlock {
        set_index: 0,
        offset: 0,
        block,
    }));
    assert_eq!(probe.block_resources(block), Some(vec![whole(buffer)]));
}

#[test]
fn test_sparse_sets_bind_at_compacted_offsets() {
    let (device, probe, _platform) = windowed_device(2, NullCompletion::Immediate);
    let (vs, fs) = triangle_shaders(&device);
    let layout = PipelineLayoutDescriptor::default()
        .with_set(1, uniform_set())
        .with_set(3, uniform_set());
    let pso = device
        .create_rasterize_pipeline(&pipeline_desc(vs, fs, layout))
        .unwrap();
    assert_eq!(
        device.pipeline_set_offsets(pso),
        Some([None, Some(0), None, Some(1)])
    );

    let set3 = device.pipeline_set_layout(pso, 3).unwrap();
    let block = device.create_parameter_block(set3).unwrap();

    let mut list = device.acquire_next_image().unwrap();
    list.set_pso(pso).unwrap();
    assert_eq!(
        list.set_parameter_block(0, block),
        Err(RecordingError::SetNotInLayout { set_index: 0 })
    );
    assert_eq!(
        list.set_parameter_block(1, block),
        Err(RecordingError::LayoutMismatch { set_index: 1 })
    );
    list.set_parameter_block(3, block).unwrap();
    device.present(list).unwrap();

    let frame = probe.last_frame().unwrap();
    let binds: Vec<&RecordedCommand> = frame
        .commands()
        .iter()
        .filter(|c| matches!(c, RecordedCommand::BindParameterBlock { .. }))
        .collect();
    assert_eq!(
        binds,
        vec![&RecordedCommand::BindParameterBlock {
            set_index: 3,
            offset: 1,
            block,
        }]
    );
}

#[test]
fn test_binding_a_block_needs_a_pipeline() {
    let (device, _probe, _platform) = windowed_device(2, NullCompletion::Immediate);
    let layout = device.create_parameter_block_layout(&uniform_set(), 0).unwrap();
    let block = device.create_parameter_block(layout).unwrap();

    let mut list = device.acquire_next_image().unwrap();
    assert_eq!(
        list.set_parameter_block(0, block),
        Err(RecordingError::NoPipelineBound {
            verb: "set_parameter_block"
        })
    );
    device.present(list).unwrap();
}
