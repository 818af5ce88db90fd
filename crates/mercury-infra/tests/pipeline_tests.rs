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

//! Integration tests for shader modules, pipeline creation and rebuilds, and
//! pipeline-dependent recording.

mod common;

use common::{
    device_with, headless_device, null_config, pipeline_desc, pipeline_with_set0,
    triangle_shaders, windowed_device, TestPlatform,
};
use mercury_core::rhi::{
    BindingSetLayoutDescriptor, PipelineError, PipelineLayoutDescriptor, PsoHandle,
    RasterizePipelineDescriptor, RecordedCommand, RecordingError, ResourceError, ShaderHandle,
    ShaderModuleDescriptor, ShaderResourceType, ShaderStage,
};
use mercury_infra::{NullBackendOptions, NullCompletion};

fn uniform_set() -> BindingSetLayoutDescriptor {
    BindingSetLayoutDescriptor::new().with_slot(0, ShaderResourceType::UniformBuffer)
}

// ─────────────────────────────────────────────────────────────────────────────
// Creation
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_pipeline_records_compacted_layout() {
    let (device, probe) = headless_device();
    let pso = pipeline_with_set0(&device, uniform_set());

    assert!(device.is_valid(pso));
    assert_eq!(device.pipeline_set_offsets(pso), Some([Some(0), None, None, None]));
    assert_eq!(probe.pipeline_builds(pso), Some(1));
    assert_eq!(probe.pipeline_label(pso).as_deref(), Some("test pipeline"));
}

#[test]
fn test_pipeline_without_stages_is_rejected() {
    let (device, probe) = headless_device();
    let desc = RasterizePipelineDescriptor {
        label: Some("empty".to_owned()),
        ..RasterizePipelineDescriptor::default()
    };
    assert_eq!(
        device.create_rasterize_pipeline(&desc),
        Err(ResourceError::Pipeline(PipelineError::NoShaderStages {
            label: "empty".to_owned()
        }))
    );
    assert_eq!(probe.live_objects(), 0);
}

#[test]
fn test_vertex_only_pipeline_is_accepted() {
    let (device, _probe) = headless_device();
    let (vs, _fs) = triangle_shaders(&device);
    let pso = device
        .create_rasterize_pipeline(&pipeline_desc(
            vs,
            ShaderHandle::INVALID,
            PipelineLayoutDescriptor::default(),
        ))
        .unwrap();
    assert!(device.is_valid(pso));
}

#[test]
fn test_shader_used_for_the_wrong_stage_is_rejected() {
    let (device, _probe) = headless_device();
    let (vs, fs) = triangle_shaders(&device);
    let result = device.create_rasterize_pipeline(&pipeline_desc(
        fs,
        vs,
        PipelineLayoutDescriptor::default(),
    ));
    assert_eq!(
        result,
        Err(ResourceError::Pipeline(PipelineError::InvalidShaderModule {
            label: "test pipeline".to_owned(),
            stage: ShaderStage::Vertex,
        }))
    );
}

#[test]
#[should_panic(expected = "shader compilation failed")]
fn test_shader_compile_failure_is_fatal() {
    let options = NullBackendOptions {
        compile_error_marker: Some("#error".to_owned()),
        ..NullBackendOptions::default()
    };
    let (device, _probe) = device_with(options, null_config(3), TestPlatform::headless());
    let _ = device.create_shader_module(&ShaderModuleDescriptor::wgsl(
        ShaderStage::Fragment,
        "#error broken",
    ));
}

// ─────────────────────────────────────────────────────────────────────────────
// Rebuilds
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_update_pipeline_state_rebuilds_in_place() {
    let (device, probe) = headless_device();
    let (vs, fs) = triangle_shaders(&device);
    let pso = device
        .create_rasterize_pipeline(&pipeline_desc(vs, fs, PipelineLayoutDescriptor::default()))
        .unwrap();

    let mut desc = pipeline_desc(
        vs,
        fs,
        PipelineLayoutDescriptor::default().with_set(2, uniform_set()),
    );
    desc.label = Some("rebuilt".to_owned());
    device.update_pipeline_state(pso, &desc).unwrap();

    assert!(device.is_valid(pso));
    assert_eq!(probe.pipeline_builds(pso), Some(2));
    assert_eq!(probe.pipeline_label(pso).as_deref(), Some("rebuilt"));
    assert_eq!(device.pipeline_set_offsets(pso), Some([None, None, Some(0), None]));
    assert_eq!(device.pending_retirements(), 1);

    device.tick();
    assert_eq!(device.pending_retirements(), 0);
}

#[test]
fn test_pipeline_survives_its_shader_modules() {
    let (device, probe, _platform) = windowed_device(2, NullCompletion::Immediate);
    let (vs, fs) = triangle_shaders(&device);
    let desc = pipeline_desc(vs, fs, PipelineLayoutDescriptor::default());
    let pso = device.create_rasterize_pipeline(&desc).unwrap();
    device.destroy_shader_module(vs).unwrap();
    device.destroy_shader_module(fs).unwrap();

    let mut list = device.acquire_next_image().unwrap();
    list.set_pso(pso).unwrap();
    list.draw(3, 1, 0, 0).unwrap();
    device.present(list).unwrap();
    assert_eq!(probe.last_frame().unwrap().pipeline_binds(), 1);

    // Rebuilding needs live modules.
    assert!(matches!(
        device.update_pipeline_state(pso, &desc),
        Err(ResourceError::Pipeline(PipelineError::InvalidShaderModule { .. }))
    ));
    assert_eq!(probe.pipeline_builds(pso), Some(1));
}

#[test]
fn test_update_of_destroyed_pipeline_fails() {
    let (device, _probe) = headless_device();
    let pso = pipeline_with_set0(&device, uniform_set());
    device.destroy_pipeline(pso).unwrap();
    assert!(!device.is_valid(pso));
    let (vs, fs) = triangle_shaders(&device);
    assert_eq!(
        device.update_pipeline_state(pso, &pipeline_desc(vs, fs, Default::default())),
        Err(ResourceError::InvalidHandle)
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Recording against a pipeline
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_repeated_set_pso_binds_once() {
    let (device, probe, _platform) = windowed_device(3, NullCompletion::Immediate);
    let pso = pipeline_with_set0(&device, uniform_set());

    let mut list = device.acquire_next_image().unwrap();
    list.set_pso(pso).unwrap();
    list.set_pso(pso).unwrap();
    list.draw(3, 1, 0, 0).unwrap();
    list.set_pso(pso).unwrap();
    list.draw(3, 1, 0, 0).unwrap();
    assert_eq!(list.bound_pipeline(), Some(pso));
    device.present(list).unwrap();

    assert_eq!(probe.last_frame().unwrap().pipeline_binds(), 1);
}

#[test]
fn test_switching_pipelines_binds_each_time() {
    let (device, probe, _platform) = windowed_device(3, NullCompletion::Immediate);
    let a = pipeline_with_set0(&device, uniform_set());
    let b = pipeline_with_set0(&device, uniform_set());

    let mut list = device.acquire_next_image().unwrap();
    for pso in [a, b, a] {
        list.set_pso(pso).unwrap();
    }
    device.present(list).unwrap();
    assert_eq!(probe.last_frame().unwrap().pipeline_binds(), 3);
}

#[test]
fn test_draw_needs_a_bound_pipeline() {
    let (device, _probe, _platform) = windowed_device(2, NullCompletion::Immediate);
    let mut list = device.acquire_next_image().unwrap();
    assert_eq!(
        list.draw(3, 1, 0, 0),
        Err(RecordingError::NoPipelineBound { verb: "draw" })
    );
    assert_eq!(list.set_pso(PsoHandle::INVALID), Err(RecordingError::InvalidPipeline));
    device.present(list).unwrap();
}

#[test]
fn test_push_constants_respect_the_declared_range() {
    let (device, probe, _platform) = windowed_device(2, NullCompletion::Immediate);
    let pso = pipeline_with_set0(&device, uniform_set());

    let mut list = device.acquire_next_image().unwrap();
    assert_eq!(
        list.push_constants(&[0; 4]),
        Err(RecordingError::NoPipelineBound {
            verb: "push_constants"
        })
    );
    list.set_pso(pso).unwrap();
    assert_eq!(
        list.push_constants(&[0; 65]),
        Err(RecordingError::PushConstantsTooLarge {
            size: 65,
            capacity: 64
        })
    );
    let tint = [0.25f32, 0.5, 0.75, 1.0];
    list.push_constants_pod(&tint).unwrap();
    list.draw(3, 1, 0, 0).unwrap();
    device.present(list).unwrap();

    let frame = probe.last_frame().unwrap();
    let pushed: Vec<&[u8]> = frame
        .commands()
        .iter()
        .filter_map(|c| match c {
            RecordedCommand::PushConstants { data } => Some(frame.stream.push_constant_data(data)),
            _ => None,
        })
        .collect();
    assert_eq!(pushed, vec![bytemuck::bytes_of(&tint)]);
}
