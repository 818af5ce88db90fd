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

//! Integration tests for one-time transfer submissions and the deferred
//! release of destroyed resources.

mod common;

use common::{device_with, headless_device, null_config, windowed_device, TestPlatform};
use mercury_core::rhi::{
    BufferDescriptor, BufferHandle, BufferUsage, CommandListKind, CompletionCallback, Device,
    RecordedCommand, RecordingError, RenderError,
};
use mercury_infra::{NullBackendOptions, NullCompletion, NullProbe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn counter_callback(counter: &Arc<AtomicUsize>) -> Option<CompletionCallback> {
    let counter = counter.clone();
    Some(Box::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    }))
}

fn deferred_headless() -> (Device, NullProbe) {
    let options = NullBackendOptions {
        completion: NullCompletion::Deferred,
        ..NullBackendOptions::default()
    };
    device_with(options, null_config(3), TestPlatform::headless())
}

fn staging_pair(device: &Device) -> (BufferHandle, BufferHandle) {
    let data: Vec<u8> = (0..64).collect();
    let src = device
        .create_buffer(
            &BufferDescriptor::new(64, BufferUsage::COPY_SRC)
                .with_label("staging")
                .with_data(data),
        )
        .unwrap();
    let dst = device
        .create_buffer(&BufferDescriptor::new(64, BufferUsage::COPY_DST | BufferUsage::VERTEX))
        .unwrap();
    (src, dst)
}

// ─────────────────────────────────────────────────────────────────────────────
// One-time submissions
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_one_time_copy_reaches_the_destination() {
    let (device, probe) = headless_device();
    let (src, dst) = staging_pair(&device);

    device
        .submit_one_time_commands(|list| list.copy_buffer_to_buffer(src, 16, dst, 0, 32), None)
        .unwrap();

    let transfers = probe.submissions_of(CommandListKind::Transfer);
    assert_eq!(transfers.len(), 1);
    assert_eq!(transfers[0].clear, None);
    let contents = probe.buffer_contents(dst).unwrap();
    assert_eq!(&contents[..32], (16..48).collect::<Vec<u8>>().as_slice());
    assert!(contents[32..].iter().all(|&b| b == 0));
}

#[test]
fn test_callback_fires_once_on_the_first_tick_after_completion() {
    let (device, probe) = deferred_headless();
    let (src, dst) = staging_pair(&device);
    let fired = Arc::new(AtomicUsize::new(0));

    device
        .submit_one_time_commands(
            |list| list.copy_buffer_to_buffer(src, 0, dst, 0, 64),
            counter_callback(&fired),
        )
        .unwrap();
    assert_eq!(fired.load(Ordering::SeqCst), 0);
    assert_eq!(device.transfers_in_flight(), 1);

    device.tick();
    assert_eq!(fired.load(Ordering::SeqCst), 0, "the GPU has not finished yet");

    probe.complete_all();
    assert_eq!(fired.load(Ordering::SeqCst), 0, "callbacks only fire from tick");
    device.tick();
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(device.transfers_in_flight(), 0);

    device.tick();
    device.tick();
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[test]
fn test_every_pending_callback_fires_in_one_tick() {
    let (device, probe) = deferred_headless();
    let (src, dst) = staging_pair(&device);
    let fired = Arc::new(AtomicUsize::new(0));

    for _ in 0..5 {
        device
            .submit_one_time_commands(
                |list| list.copy_buffer_to_buffer(src, 0, dst, 0, 4),
                counter_callback(&fired),
            )
            .unwrap();
    }
    assert_eq!(device.transfers_in_flight(), 5);

    probe.complete_all();
    device.tick();
    assert_eq!(fired.load(Ordering::SeqCst), 5);
}

#[test]
fn test_reused_contexts_fire_each_callback_exactly_once() {
    let mut config = null_config(3);
    config.transfer_ring_size = 2;
    let (device, _probe) = device_with(
        NullBackendOptions::default(),
        config,
        TestPlatform::headless(),
    );
    let (src, dst) = staging_pair(&device);
    let fired = Arc::new(AtomicUsize::new(0));

    for _ in 0..5 {
        device
            .submit_one_time_commands(
                |list| list.copy_buffer_to_buffer(src, 0, dst, 0, 8),
                counter_callback(&fired),
            )
            .unwrap();
    }
    device.tick();
    assert_eq!(fired.load(Ordering::SeqCst), 5);
    device.tick();
    assert_eq!(fired.load(Ordering::SeqCst), 5);
}

#[test]
fn test_wait_idle_fires_outstanding_callbacks() {
    let (device, probe) = deferred_headless();
    let (src, dst) = staging_pair(&device);
    let fired = Arc::new(AtomicUsize::new(0));

    device
        .submit_one_time_commands(
            |list| list.copy_buffer_to_buffer(src, 0, dst, 0, 64),
            counter_callback(&fired),
        )
        .unwrap();
    device.wait_idle().unwrap();

    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(probe.in_flight(), 0);
    assert_eq!(device.transfers_in_flight(), 0);
}

#[test]
fn test_recording_errors_abort_the_submission() {
    let (device, probe) = headless_device();
    let (src, dst) = staging_pair(&device);

    let result = device.submit_one_time_commands(
        |list| list.copy_buffer_to_buffer(src, 32, dst, 0, 64),
        None,
    );
    assert_eq!(
        result,
        Err(RenderError::Recording(RecordingError::BufferRangeOutOfBounds))
    );

    let result = device.submit_one_time_commands(|list| list.draw(3, 1, 0, 0), None);
    assert_eq!(
        result,
        Err(RenderError::Recording(RecordingError::WrongListKind {
            verb: "draw",
            kind: CommandListKind::Transfer
        }))
    );

    assert!(probe.submissions().is_empty());
    assert_eq!(device.transfers_in_flight(), 0);

    // The ring is still usable.
    device
        .submit_one_time_commands(|list| list.copy_buffer_to_buffer(src, 0, dst, 0, 64), None)
        .unwrap();
}

// ─────────────────────────────────────────────────────────────────────────────
// Deferred release
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_buffer_used_by_a_frame_outlives_its_handle() {
    let (device, probe, _platform) = windowed_device(2, NullCompletion::Deferred);
    let buffer = device
        .create_buffer(&BufferDescriptor::new(48, BufferUsage::VERTEX))
        .unwrap();

    let mut list = device.acquire_next_image().unwrap();
    list.set_vertex_buffer(0, buffer, 0).unwrap();
    device.destroy_buffer(buffer).unwrap();
    assert!(!device.is_valid(buffer));
    device.present(list).unwrap();

    // The frame still resolves the buffer it bound before the destroy.
    let frame = probe.last_frame().unwrap();
    assert!(frame.commands().iter().any(|command| matches!(
        command,
        RecordedCommand::SetVertexBuffer { buffer: bound, .. } if *bound == buffer
    )));
    assert_eq!(probe.live_objects(), 1);

    assert_eq!(device.pending_retirements(), 1);
    device.tick();
    assert_eq!(device.pending_retirements(), 1, "the frame is still in flight");
    assert_eq!(probe.released_objects(), 0);

    probe.complete_all();
    device.tick();
    assert_eq!(device.pending_retirements(), 0);
    assert_eq!(probe.released_objects(), 1);
    assert_eq!(probe.live_objects(), 0);
}

#[test]
fn test_buffer_used_by_a_transfer_outlives_its_handle() {
    let (device, probe) = deferred_headless();
    let (src, dst) = staging_pair(&device);
    device
        .submit_one_time_commands(|list| list.copy_buffer_to_buffer(src, 0, dst, 0, 64), None)
        .unwrap();
    device.destroy_buffer(src).unwrap();

    device.tick();
    assert_eq!(device.pending_retirements(), 1);

    probe.complete_all();
    device.tick();
    assert_eq!(device.pending_retirements(), 0);
    assert_eq!(probe.released_objects(), 1);
}

#[test]
fn test_source_destroyed_while_recording_a_copy_is_still_read() {
    let (device, probe) = deferred_headless();
    let (src, dst) = staging_pair(&device);

    device
        .submit_one_time_commands(
            |list| {
                list.copy_buffer_to_buffer(src, 0, dst, 0, 64)?;
                device
                    .destroy_buffer(src)
                    .map_err(|_| RecordingError::InvalidResource("buffer"))
            },
            None,
        )
        .unwrap();
    assert!(!device.is_valid(src));
    assert_eq!(
        probe.buffer_contents(dst).unwrap(),
        (0..64).collect::<Vec<u8>>()
    );

    // The stamp covers the submission that was being recorded.
    device.tick();
    assert_eq!(device.pending_retirements(), 1);
    assert_eq!(probe.released_objects(), 0);

    probe.complete_all();
    device.tick();
    assert_eq!(device.pending_retirements(), 0);
    assert_eq!(probe.released_objects(), 1);
    assert!(probe.buffer_contents(src).is_none());
}

#[test]
fn test_idle_device_releases_immediately_on_tick() {
    let (device, probe) = headless_device();
    let buffer = device
        .create_buffer(&BufferDescriptor::new(16, BufferUsage::UNIFORM))
        .unwrap();
    device.destroy_buffer(buffer).unwrap();
    assert_eq!(device.pending_retirements(), 1);
    device.tick();
    assert_eq!(probe.released_objects(), 1);
}

#[test]
fn test_wait_idle_flushes_the_retirement_queue() {
    let (device, probe, _platform) = windowed_device(3, NullCompletion::Deferred);
    let buffers: Vec<BufferHandle> = (0..3)
        .map(|_| {
            device
                .create_buffer(&BufferDescriptor::new(16, BufferUsage::VERTEX))
                .unwrap()
        })
        .collect();

    let list = device.acquire_next_image().unwrap();
    for buffer in &buffers {
        device.destroy_buffer(*buffer).unwrap();
    }
    device.present(list).unwrap();
    assert_eq!(device.pending_retirements(), 3);

    device.wait_idle().unwrap();
    assert_eq!(device.pending_retirements(), 0);
    assert_eq!(probe.released_objects(), 3);
}
