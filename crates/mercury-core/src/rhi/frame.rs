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

//! Frame-in-flight slots and the timeline arithmetic that throttles the CPU.
//!
//! One timeline semaphore covers every frame. It starts at `N - 1` and slot
//! `i` starts with value `i`, so the first `N` acquires never wait. Frame `f`
//! runs in slot `f % N`, waits for value `f`, and its submission signals
//! `f + N`, the exact value frame `f + N` will wait for. Acquire therefore
//! returns only once frame `f` has retired, which bounds the GPU backlog to
//! `N - 1` frames.

use super::api::command::CommandListKind;
use super::api::sync::TimelineId;
use super::command_pool::CommandPool;

/// One frame-in-flight slot.
#[derive(Debug)]
pub struct FrameSlot {
    /// Position in the ring.
    pub index: usize,
    /// Pool the slot's command list is allocated from.
    pub pool: CommandPool,
    /// Timeline value the slot must reach before it is reused.
    pub timeline_value: u64,
}

/// The ring of frame slots.
#[derive(Debug)]
pub struct FramePacer {
    timeline: TimelineId,
    slots: Vec<FrameSlot>,
    cursor: usize,
    frames_submitted: u64,
}

impl FramePacer {
    /// Value the frame timeline must be created with for `frames_in_flight` slots.
    pub fn initial_timeline_value(frames_in_flight: usize) -> u64 {
        frames_in_flight.saturating_sub(1) as u64
    }

    /// Builds `frames_in_flight` slots on `timeline`.
    pub fn new(timeline: TimelineId, frames_in_flight: usize) -> Self {
        let slots = (0..frames_in_flight)
            .map(|index| FrameSlot {
                index,
                pool: CommandPool::new(CommandListKind::Graphics),
                timeline_value: index as u64,
            })
            .collect();
        Self {
            timeline,
            slots,
            cursor: 0,
            frames_submitted: 0,
        }
    }

    /// The frame timeline.
    pub fn timeline(&self) -> TimelineId {
        self.timeline
    }

    /// Number of slots (N).
    pub fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }

    /// Index of the active slot.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Number of frames submitted so far.
    pub fn frames_submitted(&self) -> u64 {
        self.frames_submitted
    }

    /// Timeline value the active slot waits for before it is reused.
    pub fn wait_value(&self) -> u64 {
        self.slots[self.cursor].timeline_value
    }

    /// Value the active slot's submission will signal.
    pub fn signal_value(&self) -> u64 {
        self.wait_value() + self.slots.len() as u64
    }

    /// Value signaled by the most recently submitted frame.
    pub fn last_signal_value(&self) -> u64 {
        let n = self.slots.len();
        self.slots[(self.cursor + n - 1) % n].timeline_value
    }

    /// Timeline value after which an object referenced up to now is unused.
    ///
    /// While a frame is being recorded that is the active frame's signal;
    /// between frames it is the last submitted frame's signal.
    pub fn retire_value(&self, frame_recording: bool) -> u64 {
        if frame_recording {
            self.signal_value()
        } else {
            self.last_signal_value()
        }
    }

    /// The active slot.
    pub fn active_slot_mut(&mut self) -> &mut FrameSlot {
        &mut self.slots[self.cursor]
    }

    /// Slot at `index`.
    pub fn slot_mut(&mut self, index: usize) -> Option<&mut FrameSlot> {
        self.slots.get_mut(index)
    }

    /// Records the active slot's submission and moves the cursor.
    ///
    /// Returns the value the submission signals.
    pub fn advance(&mut self) -> u64 {
        let signal = self.signal_value();
        self.slots[self.cursor].timeline_value = signal;
        self.cursor = (self.cursor + 1) % self.slots.len();
        self.frames_submitted += 1;
        signal
    }
}
