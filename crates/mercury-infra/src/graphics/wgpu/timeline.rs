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

//! Timeline semaphores emulated on top of `on_submitted_work_done`.
//!
//! WGPU has no timeline semaphores. Each timeline keeps the last value the
//! queue reported complete in an atomic; a submission registers a callback
//! that raises it once the queue finishes that work.

use mercury_core::rhi::TimelineId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct Timeline {
    completed: Arc<AtomicU64>,
    submitted: u64,
}

/// The live timelines of a device.
#[derive(Debug, Default)]
pub struct TimelineTable {
    timelines: HashMap<TimelineId, Timeline>,
    next_id: u32,
}

impl TimelineTable {
    /// Creates a timeline whose completed and submitted values start at `initial`.
    pub fn create(&mut self, initial: u64) -> TimelineId {
        let id = TimelineId(self.next_id);
        self.next_id += 1;
        self.timelines.insert(
            id,
            Timeline {
                completed: Arc::new(AtomicU64::new(initial)),
                submitted: initial,
            },
        );
        id
    }

    /// Removes a timeline. Pending callbacks still hold their counter.
    pub fn destroy(&mut self, id: TimelineId) {
        self.timelines.remove(&id);
    }

    /// Last value the queue reported complete, or `None` for an unknown timeline.
    pub fn completed(&self, id: TimelineId) -> Option<u64> {
        self.timelines
            .get(&id)
            .map(|t| t.completed.load(Ordering::Acquire))
    }

    /// Highest value submitted so far.
    pub fn submitted(&self, id: TimelineId) -> Option<u64> {
        self.timelines.get(&id).map(|t| t.submitted)
    }

    /// Records that `value` was submitted and returns the counter the
    /// completion callback must raise.
    pub fn submit(&mut self, id: TimelineId, value: u64) -> Option<Arc<AtomicU64>> {
        let timeline = self.timelines.get_mut(&id)?;
        timeline.submitted = timeline.submitted.max(value);
        Some(timeline.completed.clone())
    }

    /// Raises a timeline from the host. Returns `false` for an unknown timeline.
    pub fn signal_host(&mut self, id: TimelineId, value: u64) -> bool {
        let Some(timeline) = self.timelines.get_mut(&id) else {
            return false;
        };
        timeline.submitted = timeline.submitted.max(value);
        signal(&timeline.completed, value);
        true
    }

    /// Whether every submitted value has completed.
    pub fn all_complete(&self) -> bool {
        self.timelines
            .values()
            .all(|t| t.completed.load(Ordering::Acquire) >= t.submitted)
    }

    /// Marks every submitted value complete. Used once the device is gone.
    pub fn complete_all(&mut self) {
        for timeline in self.timelines.values() {
            timeline
                .completed
                .fetch_max(timeline.submitted, Ordering::AcqRel);
        }
    }
}

/// Raises `counter` to `value`; called from the queue's completion callback.
pub fn signal(counter: &AtomicU64, value: u64) {
    counter.fetch_max(value, Ordering::AcqRel);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_only_moves_forward() {
        let mut table = TimelineTable::default();
        let id = table.create(0);
        let counter = table.submit(id, 2).expect("known timeline");
        assert!(!table.all_complete());

        signal(&counter, 2);
        signal(&counter, 1);
        assert_eq!(table.completed(id), Some(2));
        assert!(table.all_complete());
    }

    #[test]
    fn unknown_timelines_are_reported() {
        let mut table = TimelineTable::default();
        let id = table.create(5);
        table.destroy(id);
        assert_eq!(table.completed(id), None);
        assert!(table.submit(id, 6).is_none());
    }

    #[test]
    fn host_signals_raise_both_values() {
        let mut table = TimelineTable::default();
        let id = table.create(1);
        assert!(table.signal_host(id, 4));
        assert!(table.signal_host(id, 2));
        assert_eq!(table.completed(id), Some(4));
        assert_eq!(table.submitted(id), Some(4));
        assert!(!table.signal_host(TimelineId(99), 1));
    }

    #[test]
    fn complete_all_releases_waiters() {
        let mut table = TimelineTable::default();
        let a = table.create(0);
        let b = table.create(0);
        table.submit(a, 3);
        table.submit(b, 1);
        table.complete_all();
        assert_eq!(table.completed(a), Some(3));
        assert_eq!(table.completed(b), Some(1));
    }
}
