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

//! The ring of one-time transfer contexts.
//!
//! All contexts share one timeline; each submission signals the next value,
//! and a context is reusable once the timeline has reached the value its last
//! submission signaled.

use super::api::command::CommandListKind;
use super::api::sync::TimelineId;
use super::command_pool::CommandPool;

/// Callback fired once the GPU has finished a one-time submission.
pub type CompletionCallback = Box<dyn FnOnce() + Send + 'static>;

struct TransferContext {
    pool: CommandPool,
    signal_value: u64,
    in_use: bool,
    recording: bool,
    pending: Option<CompletionCallback>,
}

impl std::fmt::Debug for TransferContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferContext")
            .field("signal_value", &self.signal_value)
            .field("in_use", &self.in_use)
            .field("recording", &self.recording)
            .field("has_callback", &self.pending.is_some())
            .finish()
    }
}

/// A context reserved for recording.
pub struct ReservedContext {
    /// Index of the context in the ring.
    pub index: usize,
    /// Callback of the context's previous submission, if it had not fired yet.
    pub overdue: Option<CompletionCallback>,
}

/// Fixed-size ring of transfer contexts.
#[derive(Debug)]
pub struct TransferRing {
    timeline: TimelineId,
    contexts: Vec<TransferContext>,
    last_signaled: u64,
    search_start: usize,
}

impl TransferRing {
    /// Creates `size` contexts on `timeline`, which must start at 0.
    pub fn new(timeline: TimelineId, size: usize) -> Self {
        let contexts = (0..size)
            .map(|_| TransferContext {
                pool: CommandPool::new(CommandListKind::Transfer),
                signal_value: 0,
                in_use: false,
                recording: false,
                pending: None,
            })
            .collect();
        Self {
            timeline,
            contexts,
            last_signaled: 0,
            search_start: 0,
        }
    }

    /// The shared transfer timeline.
    pub fn timeline(&self) -> TimelineId {
        self.timeline
    }

    /// Number of contexts.
    pub fn capacity(&self) -> usize {
        self.contexts.len()
    }

    /// Value signaled by the most recent submission (0 if none).
    pub fn last_signaled(&self) -> u64 {
        self.last_signaled
    }

    /// Contexts submitted and not yet observed complete.
    pub fn in_flight(&self) -> usize {
        self.contexts.iter().filter(|c| c.in_use).count()
    }

    /// Finds a context whose previous work has completed and reserves it.
    ///
    /// `completed` is the current value of the transfer timeline. Returns
    /// `None` when every context is still busy or recording.
    pub fn reserve(&mut self, completed: u64) -> Option<ReservedContext> {
        let n = self.contexts.len();
        for step in 0..n {
            let index = (self.search_start + step) % n;
            let context = &mut self.contexts[index];
            if context.recording || (context.in_use && context.signal_value > completed) {
                continue;
            }
            let overdue = if context.in_use {
                context.in_use = false;
                context.pending.take()
            } else {
                None
            };
            context.recording = true;
            context.pool.reset();
            self.search_start = (index + 1) % n;
            return Some(ReservedContext { index, overdue });
        }
        None
    }

    /// Pool of context `index`.
    pub fn pool_mut(&mut self, index: usize) -> Option<&mut CommandPool> {
        self.contexts.get_mut(index).map(|c| &mut c.pool)
    }

    /// Value the next submission will signal.
    pub fn next_signal_value(&self) -> u64 {
        self.last_signaled + 1
    }

    /// Highest value a submission that may still reference a resource
    /// destroyed now will signal. Contexts being recorded have not picked
    /// their value yet; each of them takes one of the next values.
    pub fn retire_value(&self) -> u64 {
        let recording = self.contexts.iter().filter(|c| c.recording).count() as u64;
        self.last_signaled + recording
    }

    /// Marks context `index` as submitted with `signal_value`.
    pub fn submitted(
        &mut self,
        index: usize,
        signal_value: u64,
        on_finish: Option<CompletionCallback>,
    ) {
        if let Some(context) = self.contexts.get_mut(index) {
            context.recording = false;
            context.in_use = true;
            context.signal_value = signal_value;
            context.pending = on_finish;
            self.last_signaled = self.last_signaled.max(signal_value);
        }
    }

    /// Releases a reservation that was never submitted.
    pub fn abandon(&mut self, index: usize) {
        if let Some(context) = self.contexts.get_mut(index) {
            context.recording = false;
        }
    }

    /// Marks every context whose work is complete as free and collects the
    /// callbacks that are now due.
    pub fn collect_completed(&mut self, completed: u64) -> Vec<CompletionCallback> {
        let mut due = Vec::new();
        for context in &mut self.contexts {
            if context.in_use && context.signal_value <= completed {
                context.in_use = false;
                if let Some(callback) = context.pending.take() {
                    due.push(callback);
                }
            }
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counter_callback(counter: &Arc<AtomicUsize>) -> CompletionCallback {
        let counter = counter.clone();
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn completed_callbacks_fire_exactly_once() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut ring = TransferRing::new(TimelineId(1), 4);

        let ctx = ring.reserve(0).unwrap();
        let value = ring.next_signal_value();
        ring.submitted(ctx.index, value, Some(counter_callback(&fired)));
        assert_eq!(ring.in_flight(), 1);

        assert!(ring.collect_completed(0).is_empty());
        for callback in ring.collect_completed(value) {
            callback();
        }
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(ring.collect_completed(value).is_empty());
        assert_eq!(ring.in_flight(), 0);
    }

    #[test]
    fn busy_contexts_are_skipped_until_saturated() {
        let mut ring = TransferRing::new(TimelineId(1), 2);
        for _ in 0..2 {
            let ctx = ring.reserve(0).unwrap();
            let value = ring.next_signal_value();
            ring.submitted(ctx.index, value, None);
        }
        assert!(ring.reserve(0).is_none());
        assert!(ring.reserve(1).is_some());
    }

    #[test]
    fn reclaiming_a_completed_context_hands_back_its_callback() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut ring = TransferRing::new(TimelineId(1), 1);

        let ctx = ring.reserve(0).unwrap();
        ring.submitted(ctx.index, 1, Some(counter_callback(&fired)));

        let ctx = ring.reserve(1).unwrap();
        let overdue = ctx.overdue.expect("callback of the previous submission");
        overdue();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn retire_value_covers_contexts_being_recorded() {
        let mut ring = TransferRing::new(TimelineId(1), 3);
        assert_eq!(ring.retire_value(), 0);

        let first = ring.reserve(0).unwrap();
        assert_eq!(ring.retire_value(), 1);
        let second = ring.reserve(0).unwrap();
        assert_eq!(ring.retire_value(), 2);

        ring.submitted(second.index, ring.next_signal_value(), None);
        assert_eq!(ring.retire_value(), 2);
        ring.abandon(first.index);
        assert_eq!(ring.retire_value(), 1);
    }

    #[test]
    fn abandoned_reservation_is_reusable() {
        let mut ring = TransferRing::new(TimelineId(1), 1);
        let ctx = ring.reserve(0).unwrap();
        assert!(ring.reserve(0).is_none());
        ring.abandon(ctx.index);
        assert!(ring.reserve(0).is_some());
    }
}
