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

//! Deferred release of native objects the GPU may still reference.

use super::api::sync::RetiredObject;
use super::handle::{
    BufferHandle, ParameterBlockHandle, ParameterBlockLayoutHandle, PsoHandle, ShaderHandle,
    TextureHandle,
};
use std::collections::VecDeque;

/// The GPU progress an object must wait for before it is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetireStamp {
    /// Frame timeline value covering the frame that may use the object, or
    /// `None` when no swapchain exists.
    pub frame_value: Option<u64>,
    /// Transfer timeline value covering every one-time submission that may
    /// use the object, including those still being recorded.
    pub transfer_value: u64,
}

impl RetireStamp {
    /// Returns `true` once both timelines have passed the stamp.
    pub fn is_retired(&self, frame_completed: Option<u64>, transfer_completed: u64) -> bool {
        let frame_done = match (self.frame_value, frame_completed) {
            (Some(needed), Some(completed)) => completed >= needed,
            // The swapchain that stamped the object is gone; teardown waited idle.
            (Some(_), None) => true,
            (None, _) => true,
        };
        frame_done && transfer_completed >= self.transfer_value
    }
}

/// A destroyed handle whose native object the backend keeps resolvable
/// until the GPU is done with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestroyedHandle {
    Buffer(BufferHandle),
    Texture(TextureHandle),
    Shader(ShaderHandle),
    Pipeline(PsoHandle),
    ParameterBlockLayout(ParameterBlockLayoutHandle),
    ParameterBlock(ParameterBlockHandle),
}

impl DestroyedHandle {
    /// Kind of resource, for diagnostics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Buffer(_) => "buffer",
            Self::Texture(_) => "texture",
            Self::Shader(_) => "shader module",
            Self::Pipeline(_) => "pipeline",
            Self::ParameterBlockLayout(_) => "parameter block layout",
            Self::ParameterBlock(_) => "parameter block",
        }
    }
}

/// Something waiting in the retirement queue.
#[derive(Debug)]
pub enum Retiree {
    /// A native object already detached from its handle, such as the
    /// previous pipeline of a rebuilt PSO.
    Object(RetiredObject),
    /// A handle the backend still resolves; its native object is destroyed
    /// when the stamp retires.
    Handle(DestroyedHandle),
}

impl Retiree {
    /// Kind of object, for diagnostics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Object(object) => object.label(),
            Self::Handle(handle) => handle.label(),
        }
    }
}

impl From<RetiredObject> for Retiree {
    fn from(object: RetiredObject) -> Self {
        Self::Object(object)
    }
}

impl From<DestroyedHandle> for Retiree {
    fn from(handle: DestroyedHandle) -> Self {
        Self::Handle(handle)
    }
}

/// FIFO of objects waiting for the GPU.
#[derive(Debug, Default)]
pub struct RetirementQueue {
    pending: VecDeque<(RetireStamp, Retiree)>,
    released: u64,
}

impl RetirementQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `retiree` until `stamp` has retired.
    pub fn push(&mut self, stamp: RetireStamp, retiree: impl Into<Retiree>) {
        let retiree = retiree.into();
        log::trace!("RetirementQueue: deferring release of {} {:?}", retiree.label(), stamp);
        self.pending.push_back((stamp, retiree));
    }

    /// Removes every entry whose stamp has retired.
    ///
    /// Stamps are pushed in non-decreasing order, so the scan stops at the
    /// first entry that is still in use. The caller releases the returned
    /// entries outside of any lock.
    pub fn collect(&mut self, frame_completed: Option<u64>, transfer_completed: u64) -> Vec<Retiree> {
        let mut ready = Vec::new();
        while let Some((stamp, _)) = self.pending.front() {
            if !stamp.is_retired(frame_completed, transfer_completed) {
                break;
            }
            if let Some((_, retiree)) = self.pending.pop_front() {
                ready.push(retiree);
            }
        }
        self.released += ready.len() as u64;
        ready
    }

    /// Removes every pending entry regardless of its stamp. Only valid once
    /// the device is idle.
    pub fn flush(&mut self) -> Vec<Retiree> {
        let drained: Vec<Retiree> = self.pending.drain(..).map(|(_, retiree)| retiree).collect();
        self.released += drained.len() as u64;
        drained
    }

    /// Number of entries waiting.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns `true` when nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Total number of entries released so far.
    pub fn released(&self) -> u64 {
        self.released
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stamp(frame: u64, transfer: u64) -> RetireStamp {
        RetireStamp {
            frame_value: Some(frame),
            transfer_value: transfer,
        }
    }

    #[test]
    fn objects_wait_for_both_timelines() {
        let mut queue = RetirementQueue::new();
        queue.push(stamp(3, 1), RetiredObject::new("pipeline", ()));

        assert!(queue.collect(Some(2), 1).is_empty());
        assert!(queue.collect(Some(3), 0).is_empty());
        let released = queue.collect(Some(3), 1);
        assert_eq!(released.len(), 1);
        assert_eq!(released[0].label(), "pipeline");
        assert!(queue.is_empty());
        assert_eq!(queue.released(), 1);
    }

    #[test]
    fn release_stops_at_first_busy_object() {
        let mut queue = RetirementQueue::new();
        queue.push(stamp(2, 0), RetiredObject::new("a", ()));
        queue.push(stamp(5, 0), RetiredObject::new("b", ()));
        queue.push(stamp(5, 0), RetiredObject::new("c", ()));

        let released = queue.collect(Some(4), 0);
        assert_eq!(released.len(), 1);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn destroyed_handles_come_back_once_retired() {
        let mut queue = RetirementQueue::new();
        let buffer = BufferHandle::from_raw_parts(4, 2);
        queue.push(stamp(1, 3), DestroyedHandle::Buffer(buffer));

        assert!(queue.collect(Some(1), 2).is_empty());
        let released = queue.collect(Some(1), 3);
        assert!(matches!(
            released.as_slice(),
            [Retiree::Handle(DestroyedHandle::Buffer(h))] if *h == buffer
        ));
        assert_eq!(released[0].label(), "buffer");
    }

    #[test]
    fn missing_swapchain_does_not_block_release() {
        let no_frame = RetireStamp {
            frame_value: None,
            transfer_value: 0,
        };
        assert!(no_frame.is_retired(None, 0));
        assert!(stamp(9, 0).is_retired(None, 0));
    }

    #[test]
    fn flush_releases_everything() {
        let mut queue = RetirementQueue::new();
        queue.push(stamp(100, 100), RetiredObject::new("buffer", ()));
        queue.push(stamp(100, 100), DestroyedHandle::Texture(TextureHandle::from_raw_parts(0, 0)));
        assert_eq!(queue.flush().len(), 2);
        assert!(queue.is_empty());
    }
}
