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

//! Synchronization primitives and submission payloads shared with backends.

use super::command::{ClearValues, CommandListKind, CommandStream};
use super::format::TextureFormat;
use std::any::Any;
use std::fmt;

/// Identifies a backend timeline semaphore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimelineId(pub u32);

/// A value a submission signals on a timeline once the GPU finishes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineSignal {
    /// Timeline to signal.
    pub timeline: TimelineId,
    /// Value to signal.
    pub value: u64,
}

/// Everything a backend needs to execute one closed command list.
#[derive(Debug)]
pub struct Submission<'a> {
    /// Graphics lists replay inside the frame's render pass; transfer lists outside.
    pub kind: CommandListKind,
    /// Recorded commands.
    pub stream: &'a CommandStream,
    /// Clear values for the frame target, graphics lists only.
    pub clear: Option<ClearValues>,
    /// Timeline value signaled on completion.
    pub signal: TimelineSignal,
    /// Value signaled on an application timeline semaphore once the same work
    /// completes.
    pub semaphore_signal: Option<TimelineSignal>,
}

impl Submission<'_> {
    /// Every timeline value this submission signals.
    pub fn signals(&self) -> impl Iterator<Item = TimelineSignal> {
        std::iter::once(self.signal).chain(self.semaphore_signal)
    }
}

/// Result of an acquire on the swapchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainInfo {
    /// Width of the images.
    pub width: u32,
    /// Height of the images.
    pub height: u32,
    /// Number of presentable images.
    pub image_count: u32,
    /// Format of the presentable images.
    pub color_format: TextureFormat,
    /// Format of the depth target, if any.
    pub depth_format: Option<TextureFormat>,
    /// MSAA sample count of the color target.
    pub samples: u32,
}

/// A native object removed from a backend, kept alive until the GPU can no
/// longer reference it. Dropping it releases the native object.
pub struct RetiredObject {
    label: &'static str,
    _object: Box<dyn Any + Send>,
}

impl RetiredObject {
    /// Wraps a native object.
    pub fn new<T: Any + Send>(label: &'static str, object: T) -> Self {
        Self {
            label,
            _object: Box::new(object),
        }
    }

    /// Kind of object, for diagnostics.
    pub fn label(&self) -> &'static str {
        self.label
    }
}

impl fmt::Debug for RetiredObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetiredObject")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct DropCounter(Arc<AtomicUsize>);

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn dropping_a_retired_object_releases_it() {
        let drops = Arc::new(AtomicUsize::new(0));
        let retired = RetiredObject::new("buffer", DropCounter(drops.clone()));
        assert_eq!(retired.label(), "buffer");
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        drop(retired);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }
}
