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

//! Application-owned timeline semaphores.

use super::api::sync::TimelineId;
use super::device::Device;
use super::error::RenderError;
use std::fmt;
use std::time::Duration;

/// A timeline semaphore created by [`Device::create_timeline_semaphore`].
///
/// The value only moves forward. It is raised by the GPU through
/// [`Device::submit_one_time_commands_signaling`] or from the host with
/// [`signal`](Self::signal). The native semaphore is released on drop.
pub struct TimelineSemaphore<'d> {
    device: &'d Device,
    id: TimelineId,
    name: Option<String>,
}

impl<'d> TimelineSemaphore<'d> {
    pub(crate) fn new(device: &'d Device, id: TimelineId) -> Self {
        Self {
            device,
            id,
            name: None,
        }
    }

    /// Backend identifier of the timeline.
    pub fn id(&self) -> TimelineId {
        self.id
    }

    /// Last value reached.
    pub fn value(&self) -> u64 {
        self.device.backend().timeline_value(self.id)
    }

    /// Blocks until the semaphore reaches `value`.
    ///
    /// Returns `Ok(false)` if `timeout` elapsed first; `None` waits forever.
    pub fn wait_until(&self, value: u64, timeout: Option<Duration>) -> Result<bool, RenderError> {
        let reached = self.device.backend().wait_timeline(self.id, value, timeout)?;
        if !reached {
            log::debug!(
                "TimelineSemaphore: {} did not reach {value} within {timeout:?}",
                self.display_name()
            );
        }
        Ok(reached)
    }

    /// Raises the semaphore to `value` from the host. Lower values are ignored.
    pub fn signal(&self, value: u64) -> Result<(), RenderError> {
        self.device.backend().signal_timeline(self.id, value)
    }

    /// Names the semaphore in log output.
    pub fn set_debug_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    pub(crate) fn belongs_to(&self, device: &Device) -> bool {
        std::ptr::eq(self.device, device)
    }

    fn display_name(&self) -> String {
        match &self.name {
            Some(name) => format!("'{name}'"),
            None => format!("{:?}", self.id),
        }
    }
}

impl fmt::Debug for TimelineSemaphore<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimelineSemaphore")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl Drop for TimelineSemaphore<'_> {
    fn drop(&mut self) {
        log::debug!("TimelineSemaphore: releasing {}", self.display_name());
        self.device.backend().destroy_timeline(self.id);
    }
}
