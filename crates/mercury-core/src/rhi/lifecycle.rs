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

//! Bootstrap and teardown state machine of a graphics device.

/// The lifecycle state of a device.
///
/// Bring-up walks forward through the states; teardown walks back to
/// `Uninitialized`. A swapchain can come and go while the device stays up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GraphicsState {
    /// Nothing created.
    #[default]
    Uninitialized,
    /// Native instance created.
    InstanceReady,
    /// Physical adapter chosen.
    AdapterAcquired,
    /// Logical device and queues created.
    DeviceReady,
    /// Swapchain created for the platform window.
    SwapchainReady,
    /// At least one frame has been acquired.
    Running,
}

impl GraphicsState {
    /// Returns `true` if moving from `self` to `next` is allowed.
    pub fn can_transition_to(self, next: GraphicsState) -> bool {
        use GraphicsState::*;
        matches!(
            (self, next),
            (Uninitialized, InstanceReady)
                | (InstanceReady, AdapterAcquired)
                | (AdapterAcquired, DeviceReady)
                | (DeviceReady, SwapchainReady)
                | (SwapchainReady, Running)
                // Teardown.
                | (Running, DeviceReady)
                | (SwapchainReady, DeviceReady)
                | (DeviceReady, Uninitialized)
                | (AdapterAcquired, Uninitialized)
                | (InstanceReady, Uninitialized)
        )
    }

    /// Returns `true` once a logical device exists.
    pub fn has_device(self) -> bool {
        matches!(
            self,
            GraphicsState::DeviceReady | GraphicsState::SwapchainReady | GraphicsState::Running
        )
    }

    /// Returns `true` while a swapchain exists.
    pub fn has_swapchain(self) -> bool {
        matches!(self, GraphicsState::SwapchainReady | GraphicsState::Running)
    }
}
