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

//! Defines the hierarchy of error types for the render hardware interface.

use crate::rhi::api::command::{CommandListKind, CommandListState};
use crate::rhi::api::parameter_block::ShaderResourceType;
use crate::rhi::api::shader::ShaderStage;
use crate::rhi::lifecycle::GraphicsState;
use std::fmt;

/// An error related to the creation of a shader module.
#[derive(Debug, Clone, PartialEq)]
pub enum ShaderError {
    /// The backend cannot consume this kind of shader code.
    UnsupportedSource {
        /// Label of the module.
        label: String,
        /// Kind of source that was provided.
        source_kind: &'static str,
    },
    /// The module contains no code.
    EmptySource {
        /// Label of the module.
        label: String,
    },
    /// The backend compiler rejected the module.
    CompilationFailed {
        /// Label of the module.
        label: String,
        /// Compiler output.
        details: String,
    },
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderError::UnsupportedSource { label, source_kind } => {
                write!(f, "Shader '{label}' uses unsupported source kind '{source_kind}'")
            }
            ShaderError::EmptySource { label } => {
                write!(f, "Shader '{label}' has no code")
            }
            ShaderError::CompilationFailed { label, details } => {
                write!(f, "Shader compilation failed for '{label}': {details}")
            }
        }
    }
}

impl std::error::Error for ShaderError {}

/// An error related to the creation of a pipeline state object.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Neither a vertex nor a fragment stage was provided.
    NoShaderStages {
        /// Label of the pipeline.
        label: String,
    },
    /// The backend cannot build a pipeline without this stage.
    StageRequired {
        /// Label of the pipeline.
        label: String,
        /// The missing stage.
        stage: ShaderStage,
    },
    /// A shader handle is stale or used for the wrong stage.
    InvalidShaderModule {
        /// Label of the pipeline.
        label: String,
        /// The stage the module was provided for.
        stage: ShaderStage,
    },
    /// The merged layout needs more native binding groups than the backend offers.
    TooManyBindingGroups {
        /// Label of the pipeline.
        label: String,
        /// Groups needed.
        required: u32,
        /// Groups available.
        available: u32,
    },
    /// The pipeline layout could not be created.
    LayoutCreationFailed(String),
    /// The backend failed to compile the full pipeline state object.
    CompilationFailed {
        /// Label of the pipeline.
        label: String,
        /// Backend output.
        details: String,
    },
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::NoShaderStages { label } => {
                write!(f, "Pipeline '{label}' has neither a vertex nor a fragment stage")
            }
            PipelineError::StageRequired { label, stage } => {
                write!(f, "Pipeline '{label}' requires a {stage:?} stage on this backend")
            }
            PipelineError::InvalidShaderModule { label, stage } => {
                write!(f, "Invalid {stage:?} shader module for pipeline '{label}'")
            }
            PipelineError::TooManyBindingGroups {
                label,
                required,
                available,
            } => write!(
                f,
                "Pipeline '{label}' needs {required} binding groups but only {available} are available"
            ),
            PipelineError::LayoutCreationFailed(msg) => {
                write!(f, "Pipeline layout creation failed: {msg}")
            }
            PipelineError::CompilationFailed { label, details } => {
                write!(f, "Pipeline compilation failed for '{label}': {details}")
            }
        }
    }
}

impl std::error::Error for PipelineError {}

/// A rejected slot of a parameter block update.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotRejection {
    /// Binding slot.
    pub slot: u32,
    /// Why the slot was left empty.
    pub reason: ResourceError,
}

/// An error related to the creation or use of a GPU resource.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceError {
    /// The handle is stale, never issued, or the sentinel.
    InvalidHandle,
    /// A write or view exceeds the resource's allocated extent.
    OutOfBounds {
        /// Start of the access.
        offset: u64,
        /// Length of the access.
        size: u64,
        /// Allocated size.
        capacity: u64,
    },
    /// The backend has no implementation for this binding kind.
    UnimplementedResourceKind(ShaderResourceType),
    /// The native allocator failed.
    BackendAllocationFailure(String),
    /// The shared descriptor pool has no room left for this type.
    PoolExhausted {
        /// Exhausted resource type.
        kind: ShaderResourceType,
        /// Per-type capacity of the pool.
        capacity: u32,
    },
    /// A descriptor is malformed.
    InvalidDescriptor(String),
    /// Some slots of a parameter block update were left empty.
    SlotsRejected(Vec<SlotRejection>),
    /// A shader-specific error occurred.
    Shader(ShaderError),
    /// A pipeline-specific error occurred.
    Pipeline(PipelineError),
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::InvalidHandle => write!(f, "Invalid resource handle."),
            ResourceError::OutOfBounds {
                offset,
                size,
                capacity,
            } => write!(
                f,
                "Resource access out of bounds: {size} bytes at offset {offset} exceed capacity {capacity}."
            ),
            ResourceError::UnimplementedResourceKind(kind) => {
                write!(f, "Resource kind {kind} is not implemented by this backend.")
            }
            ResourceError::BackendAllocationFailure(msg) => {
                write!(f, "Backend allocation failed: {msg}")
            }
            ResourceError::PoolExhausted { kind, capacity } => {
                write!(f, "Descriptor pool exhausted for {kind} (capacity {capacity}).")
            }
            ResourceError::InvalidDescriptor(msg) => write!(f, "Invalid descriptor: {msg}"),
            ResourceError::SlotsRejected(rejections) => {
                write!(f, "{} parameter block slot(s) left empty:", rejections.len())?;
                for rejection in rejections {
                    write!(f, " [slot {}: {}]", rejection.slot, rejection.reason)?;
                }
                Ok(())
            }
            ResourceError::Shader(err) => write!(f, "Shader resource error: {err}"),
            ResourceError::Pipeline(err) => write!(f, "Pipeline resource error: {err}"),
        }
    }
}

impl std::error::Error for ResourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResourceError::Shader(err) => Some(err),
            ResourceError::Pipeline(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ShaderError> for ResourceError {
    fn from(err: ShaderError) -> Self {
        ResourceError::Shader(err)
    }
}

impl From<PipelineError> for ResourceError {
    fn from(err: PipelineError) -> Self {
        ResourceError::Pipeline(err)
    }
}

/// A misuse of a command list caught while recording.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordingError {
    /// The list is not in the `Recording` state.
    InvalidRecordingState {
        /// The verb that was called.
        verb: &'static str,
        /// State the list was in.
        state: CommandListState,
    },
    /// The verb needs a bound pipeline.
    NoPipelineBound {
        /// The verb that was called.
        verb: &'static str,
    },
    /// The pipeline handle is stale.
    InvalidPipeline,
    /// The bound pipeline declares no binding set at this index.
    SetNotInLayout {
        /// Requested set index.
        set_index: u32,
    },
    /// The parameter block was built for a different layout than the pipeline's.
    LayoutMismatch {
        /// Requested set index.
        set_index: u32,
    },
    /// A resource handle passed to a verb is stale.
    InvalidResource(&'static str),
    /// Push constants exceed the pipeline's declared range.
    PushConstantsTooLarge {
        /// Bytes provided.
        size: usize,
        /// Declared range.
        capacity: u32,
    },
    /// A draw was recorded before any viewport was set in this pass.
    ViewportNotSet,
    /// A draw was recorded before any scissor was set in this pass.
    ScissorNotSet,
    /// The verb is not allowed on this kind of list.
    WrongListKind {
        /// The verb that was called.
        verb: &'static str,
        /// Kind of the list.
        kind: CommandListKind,
    },
    /// An indexed draw was recorded before an index buffer was bound.
    IndexBufferNotSet,
    /// A buffer offset or copy range exceeds the buffer's extent.
    BufferRangeOutOfBounds,
}

impl fmt::Display for RecordingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordingError::InvalidRecordingState { verb, state } => {
                write!(f, "Cannot record '{verb}' on a command list in state {state:?}")
            }
            RecordingError::NoPipelineBound { verb } => {
                write!(f, "'{verb}' requires a bound pipeline")
            }
            RecordingError::InvalidPipeline => write!(f, "Invalid pipeline handle"),
            RecordingError::SetNotInLayout { set_index } => {
                write!(f, "Bound pipeline has no binding set {set_index}")
            }
            RecordingError::LayoutMismatch { set_index } => write!(
                f,
                "Parameter block layout does not match the bound pipeline's set {set_index}"
            ),
            RecordingError::InvalidResource(what) => write!(f, "Invalid {what} handle"),
            RecordingError::PushConstantsTooLarge { size, capacity } => write!(
                f,
                "Push constants of {size} bytes exceed the declared range of {capacity} bytes"
            ),
            RecordingError::ViewportNotSet => write!(f, "Draw recorded before a viewport was set"),
            RecordingError::ScissorNotSet => write!(f, "Draw recorded before a scissor was set"),
            RecordingError::WrongListKind { verb, kind } => {
                write!(f, "'{verb}' is not allowed on a {kind:?} command list")
            }
            RecordingError::IndexBufferNotSet => {
                write!(f, "Indexed draw recorded before an index buffer was bound")
            }
            RecordingError::BufferRangeOutOfBounds => write!(f, "Buffer range out of bounds"),
        }
    }
}

impl std::error::Error for RecordingError {}

/// Top-level error for device, swapchain and submission operations.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderError {
    /// The operation needs a state the device has not reached.
    InvalidState {
        /// What was attempted.
        operation: &'static str,
        /// Current state.
        state: GraphicsState,
    },
    /// The configuration is invalid.
    InvalidConfig(String),
    /// Instance, adapter or device creation failed.
    InitializationFailed(String),
    /// The surface cannot be rendered to right now (minimized, lost, outdated).
    SurfaceUnavailable(String),
    /// Submitting work to a queue failed.
    SubmissionFailed(String),
    /// A frame is already being recorded.
    FrameInProgress,
    /// A timeline wait timed out.
    Timeout,
    /// The device was lost or a native call failed irrecoverably.
    FatalNativeError(String),
    /// A resource error surfaced during a device operation.
    Resource(ResourceError),
    /// A recording error surfaced during submission.
    Recording(RecordingError),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::InvalidState { operation, state } => {
                write!(f, "Cannot {operation} while the device is in state {state:?}")
            }
            RenderError::InvalidConfig(msg) => write!(f, "Invalid graphics configuration: {msg}"),
            RenderError::InitializationFailed(msg) => {
                write!(f, "Graphics initialization failed: {msg}")
            }
            RenderError::SurfaceUnavailable(msg) => write!(f, "Surface unavailable: {msg}"),
            RenderError::SubmissionFailed(msg) => write!(f, "Queue submission failed: {msg}"),
            RenderError::FrameInProgress => write!(f, "A frame is already being recorded"),
            RenderError::Timeout => write!(f, "Timed out waiting for the GPU"),
            RenderError::FatalNativeError(msg) => write!(f, "Fatal native error: {msg}"),
            RenderError::Resource(err) => write!(f, "Resource error: {err}"),
            RenderError::Recording(err) => write!(f, "Recording error: {err}"),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Resource(err) => Some(err),
            RenderError::Recording(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ResourceError> for RenderError {
    fn from(err: ResourceError) -> Self {
        RenderError::Resource(err)
    }
}

impl From<RecordingError> for RenderError {
    fn from(err: RecordingError) -> Self {
        RenderError::Recording(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_bounds_display() {
        let err = ResourceError::OutOfBounds {
            offset: 224,
            size: 64,
            capacity: 256,
        };
        assert_eq!(
            format!("{err}"),
            "Resource access out of bounds: 64 bytes at offset 224 exceed capacity 256."
        );
    }

    #[test]
    fn slots_rejected_lists_every_slot() {
        let err = ResourceError::SlotsRejected(vec![
            SlotRejection {
                slot: 1,
                reason: ResourceError::InvalidHandle,
            },
            SlotRejection {
                slot: 3,
                reason: ResourceError::UnimplementedResourceKind(ShaderResourceType::RWImage),
            },
        ]);
        let text = format!("{err}");
        assert!(text.starts_with("2 parameter block slot(s) left empty:"));
        assert!(text.contains("[slot 1: Invalid resource handle.]"));
        assert!(text.contains("RWImage is not implemented"));
    }

    #[test]
    fn shader_error_wraps_into_resource_and_render_errors() {
        let shader = ShaderError::CompilationFailed {
            label: "triangle".into(),
            details: "unexpected token".into(),
        };
        let resource: ResourceError = shader.clone().into();
        assert_eq!(
            format!("{resource}"),
            "Shader resource error: Shader compilation failed for 'triangle': unexpected token"
        );
        let render: RenderError = resource.into();
        assert!(std::error::Error::source(&render).is_some());
    }

    #[test]
    fn recording_error_display() {
        let err = RecordingError::NoPipelineBound { verb: "draw" };
        assert_eq!(format!("{err}"), "'draw' requires a bound pipeline");

        let err = RecordingError::PushConstantsTooLarge {
            size: 80,
            capacity: 64,
        };
        assert_eq!(
            format!("{err}"),
            "Push constants of 80 bytes exceed the declared range of 64 bytes"
        );
    }
}
