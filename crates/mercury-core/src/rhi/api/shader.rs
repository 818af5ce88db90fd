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

//! Shader module descriptions. Bytecode is opaque to the core.

use std::borrow::Cow;

/// Pipeline stage a module is compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex stage.
    Vertex,
    /// Fragment stage.
    Fragment,
    /// Compute stage.
    Compute,
}

/// Shader code in one of the forms a backend may accept.
#[derive(Debug, Clone)]
pub enum ShaderSource<'a> {
    /// WGSL source text.
    Wgsl(Cow<'a, str>),
    /// SPIR-V words.
    SpirV(Cow<'a, [u32]>),
    /// A native blob (DXIL, metallib, ...), passed through untouched.
    Native(Cow<'a, [u8]>),
}

impl ShaderSource<'_> {
    /// Short name of the source kind, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            ShaderSource::Wgsl(_) => "wgsl",
            ShaderSource::SpirV(_) => "spirv",
            ShaderSource::Native(_) => "native",
        }
    }

    /// Returns `true` if there is no code at all.
    pub fn is_empty(&self) -> bool {
        match self {
            ShaderSource::Wgsl(s) => s.trim().is_empty(),
            ShaderSource::SpirV(words) => words.is_empty(),
            ShaderSource::Native(bytes) => bytes.is_empty(),
        }
    }
}

/// The entry point used when a descriptor does not name one.
pub const DEFAULT_ENTRY_POINT: &str = "main";

/// A descriptor used to create or update a shader module.
#[derive(Debug, Clone)]
pub struct ShaderModuleDescriptor<'a> {
    /// Debug label.
    pub label: Option<Cow<'a, str>>,
    /// Stage this module is used for.
    pub stage: ShaderStage,
    /// Code.
    pub source: ShaderSource<'a>,
    /// Entry point name.
    pub entry_point: Cow<'a, str>,
}

impl<'a> ShaderModuleDescriptor<'a> {
    /// A WGSL module using the default entry point.
    pub fn wgsl(stage: ShaderStage, source: impl Into<Cow<'a, str>>) -> Self {
        Self {
            label: None,
            stage,
            source: ShaderSource::Wgsl(source.into()),
            entry_point: Cow::Borrowed(DEFAULT_ENTRY_POINT),
        }
    }

    /// Sets the entry point.
    pub fn with_entry_point(mut self, entry_point: impl Into<Cow<'a, str>>) -> Self {
        self.entry_point = entry_point.into();
        self
    }

    /// Sets the debug label.
    pub fn with_label(mut self, label: impl Into<Cow<'a, str>>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// The label, or a placeholder for diagnostics.
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or("<unnamed shader>")
    }
}
