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

//! Native resource records and their creation.

use super::conversions::{
    binding_visibility, sampler_descriptor, IntoWgpu, SAMPLER_BINDING_OFFSET,
    STORAGE_IMAGE_FORMAT,
};
use mercury_core::rhi::{
    BindingSetLayoutDescriptor, BindingSlot, BufferDescriptor, ParameterBlockLayoutHandle,
    ResourceError, SamplerDescriptor, ShaderError, ShaderModuleDescriptor, ShaderResourceType,
    ShaderSource, ShaderStage, TextureDescriptor, TextureFormat, TextureUsage,
};
use std::collections::HashMap;
use std::num::NonZeroU64;

/// Buffer sizes are padded to this alignment; write offsets and lengths must respect it.
pub const COPY_ALIGNMENT: u64 = wgpu::COPY_BUFFER_ALIGNMENT;

/// Rounds `size` up to [`COPY_ALIGNMENT`], with a minimum of one unit.
pub fn aligned_size(size: u64) -> u64 {
    size.max(1).div_ceil(COPY_ALIGNMENT) * COPY_ALIGNMENT
}

/// Runs a WGPU call inside a validation error scope and returns what the
/// scope caught.
pub fn validated<T>(device: &wgpu::Device, create: impl FnOnce() -> T) -> Result<T, String> {
    let scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = create();
    match pollster::block_on(scope.pop()) {
        None => Ok(value),
        Some(err) => Err(err.to_string()),
    }
}

// --- Buffers ---

#[derive(Debug)]
pub struct BufferEntry {
    pub buffer: wgpu::Buffer,
}

pub fn create_buffer(
    device: &wgpu::Device,
    desc: &BufferDescriptor<'_>,
) -> Result<BufferEntry, ResourceError> {
    let size = aligned_size(desc.size);
    let initial = desc.initial_data.as_deref();
    let buffer = validated(device, || {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: desc.label.as_deref(),
            size,
            usage: desc.usage.into_wgpu(),
            mapped_at_creation: initial.is_some(),
        })
    })
    .map_err(ResourceError::BackendAllocationFailure)?;

    if let Some(data) = initial {
        {
            let mut mapped = buffer.slice(..).get_mapped_range_mut();
            mapped[..data.len()].copy_from_slice(data);
        }
        buffer.unmap();
    }
    Ok(BufferEntry { buffer })
}

// --- Textures ---

#[derive(Debug)]
pub struct TextureEntry {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub format: TextureFormat,
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
}

pub fn create_texture(
    device: &wgpu::Device,
    desc: &TextureDescriptor<'_>,
) -> Result<TextureEntry, ResourceError> {
    if desc.usage.contains(TextureUsage::STORAGE) && desc.format.into_wgpu() != STORAGE_IMAGE_FORMAT
    {
        return Err(ResourceError::InvalidDescriptor(format!(
            "storage textures must use {STORAGE_IMAGE_FORMAT:?}, got {:?}",
            desc.format
        )));
    }
    let texture = validated(device, || {
        device.create_texture(&wgpu::TextureDescriptor {
            label: desc.label.as_deref(),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: desc.mip_levels.max(1),
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: desc.format.into_wgpu(),
            usage: desc.usage.into_wgpu(),
            view_formats: &[],
        })
    })
    .map_err(ResourceError::BackendAllocationFailure)?;
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    Ok(TextureEntry {
        texture,
        view,
        format: desc.format,
        width: desc.width,
        height: desc.height,
        mip_levels: desc.mip_levels.max(1),
    })
}

/// Uploads the full contents of one mip level.
pub fn write_texture_level(
    queue: &wgpu::Queue,
    entry: &TextureEntry,
    mip_level: u32,
    data: &[u8],
) -> Result<(), ResourceError> {
    if entry.format.is_depth() {
        return Err(ResourceError::InvalidDescriptor(format!(
            "depth texture {:?} cannot be uploaded from the CPU",
            entry.format
        )));
    }
    let bytes_per_texel = entry.format.bytes_per_texel().ok_or_else(|| {
        ResourceError::InvalidDescriptor(format!("{:?} has no fixed texel size", entry.format))
    })?;
    if mip_level >= entry.mip_levels {
        return Err(ResourceError::InvalidDescriptor(format!(
            "mip level {mip_level} out of range ({} levels)",
            entry.mip_levels
        )));
    }
    let width = (entry.width >> mip_level).max(1);
    let height = (entry.height >> mip_level).max(1);
    let expected = u64::from(width) * u64::from(height) * u64::from(bytes_per_texel);
    if data.len() as u64 != expected {
        return Err(ResourceError::OutOfBounds {
            offset: 0,
            size: data.len() as u64,
            capacity: expected,
        });
    }

    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &entry.texture,
            mip_level,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(width * bytes_per_texel),
            rows_per_image: Some(height),
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    Ok(())
}

// --- Shaders ---

#[derive(Debug)]
pub struct ShaderEntry {
    pub module: wgpu::ShaderModule,
    pub stage: ShaderStage,
}

pub fn create_shader_module(
    device: &wgpu::Device,
    desc: &ShaderModuleDescriptor<'_>,
) -> Result<ShaderEntry, ShaderError> {
    let label = desc.display_label().to_owned();
    let ShaderSource::Wgsl(code) = &desc.source else {
        return Err(ShaderError::UnsupportedSource {
            label,
            source_kind: desc.source.kind_name(),
        });
    };
    let module = validated(device, || {
        device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: desc.label.as_deref(),
            source: wgpu::ShaderSource::Wgsl(code.clone()),
        })
    })
    .map_err(|details| ShaderError::CompilationFailed { label, details })?;

    Ok(ShaderEntry {
        module,
        stage: desc.stage,
    })
}

// --- Parameter blocks ---

#[derive(Debug)]
pub struct LayoutEntry {
    pub layout: wgpu::BindGroupLayout,
    pub set_index: u32,
    pub slots: Vec<BindingSlot>,
}

pub fn create_bind_group_layout(
    device: &wgpu::Device,
    set_index: u32,
    desc: &BindingSetLayoutDescriptor,
) -> Result<LayoutEntry, ResourceError> {
    let mut entries = Vec::with_capacity(desc.slots.len() + 1);
    for slot in &desc.slots {
        if slot.slot >= SAMPLER_BINDING_OFFSET {
            return Err(ResourceError::InvalidDescriptor(format!(
                "binding slot {} is out of range (max {})",
                slot.slot,
                SAMPLER_BINDING_OFFSET - 1
            )));
        }
        let visibility = binding_visibility(slot.kind);
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: slot.slot,
            visibility,
            ty: slot.kind.into_wgpu(),
            count: None,
        });
        if slot.kind == ShaderResourceType::SampledImage2D {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: slot.slot + SAMPLER_BINDING_OFFSET,
                visibility,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            });
        }
    }

    let label = format!("Mercury Set {set_index} Layout");
    let layout = validated(device, || {
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(&label),
            entries: &entries,
        })
    })
    .map_err(ResourceError::BackendAllocationFailure)?;

    Ok(LayoutEntry {
        layout,
        set_index,
        slots: desc.slots.clone(),
    })
}

#[derive(Debug)]
pub struct BlockEntry {
    pub layout: ParameterBlockLayoutHandle,
    pub bind_group: wgpu::BindGroup,
}

/// A slot write with its native objects looked up.
#[derive(Debug, Clone)]
pub enum ResolvedSlot {
    Buffer {
        buffer: wgpu::Buffer,
        offset: u64,
        size: Option<NonZeroU64>,
    },
    Texture {
        view: wgpu::TextureView,
        sampler: wgpu::Sampler,
    },
    StorageImage {
        view: wgpu::TextureView,
    },
    Empty,
}

/// Stand-ins bound to slots left empty, since WGPU bind groups must be complete.
#[derive(Debug)]
pub struct DummyResources {
    buffer: wgpu::Buffer,
    texture_view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    storage_view: wgpu::TextureView,
}

impl DummyResources {
    pub fn new(device: &wgpu::Device) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Mercury Dummy Buffer"),
            size: 256,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::STORAGE,
            mapped_at_creation: false,
        });
        let texture_view = Self::texture(
            device,
            "Mercury Dummy Texture",
            wgpu::TextureFormat::Rgba8Unorm,
            wgpu::TextureUsages::TEXTURE_BINDING,
        );
        let storage_view = Self::texture(
            device,
            "Mercury Dummy Storage Image",
            STORAGE_IMAGE_FORMAT,
            wgpu::TextureUsages::STORAGE_BINDING,
        );
        let sampler = device.create_sampler(&sampler_descriptor(&SamplerDescriptor::default()));
        Self {
            buffer,
            texture_view,
            sampler,
            storage_view,
        }
    }

    fn texture(
        device: &wgpu::Device,
        label: &str,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> wgpu::TextureView {
        device
            .create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width: 1,
                    height: 1,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage,
                view_formats: &[],
            })
            .create_view(&wgpu::TextureViewDescriptor::default())
    }
}

/// Samplers are immutable and shared by every binding with the same state.
#[derive(Debug, Default)]
pub struct SamplerCache {
    samplers: HashMap<SamplerDescriptor, wgpu::Sampler>,
}

impl SamplerCache {
    pub fn get_or_create(
        &mut self,
        device: &wgpu::Device,
        desc: &SamplerDescriptor,
    ) -> wgpu::Sampler {
        self.samplers
            .entry(*desc)
            .or_insert_with(|| device.create_sampler(&sampler_descriptor(desc)))
            .clone()
    }

    pub fn clear(&mut self) {
        self.samplers.clear();
    }
}

/// Builds a complete bind group for `layout`, one resolved write per slot.
pub fn create_bind_group(
    device: &wgpu::Device,
    layout: &LayoutEntry,
    resolved: &[ResolvedSlot],
    dummies: &DummyResources,
) -> Result<wgpu::BindGroup, ResourceError> {
    let mut entries = Vec::with_capacity(layout.slots.len() + 1);
    for (slot, write) in layout.slots.iter().zip(resolved) {
        let binding = slot.slot;
        match (slot.kind, write) {
            (_, ResolvedSlot::Buffer { buffer, offset, size }) => {
                entries.push(wgpu::BindGroupEntry {
                    binding,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer,
                        offset: *offset,
                        size: *size,
                    }),
                });
            }
            (_, ResolvedSlot::Texture { view, sampler }) => {
                entries.push(wgpu::BindGroupEntry {
                    binding,
                    resource: wgpu::BindingResource::TextureView(view),
                });
                entries.push(wgpu::BindGroupEntry {
                    binding: binding + SAMPLER_BINDING_OFFSET,
                    resource: wgpu::BindingResource::Sampler(sampler),
                });
            }
            (_, ResolvedSlot::StorageImage { view }) => {
                entries.push(wgpu::BindGroupEntry {
                    binding,
                    resource: wgpu::BindingResource::TextureView(view),
                });
            }
            (ShaderResourceType::SampledImage2D, ResolvedSlot::Empty) => {
                entries.push(wgpu::BindGroupEntry {
                    binding,
                    resource: wgpu::BindingResource::TextureView(&dummies.texture_view),
                });
                entries.push(wgpu::BindGroupEntry {
                    binding: binding + SAMPLER_BINDING_OFFSET,
                    resource: wgpu::BindingResource::Sampler(&dummies.sampler),
                });
            }
            (ShaderResourceType::RWImage, ResolvedSlot::Empty) => {
                entries.push(wgpu::BindGroupEntry {
                    binding,
                    resource: wgpu::BindingResource::TextureView(&dummies.storage_view),
                });
            }
            (_, ResolvedSlot::Empty) => {
                entries.push(wgpu::BindGroupEntry {
                    binding,
                    resource: dummies.buffer.as_entire_binding(),
                });
            }
        }
    }

    let label = format!("Mercury Set {} Block", layout.set_index);
    validated(device, || {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&label),
            layout: &layout.layout,
            entries: &entries,
        })
    })
    .map_err(ResourceError::BackendAllocationFailure)
}

// --- Push constants ---

/// Bytes reserved per push-constant write; also the largest range accepted.
pub const PUSH_CONSTANT_STRIDE: u64 = 256;

/// Push constants emulated with a dynamically offset uniform buffer.
///
/// Slot 0 stays zeroed so a pipeline can be drawn before anything was pushed;
/// every push of a submission gets its own slot after it.
#[derive(Debug)]
pub struct PushConstantArena {
    pub layout: wgpu::BindGroupLayout,
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    slots: u64,
}

impl PushConstantArena {
    const INITIAL_SLOTS: u64 = 64;

    pub fn new(device: &wgpu::Device) -> Self {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Mercury Push Constant Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(PUSH_CONSTANT_STRIDE),
                },
                count: None,
            }],
        });
        let (buffer, bind_group) = Self::allocate(device, &layout, Self::INITIAL_SLOTS);
        Self {
            layout,
            buffer,
            bind_group,
            slots: Self::INITIAL_SLOTS,
        }
    }

    fn allocate(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        slots: u64,
    ) -> (wgpu::Buffer, wgpu::BindGroup) {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Mercury Push Constants"),
            size: slots * PUSH_CONSTANT_STRIDE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Mercury Push Constant Group"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: NonZeroU64::new(PUSH_CONSTANT_STRIDE),
                }),
            }],
        });
        (buffer, bind_group)
    }

    /// Stages the pushes of one submission and returns their dynamic offsets,
    /// in recording order.
    pub fn stage(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        pushes: &[&[u8]],
    ) -> Vec<u32> {
        if pushes.is_empty() {
            return Vec::new();
        }
        let needed = pushes.len() as u64 + 1;
        if needed > self.slots {
            let slots = needed.next_power_of_two();
            log::debug!("WgpuBackend: growing push-constant arena to {slots} slots.");
            let (buffer, bind_group) = Self::allocate(device, &self.layout, slots);
            self.buffer = buffer;
            self.bind_group = bind_group;
            self.slots = slots;
        }

        let stride = PUSH_CONSTANT_STRIDE as usize;
        let mut staging = vec![0u8; needed as usize * stride];
        let mut offsets = Vec::with_capacity(pushes.len());
        for (i, bytes) in pushes.iter().enumerate() {
            let start = (i + 1) * stride;
            let len = bytes.len().min(stride);
            staging[start..start + len].copy_from_slice(&bytes[..len]);
            offsets.push(start as u32);
        }
        queue.write_buffer(&self.buffer, 0, &staging);
        offsets
    }

    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_round_up_to_copy_units() {
        assert_eq!(aligned_size(0), 4);
        assert_eq!(aligned_size(3), 4);
        assert_eq!(aligned_size(4), 4);
        assert_eq!(aligned_size(13), 16);
    }

    fn test_device() -> Option<wgpu::Device> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::LowPower,
            compatible_surface: None,
            force_fallback_adapter: true,
        }))
        .ok()?;
        let (device, _queue) =
            pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor::default())).ok()?;
        Some(device)
    }

    #[test]
    fn validation_errors_are_returned_instead_of_raised() {
        let Some(device) = test_device() else {
            eprintln!("skipping validation scope test: no wgpu adapter available");
            return;
        };

        let invalid = validated(&device, || {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("map read vertex"),
                size: 16,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::VERTEX,
                mapped_at_creation: false,
            })
        });
        assert!(invalid.is_err());

        let valid = validated(&device, || {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("vertex"),
                size: 16,
                usage: wgpu::BufferUsages::VERTEX,
                mapped_at_creation: false,
            })
        });
        assert!(valid.is_ok());
    }
}
