//! GPU implementation of [`ComputeBackend`] built on [`wgpu`].
//!
//! The `WgpuBackend` compiles the WGSL kernels once per kernel and keeps them
//! in a pipeline cache. Textures live on the device and are addressed through
//! [`ResourceHandle`]s. Every submission is followed by a blocking poll, so a
//! call returns only after the device has finished the work it recorded.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use wgpu::util::DeviceExt;

use crate::layout::{self, BindingKind};
use crate::{
    Binding, ComputeBackend, ComputeError, Kernel, ResourceHandle, TextureDesc, TextureDimension,
    TextureFormat, TextureUsage,
};

struct GpuTexture {
    desc: TextureDesc,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    textures: HashMap<ResourceHandle, GpuTexture>,
}

pub struct WgpuBackend {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    registry: Mutex<Registry>,
    // Pipeline cache - Mutex for interior mutability with &self in dispatch
    pipelines: Mutex<HashMap<std::mem::Discriminant<Kernel>, Arc<CachedPipeline>>>,
}

struct CachedPipeline {
    layout: wgpu::BindGroupLayout,
    pipeline: wgpu::ComputePipeline,
}

/// Provides the WGSL shader source associated with the kernel.
fn to_shader_source(kernel: &Kernel) -> &'static str {
    match kernel {
        Kernel::RayMarch => include_str!("../../../shaders/ray_march.wgsl"),
    }
}

fn kernel_name(kernel: &Kernel) -> &'static str {
    match kernel {
        Kernel::RayMarch => "ray_march",
    }
}

const fn wgpu_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::R32Float => wgpu::TextureFormat::R32Float,
        TextureFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
    }
}

const fn wgpu_view_dimension(dimension: TextureDimension) -> wgpu::TextureViewDimension {
    match dimension {
        TextureDimension::D2 => wgpu::TextureViewDimension::D2,
        TextureDimension::D3 => wgpu::TextureViewDimension::D3,
    }
}

fn wgpu_usage(usage: TextureUsage) -> wgpu::TextureUsages {
    // Every texture can be read back, which the tests and the capture path rely on.
    let common = wgpu::TextureUsages::COPY_SRC | wgpu::TextureUsages::COPY_DST;
    match usage {
        TextureUsage::Sampled => common | wgpu::TextureUsages::TEXTURE_BINDING,
        TextureUsage::Storage => common | wgpu::TextureUsages::STORAGE_BINDING,
        TextureUsage::Destination => common,
    }
}

fn layout_entry(binding: u32, kind: BindingKind) -> wgpu::BindGroupLayoutEntry {
    let ty = match kind {
        BindingKind::Uniform { .. } => wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        BindingKind::Texture { dimension, .. } => wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
            view_dimension: wgpu_view_dimension(dimension),
            multisampled: false,
        },
        BindingKind::StorageTexture { format } => wgpu::BindingType::StorageTexture {
            access: wgpu::StorageTextureAccess::WriteOnly,
            format: wgpu_format(format),
            view_dimension: wgpu::TextureViewDimension::D2,
        },
    };
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty,
        count: None,
    }
}

/// Whether `desc` fits the texture dimension limits of the device.
fn fits_limits(desc: &TextureDesc, limits: &wgpu::Limits) -> bool {
    let max = match desc.dimension {
        TextureDimension::D2 => limits.max_texture_dimension_2d,
        TextureDimension::D3 => limits.max_texture_dimension_3d,
    };
    let depth_ok = match desc.dimension {
        TextureDimension::D2 => desc.size.depth == 1,
        TextureDimension::D3 => desc.size.depth <= max,
    };
    desc.size.width <= max && desc.size.height <= max && depth_ok
}

/// Bytes per row of a read-back buffer, padded to the copy alignment.
fn padded_bytes_per_row(desc: &TextureDesc) -> u32 {
    let unpadded = desc.size.width * desc.format.bytes_per_texel();
    unpadded.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT) * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT
}

impl WgpuBackend {
    /// Creates a backend on the adapter selected by `WGPU_BACKEND` and
    /// `WGPU_ADAPTER_NAME`, or the system default.
    ///
    /// # Errors
    ///
    /// `ComputeError::BackendUnavailable` when no adapter or device can be
    /// obtained.
    pub fn try_new() -> Result<Self, ComputeError> {
        let backends = wgpu::util::backend_bits_from_env().unwrap_or_else(wgpu::Backends::all);
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends,
            ..Default::default()
        });
        let adapter = pollster::block_on(wgpu::util::initialize_adapter_from_env_or_default(
            &instance,
            None,
        ))
        .ok_or(ComputeError::BackendUnavailable)?;
        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("voxel-device"),
                required_features: wgpu::Features::empty(),
                required_limits: adapter.limits(),
            },
            None,
        ))
        .map_err(|_| ComputeError::BackendUnavailable)?;

        tracing::info!(
            adapter = %adapter.get_info().name,
            max_2d = device.limits().max_texture_dimension_2d,
            max_3d = device.limits().max_texture_dimension_3d,
            "wgpu device ready"
        );

        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            registry: Mutex::new(Registry::default()),
            pipelines: Mutex::new(HashMap::new()),
        })
    }

    fn pipeline(&self, kernel: &Kernel) -> Arc<CachedPipeline> {
        let mut pipelines = self.pipelines.lock();
        pipelines
            .entry(std::mem::discriminant(kernel))
            .or_insert_with(|| {
                let shader = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(kernel_name(kernel)),
                    source: wgpu::ShaderSource::Wgsl(to_shader_source(kernel).into()),
                });
                let entries: Vec<_> = layout::binding_kinds(kernel)
                    .iter()
                    .zip(0u32..)
                    .map(|(kind, slot)| layout_entry(slot, *kind))
                    .collect();
                let layout = self.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some(kernel_name(kernel)),
                    entries: &entries,
                });
                let pipeline_layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: Some(kernel_name(kernel)),
                    bind_group_layouts: &[&layout],
                    push_constant_ranges: &[],
                });
                let pipeline = self.device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                    label: Some(kernel_name(kernel)),
                    layout: Some(&pipeline_layout),
                    module: &shader,
                    entry_point: "main",
                });
                tracing::debug!(kernel = kernel_name(kernel), "compiled pipeline");
                Arc::new(CachedPipeline { layout, pipeline })
            })
            .clone()
    }

    fn wait(&self) {
        self.device.poll(wgpu::Maintain::Wait);
    }
}

impl ComputeBackend for WgpuBackend {
    fn create_texture(
        &self,
        desc: &TextureDesc,
        texels: Option<&[f32]>,
    ) -> Result<ResourceHandle, ComputeError> {
        let expected = desc.float_count();
        if let Some(src) = texels {
            if src.len() != expected {
                return Err(ComputeError::TexelCount { expected, actual: src.len() });
            }
        }
        if desc.size.is_empty() || !fits_limits(desc, &self.device.limits()) {
            tracing::warn!(label = %desc.label, size = ?desc.size, "texture allocation rejected");
            return Err(ComputeError::Allocation {
                label: desc.label.clone(),
                width: desc.size.width,
                height: desc.size.height,
                depth: desc.size.depth,
            });
        }

        let size = wgpu::Extent3d {
            width: desc.size.width,
            height: desc.size.height,
            depth_or_array_layers: desc.size.depth,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&desc.label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: match desc.dimension {
                TextureDimension::D2 => wgpu::TextureDimension::D2,
                TextureDimension::D3 => wgpu::TextureDimension::D3,
            },
            format: wgpu_format(desc.format),
            usage: wgpu_usage(desc.usage),
            view_formats: &[],
        });

        if let Some(src) = texels {
            self.queue.write_texture(
                wgpu::ImageCopyTexture {
                    texture: &texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                bytemuck::cast_slice(src),
                wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(desc.size.width * desc.format.bytes_per_texel()),
                    rows_per_image: Some(desc.size.height),
                },
                size,
            );
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mut registry = self.registry.lock();
        registry.next_id += 1;
        let handle = ResourceHandle(registry.next_id);
        registry.textures.insert(handle, GpuTexture { desc: desc.clone(), texture, view });
        tracing::debug!(?handle, label = %desc.label, "created texture");
        Ok(handle)
    }

    fn release(&self, handle: ResourceHandle) -> Result<(), ComputeError> {
        let entry = self.registry.lock().textures.remove(&handle).ok_or(ComputeError::UnknownHandle(handle))?;
        entry.texture.destroy();
        Ok(())
    }

    fn dispatch(
        &self,
        kernel: &Kernel,
        binds: &[Binding],
        workgroups: [u32; 3],
    ) -> Result<(), ComputeError> {
        let registry = self.registry.lock();
        layout::validate_binds(kernel, binds, |h| registry.textures.get(&h).map(|t| t.desc.clone()))?;
        let cached = self.pipeline(kernel);

        let mut uniforms = Vec::new();
        for bind in binds {
            if let Binding::Uniform(view) = bind {
                uniforms.push(self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("params"),
                    contents: &view.data,
                    usage: wgpu::BufferUsages::UNIFORM,
                }));
            }
        }

        let mut uniform_iter = uniforms.iter();
        let mut entries = Vec::with_capacity(binds.len());
        for (bind, slot) in binds.iter().zip(0u32..) {
            let resource = match bind {
                Binding::Uniform(_) => uniform_iter
                    .next()
                    .ok_or(ComputeError::ShapeMismatch("uniform buffer"))?
                    .as_entire_binding(),
                Binding::Texture(h) | Binding::StorageTexture(h) => {
                    let texture = registry.textures.get(h).ok_or(ComputeError::UnknownHandle(*h))?;
                    wgpu::BindingResource::TextureView(&texture.view)
                }
            };
            entries.push(wgpu::BindGroupEntry { binding: slot, resource });
        }

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(kernel_name(kernel)),
            layout: &cached.layout,
            entries: &entries,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(kernel_name(kernel)) });
        {
            let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(kernel_name(kernel)),
                timestamp_writes: None,
            });
            cpass.set_pipeline(&cached.pipeline);
            cpass.set_bind_group(0, &bind_group, &[]);
            cpass.dispatch_workgroups(workgroups[0], workgroups[1], workgroups[2]);
        }
        self.queue.submit(Some(encoder.finish()));
        drop(registry);
        self.wait();
        Ok(())
    }

    fn copy_texture(&self, src: ResourceHandle, dst: ResourceHandle) -> Result<(), ComputeError> {
        let registry = self.registry.lock();
        let source = registry.textures.get(&src).ok_or(ComputeError::UnknownHandle(src))?;
        let target = registry.textures.get(&dst).ok_or(ComputeError::UnknownHandle(dst))?;
        if source.desc.size != target.desc.size {
            return Err(ComputeError::ExtentMismatch { src: source.desc.size, dst: target.desc.size });
        }
        if source.desc.format != target.desc.format {
            return Err(ComputeError::ShapeMismatch("copy between different texture formats"));
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("present copy") });
        encoder.copy_texture_to_texture(
            source.texture.as_image_copy(),
            target.texture.as_image_copy(),
            source.texture.size(),
        );
        self.queue.submit(Some(encoder.finish()));
        drop(registry);
        self.wait();
        Ok(())
    }

    fn read_texture(&self, handle: ResourceHandle) -> Result<Vec<f32>, ComputeError> {
        let registry = self.registry.lock();
        let entry = registry.textures.get(&handle).ok_or(ComputeError::UnknownHandle(handle))?;
        let desc = entry.desc.clone();
        let padded = padded_bytes_per_row(&desc);
        let rows = desc.size.height * desc.size.depth;

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("read back"),
            size: u64::from(padded) * u64::from(rows),
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("read back") });
        encoder.copy_texture_to_buffer(
            entry.texture.as_image_copy(),
            wgpu::ImageCopyBuffer {
                buffer: &staging,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(desc.size.height),
                },
            },
            entry.texture.size(),
        );
        self.queue.submit(Some(encoder.finish()));
        drop(registry);

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            // The receiver outlives the poll below; a send failure cannot happen.
            let _ = tx.send(result);
        });
        self.wait();
        rx.recv()
            .map_err(|e| ComputeError::Device(e.to_string()))?
            .map_err(|e| ComputeError::Device(e.to_string()))?;

        let unpadded = (desc.size.width * desc.format.bytes_per_texel()) as usize;
        let mut out = Vec::with_capacity(desc.float_count());
        {
            let mapped = slice.get_mapped_range();
            for row in mapped.chunks(padded as usize) {
                out.extend(
                    row[..unpadded]
                        .chunks_exact(4)
                        .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]])),
                );
            }
        }
        staging.unmap();
        Ok(out)
    }

    fn describe(&self, handle: ResourceHandle) -> Option<TextureDesc> {
        self.registry.lock().textures.get(&handle).map(|t| t.desc.clone())
    }

    fn name(&self) -> &'static str {
        "wgpu"
    }
}

impl Drop for WgpuBackend {
    fn drop(&mut self) {
        for (_, entry) in self.registry.get_mut().textures.drain() {
            entry.texture.destroy();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_bound_each_dimension() {
        let limits = wgpu::Limits::downlevel_defaults();
        let max_2d = limits.max_texture_dimension_2d;
        let max_3d = limits.max_texture_dimension_3d;

        let fits = TextureDesc::image_2d("t", max_2d, 16, TextureFormat::Rgba32Float, TextureUsage::Storage);
        assert!(fits_limits(&fits, &limits));
        let wide = TextureDesc::image_2d("t", max_2d + 1, 16, TextureFormat::Rgba32Float, TextureUsage::Storage);
        assert!(!fits_limits(&wide, &limits));
        let tall = TextureDesc::image_2d("t", 16, max_2d + 1, TextureFormat::Rgba32Float, TextureUsage::Storage);
        assert!(!fits_limits(&tall, &limits));

        assert!(fits_limits(&TextureDesc::volume("v", max_3d), &limits));
        assert!(!fits_limits(&TextureDesc::volume("v", max_3d + 1), &limits));
    }
}
