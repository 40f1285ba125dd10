#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
//! # Compute dispatch seam
//!
//! Everything the renderer needs from a GPU goes through [`ComputeBackend`]:
//! creating and releasing textures, dispatching a kernel over a work-group
//! grid, copying one texture into another, and reading a texture back.
//!
//! Every call is blocking. A `dispatch` returns only after the kernel has
//! finished writing its outputs, and `copy_texture` only after the copy has
//! landed, so callers never rely on a graphics API's implicit ordering.
//!
//! Two implementations ship with the crate:
//!
//! - [`MockCpu`] (feature `mock`, on by default) runs the reference kernels on
//!   the CPU and keeps allocation statistics for tests.
//! - [`WgpuBackend`] (feature `gpu`) compiles the WGSL kernels and runs them on
//!   the system's graphics device.

use std::sync::Arc;
use thiserror::Error;

pub mod layout;
pub mod params;
pub mod texture;

#[cfg(feature = "mock")]
pub mod backend;
#[cfg(feature = "mock")]
pub mod kernels;

#[cfg(feature = "gpu")]
pub mod wgpu_backend;

#[cfg(feature = "mock")]
pub use backend::mock_cpu::{DispatchRecord, MockCpu, MockStats};
pub use layout::BindingKind;
pub use params::RayMarchParams;
pub use texture::{Extent, TextureDesc, TextureDimension, TextureFormat, TextureUsage};
#[cfg(feature = "gpu")]
pub use wgpu_backend::WgpuBackend;

#[derive(Error, Debug)]
pub enum ComputeError {
    #[error("buffer shape mismatch: {0}")]
    ShapeMismatch(&'static str),
    #[error("binding mismatch at slot {slot}: {reason}")]
    BindingMismatch { slot: usize, reason: &'static str },
    #[error("unknown resource handle {0:?}")]
    UnknownHandle(ResourceHandle),
    #[error("failed to allocate texture `{label}` ({width}x{height}x{depth})")]
    Allocation {
        label: String,
        width: u32,
        height: u32,
        depth: u32,
    },
    #[error("texel data length {actual} does not match expected {expected}")]
    TexelCount { expected: usize, actual: usize },
    #[error("copy extent mismatch: source {src:?}, destination {dst:?}")]
    ExtentMismatch { src: Extent, dst: Extent },
    #[error("backend not available")]
    BackendUnavailable,
    #[error("device error: {0}")]
    Device(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kernel {
    /// March camera rays through a density volume, writing one RGBA texel per
    /// pixel into a storage target.
    RayMarch,
}

impl Kernel {
    #[must_use]
    pub const fn binding_count(&self) -> u32 {
        layout::binding_count(self)
    }
}

/// Opaque identifier of a backend-resident texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceHandle(pub u64);

#[derive(Clone, Debug)]
pub struct BufferView {
    pub data: Arc<[u8]>,
    pub shape: Vec<usize>, // Number of elements per dimension
    pub element_size_in_bytes: usize, // Size of a single element described by the innermost dimension of shape
}

impl BufferView {
    #[must_use]
    pub fn new(data: Arc<[u8]>, shape: Vec<usize>, element_size_in_bytes: usize) -> Self {
        Self { data, shape, element_size_in_bytes }
    }

    /// Wraps a single plain-old-data value, e.g. a uniform block.
    #[must_use]
    pub fn from_pod<T: bytemuck::Pod>(value: &T) -> Self {
        let bytes: Arc<[u8]> = bytemuck::bytes_of(value).to_vec().into();
        Self::new(bytes, vec![1], std::mem::size_of::<T>())
    }

    #[must_use]
    pub fn expected_len(&self) -> usize {
        self.shape.iter().product::<usize>() * self.element_size_in_bytes
    }
}

/// One slot of a kernel's bind group.
#[derive(Clone, Debug)]
pub enum Binding {
    Uniform(BufferView),
    Texture(ResourceHandle),
    StorageTexture(ResourceHandle),
}

pub trait ComputeBackend: Send + Sync + 'static {
    /// Allocates a texture, optionally filled with `texels`.
    ///
    /// `texels` holds `desc.format.channels()` floats per texel in x-fastest
    /// order. `None` zero-initialises the texture.
    ///
    /// # Errors
    ///
    /// Returns `ComputeError::TexelCount` for a wrongly sized upload and
    /// `ComputeError::Allocation` when the device refuses the allocation.
    fn create_texture(
        &self,
        desc: &TextureDesc,
        texels: Option<&[f32]>,
    ) -> Result<ResourceHandle, ComputeError>;

    /// Releases a texture. The handle is invalid afterwards.
    ///
    /// # Errors
    ///
    /// Returns `ComputeError::UnknownHandle` if the handle was never created
    /// or was already released.
    fn release(&self, handle: ResourceHandle) -> Result<(), ComputeError>;

    /// Dispatches a compute kernel and waits for it to complete.
    ///
    /// # Arguments
    /// * `kernel`: The kernel to dispatch.
    /// * `binds`: One entry per slot of [`layout::binding_kinds`] for the kernel.
    /// * `workgroups`: The number of work-groups along each axis.
    ///
    /// # Errors
    ///
    /// Returns `ComputeError::BindingMismatch` or `ComputeError::UnknownHandle`
    /// if the bindings do not satisfy the kernel layout. Backends may return
    /// other variants for device failures.
    fn dispatch(
        &self,
        kernel: &Kernel,
        binds: &[Binding],
        workgroups: [u32; 3],
    ) -> Result<(), ComputeError>;

    /// Copies `src` into `dst` and waits for the copy to complete. Both
    /// textures must have the same extent and format.
    ///
    /// # Errors
    ///
    /// Returns `ComputeError::ExtentMismatch` for differing extents and
    /// `ComputeError::UnknownHandle` for released handles.
    fn copy_texture(&self, src: ResourceHandle, dst: ResourceHandle) -> Result<(), ComputeError>;

    /// Reads a texture back into host memory, same layout as `create_texture`.
    ///
    /// # Errors
    ///
    /// Returns `ComputeError::UnknownHandle` for released handles.
    fn read_texture(&self, handle: ResourceHandle) -> Result<Vec<f32>, ComputeError>;

    /// Describes a live texture.
    fn describe(&self, handle: ResourceHandle) -> Option<TextureDesc>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

/// Returns a compute backend if available, falling back to the CPU implementation.
///
/// With the `gpu` feature enabled this will attempt to create a
/// [`WgpuBackend`]. If GPU initialization fails or the feature is not
/// enabled, a [`MockCpu`] backend is returned.
#[cfg(feature = "mock")]
#[must_use]
pub fn default_backend() -> Arc<dyn ComputeBackend> {
    #[cfg(feature = "gpu")]
    {
        match WgpuBackend::try_new() {
            Ok(gpu) => {
                tracing::info!("Using WgpuBackend.");
                return Arc::new(gpu);
            }
            Err(e) => tracing::warn!("WgpuBackend initialization failed ({e}), falling back..."),
        }
    }

    tracing::info!("Using MockCpu backend.");
    Arc::new(MockCpu::default())
}
