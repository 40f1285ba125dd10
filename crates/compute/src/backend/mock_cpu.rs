//! CPU implementation of [`ComputeBackend`].
//!
//! Textures live in a registry keyed by [`ResourceHandle`]. Dispatches run the
//! reference kernels in [`crate::kernels`] and complete before returning.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::kernels::{self, CpuTexture, RayMarchInputs};
use crate::layout::{self, OUTPUT, PARAMS, SKYBOX, SURFACE, VOLUME};
use crate::{
    Binding, ComputeBackend, ComputeError, Kernel, RayMarchParams, ResourceHandle, TextureDesc,
};

/// Counters kept for assertions in tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockStats {
    pub textures_created: usize,
    pub textures_released: usize,
    pub dispatches: usize,
    pub copies: usize,
}

/// The last dispatch seen by the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchRecord {
    pub kernel: Kernel,
    pub workgroups: [u32; 3],
    pub params: Option<RayMarchParams>,
}

#[derive(Default)]
struct MockState {
    next_id: u64,
    textures: HashMap<ResourceHandle, CpuTexture>,
    stats: MockStats,
    last_dispatch: Option<DispatchRecord>,
}

impl MockState {
    fn texture(&self, handle: ResourceHandle) -> Result<&CpuTexture, ComputeError> {
        self.textures.get(&handle).ok_or(ComputeError::UnknownHandle(handle))
    }
}

#[derive(Default)]
pub struct MockCpu {
    state: Mutex<MockState>,
}

impl MockCpu {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn stats(&self) -> MockStats {
        self.state.lock().stats
    }

    #[must_use]
    pub fn last_dispatch(&self) -> Option<DispatchRecord> {
        self.state.lock().last_dispatch.clone()
    }

    /// Number of textures created and not yet released.
    #[must_use]
    pub fn live_textures(&self) -> usize {
        self.state.lock().textures.len()
    }
}

fn handle_of(bind: &Binding) -> Option<ResourceHandle> {
    match bind {
        Binding::Texture(h) | Binding::StorageTexture(h) => Some(*h),
        Binding::Uniform(_) => None,
    }
}

impl ComputeBackend for MockCpu {
    fn create_texture(
        &self,
        desc: &TextureDesc,
        texels: Option<&[f32]>,
    ) -> Result<ResourceHandle, ComputeError> {
        let texture = CpuTexture::new(desc, texels)?;
        let mut state = self.state.lock();
        state.next_id += 1;
        let handle = ResourceHandle(state.next_id);
        state.textures.insert(handle, texture);
        state.stats.textures_created += 1;
        tracing::debug!(?handle, label = %desc.label, "created texture");
        Ok(handle)
    }

    fn release(&self, handle: ResourceHandle) -> Result<(), ComputeError> {
        let mut state = self.state.lock();
        state.textures.remove(&handle).ok_or(ComputeError::UnknownHandle(handle))?;
        state.stats.textures_released += 1;
        Ok(())
    }

    fn dispatch(
        &self,
        kernel: &Kernel,
        binds: &[Binding],
        workgroups: [u32; 3],
    ) -> Result<(), ComputeError> {
        let mut state = self.state.lock();
        layout::validate_binds(kernel, binds, |h| state.textures.get(&h).map(|t| t.desc.clone()))?;

        let params = match &binds[PARAMS as usize] {
            Binding::Uniform(view) => RayMarchParams::from_bytes(&view.data),
            _ => None,
        }
        .ok_or(ComputeError::ShapeMismatch("ray march parameters"))?;

        let slot = |index: u32| handle_of(&binds[index as usize]).ok_or(ComputeError::ShapeMismatch("texture slot"));
        let output_handle = slot(OUTPUT)?;

        // Take the target out so the inputs can be borrowed alongside it.
        let mut output = state
            .textures
            .remove(&output_handle)
            .ok_or(ComputeError::UnknownHandle(output_handle))?;
        let result = (|| -> Result<(), ComputeError> {
            let inputs = RayMarchInputs {
                params: &params,
                volume: state.texture(slot(VOLUME)?)?,
                skybox: state.texture(slot(SKYBOX)?)?,
                surface: state.texture(slot(SURFACE)?)?,
            };
            match kernel {
                Kernel::RayMarch => kernels::handle_ray_march(&inputs, &mut output, workgroups),
            }
            Ok(())
        })();
        state.textures.insert(output_handle, output);
        result?;

        state.stats.dispatches += 1;
        state.last_dispatch = Some(DispatchRecord { kernel: *kernel, workgroups, params: Some(params) });
        Ok(())
    }

    fn copy_texture(&self, src: ResourceHandle, dst: ResourceHandle) -> Result<(), ComputeError> {
        let mut state = self.state.lock();
        let source = state.texture(src)?;
        let (src_size, src_format) = (source.desc.size, source.desc.format);
        let data = source.data.clone();

        let target = state.textures.get_mut(&dst).ok_or(ComputeError::UnknownHandle(dst))?;
        if target.desc.size != src_size {
            return Err(ComputeError::ExtentMismatch { src: src_size, dst: target.desc.size });
        }
        if target.desc.format != src_format {
            return Err(ComputeError::ShapeMismatch("copy between different texture formats"));
        }
        target.data = data;
        state.stats.copies += 1;
        Ok(())
    }

    fn read_texture(&self, handle: ResourceHandle) -> Result<Vec<f32>, ComputeError> {
        Ok(self.state.lock().texture(handle)?.data.clone())
    }

    fn describe(&self, handle: ResourceHandle) -> Option<TextureDesc> {
        self.state.lock().textures.get(&handle).map(|t| t.desc.clone())
    }

    fn name(&self) -> &'static str {
        "mock-cpu"
    }
}
