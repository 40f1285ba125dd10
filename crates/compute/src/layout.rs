use crate::{Binding, ComputeError, Kernel, TextureDesc, TextureDimension, TextureFormat, TextureUsage};

pub const PARAMS: u32 = 0;
pub const VOLUME: u32 = 1;
pub const SKYBOX: u32 = 2;
pub const SURFACE: u32 = 3;
pub const OUTPUT: u32 = 4;

const _: () = assert!(OUTPUT == 4);

/// Threads per work-group along x and y. Mirrors `@workgroup_size` in the WGSL.
pub const WORKGROUP_SIZE: [u32; 2] = [8, 8];

/// What a bind group slot expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Uniform { size: usize },
    Texture { dimension: TextureDimension, format: TextureFormat },
    StorageTexture { format: TextureFormat },
}

const RAY_MARCH: [BindingKind; 5] = [
    BindingKind::Uniform { size: crate::RayMarchParams::SIZE },
    BindingKind::Texture { dimension: TextureDimension::D3, format: TextureFormat::R32Float },
    BindingKind::Texture { dimension: TextureDimension::D2, format: TextureFormat::Rgba32Float },
    BindingKind::Texture { dimension: TextureDimension::D2, format: TextureFormat::Rgba32Float },
    BindingKind::StorageTexture { format: TextureFormat::Rgba32Float },
];

/// Slot layout of each kernel's bind group.
#[must_use]
pub const fn binding_kinds(kernel: &Kernel) -> &'static [BindingKind] {
    match kernel {
        Kernel::RayMarch => &RAY_MARCH,
    }
}

/// Return expected number of bindings for each kernel.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn binding_count(kernel: &Kernel) -> u32 {
    binding_kinds(kernel).len() as u32
}

/// Checks `binds` against the kernel layout. `describe` resolves handles to
/// live textures.
///
/// # Errors
///
/// Returns the first mismatch found.
pub fn validate_binds(
    kernel: &Kernel,
    binds: &[Binding],
    describe: impl Fn(crate::ResourceHandle) -> Option<TextureDesc>,
) -> Result<(), ComputeError> {
    let kinds = binding_kinds(kernel);
    if binds.len() != kinds.len() {
        return Err(ComputeError::ShapeMismatch("bind count does not match kernel layout"));
    }

    for (slot, (kind, bind)) in kinds.iter().zip(binds).enumerate() {
        match (kind, bind) {
            (BindingKind::Uniform { size }, Binding::Uniform(view)) => {
                if view.data.len() != view.expected_len() {
                    return Err(ComputeError::ShapeMismatch(
                        "Buffer data length does not match product of shape dimensions and element size",
                    ));
                }
                if view.data.len() != *size {
                    return Err(ComputeError::BindingMismatch { slot, reason: "uniform block has the wrong size" });
                }
            }
            (BindingKind::Texture { dimension, format }, Binding::Texture(handle)) => {
                let desc = describe(*handle).ok_or(ComputeError::UnknownHandle(*handle))?;
                if desc.dimension != *dimension {
                    return Err(ComputeError::BindingMismatch { slot, reason: "texture dimension" });
                }
                if desc.format != *format {
                    return Err(ComputeError::BindingMismatch { slot, reason: "texture format" });
                }
            }
            (BindingKind::StorageTexture { format }, Binding::StorageTexture(handle)) => {
                let desc = describe(*handle).ok_or(ComputeError::UnknownHandle(*handle))?;
                if desc.usage != TextureUsage::Storage {
                    return Err(ComputeError::BindingMismatch { slot, reason: "target is not a storage texture" });
                }
                if desc.format != *format || desc.dimension != TextureDimension::D2 {
                    return Err(ComputeError::BindingMismatch { slot, reason: "storage target format" });
                }
            }
            _ => return Err(ComputeError::BindingMismatch { slot, reason: "wrong binding type" }),
        }
    }
    Ok(())
}

/// Number of work-groups needed to cover `width x height` pixels.
#[must_use]
pub const fn workgroups_for(width: u32, height: u32) -> [u32; 3] {
    [width.div_ceil(WORKGROUP_SIZE[0]), height.div_ceil(WORKGROUP_SIZE[1]), 1]
}
