//! Saving presented frames to disk.

use std::path::{Path, PathBuf};

use compute::{ComputeBackend, ResourceHandle, TextureDimension, TextureFormat};

use crate::RenderError;

/// `dir/<prefix>_<local time>.png`, with millisecond resolution so captures
/// taken in quick succession do not collide.
#[must_use]
pub fn timestamped_path(dir: &Path, prefix: &str) -> PathBuf {
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S%.3f");
    dir.join(format!("{prefix}_{timestamp}.png"))
}

/// Converts linear float texels to 8-bit RGBA, clamping to [0, 1].
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn to_rgba8(texels: &[f32]) -> Vec<u8> {
    texels.iter().map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8).collect()
}

/// Reads `handle` back from the backend and writes it as a PNG.
///
/// # Errors
///
/// `RenderError::Capture` for textures that are not 2D RGBA images,
/// otherwise the backend or encoder error.
pub fn save_png(
    backend: &dyn ComputeBackend,
    handle: ResourceHandle,
    path: &Path,
) -> Result<(), RenderError> {
    let desc = backend
        .describe(handle)
        .ok_or(RenderError::Compute(compute::ComputeError::UnknownHandle(handle)))?;
    if desc.dimension != TextureDimension::D2 || desc.format != TextureFormat::Rgba32Float {
        return Err(RenderError::Capture(format!("`{}` is not an RGBA image", desc.label)));
    }

    let texels = backend.read_texture(handle)?;
    let image = image::RgbaImage::from_raw(desc.size.width, desc.size.height, to_rgba8(&texels))
        .ok_or_else(|| RenderError::Capture("read-back size does not match texture".to_string()))?;
    image.save_with_format(path, image::ImageFormat::Png)?;
    tracing::info!(path = %path.display(), "saved capture");
    Ok(())
}
