//! Input textures: PNG files from disk or procedural stand-ins.

use std::path::Path;

use anyhow::{Context, Result};
use compute::{ComputeBackend, ResourceHandle, TextureDesc, TextureFormat, TextureUsage};

use crate::SceneTextures;

/// Float RGBA pixels in row-major order, row 0 at the top.
#[derive(Debug, Clone, PartialEq)]
pub struct RgbaImage {
    pub width: u32,
    pub height: u32,
    pub texels: Vec<f32>,
}

/// Loads any format `image` can decode, converted to linear RGBA floats.
///
/// # Errors
///
/// Fails if the file cannot be opened or decoded.
pub fn load_image(path: &Path) -> Result<RgbaImage> {
    let decoded = image::open(path)
        .with_context(|| format!("failed to load image {}", path.display()))?
        .to_rgba32f();
    Ok(RgbaImage {
        width: decoded.width(),
        height: decoded.height(),
        texels: decoded.into_raw(),
    })
}

/// Equirectangular sky: deep blue at the zenith, pale at the horizon and a
/// dark ground colour below it.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn gradient_sky(width: u32, height: u32) -> RgbaImage {
    const ZENITH: [f32; 3] = [0.15, 0.35, 0.8];
    const HORIZON: [f32; 3] = [0.75, 0.85, 0.95];
    const GROUND: [f32; 3] = [0.25, 0.2, 0.15];

    let mut texels = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        // v = 0 looks straight up, v = 1 straight down.
        let v = (y as f32 + 0.5) / height as f32;
        let rgb = if v < 0.5 {
            let t = v / 0.5;
            [0, 1, 2].map(|c| ZENITH[c] + (HORIZON[c] - ZENITH[c]) * t)
        } else {
            GROUND
        };
        for _ in 0..width {
            texels.extend_from_slice(&[rgb[0], rgb[1], rgb[2], 1.0]);
        }
    }
    RgbaImage { width, height, texels }
}

/// `cells x cells` checkerboard of `size` pixels square.
#[must_use]
pub fn checkerboard(size: u32, cells: u32) -> RgbaImage {
    const LIGHT: [f32; 4] = [0.55, 0.75, 0.35, 1.0];
    const DARK: [f32; 4] = [0.35, 0.5, 0.2, 1.0];

    let cell = (size / cells.max(1)).max(1);
    let mut texels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let texel = if (x / cell + y / cell) % 2 == 0 { LIGHT } else { DARK };
            texels.extend_from_slice(&texel);
        }
    }
    RgbaImage { width: size, height: size, texels }
}

/// Uploads `image` as a sampled texture.
///
/// # Errors
///
/// Propagates the backend error.
pub fn upload(backend: &dyn ComputeBackend, label: &str, image: &RgbaImage) -> Result<ResourceHandle> {
    let desc = TextureDesc::image_2d(label, image.width, image.height, TextureFormat::Rgba32Float, TextureUsage::Sampled);
    backend
        .create_texture(&desc, Some(&image.texels))
        .with_context(|| format!("failed to upload {label} texture"))
}

/// Loads or synthesises the skybox and surface textures and uploads them.
///
/// # Errors
///
/// Fails if a given file cannot be loaded or the upload fails.
pub fn upload_scene_textures(
    backend: &dyn ComputeBackend,
    skybox: Option<&Path>,
    surface: Option<&Path>,
) -> Result<SceneTextures> {
    let sky_image = match skybox {
        Some(path) => load_image(path)?,
        None => gradient_sky(256, 128),
    };
    let surface_image = match surface {
        Some(path) => load_image(path)?,
        None => checkerboard(64, 8),
    };
    tracing::info!(
        skybox = %skybox.map_or_else(|| "gradient".into(), |p| p.display().to_string()),
        surface = %surface.map_or_else(|| "checkerboard".into(), |p| p.display().to_string()),
        "scene textures ready"
    );

    upload_pair(backend, &sky_image, &surface_image)
}

/// Uploads both scene images. Nothing stays allocated on failure.
///
/// # Errors
///
/// Propagates the first upload error.
pub fn upload_pair(backend: &dyn ComputeBackend, skybox: &RgbaImage, surface: &RgbaImage) -> Result<SceneTextures> {
    let skybox = upload(backend, "skybox", skybox)?;
    match upload(backend, "surface", surface) {
        Ok(surface) => Ok(SceneTextures { skybox, surface }),
        Err(e) => {
            if let Err(release) = backend.release(skybox) {
                tracing::warn!("failed to release skybox texture: {release}");
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compute::MockCpu;

    #[test]
    fn procedural_images_have_full_size() {
        let sky = gradient_sky(8, 4);
        assert_eq!(sky.texels.len(), 8 * 4 * 4);
        // Top row is darker blue than the last row above the horizon.
        assert!(sky.texels[0] < sky.texels[8 * 4]);

        let board = checkerboard(4, 2);
        assert_eq!(board.texels.len(), 4 * 4 * 4);
        assert_ne!(board.texels[..4], board.texels[8..12]);
    }

    #[test]
    fn png_round_trip_through_loader() {
        let dir = std::env::temp_dir().join(format!("voxbench-assets-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("red.png");
        image::RgbaImage::from_pixel(3, 2, image::Rgba([255, 0, 0, 255])).save(&path).unwrap();

        let loaded = load_image(&path).unwrap();
        assert_eq!((loaded.width, loaded.height), (3, 2));
        assert_eq!(&loaded.texels[..4], &[1.0, 0.0, 0.0, 1.0]);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn failed_surface_upload_releases_the_skybox() {
        let cpu = MockCpu::new();
        let mut surface = checkerboard(4, 2);
        surface.texels.pop();
        assert!(upload_pair(&cpu, &gradient_sky(8, 4), &surface).is_err());
        assert_eq!(cpu.live_textures(), 0);
        assert_eq!(cpu.stats().textures_created, cpu.stats().textures_released);
    }

    #[test]
    fn missing_file_is_an_error() {
        let cpu = MockCpu::new();
        let result = upload_scene_textures(&cpu, Some(Path::new("/nonexistent/sky.png")), None);
        assert!(result.is_err());
        assert_eq!(cpu.live_textures(), 0);
    }
}
