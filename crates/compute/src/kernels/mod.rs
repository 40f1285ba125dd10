// Reference CPU implementations of each kernel.

pub mod ray_march_op;
pub use ray_march_op::{handle_ray_march, trace_pixel, RayMarchInputs};

use crate::{ComputeError, TextureDesc};

/// Host-memory texture used by the CPU backend.
#[derive(Clone, Debug)]
pub struct CpuTexture {
    pub desc: TextureDesc,
    pub data: Vec<f32>,
}

impl CpuTexture {
    /// Allocates a zeroed texture, or copies `texels` when given.
    ///
    /// # Errors
    ///
    /// `ComputeError::TexelCount` for a wrongly sized upload,
    /// `ComputeError::Allocation` if the buffer cannot be reserved.
    pub fn new(desc: &TextureDesc, texels: Option<&[f32]>) -> Result<Self, ComputeError> {
        let expected = desc.float_count();
        let data = match texels {
            Some(src) if src.len() != expected => {
                return Err(ComputeError::TexelCount { expected, actual: src.len() })
            }
            Some(src) => src.to_vec(),
            None => {
                let mut data = Vec::new();
                data.try_reserve_exact(expected).map_err(|_| ComputeError::Allocation {
                    label: desc.label.clone(),
                    width: desc.size.width,
                    height: desc.size.height,
                    depth: desc.size.depth,
                })?;
                data.resize(expected, 0.0);
                data
            }
        };
        Ok(Self { desc: desc.clone(), data })
    }

    /// Texel at integer coordinates, clamped to the texture edges.
    #[must_use]
    pub fn load(&self, x: u32, y: u32, z: u32) -> [f32; 4] {
        let size = self.desc.size;
        if size.is_empty() {
            return [0.0; 4];
        }
        let x = x.min(size.width - 1) as usize;
        let y = y.min(size.height - 1) as usize;
        let z = z.min(size.depth - 1) as usize;
        let index = x + size.width as usize * (y + size.height as usize * z);
        let channels = self.desc.format.channels();
        let base = index * channels;
        let mut texel = [0.0, 0.0, 0.0, 1.0];
        texel[..channels].copy_from_slice(&self.data[base..base + channels]);
        texel
    }

    /// Nearest texel for normalised coordinates in [0, 1].
    #[must_use]
    pub fn load_uv(&self, u: f32, v: f32) -> [f32; 4] {
        let size = self.desc.size;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
        let (x, y) = (
            (u.max(0.0) * size.width as f32) as u32,
            (v.max(0.0) * size.height as f32) as u32,
        );
        self.load(x, y, 0)
    }

    pub fn store(&mut self, x: u32, y: u32, texel: [f32; 4]) {
        let width = self.desc.size.width as usize;
        let base = (y as usize * width + x as usize) * 4;
        self.data[base..base + 4].copy_from_slice(&texel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TextureFormat, TextureUsage};

    #[test]
    fn wrong_upload_length_fails() {
        let desc = TextureDesc::image_2d("sky", 2, 2, TextureFormat::Rgba32Float, TextureUsage::Sampled);
        assert!(matches!(
            CpuTexture::new(&desc, Some(&[0.0; 15])),
            Err(ComputeError::TexelCount { expected: 16, actual: 15 })
        ));
    }

    #[test]
    fn single_channel_loads_fill_alpha() {
        let desc = TextureDesc::volume("v", 2);
        let texels: Vec<f32> = (0..8).map(|i| i as f32).collect();
        let tex = CpuTexture::new(&desc, Some(&texels)).unwrap();
        assert_eq!(tex.load(1, 1, 1), [7.0, 0.0, 0.0, 1.0]);
        assert_eq!(tex.load(5, 0, 0), [1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn uv_lookup_clamps_to_last_texel() {
        let desc = TextureDesc::image_2d("s", 2, 1, TextureFormat::Rgba32Float, TextureUsage::Sampled);
        let tex = CpuTexture::new(&desc, Some(&[0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0])).unwrap();
        assert_eq!(tex.load_uv(1.0, 1.0), [1.0, 1.0, 1.0, 1.0]);
        assert_eq!(tex.load_uv(0.2, 0.0), [0.0, 0.0, 0.0, 1.0]);
    }
}
