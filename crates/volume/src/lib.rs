#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
//! # Density volume generation
//!
//! Builds the static voxel field the ray marcher walks through. The field is a
//! cube of `size³` scalar densities in [0, 1], produced once at startup and
//! never mutated afterwards.
//!
//! Each cell `(x, y, z)` holds `height_scale * noise(x * noise_scale, y * noise_scale) - z`,
//! clamped to [0, 1] the way a unorm texture store would clamp it. The noise
//! only looks at the first two coordinates, so the field reads as a heightmap
//! extruded along `z`.
//!
//! ```rust,ignore
//! use volume::{DensityVolume, VolumeSpec};
//!
//! let field = DensityVolume::generate(&VolumeSpec::default())?;
//! assert_eq!(field.side(), 64);
//! ```

pub mod noise;

use thiserror::Error;

pub use noise::Perlin2;

/// Side length used when nothing else is configured.
pub const DEFAULT_SIDE: u32 = 64;

/// Largest side accepted by [`DensityVolume::generate`].
pub const MAX_SIDE: u32 = 1024;

#[derive(Error, Debug)]
pub enum VolumeError {
    #[error("volume side must be at least 1")]
    ZeroSize,
    #[error("volume side {0} exceeds the maximum of {MAX_SIDE}")]
    TooLarge(u32),
    #[error("failed to allocate {cells} density cells")]
    Allocation { cells: usize },
}

/// Parameters for [`DensityVolume::generate`].
///
/// The defaults sample the noise at integer voxel coordinates with unit
/// height, which is exactly `noise(x, y) - z`.
#[derive(Clone, Debug, PartialEq)]
pub struct VolumeSpec {
    pub size: u32,
    pub noise_scale: f32,
    pub height_scale: f32,
    pub seed: u64,
}

impl Default for VolumeSpec {
    fn default() -> Self {
        Self {
            size: DEFAULT_SIDE,
            noise_scale: 1.0,
            height_scale: 1.0,
            seed: 0,
        }
    }
}

impl VolumeSpec {
    #[must_use]
    pub fn with_size(size: u32) -> Self {
        Self {
            size,
            ..Self::default()
        }
    }
}

/// Immutable cubic density field, stored x-fastest, then y, then z.
#[derive(Clone, Debug, PartialEq)]
pub struct DensityVolume {
    side: u32,
    values: Vec<f32>,
}

impl DensityVolume {
    /// Populates a new field from `spec`.
    ///
    /// # Errors
    ///
    /// [`VolumeError::ZeroSize`] / [`VolumeError::TooLarge`] for an out of
    /// range side, [`VolumeError::Allocation`] when the cell buffer cannot be
    /// reserved.
    pub fn generate(spec: &VolumeSpec) -> Result<Self, VolumeError> {
        if spec.size == 0 {
            return Err(VolumeError::ZeroSize);
        }
        if spec.size > MAX_SIDE {
            return Err(VolumeError::TooLarge(spec.size));
        }

        let side = spec.size as usize;
        let cells = side * side * side;
        let mut values = Vec::new();
        values
            .try_reserve_exact(cells)
            .map_err(|_| VolumeError::Allocation { cells })?;

        let noise = Perlin2::new(spec.seed);

        // The noise term is shared by every z in a column.
        let mut heights = Vec::with_capacity(side * side);
        for y in 0..spec.size {
            for x in 0..spec.size {
                #[allow(clippy::cast_precision_loss)]
                let n = noise.sample(x as f32 * spec.noise_scale, y as f32 * spec.noise_scale);
                heights.push(n * spec.height_scale);
            }
        }

        for z in 0..spec.size {
            #[allow(clippy::cast_precision_loss)]
            let zf = z as f32;
            values.extend(heights.iter().map(|h| (h - zf).clamp(0.0, 1.0)));
        }

        tracing::info!(side = spec.size, cells, "populated density volume");
        Ok(Self {
            side: spec.size,
            values,
        })
    }

    #[must_use]
    pub fn side(&self) -> u32 {
        self.side
    }

    /// Number of cells, `side³`.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Density at `(x, y, z)`, or `None` outside the cube.
    #[must_use]
    pub fn get(&self, x: u32, y: u32, z: u32) -> Option<f32> {
        if x >= self.side || y >= self.side || z >= self.side {
            return None;
        }
        let s = self.side as usize;
        let index = x as usize + s * (y as usize + s * z as usize);
        self.values.get(index).copied()
    }

    /// Raw cells in upload order.
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    /// Count of cells whose density exceeds `threshold`.
    #[must_use]
    pub fn solid_cells(&self, threshold: f32) -> usize {
        self.values.iter().filter(|&&v| v > threshold).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_side() {
        assert!(matches!(
            DensityVolume::generate(&VolumeSpec::with_size(0)),
            Err(VolumeError::ZeroSize)
        ));
    }

    #[test]
    fn rejects_oversized_side() {
        assert!(matches!(
            DensityVolume::generate(&VolumeSpec::with_size(MAX_SIDE + 1)),
            Err(VolumeError::TooLarge(_))
        ));
    }

    #[test]
    fn indexing_is_x_fastest() {
        let field = DensityVolume::generate(&VolumeSpec {
            size: 4,
            noise_scale: 0.37,
            height_scale: 3.0,
            seed: 5,
        })
        .unwrap();
        let raw = field.as_slice();
        assert_eq!(field.get(1, 0, 0), Some(raw[1]));
        assert_eq!(field.get(0, 1, 0), Some(raw[4]));
        assert_eq!(field.get(0, 0, 1), Some(raw[16]));
        assert_eq!(field.get(4, 0, 0), None);
    }
}
