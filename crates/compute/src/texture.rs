//! Backend-neutral texture descriptions.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl Extent {
    #[must_use]
    pub const fn new_2d(width: u32, height: u32) -> Self {
        Self { width, height, depth: 1 }
    }

    #[must_use]
    pub const fn cube(side: u32) -> Self {
        Self { width: side, height: side, depth: side }
    }

    #[must_use]
    pub fn texel_count(&self) -> usize {
        self.width as usize * self.height as usize * self.depth as usize
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.depth == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureDimension {
    D2,
    D3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// Single float channel; used for the density volume.
    R32Float,
    /// Four float channels; used for images and the render target.
    Rgba32Float,
}

impl TextureFormat {
    #[must_use]
    pub const fn channels(self) -> usize {
        match self {
            Self::R32Float => 1,
            Self::Rgba32Float => 4,
        }
    }

    #[must_use]
    pub const fn bytes_per_texel(self) -> u32 {
        match self {
            Self::R32Float => 4,
            Self::Rgba32Float => 16,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureUsage {
    /// Read by kernels, filled by the host.
    Sampled,
    /// Written in arbitrary order by kernels, source of copies.
    Storage,
    /// Destination of copies; the host's display surface.
    Destination,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureDesc {
    pub label: String,
    pub size: Extent,
    pub dimension: TextureDimension,
    pub format: TextureFormat,
    pub usage: TextureUsage,
}

impl TextureDesc {
    #[must_use]
    pub fn image_2d(
        label: impl Into<String>,
        width: u32,
        height: u32,
        format: TextureFormat,
        usage: TextureUsage,
    ) -> Self {
        Self {
            label: label.into(),
            size: Extent::new_2d(width, height),
            dimension: TextureDimension::D2,
            format,
            usage,
        }
    }

    /// A sampled single-channel cube of `side³` texels.
    #[must_use]
    pub fn volume(label: impl Into<String>, side: u32) -> Self {
        Self {
            label: label.into(),
            size: Extent::cube(side),
            dimension: TextureDimension::D3,
            format: TextureFormat::R32Float,
            usage: TextureUsage::Sampled,
        }
    }

    /// Number of floats a full upload or read-back of this texture holds.
    #[must_use]
    pub fn float_count(&self) -> usize {
        self.size.texel_count() * self.format.channels()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_counts() {
        let target = TextureDesc::image_2d("t", 3, 2, TextureFormat::Rgba32Float, TextureUsage::Storage);
        assert_eq!(target.float_count(), 24);
        assert_eq!(TextureDesc::volume("v", 4).float_count(), 64);
    }

    #[test]
    fn empty_extents() {
        assert!(Extent::new_2d(0, 5).is_empty());
        assert!(!Extent::cube(1).is_empty());
    }
}
