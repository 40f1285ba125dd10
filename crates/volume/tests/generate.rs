use volume::{DensityVolume, VolumeSpec, DEFAULT_SIDE};

#[test]
fn generation_is_deterministic() {
    let a = DensityVolume::generate(&VolumeSpec::default()).expect("generate");
    let b = DensityVolume::generate(&VolumeSpec::default()).expect("generate");
    assert_eq!(a.side(), DEFAULT_SIDE);
    assert_eq!(a.len(), 64 * 64 * 64);
    assert_eq!(a, b);
}

#[test]
fn default_spec_samples_the_noise_lattice() {
    // Integer coordinates hit the lattice where the noise is exactly 0.5, so
    // the bottom layer holds 0.5 and everything above is clamped to zero.
    let field = DensityVolume::generate(&VolumeSpec::with_size(16)).unwrap();
    for y in 0..16 {
        for x in 0..16 {
            let bottom = field.get(x, y, 0).unwrap();
            assert!((bottom - 0.5).abs() < 1e-6, "bottom ({x},{y}) = {bottom}");
            for z in 1..16 {
                assert_eq!(field.get(x, y, z), Some(0.0));
            }
        }
    }
    assert_eq!(field.solid_cells(0.0), 16 * 16);
}

#[test]
fn scaled_noise_produces_relief() {
    let spec = VolumeSpec {
        size: 32,
        noise_scale: 0.11,
        height_scale: 12.0,
        seed: 9,
    };
    let field = DensityVolume::generate(&spec).unwrap();

    let column_height = |x: u32, y: u32| (0..32).filter(|&z| field.get(x, y, z).unwrap() > 0.0).count();
    let heights: Vec<usize> = (0..32).map(|x| column_height(x, 7)).collect();
    let min = heights.iter().min().unwrap();
    let max = heights.iter().max().unwrap();
    assert!(max > min, "expected varying terrain, got {heights:?}");

    assert!(field.as_slice().iter().all(|v| (0.0..=1.0).contains(v)));
}

#[test]
fn seeds_change_the_terrain() {
    let base = VolumeSpec {
        size: 24,
        noise_scale: 0.2,
        height_scale: 8.0,
        seed: 1,
    };
    let a = DensityVolume::generate(&base).unwrap();
    let b = DensityVolume::generate(&VolumeSpec { seed: 2, ..base }).unwrap();
    assert_ne!(a, b);
}
