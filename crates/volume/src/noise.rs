//! Two-dimensional gradient noise.
//!
//! Classic Perlin construction: a shuffled permutation table hashes lattice
//! corners to one of eight gradients, and a quintic fade blends the four
//! corner contributions. The raw value lies in roughly [-1, 1]; [`Perlin2::sample`]
//! remaps it to [0, 1]. Every integer lattice point evaluates to exactly 0.5,
//! so a field sampled only at integer coordinates is constant.

const TABLE_SIZE: usize = 256;

#[derive(Clone, Debug)]
pub struct Perlin2 {
    perm: [u8; TABLE_SIZE * 2],
}

impl Perlin2 {
    /// Builds the permutation table from `seed`. Equal seeds give equal tables.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        let mut base: Vec<u8> = (0..=u8::MAX).collect();
        fastrand::Rng::with_seed(seed).shuffle(&mut base);

        let mut perm = [0u8; TABLE_SIZE * 2];
        for (i, slot) in perm.iter_mut().enumerate() {
            *slot = base[i % TABLE_SIZE];
        }
        Self { perm }
    }

    /// Noise in [0, 1].
    #[must_use]
    pub fn sample(&self, x: f32, y: f32) -> f32 {
        ((self.raw(x, y) + 1.0) * 0.5).clamp(0.0, 1.0)
    }

    /// Noise in roughly [-1, 1], zero on the integer lattice.
    #[must_use]
    pub fn raw(&self, x: f32, y: f32) -> f32 {
        let x0 = x.floor();
        let y0 = y.floor();
        let xf = x - x0;
        let yf = y - y0;

        // Wrapping keeps negative coordinates inside the table.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let xi = (x0 as i64).rem_euclid(TABLE_SIZE as i64) as usize;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let yi = (y0 as i64).rem_euclid(TABLE_SIZE as i64) as usize;

        let p = &self.perm;
        let aa = p[usize::from(p[xi]) + yi];
        let ab = p[usize::from(p[xi]) + yi + 1];
        let ba = p[usize::from(p[xi + 1]) + yi];
        let bb = p[usize::from(p[xi + 1]) + yi + 1];

        let u = fade(xf);
        let v = fade(yf);

        let bottom = lerp(grad(aa, xf, yf), grad(ba, xf - 1.0, yf), u);
        let top = lerp(grad(ab, xf, yf - 1.0), grad(bb, xf - 1.0, yf - 1.0), u);
        lerp(bottom, top, v)
    }
}

impl Default for Perlin2 {
    fn default() -> Self {
        Self::new(0)
    }
}

fn fade(t: f32) -> f32 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + t * (b - a)
}

fn grad(hash: u8, x: f32, y: f32) -> f32 {
    match hash & 7 {
        0 => x + y,
        1 => -x + y,
        2 => x - y,
        3 => -x - y,
        4 => x,
        5 => -x,
        6 => y,
        _ => -y,
    }
}
