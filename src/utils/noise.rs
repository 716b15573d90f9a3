//! Seeded 1-D gradient (Perlin) noise.
//!
//! Continuous in its input, zero at every integer lattice point, bounded by
//! ±1.6. Each instance owns its own permutation table so two axes seeded
//! differently wobble independently.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

#[derive(Clone, Debug)]
pub struct Perlin1D {
    perm: [u8; 512],
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Octaves {
    pub count: u32,
    pub persistence: f64,
    pub lacunarity: f64,
}

impl Default for Octaves {
    fn default() -> Self {
        Self { count: 1, persistence: 0.5, lacunarity: 2.0 }
    }
}

#[inline(always)]
fn fade(t: f64) -> f64 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

#[inline(always)]
fn grad(hash: u8, x: f64) -> f64 {
    let g = f64::from(hash & 7) + 1.0;
    if hash & 8 != 0 { -g * x } else { g * x }
}

impl Perlin1D {
    pub fn new(seed: u64) -> Self {
        let mut table: Vec<u8> = (0..=255u8).collect();
        table.shuffle(&mut StdRng::seed_from_u64(seed));
        let mut perm = [0u8; 512];
        for (i, slot) in perm.iter_mut().enumerate() {
            *slot = table[i & 255];
        }
        Self { perm }
    }

    fn single(&self, x: f64) -> f64 {
        let floor = x.floor();
        let i = (floor as i64 & 255) as usize;
        let fx = x - floor;
        let u = fade(fx);
        let a = grad(self.perm[i], fx);
        let b = grad(self.perm[i + 1], fx - 1.0);
        0.4 * (a + u * (b - a))
    }

    /// Fractal sum over `octaves`, normalised by total amplitude.
    pub fn sample(&self, x: f64, octaves: Octaves) -> f64 {
        let count = octaves.count.max(1);
        let mut total = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = 1.0;
        let mut max = 0.0;
        for _ in 0..count {
            total += self.single(x * frequency) * amplitude;
            max += amplitude;
            amplitude *= octaves.persistence;
            frequency *= octaves.lacunarity;
        }
        total / max
    }
}
