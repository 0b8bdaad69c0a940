use core::num::Wrapping as w;
use serde::{Deserialize, Serialize};

/// Xorshift128 generator, seedable so spawn draws are reproducible
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RandProvider {
    x: w<u32>,
    y: w<u32>,
    z: w<u32>,
    w: w<u32>,
}

impl RandProvider {
    pub fn new(mut seed: u64) -> Self {
        let tmp = splitmix64(&mut seed);
        let tmp2 = splitmix64(&mut seed);

        Self::from_seed([
            tmp as u32,
            (tmp >> 32) as u32,
            tmp2 as u32,
            (tmp2 >> 32) as u32,
        ])
    }

    /// Uniform in [0; 1)
    pub fn next_f32(&mut self) -> f32 {
        f32::from_bits(0x3f800000 | (0x7fffff & self.next_u32())) - 1.0
    }

    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        let x = self.x;
        let t = x ^ (x << 11);
        self.x = self.y;
        self.y = self.z;
        self.z = self.w;
        let w_ = self.w;
        self.w = w_ ^ (w_ >> 19) ^ (t ^ (t >> 8));
        self.w.0
    }

    /// Uniform index in 0..n, n must not be 0
    #[inline]
    pub fn next_index(&mut self, n: usize) -> usize {
        ((u64::from(self.next_u32()) * n as u64) >> 32) as usize
    }

    pub fn from_seed(mut seed_u32: [u32; 4]) -> Self {
        // xorshift is stuck at zero
        if seed_u32.iter().all(|&x| x == 0) {
            seed_u32 = [0xBAD_5EED, 0xBAD_5EED, 0xBAD_5EED, 0xBAD_5EED];
        }

        Self {
            x: w(seed_u32[0]),
            y: w(seed_u32[1]),
            z: w(seed_u32[2]),
            w: w(seed_u32[3]),
        }
    }
}

// used only for the initial seed
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E3779B97F4A7C15);
    let mut result = *state;
    result = (result ^ (result >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    result = (result ^ (result >> 27)).wrapping_mul(0x94D049BB133111EB);
    result ^ (result >> 31)
}
