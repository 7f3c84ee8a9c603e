//! Deterministic, string-seeded random source for reproducible asset builds.
//!
//! - `hash_seed`   : xmur3 string hash (first output word)
//! - `Mulberry32`  : tiny 32-bit-state generator, fast and statistically fine for audio
//!
//! The stream is part of the asset format: the same `(asset id, variant)` must
//! render the same bytes forever. Any change to these algorithms bumps
//! [`RNG_VERSION`] and invalidates previously generated assets.

use rand::{Error as RandError, RngCore};

/// Bumped whenever `hash_seed` or `Mulberry32` change their output.
pub const RNG_VERSION: u32 = 1;

/// xmur3 hash of `s`, returning the first word of its output stream.
///
/// Hashes UTF-16 code units so ids hash identically to the browser-side
/// tooling that shares this catalog.
pub fn hash_seed(s: &str) -> u32 {
    let len = s.encode_utf16().count() as u32;
    let mut h: u32 = 1_779_033_703 ^ len;
    for c in s.encode_utf16() {
        h = (h ^ u32::from(c)).wrapping_mul(3_432_918_353);
        h = h.rotate_left(13);
    }
    h = (h ^ (h >> 16)).wrapping_mul(2_246_822_507);
    h = (h ^ (h >> 13)).wrapping_mul(3_266_489_909);
    h ^ (h >> 16)
}

/// Mulberry32 generator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mulberry32 {
    state: u32,
}

impl Mulberry32 {
    #[inline]
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Seeded from the xmur3 hash of `s`.
    pub fn from_str_seed(s: &str) -> Self {
        Self::new(hash_seed(s))
    }

    #[inline]
    pub fn next_word(&mut self) -> u32 {
        self.state = self.state.wrapping_add(0x6D2B_79F5);
        let a = self.state;
        let mut t = (a ^ (a >> 15)).wrapping_mul(1 | a);
        t = t.wrapping_add((t ^ (t >> 7)).wrapping_mul(61 | t)) ^ t;
        t ^ (t >> 14)
    }

    /// Uniform in [0, 1) with 24 bits of resolution.
    #[inline]
    pub fn next_f32(&mut self) -> f32 {
        (self.next_word() >> 8) as f32 / 16_777_216.0
    }

    /// Uniform in [0, 1) with the full 32 bits.
    #[inline]
    pub fn next_f64(&mut self) -> f64 {
        f64::from(self.next_word()) / 4_294_967_296.0
    }

    /// Uniform in [-1, 1).
    #[inline]
    pub fn signed(&mut self) -> f32 {
        self.next_f32() * 2.0 - 1.0
    }

    /// Uniform in [lo, hi).
    #[inline]
    pub fn range(&mut self, lo: f32, hi: f32) -> f32 {
        lo + (hi - lo) * self.next_f32()
    }
}

/// Generator for one asset variant: seeded from `"{asset_id}#{variant}"`.
pub fn seed_for_asset(asset_id: &str, variant: u32) -> Mulberry32 {
    Mulberry32::from_str_seed(&format!("{asset_id}#{variant}"))
}

impl RngCore for Mulberry32 {
    fn next_u32(&mut self) -> u32 {
        self.next_word()
    }

    fn next_u64(&mut self) -> u64 {
        let hi = u64::from(self.next_word());
        let lo = u64::from(self.next_word());
        (hi << 32) | lo
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let w = self.next_word().to_le_bytes();
            chunk.copy_from_slice(&w[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), RandError> {
        self.fill_bytes(dest);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn hash_is_stable_and_sensitive() {
        assert_eq!(hash_seed("rain_gentle_air_01"), hash_seed("rain_gentle_air_01"));
        assert_ne!(hash_seed("rain_gentle_air_01"), hash_seed("rain_gentle_air_02"));
        assert_ne!(hash_seed(""), hash_seed(" "));
    }

    #[test]
    fn same_seed_same_stream() {
        let mut a = Mulberry32::new(42);
        let mut b = Mulberry32::new(42);
        for _ in 0..1000 {
            assert_eq!(a.next_word(), b.next_word());
        }
    }

    #[test]
    fn floats_stay_in_unit_interval() {
        let mut r = Mulberry32::from_str_seed("unit");
        let mut sum = 0.0;
        for _ in 0..100_000 {
            let x = r.next_f32();
            assert!((0.0..1.0).contains(&x));
            sum += f64::from(x);
        }
        let mean = sum / 100_000.0;
        assert!((mean - 0.5).abs() < 0.01, "mean={mean}");
    }

    #[test]
    fn asset_seeds_differ_by_variant() {
        let mut a = seed_for_asset("focus_warm_air_01", 0);
        let mut b = seed_for_asset("focus_warm_air_01", 1);
        assert_ne!(a.next_word(), b.next_word());
    }

    #[test]
    fn drives_rand_apis() {
        let mut r = Mulberry32::new(5);
        let v: u8 = r.gen_range(0..10);
        assert!(v < 10);
        let mut buf = [0u8; 7];
        r.fill_bytes(&mut buf);
    }
}
