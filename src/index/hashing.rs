//! Universal hash functions over a prime field

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// RNG stream for the MinHash function family
pub const SIGNATURE_STREAM: u64 = 0;

/// RNG stream for per-(table, band) hash parameters
pub const BAND_STREAM: u64 = 1;

/// One universal hash function `h(x) = (a * x + b) mod p`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashParams {
    /// Multiplier in `[1, p - 1]`
    pub a: u32,
    /// Offset in `[1, p - 1]`
    pub b: u32,
}

impl HashParams {
    /// Draw `a` and `b` uniformly from `[1, prime - 1]`.
    pub fn random<R: Rng>(rng: &mut R, prime: u32) -> Self {
        Self {
            a: rng.gen_range(1..prime),
            b: rng.gen_range(1..prime),
        }
    }

    /// Evaluate the hash. `a * x + b` stays below 2^64 for 32-bit inputs.
    #[inline]
    pub fn apply(&self, x: u32, prime: u32) -> u32 {
        ((self.a as u64 * x as u64 + self.b as u64) % prime as u64) as u32
    }
}

/// Deterministic RNG for one generation stream
pub fn seeded_rng(seed: u64, stream: u64) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(stream);
    rng
}

/// Generate `count` independent hash functions.
pub fn hash_family<R: Rng>(rng: &mut R, count: usize, prime: u32) -> Vec<HashParams> {
    (0..count).map(|_| HashParams::random(rng, prime)).collect()
}
