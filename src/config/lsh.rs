//! MinHash and LSH banding configuration

use serde::{Deserialize, Serialize};

/// Largest prime below 2^32, the default modulus for universal hashing
pub const DEFAULT_LARGE_PRIME: u32 = 4_294_967_291;

/// Bits each band hash occupies in a combined table key
pub const BAND_KEY_BITS: u32 = 16;

/// Bands that fit in a 64-bit table key without shifting earlier bands out
pub const MAX_BANDS_PER_TABLE: usize = (u64::BITS / BAND_KEY_BITS) as usize;

/// MinHash signature and LSH table configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LshConfig {
    /// Signature length (number of MinHash functions)
    pub num_hash_functions: usize,
    /// Number of bands the signature is split into
    pub num_bands: usize,
    /// Signature rows per band
    pub rows_per_band: usize,
    /// Number of independent hash tables
    pub num_tables: usize,
    /// Contiguous bands combined into each table's bucket key
    #[serde(default = "default_bands_per_table")]
    pub bands_per_table: usize,
    /// Prime modulus for universal hash functions; must exceed every item ID
    #[serde(default = "default_large_prime")]
    pub large_prime: u32,
    /// Bucket count per table
    #[serde(default = "default_num_buckets")]
    pub num_buckets: u64,
    /// Modulus each band hash is reduced into before combining; at most
    /// `2^BAND_KEY_BITS`
    #[serde(default = "default_band_modulus")]
    pub band_modulus: u64,
    /// Below this many candidates, neighbouring buckets are probed
    #[serde(default = "default_probe_floor")]
    pub probe_floor: usize,
    /// Number of tables probed during multi-probe
    #[serde(default = "default_probe_tables")]
    pub probe_tables: usize,
    /// Largest band-hash offset tried per probed table
    #[serde(default = "default_probe_depth")]
    pub probe_depth: u64,
    /// Weight of the table hit count in candidate scoring
    #[serde(default = "default_hit_weight")]
    pub hit_weight: f32,
    /// Weight of the estimated Jaccard similarity in candidate scoring
    #[serde(default = "default_jaccard_weight")]
    pub jaccard_weight: f32,
    /// Seed for hash-function generation
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_bands_per_table() -> usize {
    3
}

fn default_large_prime() -> u32 {
    DEFAULT_LARGE_PRIME
}

fn default_num_buckets() -> u64 {
    4000
}

fn default_band_modulus() -> u64 {
    20_000
}

fn default_probe_floor() -> usize {
    50
}

fn default_probe_tables() -> usize {
    3
}

fn default_probe_depth() -> u64 {
    2
}

fn default_hit_weight() -> f32 {
    0.3
}

fn default_jaccard_weight() -> f32 {
    0.7
}

fn default_seed() -> u64 {
    42
}

impl Default for LshConfig {
    fn default() -> Self {
        Self {
            num_hash_functions: 96,
            num_bands: 24,
            rows_per_band: 4,
            num_tables: 8,
            bands_per_table: default_bands_per_table(),
            large_prime: default_large_prime(),
            num_buckets: default_num_buckets(),
            band_modulus: default_band_modulus(),
            probe_floor: default_probe_floor(),
            probe_tables: default_probe_tables(),
            probe_depth: default_probe_depth(),
            hit_weight: default_hit_weight(),
            jaccard_weight: default_jaccard_weight(),
            seed: default_seed(),
        }
    }
}

impl LshConfig {
    /// First band used by `table`; tables rotate through the band space.
    pub fn start_band(&self, table: usize) -> usize {
        (table * self.bands_per_table) % self.num_bands
    }
}

/// Trial-division primality check; fast enough for 32-bit moduli.
pub fn is_prime(n: u32) -> bool {
    if n < 2 {
        return false;
    }
    if n % 2 == 0 {
        return n == 2;
    }
    let n = n as u64;
    let mut d = 3u64;
    while d * d <= n {
        if n % d == 0 {
            return false;
        }
        d += 2;
    }
    true
}
