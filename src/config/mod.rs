//! Configuration for lshrec
//!
//! A [`Config`] is built once per run (from TOML or defaults), validated, and
//! then passed by reference into every component. Nothing mutates it after
//! construction.

mod logging;
mod lsh;
mod recommendation;
mod similarity;

pub use logging::{init_logging, LogFormat, LogLevel, LoggingConfig};
pub use lsh::{is_prime, LshConfig, BAND_KEY_BITS, DEFAULT_LARGE_PRIME, MAX_BANDS_PER_TABLE};
pub use recommendation::{
    CandidateStrategy, ConcurrencyConfig, RecommendationConfig, ScoringWeights,
};
pub use similarity::{CacheKind, SimilarityConfig, SimilarityMeasure};

use crate::types::ItemId;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// MinHash / LSH index configuration
    #[serde(default)]
    pub lsh: LshConfig,
    /// Exact similarity configuration
    #[serde(default)]
    pub similarity: SimilarityConfig,
    /// Recommendation pipeline configuration
    #[serde(default)]
    pub recommendation: RecommendationConfig,
    /// Hybrid scoring weights
    #[serde(default)]
    pub scoring: ScoringWeights,
    /// Worker-pool configuration
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file and validate it.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration fields.
    ///
    /// Collects every violation and reports them together.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        // LSH validation
        let lsh = &self.lsh;
        if lsh.num_hash_functions == 0 {
            errors.push("num_hash_functions must be positive".to_string());
        }
        if lsh.num_bands == 0 {
            errors.push("num_bands must be positive".to_string());
        }
        if lsh.rows_per_band == 0 {
            errors.push("rows_per_band must be positive".to_string());
        }
        if lsh.num_bands.checked_mul(lsh.rows_per_band) != Some(lsh.num_hash_functions) {
            errors.push(format!(
                "num_bands ({}) x rows_per_band ({}) must equal num_hash_functions ({})",
                lsh.num_bands, lsh.rows_per_band, lsh.num_hash_functions
            ));
        }
        if lsh.num_tables == 0 {
            errors.push("num_tables must be positive".to_string());
        }
        let max_bands_per_table = lsh.num_bands.min(MAX_BANDS_PER_TABLE);
        if lsh.bands_per_table == 0 || lsh.bands_per_table > max_bands_per_table {
            errors.push(format!(
                "bands_per_table ({}) must be between 1 and {} (num_bands {}, key limit {})",
                lsh.bands_per_table, max_bands_per_table, lsh.num_bands, MAX_BANDS_PER_TABLE
            ));
        }
        if !is_prime(lsh.large_prime) {
            errors.push(format!("large_prime ({}) must be prime", lsh.large_prime));
        }
        if lsh.num_buckets == 0 {
            errors.push("num_buckets must be positive".to_string());
        }
        if lsh.band_modulus == 0 || lsh.band_modulus > 1 << BAND_KEY_BITS {
            errors.push(format!(
                "band_modulus ({}) must be between 1 and {}",
                lsh.band_modulus,
                1u64 << BAND_KEY_BITS
            ));
        }
        if lsh.hit_weight < 0.0 || lsh.jaccard_weight < 0.0 {
            errors.push("hit_weight and jaccard_weight must be non-negative".to_string());
        }

        // Similarity validation
        if self.similarity.min_common_items == 0 {
            errors.push("min_common_items must be positive".to_string());
        }

        // Recommendation validation
        let rec = &self.recommendation;
        if rec.top_k == 0 {
            errors.push("top_k must be positive".to_string());
        }
        if rec.max_candidates == 0 {
            errors.push("max_candidates must be positive".to_string());
        }
        if rec.candidate_multiplier == 0 {
            errors.push("candidate_multiplier must be positive".to_string());
        }
        if rec.max_similar_users == 0 {
            errors.push("max_similar_users must be positive".to_string());
        }
        if !(-1.0..=1.0).contains(&rec.min_similarity) {
            errors.push("min_similarity must be between -1.0 and 1.0".to_string());
        }
        if rec.preferred_genre_count > crate::types::MAX_GENRES {
            errors.push(format!(
                "preferred_genre_count must be <= {}",
                crate::types::MAX_GENRES
            ));
        }

        // Scoring validation
        let w = &self.scoring;
        if w.cf_weight < 0.0 || w.content_weight < 0.0 || w.popularity_weight < 0.0 {
            errors.push("scoring weights must be non-negative".to_string());
        }
        if w.popularity_log_divisor <= 0.0 || w.content_log_divisor <= 0.0 {
            errors.push("log divisors must be positive".to_string());
        }
        if !(0.0..=1.0).contains(&w.content_quality_blend) {
            errors.push("content_quality_blend must be between 0.0 and 1.0".to_string());
        }
        if w.max_rating <= 0.0 {
            errors.push("max_rating must be positive".to_string());
        }
        if w.fallback_divisor <= 0.0 {
            errors.push("fallback_divisor must be positive".to_string());
        }
        if w.fallback_margin < 0.0 {
            errors.push("fallback_margin must be non-negative".to_string());
        }

        // Concurrency validation
        if self.concurrency.batch_size == 0 {
            errors.push("batch_size must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            anyhow::bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            );
        }
    }

    /// Validate the configuration against the item ID space of a corpus.
    ///
    /// Universal hashing over `large_prime` only behaves when every item ID
    /// is smaller than the prime.
    pub fn validate_for_catalog(&self, max_item_id: Option<ItemId>) -> Result<()> {
        self.validate()?;
        if let Some(max_id) = max_item_id {
            if max_id >= self.lsh.large_prime {
                anyhow::bail!(
                    "large_prime ({}) must exceed the largest item ID ({})",
                    self.lsh.large_prime,
                    max_id
                );
            }
        }
        Ok(())
    }
}
