//! Exact similarity configuration

use serde::{Deserialize, Serialize};

/// Exact similarity measure over co-rated items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityMeasure {
    Pearson,
    Cosine,
}

/// Backing store for the similarity memo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheKind {
    /// Sharded concurrent map
    Sharded,
    /// Single map behind one mutex
    Locked,
}

/// Similarity calculator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityConfig {
    /// Measure used by the calculator
    #[serde(default = "default_measure")]
    pub measure: SimilarityMeasure,
    /// Minimum co-rated items before a pair gets a non-zero similarity
    #[serde(default = "default_min_common_items")]
    pub min_common_items: usize,
    /// Memo implementation
    #[serde(default = "default_cache")]
    pub cache: CacheKind,
}

fn default_measure() -> SimilarityMeasure {
    SimilarityMeasure::Pearson
}

fn default_min_common_items() -> usize {
    1
}

fn default_cache() -> CacheKind {
    CacheKind::Sharded
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            measure: default_measure(),
            min_common_items: default_min_common_items(),
            cache: default_cache(),
        }
    }
}
