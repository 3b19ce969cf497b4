//! Recommendation pipeline, scoring and worker-pool configuration

use serde::{Deserialize, Serialize};

/// How neighbour candidates are discovered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateStrategy {
    /// Approximate lookup in the LSH index
    Lsh,
    /// Inverted-index scan over every user sharing an item
    Exhaustive,
}

/// Recommendation pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationConfig {
    /// Length of the final list
    pub top_k: usize,
    /// Cap on neighbours kept after similarity refinement
    pub max_similar_users: usize,
    /// Ratings at or above this value count as positive
    pub min_rating: f32,
    /// Neighbours at or below this similarity are dropped
    pub min_similarity: f32,
    /// Cap on candidates passed to similarity refinement
    pub max_candidates: usize,
    /// LSH is asked for `max_candidates * candidate_multiplier` neighbours
    #[serde(default = "default_candidate_multiplier")]
    pub candidate_multiplier: usize,
    /// Backfill from low-overlap candidates until this many are kept
    #[serde(default = "default_min_quality_candidates")]
    pub min_quality_candidates: usize,
    /// Below this many LSH candidates, an exhaustive scan backfills the pool
    #[serde(default = "default_emergency_fallback_threshold")]
    pub emergency_fallback_threshold: usize,
    /// Candidate discovery strategy
    #[serde(default = "default_candidate_strategy")]
    pub candidate_strategy: CandidateStrategy,
    /// Number of top genres folded into a user's preference mask
    #[serde(default = "default_preferred_genre_count")]
    pub preferred_genre_count: usize,
}

fn default_candidate_multiplier() -> usize {
    3
}

fn default_min_quality_candidates() -> usize {
    20
}

fn default_emergency_fallback_threshold() -> usize {
    10
}

fn default_candidate_strategy() -> CandidateStrategy {
    CandidateStrategy::Lsh
}

fn default_preferred_genre_count() -> usize {
    5
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            max_similar_users: 500,
            min_rating: 3.5,
            min_similarity: 0.01,
            max_candidates: 1000,
            candidate_multiplier: default_candidate_multiplier(),
            min_quality_candidates: default_min_quality_candidates(),
            emergency_fallback_threshold: default_emergency_fallback_threshold(),
            candidate_strategy: default_candidate_strategy(),
            preferred_genre_count: default_preferred_genre_count(),
        }
    }
}

/// Weights for the hybrid score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringWeights {
    /// Multiplier on the normalised collaborative-filtering deviation
    pub cf_weight: f32,
    /// Multiplier on the genre boost
    pub content_weight: f32,
    /// Multiplier on log-popularity terms and fallback scores
    pub popularity_weight: f32,
    /// Divisor applied to `ln(popularity + 1)` in the CF stage
    #[serde(default = "default_popularity_log_divisor")]
    pub popularity_log_divisor: f32,
    /// Divisor applied to `ln(popularity + 1)` in the genre boost (capped at 1)
    #[serde(default = "default_content_log_divisor")]
    pub content_log_divisor: f32,
    /// Share of item quality (vs popularity) in the genre boost
    #[serde(default = "default_content_quality_blend")]
    pub content_quality_blend: f32,
    /// Top of the rating scale, used to normalise item averages
    #[serde(default = "default_max_rating")]
    pub max_rating: f32,
    /// Divisor for fallback scores when nothing was scored organically
    #[serde(default = "default_fallback_divisor")]
    pub fallback_divisor: f32,
    /// Gap kept between the lowest organic score and the best fallback score
    #[serde(default = "default_fallback_margin")]
    pub fallback_margin: f32,
}

fn default_popularity_log_divisor() -> f32 {
    15.0
}

fn default_content_log_divisor() -> f32 {
    10.0
}

fn default_content_quality_blend() -> f32 {
    0.3
}

fn default_max_rating() -> f32 {
    5.0
}

fn default_fallback_divisor() -> f32 {
    50.0
}

fn default_fallback_margin() -> f32 {
    0.001
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            cf_weight: 1.0,
            content_weight: 1.0,
            popularity_weight: 1.5,
            popularity_log_divisor: default_popularity_log_divisor(),
            content_log_divisor: default_content_log_divisor(),
            content_quality_blend: default_content_quality_blend(),
            max_rating: default_max_rating(),
            fallback_divisor: default_fallback_divisor(),
            fallback_margin: default_fallback_margin(),
        }
    }
}

/// Worker-pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    /// Worker threads; 0 picks all cores minus two (at least one)
    #[serde(default)]
    pub num_threads: usize,
    /// Similarity computations in flight per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_batch_size() -> usize {
    100
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            num_threads: 0,
            batch_size: default_batch_size(),
        }
    }
}

impl ConcurrencyConfig {
    /// Resolve `num_threads`, leaving two cores to the rest of the system.
    pub fn worker_threads(&self) -> usize {
        if self.num_threads > 0 {
            return self.num_threads;
        }
        std::thread::available_parallelism()
            .map(|n| n.get().saturating_sub(2))
            .unwrap_or(1)
            .max(1)
    }
}
