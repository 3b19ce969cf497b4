//! Exact, memoised pairwise similarity between users

use super::cache::{pair_key, SimilarityCache};
use super::measure::{common_item_count, CoRatedStats};
use crate::config::{SimilarityConfig, SimilarityMeasure};
use crate::types::{UserId, UserProfile};
use std::collections::HashMap;

/// Computes user-user similarity over co-rated items
///
/// Borrows the user profiles and the shared cache; cheap to construct per
/// request.
#[derive(Debug, Clone, Copy)]
pub struct SimilarityCalculator<'a> {
    users: &'a HashMap<UserId, UserProfile>,
    measure: SimilarityMeasure,
    min_common_items: usize,
    cache: &'a dyn SimilarityCache,
}

impl<'a> SimilarityCalculator<'a> {
    pub fn new(
        users: &'a HashMap<UserId, UserProfile>,
        config: &SimilarityConfig,
        cache: &'a dyn SimilarityCache,
    ) -> Self {
        Self {
            users,
            measure: config.measure,
            min_common_items: config.min_common_items,
            cache,
        }
    }

    /// Symmetric similarity in [-1, 1].
    ///
    /// Unknown users give 0.0 and are not cached. Pairs with fewer than
    /// `min_common_items` co-rated items give 0.0.
    pub fn similarity(&self, a: UserId, b: UserId) -> f32 {
        let (Some(pa), Some(pb)) = (self.users.get(&a), self.users.get(&b)) else {
            return 0.0;
        };

        let key = pair_key(a, b);
        if let Some(cached) = self.cache.get(key) {
            return cached;
        }

        // Merge in canonical order so both argument orders sum identically
        let (first, second) = if a <= b { (pa, pb) } else { (pb, pa) };
        let value = self.compute(first, second);
        self.cache.insert(key, value);
        value
    }

    /// Uncached similarity of two profiles
    pub fn compute(&self, a: &UserProfile, b: &UserProfile) -> f32 {
        let stats = CoRatedStats::collect(&a.ratings, &b.ratings);
        if stats.count < self.min_common_items {
            return 0.0;
        }
        match self.measure {
            SimilarityMeasure::Pearson => stats.pearson(),
            SimilarityMeasure::Cosine => stats.cosine(),
        }
    }

    /// Number of items both users rated; 0 if either is unknown
    pub fn common_items(&self, a: UserId, b: UserId) -> usize {
        match (self.users.get(&a), self.users.get(&b)) {
            (Some(pa), Some(pb)) => common_item_count(&pa.ratings, &pb.ratings),
            _ => 0,
        }
    }

    pub fn measure(&self) -> SimilarityMeasure {
        self.measure
    }

    pub fn cache(&self) -> &'a dyn SimilarityCache {
        self.cache
    }
}
