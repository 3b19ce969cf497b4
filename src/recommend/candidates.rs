//! Neighbour candidate discovery
//!
//! The LSH index proposes neighbours; each is checked for actual rating
//! overlap. When LSH comes back nearly empty, an exhaustive inverted-index
//! scan backfills the pool so sparse users still get collaborative scores.

use crate::catalog::Catalog;
use crate::config::{CandidateStrategy, RecommendationConfig};
use crate::index::LshIndex;
use crate::similarity::common_item_count;
use crate::types::{Candidate, UserId, UserProfile};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Selects neighbour candidates for one user at a time
#[derive(Debug, Clone, Copy)]
pub struct CandidateSelector<'a> {
    catalog: &'a Catalog,
    index: &'a LshIndex,
    config: &'a RecommendationConfig,
    min_common_items: usize,
}

impl<'a> CandidateSelector<'a> {
    pub fn new(
        catalog: &'a Catalog,
        index: &'a LshIndex,
        config: &'a RecommendationConfig,
        min_common_items: usize,
    ) -> Self {
        Self {
            catalog,
            index,
            config,
            min_common_items,
        }
    }

    /// Number of neighbours requested from the index (or scan) per user
    fn search_limit(&self) -> usize {
        self.config
            .max_candidates
            .saturating_mul(self.config.candidate_multiplier)
    }

    /// Candidates with at least one co-rated item, at most `max_candidates`.
    ///
    /// See [`narrow`](Self::narrow) for the ordering of the result.
    pub fn select(&self, profile: &UserProfile) -> Vec<Candidate> {
        let mut pool = match self.config.candidate_strategy {
            CandidateStrategy::Lsh => self.lsh_candidates(profile),
            CandidateStrategy::Exhaustive => self.exhaustive_candidates(profile),
        };

        if self.config.candidate_strategy == CandidateStrategy::Lsh
            && pool.len() < self.config.emergency_fallback_threshold
        {
            let before = pool.len();
            let seen: HashSet<UserId> = pool.iter().map(|c| c.user_id).collect();
            pool.extend(
                self.exhaustive_candidates(profile)
                    .into_iter()
                    .filter(|c| !seen.contains(&c.user_id)),
            );
            warn!(
                "Emergency fallback for user {}: {} LSH candidates, {} after exhaustive scan",
                profile.user_id,
                before,
                pool.len()
            );
        }

        let selected = self.narrow(pool);
        debug!(
            "User {}: {} candidates selected",
            profile.user_id,
            selected.len()
        );
        selected
    }

    /// Partition, backfill and cap a discovered pool.
    ///
    /// High-overlap candidates (`>= min_common_items`) come first, by overlap
    /// descending then user ID. If fewer than `min_quality_candidates`
    /// qualify, the rest follow in the same order until the floor is met.
    /// The result holds at most `max_candidates` entries.
    pub fn narrow(&self, pool: Vec<Candidate>) -> Vec<Candidate> {
        let (mut selected, mut rest): (Vec<Candidate>, Vec<Candidate>) = pool
            .into_iter()
            .partition(|c| c.common_items >= self.min_common_items);
        selected.sort_by(by_overlap);

        if selected.len() < self.config.min_quality_candidates && !rest.is_empty() {
            rest.sort_by(by_overlap);
            let needed = self.config.min_quality_candidates - selected.len();
            selected.extend(rest.into_iter().take(needed));
        }

        selected.truncate(self.config.max_candidates);
        selected
    }

    /// LSH neighbours with non-zero overlap, in index order
    pub fn lsh_candidates(&self, profile: &UserProfile) -> Vec<Candidate> {
        self.index
            .find_similar_candidates(profile.user_id, self.search_limit())
            .into_iter()
            .filter_map(|user_id| {
                let other = self.catalog.user(user_id)?;
                let common_items = common_item_count(&profile.ratings, &other.ratings);
                (common_items > 0).then_some(Candidate {
                    user_id,
                    common_items,
                })
            })
            .collect()
    }

    /// Every user sharing an item with `profile`, by overlap descending
    pub fn exhaustive_candidates(&self, profile: &UserProfile) -> Vec<Candidate> {
        let mut overlap: HashMap<UserId, usize> = HashMap::new();
        for item in profile.items() {
            for &other in self.catalog.raters_of(item) {
                if other != profile.user_id {
                    *overlap.entry(other).or_default() += 1;
                }
            }
        }

        let mut candidates: Vec<Candidate> = overlap
            .into_iter()
            .map(|(user_id, common_items)| Candidate {
                user_id,
                common_items,
            })
            .collect();
        candidates.sort_by(by_overlap);
        candidates.truncate(self.search_limit());
        candidates
    }
}

/// Overlap descending, ties by user ID
fn by_overlap(a: &Candidate, b: &Candidate) -> Ordering {
    b.common_items
        .cmp(&a.common_items)
        .then_with(|| a.user_id.cmp(&b.user_id))
}
