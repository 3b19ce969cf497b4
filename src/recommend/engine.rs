//! Per-user recommendation pipeline

use super::candidates::CandidateSelector;
use super::scoring::{apply_content_boost, apply_popularity_fallback, collaborative_scores, rank};
use crate::catalog::Catalog;
use crate::config::Config;
use crate::index::LshIndex;
use crate::similarity::SimilarityCalculator;
use crate::types::{Candidate, Recommendation, SimilarUser, UserId};
use rayon::prelude::*;
use tracing::debug;

/// Borrowed view over everything a request needs
///
/// Holds no state of its own beyond the shared similarity cache behind
/// [`SimilarityCalculator`], so one engine can serve many threads.
#[derive(Debug, Clone, Copy)]
pub struct RecommendationEngine<'a> {
    config: &'a Config,
    catalog: &'a Catalog,
    candidates: CandidateSelector<'a>,
    similarity: SimilarityCalculator<'a>,
}

impl<'a> RecommendationEngine<'a> {
    pub fn new(
        config: &'a Config,
        catalog: &'a Catalog,
        index: &'a LshIndex,
        similarity: SimilarityCalculator<'a>,
    ) -> Self {
        Self {
            config,
            catalog,
            candidates: CandidateSelector::new(
                catalog,
                index,
                &config.recommendation,
                config.similarity.min_common_items,
            ),
            similarity,
        }
    }

    /// Up to `top_k` items for `user_id`, best first.
    ///
    /// Unknown users get an empty list. Every stage degrades to a smaller
    /// result rather than failing.
    pub fn recommend(&self, user_id: UserId) -> Vec<Recommendation> {
        let Some(profile) = self.catalog.user(user_id) else {
            debug!("User {} not in catalog", user_id);
            return Vec::new();
        };
        let rec = &self.config.recommendation;
        let weights = &self.config.scoring;

        let candidates = self.candidates.select(profile);
        let neighbours = self.refine_similarities(user_id, &candidates);

        let mut scores = collaborative_scores(self.catalog, profile, &neighbours, weights);
        let cf_count = scores.len();
        apply_content_boost(self.catalog, profile, &mut scores, weights);
        let boosted_count = scores.len();
        apply_popularity_fallback(
            self.catalog,
            profile,
            &mut scores,
            rec.top_k,
            rec.min_rating,
            weights,
        );

        debug!(
            "User {}: {} candidates, {} neighbours, {} CF items, {} after boost, {} after fallback",
            user_id,
            candidates.len(),
            neighbours.len(),
            cf_count,
            boosted_count,
            scores.len()
        );

        rank(scores, rec.top_k)
    }

    /// Exact similarity for each candidate, computed in parallel batches.
    ///
    /// Each batch of `batch_size` finishes before the next starts. Only
    /// neighbours above `min_similarity` are kept, strongest first (ties by
    /// user ID), at most `max_similar_users`.
    pub fn refine_similarities(&self, user_id: UserId, candidates: &[Candidate]) -> Vec<SimilarUser> {
        let rec = &self.config.recommendation;
        let batch_size = self.config.concurrency.batch_size.max(1);

        let mut similar: Vec<SimilarUser> = Vec::with_capacity(candidates.len());
        for batch in candidates.chunks(batch_size) {
            let scored: Vec<SimilarUser> = batch
                .par_iter()
                .map(|c| SimilarUser {
                    user_id: c.user_id,
                    similarity: self.similarity.similarity(user_id, c.user_id),
                })
                .collect();
            similar.extend(
                scored
                    .into_iter()
                    .filter(|s| s.similarity > rec.min_similarity),
            );
        }

        similar.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        similar.truncate(rec.max_similar_users);
        similar
    }

    pub fn similarity(&self) -> &SimilarityCalculator<'a> {
        &self.similarity
    }

    pub fn candidates(&self) -> &CandidateSelector<'a> {
        &self.candidates
    }
}
