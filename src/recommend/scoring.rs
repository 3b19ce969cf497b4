//! Hybrid scoring stages
//!
//! Each stage reads the catalog and mutates one shared score map:
//! 1. collaborative filtering from refined neighbours
//! 2. genre boost for the user's preferred genres
//! 3. popularity fallback when fewer than `top_k` items were scored
//!
//! [`rank`] turns the map into the final list.

use crate::catalog::Catalog;
use crate::config::ScoringWeights;
use crate::types::{genre_bits, ItemId, Rating, Recommendation, SimilarUser, UserProfile};
use std::collections::HashMap;

/// Item -> accumulated score
pub type ScoreMap = HashMap<ItemId, f32>;

/// `ln(popularity + 1)` for an item, 0.0 if it was never rated
fn log_popularity(catalog: &Catalog, item: ItemId) -> f32 {
    catalog
        .item_popularity(item)
        .map(|p| (p as f32 + 1.0).ln())
        .unwrap_or(0.0)
}

/// Mean-centred collaborative filtering over unwatched items.
///
/// Each item accumulates `sim * (rating - neighbour_avg)` from the neighbours
/// who rated it. Every item is normalised by the same total, `sum(|sim|)` over
/// all neighbours, so an item only weak neighbours rated stays close to its
/// average. The result is scaled by `cf_weight`, re-centred on the item
/// average (the global average if the item has none) and lifted by a
/// log-popularity term.
pub fn collaborative_scores(
    catalog: &Catalog,
    profile: &UserProfile,
    neighbours: &[SimilarUser],
    weights: &ScoringWeights,
) -> ScoreMap {
    let mut weighted: HashMap<ItemId, f64> = HashMap::new();
    let mut total_sim = 0.0f64;
    for neighbour in neighbours {
        let sim = neighbour.similarity as f64;
        total_sim += sim.abs();
        let Some(other) = catalog.user(neighbour.user_id) else {
            continue;
        };
        for &(item, rating) in &other.ratings {
            if profile.has_rated(item) {
                continue;
            }
            *weighted.entry(item).or_default() += sim * (rating - other.avg_rating) as f64;
        }
    }

    if total_sim <= 0.0 {
        return ScoreMap::new();
    }

    weighted
        .into_iter()
        .map(|(item, sum)| {
            let baseline = catalog
                .item_average(item)
                .unwrap_or_else(|| catalog.global_average());
            let deviation = (sum / total_sim) as f32 * weights.cf_weight;
            let popularity = log_popularity(catalog, item) / weights.popularity_log_divisor
                * weights.popularity_weight;
            (item, deviation + baseline + popularity)
        })
        .collect()
}

/// Boost unwatched items in each of the user's preferred genres.
///
/// An item in several preferred genres is boosted once per genre. Items
/// nobody rated are skipped.
pub fn apply_content_boost(
    catalog: &Catalog,
    profile: &UserProfile,
    scores: &mut ScoreMap,
    weights: &ScoringWeights,
) {
    for genre in genre_bits(profile.preferred_genres) {
        for &item in catalog.items_in_genre(genre) {
            if profile.has_rated(item) {
                continue;
            }
            let Some(average) = catalog.item_average(item) else {
                continue;
            };
            let quality = average / weights.max_rating;
            let popularity = (log_popularity(catalog, item) / weights.content_log_divisor).min(1.0);
            let blend = weights.content_quality_blend * quality
                + (1.0 - weights.content_quality_blend) * popularity;
            let boost = blend * weights.content_weight + popularity * weights.popularity_weight;
            *scores.entry(item).or_default() += boost;
        }
    }
}

/// Fill up to `top_k` entries with popular, well-rated unwatched items.
///
/// Does nothing when `scores` already holds `top_k` items. Fallback scores
/// stay strictly below every organic score.
pub fn apply_popularity_fallback(
    catalog: &Catalog,
    profile: &UserProfile,
    scores: &mut ScoreMap,
    top_k: usize,
    min_rating: Rating,
    weights: &ScoringWeights,
) {
    if scores.len() >= top_k {
        return;
    }
    let needed = top_k - scores.len();

    let mut ranked: Vec<(ItemId, f32)> = catalog
        .popularity()
        .filter(|(item, _)| !profile.has_rated(*item) && !scores.contains_key(item))
        .filter_map(|(item, count)| {
            let average = catalog.item_average(item)?;
            (average >= min_rating)
                .then(|| (item, count as f32 * average * weights.popularity_weight))
        })
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(needed);

    let Some(&(_, raw_max)) = ranked.first() else {
        return;
    };
    let organic_min = scores.values().copied().min_by(f32::total_cmp);

    for (item, raw) in ranked {
        let score = match organic_min {
            Some(floor) => {
                let relative = if raw_max > 0.0 { raw / raw_max } else { 0.0 };
                floor - weights.fallback_margin - (1.0 - relative)
            }
            None => raw / weights.fallback_divisor,
        };
        scores.insert(item, score);
    }
}

/// Sort by score descending (ties by item ID) and keep `top_k`
pub fn rank(scores: ScoreMap, top_k: usize) -> Vec<Recommendation> {
    let mut ranked: Vec<Recommendation> = scores
        .into_iter()
        .filter(|(_, score)| score.is_finite())
        .map(|(item, score)| Recommendation::new(item, score))
        .collect();
    ranked.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.item_id.cmp(&b.item_id))
    });
    ranked.truncate(top_k);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogBuilder;

    // ========================================================================
    // Fixtures
    // ========================================================================

    /// Items 1..=6; genres: 1,2 Action; 3 Comedy; 4,5,6 Drama
    fn catalog() -> Catalog {
        let mut b = CatalogBuilder::new();
        b.add_movie(1, &["Action"]).unwrap();
        b.add_movie(2, &["Action"]).unwrap();
        b.add_movie(3, &["Comedy"]).unwrap();
        b.add_movie(4, &["Drama"]).unwrap();
        b.add_movie(5, &["Drama"]).unwrap();
        b.add_movie(6, &["Drama"]).unwrap();
        b.add_movie(7, &["Drama"]).unwrap();
        // Target user 1 likes action
        b.add_rating(1, 1, 5.0).unwrap();
        // Neighbour 2 rates item 2 above their mean and item 3 below
        b.add_rating(2, 1, 5.0).unwrap();
        b.add_rating(2, 2, 5.0).unwrap();
        b.add_rating(2, 3, 2.0).unwrap();
        // Popularity signal on drama
        for u in 10..20 {
            b.add_rating(u, 4, 4.5).unwrap();
        }
        for u in 10..13 {
            b.add_rating(u, 5, 4.0).unwrap();
        }
        b.add_rating(10, 6, 1.0).unwrap();
        b.build(3.5, 5)
    }

    fn weights() -> ScoringWeights {
        ScoringWeights::default()
    }

    // ========================================================================
    // Collaborative filtering
    // ========================================================================

    #[test]
    fn test_cf_skips_watched_and_centres_on_item_average() {
        let catalog = catalog();
        let profile = catalog.user(1).unwrap();
        let neighbours = [SimilarUser {
            user_id: 2,
            similarity: 0.8,
        }];
        let scores = collaborative_scores(&catalog, profile, &neighbours, &weights());
        assert!(!scores.contains_key(&1));
        assert_eq!(scores.len(), 2);

        // Neighbour average is 4.0; item 2 deviation +1.0, item 3 deviation -2.0
        let pop = 2.0f32.ln() / 15.0 * 1.5;
        assert!((scores[&2] - (1.0 + 5.0 + pop)).abs() < 1e-5);
        assert!((scores[&3] - (-2.0 + 2.0 + pop)).abs() < 1e-5);
    }

    #[test]
    fn test_cf_weight_scales_deviation() {
        let catalog = catalog();
        let profile = catalog.user(1).unwrap();
        let neighbours = [SimilarUser {
            user_id: 2,
            similarity: 0.5,
        }];
        let w = ScoringWeights {
            cf_weight: 0.0,
            popularity_weight: 0.0,
            ..weights()
        };
        let scores = collaborative_scores(&catalog, profile, &neighbours, &w);
        assert!((scores[&2] - 5.0).abs() < 1e-6);
        assert!((scores[&3] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_cf_normalises_by_total_neighbour_similarity() {
        let mut b = CatalogBuilder::new();
        b.add_rating(1, 1, 4.0).unwrap();
        // Strong neighbour: mean 4.0, rates item 10 one below
        b.add_rating(2, 1, 5.0).unwrap();
        b.add_rating(2, 10, 3.0).unwrap();
        // Weak neighbour: mean 3.0, rates item 20 two above
        b.add_rating(3, 1, 1.0).unwrap();
        b.add_rating(3, 20, 5.0).unwrap();
        b.add_rating(3, 21, 3.0).unwrap();
        let catalog = b.build(3.5, 5);

        let neighbours = [
            SimilarUser {
                user_id: 2,
                similarity: 0.9,
            },
            SimilarUser {
                user_id: 3,
                similarity: 0.1,
            },
        ];
        let w = ScoringWeights {
            popularity_weight: 0.0,
            ..weights()
        };
        let scores = collaborative_scores(&catalog, catalog.user(1).unwrap(), &neighbours, &w);

        // Total similarity is 1.0 for every item
        assert!((scores[&20] - (0.1 * 2.0 + 5.0)).abs() < 1e-5, "got {}", scores[&20]);
        assert!((scores[&10] - (0.9 * -1.0 + 3.0)).abs() < 1e-5, "got {}", scores[&10]);
        assert!((scores[&21] - 3.0).abs() < 1e-5, "got {}", scores[&21]);
        assert!(scores[&20] < 5.5, "a weak neighbour must not carry full weight");
    }

    #[test]
    fn test_cf_without_neighbours_is_empty() {
        let catalog = catalog();
        let scores = collaborative_scores(&catalog, catalog.user(1).unwrap(), &[], &weights());
        assert!(scores.is_empty());
    }

    // ========================================================================
    // Content boost
    // ========================================================================

    #[test]
    fn test_content_boost_targets_preferred_genres() {
        let catalog = catalog();
        let profile = catalog.user(1).unwrap();
        assert_eq!(catalog.genre_names_of(profile.preferred_genres), vec!["Action"]);

        let mut scores = ScoreMap::new();
        apply_content_boost(&catalog, profile, &mut scores, &weights());
        // Item 1 is watched; item 2 is the only other action title
        assert_eq!(scores.len(), 1);
        let p = (2.0f32.ln() / 10.0).min(1.0);
        let expected = (0.3 * (5.0 / 5.0) + 0.7 * p) + p * 1.5;
        assert!((scores[&2] - expected).abs() < 1e-5);
    }

    #[test]
    fn test_content_boost_without_preferences_is_noop() {
        let catalog = catalog();
        let profile = catalog.user(10).unwrap().clone().with_preferred_genres(0);
        let mut scores = ScoreMap::new();
        apply_content_boost(&catalog, &profile, &mut scores, &weights());
        assert!(scores.is_empty());
    }

    #[test]
    fn test_content_boost_skips_unrated_items() {
        let catalog = catalog();
        let profile = catalog.user(10).unwrap();
        let mut scores = ScoreMap::new();
        apply_content_boost(&catalog, profile, &mut scores, &weights());
        // Item 7 is drama but nobody rated it
        assert!(!scores.contains_key(&7));
    }

    // ========================================================================
    // Popularity fallback
    // ========================================================================

    #[test]
    fn test_fallback_without_organic_scores() {
        let catalog = catalog();
        let profile = catalog.user(1).unwrap();
        let mut scores = ScoreMap::new();
        apply_popularity_fallback(&catalog, profile, &mut scores, 5, 3.5, &weights());
        // Items 4 (10 x 4.5), 2 (1 x 5.0) and 5 (3 x 4.0) pass the rating floor
        let mut ranked = rank(scores.clone(), 5);
        assert_eq!(
            ranked.iter().map(|r| r.item_id).collect::<Vec<_>>(),
            vec![4, 5, 2]
        );
        let top = ranked.remove(0);
        assert!((top.score - 10.0 * 4.5 * 1.5 / 50.0).abs() < 1e-5);
        assert!(!scores.contains_key(&6), "below min_rating");
        assert!(!scores.contains_key(&3), "below min_rating");
    }

    #[test]
    fn test_fallback_stays_below_organic() {
        let catalog = catalog();
        let profile = catalog.user(1).unwrap();
        let mut scores = ScoreMap::new();
        scores.insert(3, 0.01);
        apply_popularity_fallback(&catalog, profile, &mut scores, 3, 3.5, &weights());
        assert_eq!(scores.len(), 3);
        let ranked = rank(scores, 3);
        assert_eq!(ranked[0].item_id, 3);
        assert_eq!(ranked[1].item_id, 4);
        assert_eq!(ranked[2].item_id, 5);
        assert!(ranked[1].score < 0.01);
    }

    #[test]
    fn test_fallback_noop_when_full() {
        let catalog = catalog();
        let profile = catalog.user(1).unwrap();
        let mut scores: ScoreMap = [(2, 1.0), (3, 0.5)].into_iter().collect();
        apply_popularity_fallback(&catalog, profile, &mut scores, 2, 3.5, &weights());
        assert_eq!(scores.len(), 2);
    }

    // ========================================================================
    // Ranking
    // ========================================================================

    #[test]
    fn test_rank_breaks_ties_by_item_id() {
        let scores: ScoreMap = [(9, 1.0), (3, 1.0), (5, 2.0), (1, 0.5)].into_iter().collect();
        let ranked = rank(scores, 3);
        let ids: Vec<ItemId> = ranked.iter().map(|r| r.item_id).collect();
        assert_eq!(ids, vec![5, 3, 9]);
    }

    #[test]
    fn test_rank_drops_non_finite() {
        let scores: ScoreMap = [(1, f32::NAN), (2, 1.0)].into_iter().collect();
        assert_eq!(rank(scores, 5), vec![Recommendation::new(2, 1.0)]);
    }
}
