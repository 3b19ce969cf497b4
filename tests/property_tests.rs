//! Property-based tests for lshrec
//!
//! These tests verify invariants that should hold regardless of input:
//! - Signature length equals the configured hash count
//! - Estimated and exact similarities are symmetric and bounded
//! - Similarity cache keys are canonical
//! - Recommendation lists never exceed top_k

use lshrec::{
    config::{Config, LshConfig, SimilarityConfig, SimilarityMeasure},
    index::{perturb_band_hash, LshIndex, SignatureBuilder},
    similarity::{create_cache, pair_key, CoRatedStats, SimilarityCalculator},
    types::{ItemId, Rating, UserId, UserProfile},
    CatalogBuilder, Recommender,
};
use proptest::prelude::*;
use std::collections::{BTreeMap, HashMap};

prop_compose! {
    fn arb_item_set()(items in prop::collection::btree_set(0u32..500, 1..40)) -> Vec<ItemId> {
        items.into_iter().collect()
    }
}

prop_compose! {
    fn arb_ratings()(
        ratings in prop::collection::btree_map(0u32..60, 1u8..=10, 0..25)
    ) -> Vec<(ItemId, Rating)> {
        ratings.into_iter().map(|(i, r)| (i, r as f32 / 2.0)).collect()
    }
}

mod signature_props {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn signature_length_is_constant(users in prop::collection::vec(arb_item_set(), 1..20)) {
            let config = LshConfig::default();
            let map: HashMap<UserId, Vec<ItemId>> =
                users.into_iter().enumerate().map(|(i, s)| (i as UserId, s)).collect();
            let sigs = SignatureBuilder::new(&config).build(&map, 3);
            prop_assert_eq!(sigs.len(), map.len());
            for sig in sigs.values() {
                prop_assert_eq!(sig.len(), config.num_hash_functions);
            }
        }

        #[test]
        fn estimate_is_symmetric_and_bounded(a in arb_item_set(), b in arb_item_set()) {
            let config = LshConfig::default();
            let mut map = HashMap::new();
            map.insert(1, a.clone());
            map.insert(2, b);
            map.insert(3, a);
            let sigs = SignatureBuilder::new(&config).build(&map, 2);
            let index = LshIndex::build(&config, sigs).unwrap();

            let ab = index.estimate_similarity(1, 2);
            prop_assert_eq!(ab, index.estimate_similarity(2, 1));
            prop_assert!((0.0..=1.0).contains(&ab));
            prop_assert_eq!(index.estimate_similarity(1, 3), 1.0);
            prop_assert!(index.find_similar_candidates(1, 10).contains(&3));
        }

        #[test]
        fn zero_offset_probe_is_identity(h in 0u64..20_000, modulus in 1u64..50_000) {
            let reduced = h % modulus;
            prop_assert_eq!(perturb_band_hash(reduced, 0, modulus), reduced);
        }
    }
}

mod similarity_props {
    use super::*;

    proptest! {
        #[test]
        fn pair_key_is_order_independent(a: u32, b: u32) {
            prop_assert_eq!(pair_key(a, b), pair_key(b, a));
        }

        #[test]
        fn exact_similarity_is_symmetric_and_bounded(
            a in arb_ratings(),
            b in arb_ratings(),
            cosine in any::<bool>(),
        ) {
            let users: HashMap<UserId, UserProfile> = [
                (1, UserProfile::new(1, a)),
                (2, UserProfile::new(2, b)),
            ]
            .into_iter()
            .collect();
            let config = SimilarityConfig {
                measure: if cosine { SimilarityMeasure::Cosine } else { SimilarityMeasure::Pearson },
                ..SimilarityConfig::default()
            };

            // Separate caches so the second call is computed, not replayed
            let c1 = create_cache(config.cache);
            let c2 = create_cache(config.cache);
            let ab = SimilarityCalculator::new(&users, &config, c1.as_ref()).similarity(1, 2);
            let ba = SimilarityCalculator::new(&users, &config, c2.as_ref()).similarity(2, 1);
            prop_assert_eq!(ab, ba);
            prop_assert!(ab.is_finite());
            prop_assert!((-1.0..=1.0).contains(&ab));
        }

        #[test]
        fn pearson_of_self_is_one_or_zero(a in arb_ratings()) {
            let r = CoRatedStats::collect(&a, &a).pearson();
            prop_assert!(r == 1.0 || r == 0.0, "r = {}", r);
        }
    }
}

mod recommend_props {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn list_never_exceeds_top_k(
            ratings in prop::collection::vec((0u32..30, 0u32..80, 1u8..=10), 1..300),
            top_k in 1usize..10,
        ) {
            let mut b = CatalogBuilder::new();
            for item in 0..80u32 {
                let genre = ["Action", "Comedy", "Drama"][(item % 3) as usize];
                b.add_movie(item, &[genre]).unwrap();
            }
            let mut by_user: BTreeMap<UserId, usize> = BTreeMap::new();
            for (user, item, r) in ratings {
                b.add_rating(user, item, r as f32 / 2.0).unwrap();
                *by_user.entry(user).or_default() += 1;
            }
            let catalog = b.build(3.5, 5);

            let mut config = Config::default();
            config.concurrency.num_threads = 2;
            config.recommendation.top_k = top_k;
            let recommender = Recommender::build(&config, &catalog).unwrap();

            for &user in by_user.keys() {
                let recs = recommender.recommend(user);
                prop_assert!(recs.len() <= top_k);
                let profile = catalog.user(user).unwrap();
                for rec in &recs {
                    prop_assert!(!profile.has_rated(rec.item_id));
                }
            }
            prop_assert!(recommender.recommend(10_000).is_empty());
        }
    }
}
