//! MinHash signatures of users' rated-item sets
//!
//! For a family of universal hash functions h_1..h_k, a user's signature is
//! `[min h_1(S), ..., min h_k(S)]` over the set S of items they rated. Two
//! signatures agree at position i with probability equal to the Jaccard
//! similarity of the underlying sets.

use super::hashing::{hash_family, seeded_rng, HashParams, SIGNATURE_STREAM};
use crate::config::LshConfig;
use crate::types::{ItemId, UserId, UserProfile};
use parking_lot::Mutex;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Anything that can enumerate a user's rated items
pub trait RatedItems {
    fn rated_items(&self) -> impl Iterator<Item = ItemId> + '_;
}

impl RatedItems for UserProfile {
    fn rated_items(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.items()
    }
}

impl RatedItems for Vec<ItemId> {
    fn rated_items(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.iter().copied()
    }
}

impl RatedItems for HashSet<ItemId> {
    fn rated_items(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.iter().copied()
    }
}

/// A user's MinHash signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinHashSignature {
    pub user_id: UserId,
    /// One minimum per hash function
    pub values: Vec<u32>,
}

impl MinHashSignature {
    /// Fraction of positions where two signatures agree.
    ///
    /// Unbiased estimate of the Jaccard similarity of the two item sets.
    pub fn agreement(&self, other: &Self) -> f32 {
        if self.values.len() != other.values.len() || self.values.is_empty() {
            return 0.0;
        }
        let matches = self
            .values
            .iter()
            .zip(other.values.iter())
            .filter(|(a, b)| a == b)
            .count();
        matches as f32 / self.values.len() as f32
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Computes MinHash signatures with a shared, seeded hash family
#[derive(Debug, Clone)]
pub struct SignatureBuilder {
    hash_functions: Vec<HashParams>,
    prime: u32,
}

impl SignatureBuilder {
    /// Create a builder with `config.num_hash_functions` functions drawn from `config.seed`.
    pub fn new(config: &LshConfig) -> Self {
        let mut rng = seeded_rng(config.seed, SIGNATURE_STREAM);
        Self {
            hash_functions: hash_family(&mut rng, config.num_hash_functions, config.large_prime),
            prime: config.large_prime,
        }
    }

    pub fn num_hash_functions(&self) -> usize {
        self.hash_functions.len()
    }

    /// Every hash function evaluated on one item
    pub fn hash_item(&self, item: ItemId) -> Vec<u32> {
        self.hash_functions
            .iter()
            .map(|h| h.apply(item, self.prime))
            .collect()
    }

    /// Signature of a single item set without memoisation.
    ///
    /// Returns `None` for an empty set.
    pub fn signature_for<I>(&self, user_id: UserId, items: I) -> Option<MinHashSignature>
    where
        I: IntoIterator<Item = ItemId>,
    {
        let mut values = vec![u32::MAX; self.hash_functions.len()];
        let mut any = false;
        for item in items {
            any = true;
            for (slot, h) in values.iter_mut().zip(&self.hash_functions) {
                *slot = (*slot).min(h.apply(item, self.prime));
            }
        }
        any.then_some(MinHashSignature { user_id, values })
    }

    /// Build signatures for every user with at least one rated item.
    ///
    /// Item hashes are computed once per distinct item. Users are split into
    /// `num_workers` contiguous chunks processed in parallel; each chunk is
    /// merged into the shared store under a short exclusive lock.
    pub fn build<S>(&self, users: &HashMap<UserId, S>, num_workers: usize) -> HashMap<UserId, MinHashSignature>
    where
        S: RatedItems + Sync,
    {
        let distinct: HashSet<ItemId> = users.values().flat_map(|u| u.rated_items()).collect();
        let item_hashes: HashMap<ItemId, Box<[u32]>> = distinct
            .par_iter()
            .map(|&item| (item, self.hash_item(item).into_boxed_slice()))
            .collect();
        debug!("Precomputed hashes for {} distinct items", item_hashes.len());

        let mut user_ids: Vec<UserId> = users.keys().copied().collect();
        user_ids.sort_unstable();

        let store: Mutex<HashMap<UserId, MinHashSignature>> =
            Mutex::new(HashMap::with_capacity(user_ids.len()));
        if user_ids.is_empty() {
            return store.into_inner();
        }

        let workers = num_workers.max(1);
        let chunk_size = user_ids.len().div_ceil(workers);

        user_ids.par_chunks(chunk_size).for_each(|chunk| {
            let local: Vec<MinHashSignature> = chunk
                .iter()
                .filter_map(|&user_id| {
                    let items = users.get(&user_id)?;
                    self.fold_precomputed(user_id, items.rated_items(), &item_hashes)
                })
                .collect();

            store
                .lock()
                .extend(local.into_iter().map(|sig| (sig.user_id, sig)));
        });

        let signatures = store.into_inner();
        info!(
            "Built {} MinHash signatures ({} hash functions, {} workers)",
            signatures.len(),
            self.hash_functions.len(),
            workers
        );
        signatures
    }

    fn fold_precomputed(
        &self,
        user_id: UserId,
        items: impl Iterator<Item = ItemId>,
        item_hashes: &HashMap<ItemId, Box<[u32]>>,
    ) -> Option<MinHashSignature> {
        let mut values = vec![u32::MAX; self.hash_functions.len()];
        let mut any = false;
        for item in items {
            let Some(hashes) = item_hashes.get(&item) else {
                continue;
            };
            any = true;
            for (slot, &h) in values.iter_mut().zip(hashes.iter()) {
                *slot = (*slot).min(h);
            }
        }
        any.then_some(MinHashSignature { user_id, values })
    }
}
