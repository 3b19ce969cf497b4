//! Banded Locality-Sensitive Hashing over MinHash signatures
//!
//! Each table keys a user by a few contiguous bands of their signature
//! (`bands_per_table`), starting at a table-specific rotating offset. Users
//! collide in a table only when every row of those bands agrees, and tables
//! are OR-ed at query time. Fewer, looser bands per table favour recall,
//! which matters for sparse rating overlap where strict banding leaves most
//! true neighbours in singleton buckets.

use super::hashing::{seeded_rng, HashParams, BAND_STREAM};
use super::signature::MinHashSignature;
use super::IndexError;
use crate::config::{LshConfig, BAND_KEY_BITS, MAX_BANDS_PER_TABLE};
use crate::types::UserId;
use rayon::prelude::*;
use std::collections::HashMap;
use tracing::{debug, info};

/// Multiplier for folding row hashes into a band hash
const BAND_FOLD_MULTIPLIER: u64 = 37;

/// Summary of bucket occupancy
#[derive(Debug, Clone, PartialEq)]
pub struct IndexStats {
    /// Users with a signature in the index
    pub num_users: usize,
    pub num_tables: usize,
    /// Non-empty buckets across all tables
    pub num_buckets: usize,
    pub largest_bucket: usize,
    pub mean_bucket_size: f64,
}

/// Reduce a band hash after adding a probe offset.
///
/// Offset 0 leaves an already-reduced hash unchanged.
#[inline]
pub fn perturb_band_hash(band_hash: u64, offset: u64, band_modulus: u64) -> u64 {
    (band_hash + offset) % band_modulus
}

/// Shift-XOR band hashes into a bucket key.
///
/// Each band hash takes `BAND_KEY_BITS`, so at most `MAX_BANDS_PER_TABLE`
/// bands below `2^BAND_KEY_BITS` keep every band in the key.
#[inline]
pub fn combine_band_hashes<I>(band_hashes: I, num_buckets: u64) -> u64
where
    I: IntoIterator<Item = u64>,
{
    band_hashes
        .into_iter()
        .fold(0u64, |acc, h| (acc << BAND_KEY_BITS) ^ h)
        % num_buckets
}

/// Multi-table LSH index, built once and read-only afterwards
#[derive(Debug)]
pub struct LshIndex {
    config: LshConfig,
    /// `[table][band]` hash parameters
    band_params: Vec<Vec<HashParams>>,
    /// `[table]` bucket key -> user IDs (ascending)
    tables: Vec<HashMap<u64, Vec<UserId>>>,
    signatures: HashMap<UserId, MinHashSignature>,
}

impl LshIndex {
    /// Index `signatures` into `config.num_tables` tables.
    ///
    /// Fails if the band layout is inconsistent or a signature has the wrong
    /// length. An empty signature map yields an empty index.
    pub fn build(
        config: &LshConfig,
        signatures: HashMap<UserId, MinHashSignature>,
    ) -> Result<Self, IndexError> {
        validate_params(config)?;

        if let Some(bad) = signatures
            .values()
            .find(|s| s.len() != config.num_hash_functions)
        {
            return Err(IndexError::SignatureLength {
                user_id: bad.user_id,
                expected: config.num_hash_functions,
                got: bad.len(),
            });
        }

        let mut rng = seeded_rng(config.seed, BAND_STREAM);
        let band_params: Vec<Vec<HashParams>> = (0..config.num_tables)
            .map(|_| {
                (0..config.num_bands)
                    .map(|_| HashParams::random(&mut rng, config.large_prime))
                    .collect()
            })
            .collect();

        let mut index = Self {
            config: config.clone(),
            band_params,
            tables: Vec::new(),
            signatures,
        };

        let mut user_ids: Vec<UserId> = index.signatures.keys().copied().collect();
        user_ids.sort_unstable();

        let tables: Vec<HashMap<u64, Vec<UserId>>> = (0..index.config.num_tables)
            .into_par_iter()
            .map(|table| {
                let mut buckets: HashMap<u64, Vec<UserId>> = HashMap::new();
                for user_id in &user_ids {
                    let sig = &index.signatures[user_id];
                    buckets
                        .entry(index.bucket_key(sig, table))
                        .or_default()
                        .push(*user_id);
                }
                buckets
            })
            .collect();
        index.tables = tables;

        let stats = index.stats();
        info!(
            "LSH index built: {} users, {} tables, {} buckets (largest {}, mean {:.2})",
            stats.num_users,
            stats.num_tables,
            stats.num_buckets,
            stats.largest_bucket,
            stats.mean_bucket_size
        );

        Ok(index)
    }

    /// Bucket key of `signature` in `table`
    pub fn bucket_key(&self, signature: &MinHashSignature, table: usize) -> u64 {
        self.probe_key(signature, table, 0)
    }

    /// Bucket key with every band hash shifted by `offset` (multi-probe)
    pub fn probe_key(&self, signature: &MinHashSignature, table: usize, offset: u64) -> u64 {
        let start = self.config.start_band(table);
        let band_hashes = (0..self.config.bands_per_table).map(|i| {
            let band = (start + i) % self.config.num_bands;
            perturb_band_hash(
                self.band_hash(signature, table, band),
                offset,
                self.config.band_modulus,
            )
        });
        combine_band_hashes(band_hashes, self.config.num_buckets)
    }

    /// Hash of one band's rows under the (table, band) universal hash
    fn band_hash(&self, signature: &MinHashSignature, table: usize, band: usize) -> u64 {
        let params = self.band_params[table][band];
        let start = band * self.config.rows_per_band;
        let rows = &signature.values[start..start + self.config.rows_per_band];
        let folded = rows.iter().fold(0u64, |acc, &v| {
            acc.wrapping_mul(BAND_FOLD_MULTIPLIER) ^ params.apply(v, self.config.large_prime) as u64
        });
        folded % self.config.band_modulus
    }

    /// Approximate neighbours of `user_id`, best first.
    ///
    /// Returns an empty list for users that are not indexed.
    pub fn find_similar_candidates(&self, user_id: UserId, max_candidates: usize) -> Vec<UserId> {
        self.scored_candidates(user_id, max_candidates)
            .into_iter()
            .map(|(id, _)| id)
            .collect()
    }

    /// Like [`find_similar_candidates`](Self::find_similar_candidates), with
    /// the blended hit-count / Jaccard score of each candidate.
    pub fn scored_candidates(&self, user_id: UserId, max_candidates: usize) -> Vec<(UserId, f32)> {
        let Some(query) = self.signatures.get(&user_id) else {
            return Vec::new();
        };
        if max_candidates == 0 {
            return Vec::new();
        }

        let mut hits: HashMap<UserId, u32> = HashMap::new();
        for table in 0..self.tables.len() {
            let key = self.bucket_key(query, table);
            self.collect_bucket(table, key, user_id, &mut hits);
        }

        let primary = hits.len();
        if primary < self.config.probe_floor {
            let probe_tables = self.config.probe_tables.min(self.tables.len());
            'probe: for table in 0..probe_tables {
                for offset in 1..=self.config.probe_depth {
                    let key = self.probe_key(query, table, offset);
                    self.collect_bucket(table, key, user_id, &mut hits);
                    if hits.len() >= self.config.probe_floor {
                        break 'probe;
                    }
                }
            }
            debug!(
                "Multi-probe for user {}: {} -> {} candidates",
                user_id,
                primary,
                hits.len()
            );
        }

        let mut scored: Vec<(UserId, f32)> = hits
            .into_iter()
            .map(|(candidate, count)| {
                let jaccard = self
                    .signatures
                    .get(&candidate)
                    .map(|sig| query.agreement(sig))
                    .unwrap_or(0.0);
                let score =
                    count as f32 * self.config.hit_weight + jaccard * self.config.jaccard_weight;
                (candidate, score)
            })
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(max_candidates);
        scored
    }

    fn collect_bucket(&self, table: usize, key: u64, query_user: UserId, hits: &mut HashMap<UserId, u32>) {
        if let Some(bucket) = self.tables[table].get(&key) {
            for &candidate in bucket {
                if candidate != query_user {
                    *hits.entry(candidate).or_default() += 1;
                }
            }
        }
    }

    /// Fraction of agreeing signature positions; 0.0 if either user is missing.
    pub fn estimate_similarity(&self, user_a: UserId, user_b: UserId) -> f32 {
        match (self.signatures.get(&user_a), self.signatures.get(&user_b)) {
            (Some(a), Some(b)) => a.agreement(b),
            _ => 0.0,
        }
    }

    pub fn signature(&self, user_id: UserId) -> Option<&MinHashSignature> {
        self.signatures.get(&user_id)
    }

    pub fn contains(&self, user_id: UserId) -> bool {
        self.signatures.contains_key(&user_id)
    }

    pub fn config(&self) -> &LshConfig {
        &self.config
    }

    /// Number of indexed users
    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    /// Bucket occupancy statistics
    pub fn stats(&self) -> IndexStats {
        let sizes = self
            .tables
            .iter()
            .flat_map(|t| t.values().map(Vec::len));
        let (num_buckets, total, largest) = sizes.fold((0usize, 0usize, 0usize), |(n, sum, max), s| {
            (n + 1, sum + s, max.max(s))
        });
        IndexStats {
            num_users: self.signatures.len(),
            num_tables: self.tables.len(),
            num_buckets,
            largest_bucket: largest,
            mean_bucket_size: if num_buckets > 0 {
                total as f64 / num_buckets as f64
            } else {
                0.0
            },
        }
    }
}

fn validate_params(config: &LshConfig) -> Result<(), IndexError> {
    if config.num_bands == 0 || config.rows_per_band == 0 {
        return Err(IndexError::InvalidParam(
            "num_bands and rows_per_band must be >= 1".to_string(),
        ));
    }
    if config.num_bands.checked_mul(config.rows_per_band) != Some(config.num_hash_functions) {
        return Err(IndexError::InvalidParam(format!(
            "num_bands ({}) x rows_per_band ({}) != num_hash_functions ({})",
            config.num_bands, config.rows_per_band, config.num_hash_functions
        )));
    }
    if config.num_tables == 0 {
        return Err(IndexError::InvalidParam("num_tables must be >= 1".to_string()));
    }
    let max_bands_per_table = config.num_bands.min(MAX_BANDS_PER_TABLE);
    if config.bands_per_table == 0 || config.bands_per_table > max_bands_per_table {
        return Err(IndexError::InvalidParam(format!(
            "bands_per_table must be in [1, {}]",
            max_bands_per_table
        )));
    }
    if config.num_buckets == 0 || config.band_modulus == 0 {
        return Err(IndexError::InvalidParam(
            "num_buckets and band_modulus must be >= 1".to_string(),
        ));
    }
    if config.band_modulus > 1 << BAND_KEY_BITS {
        return Err(IndexError::InvalidParam(format!(
            "band_modulus must be <= {}",
            1u64 << BAND_KEY_BITS
        )));
    }
    if config.large_prime < 2 {
        return Err(IndexError::InvalidParam("large_prime must be >= 2".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::SignatureBuilder;
    use crate::types::ItemId;

    fn build_index(config: &LshConfig, users: &HashMap<UserId, Vec<ItemId>>) -> LshIndex {
        let sigs = SignatureBuilder::new(config).build(users, 2);
        LshIndex::build(config, sigs).unwrap()
    }

    fn clustered_users() -> HashMap<UserId, Vec<ItemId>> {
        let mut users = HashMap::new();
        // Two identical users plus noise users with unrelated items
        users.insert(1, (100..110).collect());
        users.insert(2, (100..110).collect());
        for u in 10..60u32 {
            users.insert(u, (u * 1000..u * 1000 + 8).collect());
        }
        users
    }

    #[test]
    fn test_rejects_band_layout_mismatch() {
        let config = LshConfig {
            num_hash_functions: 100,
            num_bands: 24,
            rows_per_band: 4,
            ..LshConfig::default()
        };
        let err = LshIndex::build(&config, HashMap::new()).unwrap_err();
        assert!(matches!(err, IndexError::InvalidParam(_)));
        assert!(err.to_string().contains("24"));
    }

    #[test]
    fn test_rejects_overflowing_band_layout() {
        let config = LshConfig {
            num_bands: usize::MAX,
            rows_per_band: 2,
            ..LshConfig::default()
        };
        let err = LshIndex::build(&config, HashMap::new()).unwrap_err();
        assert!(matches!(err, IndexError::InvalidParam(_)));
    }

    #[test]
    fn test_rejects_more_bands_than_table_key_holds() {
        let config = LshConfig {
            bands_per_table: MAX_BANDS_PER_TABLE + 1,
            ..LshConfig::default()
        };
        let err = LshIndex::build(&config, HashMap::new()).unwrap_err();
        assert!(err.to_string().contains("[1, 4]"));

        let config = LshConfig {
            bands_per_table: MAX_BANDS_PER_TABLE,
            ..LshConfig::default()
        };
        assert!(LshIndex::build(&config, HashMap::new()).is_ok());
    }

    #[test]
    fn test_accepts_24_by_4_layout() {
        let config = LshConfig::default();
        assert_eq!(config.num_bands * config.rows_per_band, config.num_hash_functions);
        assert!(LshIndex::build(&config, HashMap::new()).is_ok());
    }

    #[test]
    fn test_rejects_wrong_signature_length() {
        let config = LshConfig::default();
        let mut sigs = HashMap::new();
        sigs.insert(
            5,
            MinHashSignature {
                user_id: 5,
                values: vec![0; 10],
            },
        );
        let err = LshIndex::build(&config, sigs).unwrap_err();
        assert_eq!(
            err,
            IndexError::SignatureLength {
                user_id: 5,
                expected: 96,
                got: 10
            }
        );
    }

    #[test]
    fn test_empty_index_returns_empty_results() {
        let index = LshIndex::build(&LshConfig::default(), HashMap::new()).unwrap();
        assert!(index.is_empty());
        assert!(index.find_similar_candidates(1, 10).is_empty());
        assert_eq!(index.estimate_similarity(1, 2), 0.0);
        assert_eq!(index.stats().num_buckets, 0);
    }

    #[test]
    fn test_unknown_user_has_no_candidates() {
        let index = build_index(&LshConfig::default(), &clustered_users());
        assert!(index.find_similar_candidates(9999, 10).is_empty());
    }

    #[test]
    fn test_identical_users_find_each_other() {
        for seed in [1u64, 7, 42, 1234, 99_999] {
            let config = LshConfig {
                seed,
                ..LshConfig::default()
            };
            let index = build_index(&config, &clustered_users());
            let candidates = index.find_similar_candidates(1, 10);
            assert_eq!(candidates.first(), Some(&2), "seed {} gave {:?}", seed, candidates);
            assert!(index.find_similar_candidates(2, 10).contains(&1));
            assert_eq!(index.estimate_similarity(1, 2), 1.0);
        }
    }

    #[test]
    fn test_query_user_is_excluded() {
        let index = build_index(&LshConfig::default(), &clustered_users());
        assert!(!index.find_similar_candidates(1, 100).contains(&1));
    }

    #[test]
    fn test_max_candidates_truncates() {
        let mut users = HashMap::new();
        for u in 0..30u32 {
            users.insert(u, (0..20).collect::<Vec<ItemId>>());
        }
        let index = build_index(&LshConfig::default(), &users);
        assert_eq!(index.find_similar_candidates(0, 5).len(), 5);
        assert_eq!(index.find_similar_candidates(0, 100).len(), 29);
        assert!(index.find_similar_candidates(0, 0).is_empty());
        // All tie on score, so IDs come back ascending
        assert_eq!(index.find_similar_candidates(0, 3), vec![1, 2, 3]);
    }

    #[test]
    fn test_users_only_live_in_their_own_buckets() {
        let index = build_index(&LshConfig::default(), &clustered_users());
        for (table, buckets) in index.tables.iter().enumerate() {
            for (key, users) in buckets {
                for user in users {
                    let sig = index.signature(*user).unwrap();
                    assert_eq!(index.bucket_key(sig, table), *key);
                }
            }
        }
    }

    #[test]
    fn test_every_user_appears_once_per_table() {
        let users = clustered_users();
        let index = build_index(&LshConfig::default(), &users);
        for buckets in &index.tables {
            let total: usize = buckets.values().map(Vec::len).sum();
            assert_eq!(total, users.len());
        }
    }

    #[test]
    fn test_zero_probe_offset_is_identity() {
        let index = build_index(&LshConfig::default(), &clustered_users());
        let sig = index.signature(1).unwrap();
        for table in 0..index.config().num_tables {
            assert_eq!(index.probe_key(sig, table, 0), index.bucket_key(sig, table));
        }
        for h in [0u64, 1, 19_999, 12_345] {
            assert_eq!(perturb_band_hash(h, 0, 20_000), h);
        }
        assert_eq!(perturb_band_hash(19_999, 1, 20_000), 0);
    }

    #[test]
    fn test_combine_band_hashes() {
        assert_eq!(combine_band_hashes([1u64, 2, 3], u64::MAX), (1 << 32) ^ (2 << 16) ^ 3);
        assert!(combine_band_hashes([19_999u64, 19_999, 19_999], 4000) < 4000);
        assert_eq!(combine_band_hashes(std::iter::empty(), 4000), 0);
    }

    #[test]
    fn test_combined_key_keeps_every_band() {
        let bands = MAX_BANDS_PER_TABLE;
        let base: Vec<u64> = (0..bands as u64).map(|i| 7 + i).collect();
        for changed in 0..bands {
            let mut other = base.clone();
            other[changed] = 19_999;
            assert_ne!(
                combine_band_hashes(base.iter().copied(), u64::MAX),
                combine_band_hashes(other.iter().copied(), u64::MAX),
                "band {} dropped from the key",
                changed
            );
        }
    }

    #[test]
    fn test_multiprobe_only_adds_candidates() {
        let users = clustered_users();
        let no_probe = build_index(
            &LshConfig {
                probe_floor: 0,
                ..LshConfig::default()
            },
            &users,
        );
        let probed = build_index(
            &LshConfig {
                probe_floor: usize::MAX,
                ..LshConfig::default()
            },
            &users,
        );
        let base = no_probe.find_similar_candidates(1, usize::MAX);
        let wide = probed.find_similar_candidates(1, usize::MAX);
        for c in &base {
            assert!(wide.contains(c));
        }
    }

    #[test]
    fn test_estimate_similarity_symmetric() {
        let mut users = clustered_users();
        users.insert(3, (100..115).collect());
        let index = build_index(&LshConfig::default(), &users);
        for &(a, b) in &[(1, 2), (1, 3), (2, 3), (1, 10), (10, 11)] {
            assert_eq!(index.estimate_similarity(a, b), index.estimate_similarity(b, a));
        }
        let e = index.estimate_similarity(1, 3);
        assert!((0.0..=1.0).contains(&e));
    }

    #[test]
    fn test_stats() {
        let users = clustered_users();
        let index = build_index(&LshConfig::default(), &users);
        let stats = index.stats();
        assert_eq!(stats.num_users, users.len());
        assert_eq!(stats.num_tables, 8);
        assert!(stats.largest_bucket >= 2, "identical users share a bucket");
        assert!(stats.num_buckets <= users.len() * 8);
        assert!(stats.mean_bucket_size >= 1.0);
    }
}
