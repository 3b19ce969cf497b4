//! Memo for pairwise similarity results
//!
//! Keys are canonical: the smaller user ID sits in the high 32 bits, so
//! `(a, b)` and `(b, a)` share one entry.

use crate::config::CacheKind;
use crate::types::UserId;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::debug;

/// Canonical 64-bit key for an unordered user pair
#[inline]
pub fn pair_key(a: UserId, b: UserId) -> u64 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    ((lo as u64) << 32) | hi as u64
}

/// Concurrent similarity memo
///
/// Implementations hold a lock for a single lookup or insert only. The trait
/// is object-safe so the calculator can work against `dyn SimilarityCache`.
pub trait SimilarityCache: Send + Sync + Debug {
    fn get(&self, key: u64) -> Option<f32>;

    fn insert(&self, key: u64, value: f32);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&self);

    /// Short name for logs ("sharded", "locked")
    fn name(&self) -> &str;
}

/// Sharded concurrent map; lookups on different shards never contend
#[derive(Debug, Default)]
pub struct ShardedCache {
    entries: DashMap<u64, f32>,
}

impl ShardedCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SimilarityCache for ShardedCache {
    fn get(&self, key: u64) -> Option<f32> {
        self.entries.get(&key).map(|v| *v)
    }

    fn insert(&self, key: u64, value: f32) {
        self.entries.insert(key, value);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn clear(&self) {
        self.entries.clear();
    }

    fn name(&self) -> &str {
        "sharded"
    }
}

/// One map behind a single mutex
#[derive(Debug, Default)]
pub struct LockedCache {
    entries: Mutex<HashMap<u64, f32>>,
}

impl LockedCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SimilarityCache for LockedCache {
    fn get(&self, key: u64) -> Option<f32> {
        self.entries.lock().get(&key).copied()
    }

    fn insert(&self, key: u64, value: f32) {
        self.entries.lock().insert(key, value);
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }

    fn clear(&self) {
        self.entries.lock().clear();
    }

    fn name(&self) -> &str {
        "locked"
    }
}

/// Create a similarity cache of the configured kind
pub fn create_cache(kind: CacheKind) -> Arc<dyn SimilarityCache> {
    let cache: Arc<dyn SimilarityCache> = match kind {
        CacheKind::Sharded => Arc::new(ShardedCache::new()),
        CacheKind::Locked => Arc::new(LockedCache::new()),
    };
    debug!("Created {} similarity cache", cache.name());
    cache
}
