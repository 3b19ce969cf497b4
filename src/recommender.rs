//! Top-level orchestrator
//!
//! Owns the worker pool, the LSH index and the similarity cache, and lends
//! them to a [`RecommendationEngine`] per call.

use crate::catalog::Catalog;
use crate::config::Config;
use crate::index::{LshIndex, SignatureBuilder};
use crate::recommend::RecommendationEngine;
use crate::similarity::{create_cache, SimilarityCache, SimilarityCalculator};
use crate::types::{Recommendation, UserId};
use anyhow::{Context, Result};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::Arc;
use tracing::{info, warn};

/// Built recommender over one catalog
pub struct Recommender<'a> {
    config: &'a Config,
    catalog: &'a Catalog,
    index: LshIndex,
    cache: Arc<dyn SimilarityCache>,
    pool: ThreadPool,
}

impl<'a> Recommender<'a> {
    /// Validate the configuration against the catalog, then build signatures
    /// and the LSH index on a dedicated worker pool.
    pub fn build(config: &'a Config, catalog: &'a Catalog) -> Result<Self> {
        config
            .validate_for_catalog(catalog.max_item_id())
            .context("Invalid configuration for catalog")?;

        let workers = config.concurrency.worker_threads();
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("lshrec-worker-{}", i))
            .build()
            .context("Failed to build worker pool")?;

        let index = pool.install(|| {
            let signatures = SignatureBuilder::new(&config.lsh).build(catalog.users(), workers);
            LshIndex::build(&config.lsh, signatures)
        })
        .context("Failed to build LSH index")?;

        let cache = create_cache(config.similarity.cache);

        info!(
            "Recommender ready: {} of {} users indexed, {} workers, {} similarity cache",
            index.len(),
            catalog.num_users(),
            workers,
            cache.name()
        );

        Ok(Self {
            config,
            catalog,
            index,
            cache,
            pool,
        })
    }

    /// Borrowed pipeline over this recommender's index and cache
    pub fn engine(&self) -> RecommendationEngine<'_> {
        RecommendationEngine::new(self.config, self.catalog, &self.index, self.similarity())
    }

    /// Recommendations for one user; empty for unknown users.
    pub fn recommend(&self, user_id: UserId) -> Vec<Recommendation> {
        self.pool.install(|| self.engine().recommend(user_id))
    }

    /// Recommendations for many users in parallel, in input order.
    pub fn recommend_batch(&self, user_ids: &[UserId]) -> Vec<(UserId, Vec<Recommendation>)> {
        let engine = self.engine();
        let results: Vec<(UserId, Vec<Recommendation>)> = self.pool.install(|| {
            user_ids
                .par_iter()
                .map(|&user_id| {
                    if self.catalog.user(user_id).is_none() {
                        warn!("Skipping unknown user {}", user_id);
                    }
                    (user_id, engine.recommend(user_id))
                })
                .collect()
        });
        info!(
            "Batch complete: {} users, {} similarities cached",
            results.len(),
            self.cache.len()
        );
        results
    }

    pub fn index(&self) -> &LshIndex {
        &self.index
    }

    pub fn similarity(&self) -> SimilarityCalculator<'_> {
        SimilarityCalculator::new(
            self.catalog.users(),
            &self.config.similarity,
            self.cache.as_ref(),
        )
    }

    pub fn catalog(&self) -> &Catalog {
        self.catalog
    }

    pub fn config(&self) -> &Config {
        self.config
    }

    /// Worker threads in the pool
    pub fn num_workers(&self) -> usize {
        self.pool.current_num_threads()
    }
}
