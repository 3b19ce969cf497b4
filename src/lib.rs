//! lshrec: MinHash/LSH neighbour retrieval and hybrid scoring for
//! rating-based recommendation
//!
//! - MinHash signatures of each user's rated-item set
//! - Multi-table banded LSH with multi-probe for sub-linear neighbour lookup
//! - Exact Pearson/cosine refinement behind a shared concurrent cache
//! - Collaborative filtering fused with genre boosts and popularity fallback

pub mod catalog;
pub mod config;
pub mod index;
pub mod recommend;
pub mod recommender;
pub mod similarity;
pub mod types;

pub use catalog::{Catalog, CatalogBuilder, CatalogError};
pub use config::Config;
pub use recommender::Recommender;
pub use types::*;
