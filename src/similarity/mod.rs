//! Exact user-user similarity
//!
//! Refines approximate LSH candidates with Pearson correlation (or cosine)
//! over co-rated items, memoised in a shared concurrent cache.

mod cache;
mod calculator;
mod measure;

pub use cache::*;
pub use calculator::*;
pub use measure::*;
