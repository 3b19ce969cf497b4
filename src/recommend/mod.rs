//! Recommendation pipeline
//!
//! Candidate discovery -> similarity refinement -> collaborative filtering
//! -> genre boost -> popularity fallback -> ranking.

mod candidates;
mod engine;
mod scoring;

pub use candidates::*;
pub use engine::*;
pub use scoring::*;
