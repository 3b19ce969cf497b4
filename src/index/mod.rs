//! Approximate neighbour retrieval over user rating sets
//!
//! - MinHash signatures estimate Jaccard similarity between rated-item sets
//! - Banded LSH tables turn neighbour search into bucket lookups
//! - Multi-probe widens the search when primary buckets are sparse

mod hashing;
mod lsh;
mod signature;

pub use hashing::*;
pub use lsh::*;
pub use signature::*;

use crate::types::UserId;
use thiserror::Error;

/// Errors raised while constructing an index
#[derive(Debug, Error, PartialEq)]
pub enum IndexError {
    #[error("invalid LSH parameter: {0}")]
    InvalidParam(String),

    #[error("signature for user {user_id} has length {got}, expected {expected}")]
    SignatureLength {
        user_id: UserId,
        expected: usize,
        got: usize,
    },
}
