//! Core types shared by the index, similarity and recommendation layers

use serde::{Deserialize, Serialize};

/// Unique identifier for a user
pub type UserId = u32;

/// Unique identifier for an item (movie)
pub type ItemId = u32;

/// A single rating value
pub type Rating = f32;

/// Bitmask over at most 32 genre categories
pub type GenreMask = u32;

/// Maximum number of distinct genres a [`GenreMask`] can represent
pub const MAX_GENRES: usize = GenreMask::BITS as usize;

// ============================================================================
// Ingestion-side records
// ============================================================================

/// A user's rating history plus the values derived from it at load time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: UserId,
    /// (item, rating) pairs sorted by item ID ascending
    pub ratings: Vec<(ItemId, Rating)>,
    /// Mean of `ratings`, 0.0 for an empty history
    pub avg_rating: Rating,
    /// Genres the user rates highly
    pub preferred_genres: GenreMask,
}

impl UserProfile {
    /// Build a profile from unsorted ratings; duplicates keep the last rating.
    pub fn new(user_id: UserId, mut ratings: Vec<(ItemId, Rating)>) -> Self {
        // Stable sort keeps insertion order among equal items, so the last
        // occurrence of a duplicate is the one dedup should retain.
        ratings.sort_by_key(|&(item, _)| item);
        let mut deduped: Vec<(ItemId, Rating)> = Vec::with_capacity(ratings.len());
        for (item, rating) in ratings {
            match deduped.last_mut() {
                Some(last) if last.0 == item => last.1 = rating,
                _ => deduped.push((item, rating)),
            }
        }

        let avg_rating = if deduped.is_empty() {
            0.0
        } else {
            let sum: f64 = deduped.iter().map(|&(_, r)| r as f64).sum();
            (sum / deduped.len() as f64) as Rating
        };

        Self {
            user_id,
            ratings: deduped,
            avg_rating,
            preferred_genres: 0,
        }
    }

    /// Set the preferred-genre bitmask
    pub fn with_preferred_genres(mut self, mask: GenreMask) -> Self {
        self.preferred_genres = mask;
        self
    }

    /// Iterate over rated item IDs in ascending order
    pub fn items(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.ratings.iter().map(|&(item, _)| item)
    }

    /// Whether the user rated `item`
    pub fn has_rated(&self, item: ItemId) -> bool {
        self.ratings
            .binary_search_by_key(&item, |&(i, _)| i)
            .is_ok()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ratings.len()
    }
}

/// Item metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movie {
    pub item_id: ItemId,
    pub genre_mask: GenreMask,
    pub genres: Vec<String>,
}

impl Movie {
    pub fn has_genre(&self, genre_id: u32) -> bool {
        genre_id < GenreMask::BITS && self.genre_mask & (1 << genre_id) != 0
    }
}

// ============================================================================
// Per-request results
// ============================================================================

/// A scored item in a recommendation list
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub item_id: ItemId,
    pub score: f32,
}

impl Recommendation {
    pub fn new(item_id: ItemId, score: f32) -> Self {
        Self { item_id, score }
    }
}

/// A neighbour found during candidate discovery, scored by co-rated items
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub user_id: UserId,
    pub common_items: usize,
}

/// A neighbour that survived exact similarity refinement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarUser {
    pub user_id: UserId,
    pub similarity: f32,
}

/// Iterate the set bit positions of a genre mask, lowest first
pub fn genre_bits(mask: GenreMask) -> impl Iterator<Item = u32> {
    (0..GenreMask::BITS).filter(move |bit| mask & (1 << bit) != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_sorts_and_averages() {
        let profile = UserProfile::new(7, vec![(30, 4.0), (10, 2.0), (20, 3.0)]);
        assert_eq!(profile.ratings, vec![(10, 2.0), (20, 3.0), (30, 4.0)]);
        assert!((profile.avg_rating - 3.0).abs() < 1e-6);
        assert!(profile.has_rated(20));
        assert!(!profile.has_rated(25));
    }

    #[test]
    fn test_profile_duplicate_keeps_last() {
        let profile = UserProfile::new(1, vec![(5, 1.0), (3, 2.0), (5, 4.5)]);
        assert_eq!(profile.ratings, vec![(3, 2.0), (5, 4.5)]);
    }

    #[test]
    fn test_empty_profile_average_is_zero() {
        let profile = UserProfile::new(1, Vec::new());
        assert!(profile.is_empty());
        assert_eq!(profile.avg_rating, 0.0);
    }

    #[test]
    fn test_genre_bits() {
        let bits: Vec<u32> = genre_bits(0b1010_0001).collect();
        assert_eq!(bits, vec![0, 5, 7]);
        assert_eq!(genre_bits(0).count(), 0);
        assert_eq!(genre_bits(u32::MAX).count(), MAX_GENRES);
    }
}
