//! Read-only rating corpus handed to the core by ingestion
//!
//! The core never parses files. Ingestion feeds records into a
//! [`CatalogBuilder`], which derives the aggregates the pipeline consumes:
//! - per-user profiles (sorted ratings, average, preferred genres)
//! - per-item average rating and popularity
//! - item -> raters and genre -> items inverted indexes

mod builder;

pub use builder::*;

use crate::types::{GenreMask, ItemId, Movie, Rating, UserId, UserProfile};
use std::collections::HashMap;

/// Immutable rating corpus
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub(crate) users: HashMap<UserId, UserProfile>,
    pub(crate) movies: HashMap<ItemId, Movie>,
    pub(crate) genre_names: Vec<String>,
    /// Indexed by genre bit; item IDs ascending
    pub(crate) genre_items: Vec<Vec<ItemId>>,
    pub(crate) item_averages: HashMap<ItemId, Rating>,
    pub(crate) item_popularity: HashMap<ItemId, u32>,
    /// Item -> users who rated it, user IDs ascending
    pub(crate) item_raters: HashMap<ItemId, Vec<UserId>>,
    pub(crate) global_average: Rating,
}

impl Catalog {
    pub fn user(&self, user_id: UserId) -> Option<&UserProfile> {
        self.users.get(&user_id)
    }

    pub fn users(&self) -> &HashMap<UserId, UserProfile> {
        &self.users
    }

    /// All user IDs, ascending
    pub fn user_ids(&self) -> Vec<UserId> {
        let mut ids: Vec<UserId> = self.users.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn movie(&self, item_id: ItemId) -> Option<&Movie> {
        self.movies.get(&item_id)
    }

    pub fn num_users(&self) -> usize {
        self.users.len()
    }

    pub fn num_movies(&self) -> usize {
        self.movies.len()
    }

    /// Mean rating of an item across all users
    pub fn item_average(&self, item_id: ItemId) -> Option<Rating> {
        self.item_averages.get(&item_id).copied()
    }

    /// Number of ratings an item received
    pub fn item_popularity(&self, item_id: ItemId) -> Option<u32> {
        self.item_popularity.get(&item_id).copied()
    }

    /// Iterate (item, popularity) over every rated item, in arbitrary order
    pub fn popularity(&self) -> impl Iterator<Item = (ItemId, u32)> + '_ {
        self.item_popularity.iter().map(|(&item, &count)| (item, count))
    }

    /// Items carrying genre bit `genre_id`
    pub fn items_in_genre(&self, genre_id: u32) -> &[ItemId] {
        self.genre_items
            .get(genre_id as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Users who rated `item_id`
    pub fn raters_of(&self, item_id: ItemId) -> &[UserId] {
        self.item_raters
            .get(&item_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Genre name for a bit position
    pub fn genre_name(&self, genre_id: u32) -> Option<&str> {
        self.genre_names.get(genre_id as usize).map(String::as_str)
    }

    /// Genre names covered by a mask, in bit order
    pub fn genre_names_of(&self, mask: GenreMask) -> Vec<&str> {
        crate::types::genre_bits(mask)
            .filter_map(|bit| self.genre_name(bit))
            .collect()
    }

    /// Mean over every rating in the corpus
    pub fn global_average(&self) -> Rating {
        self.global_average
    }

    /// Largest item ID that appears in ratings or metadata
    pub fn max_item_id(&self) -> Option<ItemId> {
        self.item_popularity
            .keys()
            .chain(self.movies.keys())
            .copied()
            .max()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
