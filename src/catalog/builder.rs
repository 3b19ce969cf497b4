//! Catalog assembly from in-memory rating and movie records

use super::Catalog;
use crate::types::{genre_bits, GenreMask, ItemId, Movie, Rating, UserId, UserProfile, MAX_GENRES};
use std::collections::HashMap;
use thiserror::Error;
use tracing::info;

/// Errors raised while assembling a catalog
#[derive(Debug, Error, PartialEq)]
pub enum CatalogError {
    #[error("too many distinct genres: '{genre}' exceeds the 32-genre bitmask")]
    TooManyGenres { genre: String },

    #[error("invalid rating {rating} for user {user_id}, item {item_id}")]
    InvalidRating {
        user_id: UserId,
        item_id: ItemId,
        rating: Rating,
    },
}

/// Accumulates ratings and movie metadata, then derives a [`Catalog`]
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    ratings: HashMap<UserId, Vec<(ItemId, Rating)>>,
    movies: HashMap<ItemId, Movie>,
    genre_ids: HashMap<String, u32>,
    genre_names: Vec<String>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a movie; genre names get bit positions in first-seen order.
    pub fn add_movie<S: AsRef<str>>(
        &mut self,
        item_id: ItemId,
        genres: &[S],
    ) -> Result<&mut Self, CatalogError> {
        let mut mask: GenreMask = 0;
        let mut names = Vec::with_capacity(genres.len());
        for genre in genres {
            let genre = genre.as_ref();
            let bit = self.genre_id(genre)?;
            mask |= 1 << bit;
            names.push(genre.to_string());
        }
        self.movies.insert(
            item_id,
            Movie {
                item_id,
                genre_mask: mask,
                genres: names,
            },
        );
        Ok(self)
    }

    /// Record a rating; a repeated (user, item) pair keeps the last value.
    pub fn add_rating(
        &mut self,
        user_id: UserId,
        item_id: ItemId,
        rating: Rating,
    ) -> Result<&mut Self, CatalogError> {
        if !rating.is_finite() || rating < 0.0 {
            return Err(CatalogError::InvalidRating {
                user_id,
                item_id,
                rating,
            });
        }
        self.ratings.entry(user_id).or_default().push((item_id, rating));
        Ok(self)
    }

    /// Register a user with no ratings (a cold user the pipeline should still accept).
    pub fn add_user(&mut self, user_id: UserId) -> &mut Self {
        self.ratings.entry(user_id).or_default();
        self
    }

    fn genre_id(&mut self, genre: &str) -> Result<u32, CatalogError> {
        if let Some(&id) = self.genre_ids.get(genre) {
            return Ok(id);
        }
        if self.genre_names.len() >= MAX_GENRES {
            return Err(CatalogError::TooManyGenres {
                genre: genre.to_string(),
            });
        }
        let id = self.genre_names.len() as u32;
        self.genre_ids.insert(genre.to_string(), id);
        self.genre_names.push(genre.to_string());
        Ok(id)
    }

    /// Derive every aggregate and freeze the corpus.
    ///
    /// `min_rating` and `preferred_genre_count` control preferred-genre
    /// derivation: each rating at or above `min_rating` adds
    /// `rating - min_rating` to every genre of the rated movie, and the
    /// `preferred_genre_count` best-scoring genres form the user's mask.
    pub fn build(self, min_rating: Rating, preferred_genre_count: usize) -> Catalog {
        let mut users: HashMap<UserId, UserProfile> = self
            .ratings
            .into_iter()
            .map(|(user_id, ratings)| (user_id, UserProfile::new(user_id, ratings)))
            .collect();

        let mut item_sums: HashMap<ItemId, f64> = HashMap::new();
        let mut item_popularity: HashMap<ItemId, u32> = HashMap::new();
        let mut item_raters: HashMap<ItemId, Vec<UserId>> = HashMap::new();
        let mut total_sum = 0.0f64;
        let mut total_count = 0u64;

        for profile in users.values() {
            for &(item, rating) in &profile.ratings {
                *item_sums.entry(item).or_default() += rating as f64;
                *item_popularity.entry(item).or_default() += 1;
                item_raters.entry(item).or_default().push(profile.user_id);
                total_sum += rating as f64;
                total_count += 1;
            }
        }

        for raters in item_raters.values_mut() {
            raters.sort_unstable();
        }

        let item_averages: HashMap<ItemId, Rating> = item_sums
            .into_iter()
            .map(|(item, sum)| {
                let count = item_popularity.get(&item).copied().unwrap_or(1).max(1);
                (item, (sum / count as f64) as Rating)
            })
            .collect();

        let global_average = if total_count > 0 {
            (total_sum / total_count as f64) as Rating
        } else {
            0.0
        };

        for profile in users.values_mut() {
            profile.preferred_genres =
                preferred_genres(profile, &self.movies, min_rating, preferred_genre_count);
        }

        let mut genre_items: Vec<Vec<ItemId>> = vec![Vec::new(); self.genre_names.len()];
        for movie in self.movies.values() {
            for bit in genre_bits(movie.genre_mask) {
                genre_items[bit as usize].push(movie.item_id);
            }
        }
        for items in &mut genre_items {
            items.sort_unstable();
        }

        info!(
            "Catalog built: {} users, {} movies, {} rated items, {} ratings, {} genres",
            users.len(),
            self.movies.len(),
            item_popularity.len(),
            total_count,
            self.genre_names.len()
        );

        Catalog {
            users,
            movies: self.movies,
            genre_names: self.genre_names,
            genre_items,
            item_averages,
            item_popularity,
            item_raters,
            global_average,
        }
    }
}

/// Top genres by accumulated `rating - min_rating` over positive ratings
fn preferred_genres(
    profile: &UserProfile,
    movies: &HashMap<ItemId, Movie>,
    min_rating: Rating,
    count: usize,
) -> GenreMask {
    let mut scores: HashMap<u32, f32> = HashMap::new();
    for &(item, rating) in &profile.ratings {
        if rating < min_rating {
            continue;
        }
        if let Some(movie) = movies.get(&item) {
            for bit in genre_bits(movie.genre_mask) {
                *scores.entry(bit).or_default() += rating - min_rating;
            }
        }
    }

    let mut ranked: Vec<(u32, f32)> = scores.into_iter().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
        .into_iter()
        .take(count)
        .fold(0, |mask, (bit, _)| mask | (1 << bit))
}
