//! Movie catalog access: HTTP client, result normalization and pagination.
//!
//! - [`client`] - TMDB requests with size limits and a detail cache
//! - [`pager`] - per-context accumulation with dedup and stale-result rejection
//! - [`slot`] - cancellable, generation-tagged background requests
//! - [`suggest`] - type-ahead search suggestions
//! - [`browse`] - popular and per-genre rows

mod browse;
mod client;
mod genres;
mod pager;
mod slot;
mod suggest;
mod types;

pub use browse::{BrowseRows, GenreRow, RowSelector};
pub use client::{CatalogClient, FetchError, DEFAULT_BASE_URL};
pub use genres::{all_genres, find_genre, genre_name};
pub use pager::{merge_unique, MergeOutcome, MergeStats, PageTicket, Pager};
pub use slot::RequestSlot;
pub use suggest::{Suggestions, DEFAULT_SUGGESTION_LIMIT};
pub use types::{Genre, GenreId, Movie, MovieId, MoviePage, QueryContext};
