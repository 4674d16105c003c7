//! moviematch: a movie discovery client for the TMDB catalog.
//!
//! - [`identity`] - the signed-in user handle
//! - [`collections`] - favorites, watchlist and not-interested, per identity
//! - [`catalog`] - catalog requests, pagination and suggestions
//! - [`recommend`] - recommendations derived from favorites
//! - [`presentation`] - local filter and sort of fetched lists
//! - [`session`] - identity and collections kept in step
//! - [`storage`] - SQLite-backed key-value persistence

pub mod catalog;
pub mod collections;
pub mod config;
pub mod identity;
pub mod presentation;
pub mod recommend;
pub mod session;
pub mod storage;
pub mod util;
