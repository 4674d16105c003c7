//! Per-user movie collections: favorites, watchlist and not-interested.
//!
//! - [`store`] - a single identity-scoped, persisted, ordered id set
//! - [`library`] - the three collections together with the exclusivity rule

mod library;
mod store;

pub use library::Library;
pub use store::{CollectionKind, CollectionState, TaggedCollection};
