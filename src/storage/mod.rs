//! SQLite-backed key-value persistence.
//!
//! Values are JSON text. The store survives restarts and is shared by the
//! identity store and the per-identity collections.

mod kv;
mod schema;
mod types;

pub use kv::decode_id_list;
pub use schema::Database;
pub use types::{DatabaseError, DecodedIds};
