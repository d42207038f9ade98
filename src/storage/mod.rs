//! SQLite-backed persistence: the feed registry, per-feed watermarks and
//! runtime settings.

mod feeds;
mod schema;
mod settings;
mod types;
mod watermarks;

pub use schema::Database;
pub use settings::INTERVAL_KEY;
pub use types::{DatabaseError, Feed, RegistryError};
