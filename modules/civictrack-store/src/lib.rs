//! Persistence for CivicTrack: the store traits the engine depends on and
//! their SQLite implementation.

pub mod error;
pub mod sqlite;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use sqlite::SqliteStore;
pub use store::{IssueStore, UserStore};
