//! SQLite-backed cache storage for response snapshots.
//!
//! Entries are grouped into named generations (the app-shell generation and
//! the runtime generation, plus whatever older generations are still around
//! until the next activation deletes them). Access is async via
//! tokio-rusqlite; the database runs in WAL mode.

pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;
pub mod storage;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::CacheHandle;
