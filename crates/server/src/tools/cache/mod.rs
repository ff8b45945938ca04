//! Cache-related MCP tools.
//!
//! Inspect and prune cache generations.

pub mod get;
pub mod names;
pub mod purge;

pub use get::{CacheMatchParams, match_impl};
pub use names::names_impl;
pub use purge::{CacheDeleteParams, delete_impl};
