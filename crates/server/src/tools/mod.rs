//! MCP tool implementations.
//!
//! This module contains all tools exposed on the control channel.

pub mod cache;
pub mod worker;

pub use cache::{CacheDeleteParams, CacheMatchParams};
pub use worker::WorkerMessageParams;
