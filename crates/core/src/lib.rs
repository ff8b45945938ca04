//! Core types and shared functionality for the vokabel offline worker.
//!
//! This crate provides:
//! - Request classification
//! - Cache storage with SQLite backend
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod classify;
pub mod config;
pub mod error;
pub mod http;
pub mod network;

pub use cache::{CacheDb, CacheHandle};
pub use classify::{Classification, Classifier, RoutingClass};
pub use config::AppConfig;
pub use error::Error;
pub use http::{Destination, Request, RequestIdentity, ResponseSnapshot};
pub use network::Fetch;
