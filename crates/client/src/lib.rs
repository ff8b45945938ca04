//! Worker runtime for the vokabel offline intermediary.
//!
//! This crate provides the upstream HTTP fetcher, the routing policy, the
//! worker lifecycle and the install-prompt controller.

pub mod events;
pub mod fetch;
pub mod lifecycle;
pub mod policy;
pub mod prompt;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use events::{InstallOutcome, PageEvent, WorkerId};
pub use fetch::{FetchClient, FetchConfig};
pub use lifecycle::{ControlMessage, Lifecycle, LifecycleConfig, Registration, WorkerState};
pub use policy::{Router, RouterConfig};
pub use prompt::{DeferredPrompt, InstallPromptController, InstallSignal};
pub use worker::{EventOutcome, Worker, WorkerEvent};
