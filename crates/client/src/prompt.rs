//! Deferred install prompt.
//!
//! The browser offers an install affordance once; the page suppresses it and
//! keeps the handle until the user explicitly asks to install. The handle is
//! single use and is dropped once consumed or once the app reports itself
//! installed.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::events::{InstallOutcome, PageEvent};

/// The browser's deferred install choice.
#[async_trait]
pub trait DeferredPrompt: Send + Sync {
    /// Show the native prompt and wait for the user's answer.
    async fn prompt(&self) -> InstallOutcome;
}

/// Observable install state, without the handle itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallSignal {
    #[default]
    NoPrompt,
    PromptAvailable,
    Dismissed,
}

#[derive(Default)]
enum Slot {
    #[default]
    Empty,
    Captured(Arc<dyn DeferredPrompt>),
    Dismissed,
}

pub struct InstallPromptController {
    slot: Mutex<Slot>,
    events: broadcast::Sender<PageEvent>,
}

impl InstallPromptController {
    pub fn new(events: broadcast::Sender<PageEvent>) -> Self {
        Self { slot: Mutex::new(Slot::Empty), events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PageEvent> {
        self.events.subscribe()
    }

    /// Keep the deferred prompt for later and tell the page it can offer
    /// an install button.
    pub fn capture(&self, prompt: Arc<dyn DeferredPrompt>) {
        self.set(Slot::Captured(prompt));
        tracing::debug!("install prompt captured");
        self.emit(PageEvent::InstallPromptAvailable);
    }

    pub fn can_install(&self) -> bool {
        self.signal() == InstallSignal::PromptAvailable
    }

    pub fn signal(&self) -> InstallSignal {
        match &*self.lock() {
            Slot::Empty => InstallSignal::NoPrompt,
            Slot::Captured(_) => InstallSignal::PromptAvailable,
            Slot::Dismissed => InstallSignal::Dismissed,
        }
    }

    /// Show the captured prompt.
    ///
    /// Returns `None` when there is nothing to show.
    pub async fn request_install(&self) -> Option<InstallOutcome> {
        let prompt = {
            let mut slot = self.lock();
            match std::mem::take(&mut *slot) {
                Slot::Captured(prompt) => prompt,
                other => {
                    *slot = other;
                    tracing::info!("install requested without a captured prompt");
                    return None;
                }
            }
        };

        let outcome = prompt.prompt().await;
        tracing::info!(?outcome, "install prompt answered");
        if outcome == InstallOutcome::Dismissed {
            self.set(Slot::Dismissed);
        }
        self.emit(PageEvent::InstallOutcome { outcome });
        Some(outcome)
    }

    /// The app reports itself installed.
    pub fn app_installed(&self) {
        self.set(Slot::Empty);
        tracing::info!("app installed");
        self.emit(PageEvent::Installed);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set(&self, slot: Slot) {
        *self.lock() = slot;
    }

    fn emit(&self, event: PageEvent) {
        let _ = self.events.send(event);
    }
}
