//! Registration: which worker controls the page, which one waits.

use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{Mutex, broadcast};
use vokabel_core::Error;

use super::{Lifecycle, WorkerState};
use crate::events::{PageEvent, WorkerId};

#[derive(Default)]
struct Slots {
    active: Option<Arc<Lifecycle>>,
    waiting: Option<Arc<Lifecycle>>,
}

/// Tracks the active and waiting workers and tells the page when an update
/// is ready.
pub struct Registration {
    slots: Mutex<Slots>,
    events: broadcast::Sender<PageEvent>,
    /// Last worker announced; a worker installs at most once, so this is
    /// enough to keep the announcement one-shot.
    notified: StdMutex<Option<WorkerId>>,
}

impl Registration {
    pub fn new(events: broadcast::Sender<PageEvent>) -> Self {
        Self { slots: Mutex::new(Slots::default()), events, notified: StdMutex::new(None) }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PageEvent> {
        self.events.subscribe()
    }

    /// Install `worker` and, once installed, either promote it or park it as
    /// the waiting worker.
    ///
    /// If another worker controls the page when the new one finishes
    /// installing, a single [`PageEvent::UpdateAvailable`] is emitted.
    pub async fn register(&self, worker: Arc<Lifecycle>) -> Result<(), Error> {
        worker.install().await?;

        let mut slots = self.slots.lock().await;
        let has_controller = slots.active.as_ref().is_some_and(|active| active.is_controlling());
        if has_controller {
            self.notify_update(worker.id());
        }

        if worker.skip_waiting_requested() {
            self.promote(&mut slots, worker).await
        } else {
            tracing::info!(worker = %worker.id(), "worker installed, waiting");
            if let Some(previous) = slots.waiting.replace(worker) {
                previous.retire();
            }
            Ok(())
        }
    }

    /// Activate the waiting worker, if any.
    pub async fn skip_waiting(&self) -> Result<bool, Error> {
        let mut slots = self.slots.lock().await;
        match slots.waiting.take() {
            Some(worker) => self.promote(&mut slots, worker).await.map(|()| true),
            None => Ok(false),
        }
    }

    /// Worker currently controlling the page.
    ///
    /// A waiting worker that activated itself (for example after a
    /// `SKIP_WAITING` message sent to it directly) is promoted here.
    pub async fn controller(&self) -> Option<Arc<Lifecycle>> {
        let mut slots = self.slots.lock().await;
        if let Some(waiting) = slots.waiting.take_if(|w| w.state() == WorkerState::Activated)
            && let Some(old) = slots.active.replace(waiting)
        {
            old.retire();
        }
        slots.active.clone()
    }

    pub async fn waiting(&self) -> Option<Arc<Lifecycle>> {
        self.slots.lock().await.waiting.clone()
    }

    async fn promote(&self, slots: &mut Slots, worker: Arc<Lifecycle>) -> Result<(), Error> {
        let deleted = worker.activate().await?;
        tracing::info!(worker = %worker.id(), deleted = deleted.len(), "worker activated");
        if let Some(old) = slots.active.replace(worker.clone())
            && old.id() != worker.id()
        {
            old.retire();
        }
        Ok(())
    }

    fn notify_update(&self, id: WorkerId) {
        let first = self.notified.lock().map(|mut last| last.replace(id) != Some(id)).unwrap_or(false);
        if first {
            tracing::info!(worker = %id, "update available");
            // No receivers is fine; the page may not be listening yet.
            let _ = self.events.send(PageEvent::UpdateAvailable { worker_id: id });
        }
    }
}
