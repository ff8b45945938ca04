//! Worker lifecycle: install, activate, and control messages.
//!
//! ```text
//! Parsed -> Installing -> Installed -> Activating -> Activated -> Redundant
//!               |                                                  ^
//!               +------------------ precache failed ---------------+
//! ```
//!
//! Install precaches the app shell all-or-nothing and then asks to skip the
//! waiting phase. Activate deletes every generation other than the current
//! app-shell and runtime generations and takes control of open clients.

pub mod registration;

use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use url::Url;
use vokabel_core::config::ConfigError;
use vokabel_core::{AppConfig, CacheDb, Error, Fetch};

use crate::events::WorkerId;

pub use registration::Registration;

/// Lifecycle state of one worker instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    #[default]
    Parsed,
    Installing,
    /// Installed and waiting to activate.
    Installed,
    Activating,
    Activated,
    /// Install failed or a newer worker took over.
    Redundant,
}

impl WorkerState {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
            WorkerState::Redundant => "redundant",
        }
    }
}

/// Messages accepted on the control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    /// Leave the waiting phase now.
    SkipWaiting,
    /// Delete every generation.
    ClearCache,
}

impl FromStr for ControlMessage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(s).map_err(|e| Error::InvalidMessage(e.to_string()))
    }
}

/// Generation names and the precache manifest.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    pub shell_cache: String,
    pub runtime_cache: String,
    pub precache: Vec<Url>,
}

impl TryFrom<&AppConfig> for LifecycleConfig {
    type Error = ConfigError;

    fn try_from(config: &AppConfig) -> Result<Self, Self::Error> {
        Ok(Self {
            shell_cache: config.shell_cache.clone(),
            runtime_cache: config.runtime_cache.clone(),
            precache: config.precache_manifest()?,
        })
    }
}

/// One worker instance's lifecycle.
pub struct Lifecycle {
    id: WorkerId,
    db: CacheDb,
    network: Arc<dyn Fetch>,
    config: LifecycleConfig,
    state: watch::Sender<WorkerState>,
    skip_waiting: AtomicBool,
    controlling: AtomicBool,
}

impl Lifecycle {
    pub fn new(db: CacheDb, network: Arc<dyn Fetch>, config: LifecycleConfig) -> Self {
        Self {
            id: WorkerId::next(),
            db,
            network,
            config,
            state: watch::Sender::new(WorkerState::Parsed),
            skip_waiting: AtomicBool::new(false),
            controlling: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    /// Whether this worker has claimed the open clients.
    pub fn is_controlling(&self) -> bool {
        self.controlling.load(Ordering::SeqCst)
    }

    /// Whether the worker asked to skip the waiting phase.
    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    fn transition(&self, to: WorkerState) {
        let from = self.state.send_replace(to);
        tracing::info!(worker = %self.id, ?from, ?to, "worker state changed");
    }

    /// Precache the app shell.
    ///
    /// On failure nothing from the manifest is stored, the worker becomes
    /// redundant, and the error is returned so the host can retry with a
    /// fresh worker.
    pub async fn install(&self) -> Result<(), Error> {
        if self.state() != WorkerState::Parsed {
            return Err(Error::InvalidState(format!("cannot install from {:?}", self.state())));
        }
        self.transition(WorkerState::Installing);

        let result = async {
            let shell = self.db.open_cache(&self.config.shell_cache).await?;
            tracing::info!(generation = shell.name(), urls = self.config.precache.len(), "precaching app shell");
            shell.add_all(&self.config.precache, self.network.as_ref()).await
        }
        .await;

        match result {
            Ok(()) => {
                self.transition(WorkerState::Installed);
                self.skip_waiting.store(true, Ordering::SeqCst);
                Ok(())
            }
            Err(err) => {
                tracing::error!(worker = %self.id, error = %err, "precaching failed");
                self.transition(WorkerState::Redundant);
                Err(err)
            }
        }
    }

    /// Delete superseded generations and claim clients.
    ///
    /// Returns the names of the deleted generations.
    pub async fn activate(&self) -> Result<Vec<String>, Error> {
        match self.state() {
            WorkerState::Installed => {}
            WorkerState::Activated => return Ok(Vec::new()),
            other => return Err(Error::InvalidState(format!("cannot activate from {other:?}"))),
        }
        self.transition(WorkerState::Activating);

        let keep: HashSet<&str> = [self.config.shell_cache.as_str(), self.config.runtime_cache.as_str()].into();
        let mut deleted = Vec::new();
        for name in self.db.cache_names().await? {
            if keep.contains(name.as_str()) {
                continue;
            }
            tracing::info!(generation = %name, "deleting old cache");
            if self.db.delete_cache(&name).await? {
                deleted.push(name);
            }
        }

        self.controlling.store(true, Ordering::SeqCst);
        self.transition(WorkerState::Activated);
        Ok(deleted)
    }

    /// Handle a control message.
    pub async fn handle_message(&self, message: ControlMessage) -> Result<(), Error> {
        match message {
            ControlMessage::SkipWaiting => {
                self.skip_waiting.store(true, Ordering::SeqCst);
                if self.state() == WorkerState::Installed {
                    self.activate().await?;
                }
                Ok(())
            }
            ControlMessage::ClearCache => {
                let cleared = self.clear_all().await?;
                tracing::info!(cleared, "cleared all caches");
                Ok(())
            }
        }
    }

    /// Delete every generation. Returns how many were deleted.
    pub async fn clear_all(&self) -> Result<usize, Error> {
        let mut cleared = 0;
        for name in self.db.cache_names().await? {
            if self.db.delete_cache(&name).await? {
                cleared += 1;
            }
        }
        Ok(cleared)
    }

    /// Give up control to a newer worker.
    pub(crate) fn retire(&self) {
        self.controlling.store(false, Ordering::SeqCst);
        self.transition(WorkerState::Redundant);
    }
}
