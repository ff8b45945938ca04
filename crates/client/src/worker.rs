//! Event dispatch for one worker instance.
//!
//! Every host event lands in [`Worker::dispatch`], which picks the decision
//! function for its kind and runs it against the worker's lifecycle and the
//! shared router.

use std::sync::Arc;

use tokio::task::JoinHandle;
use vokabel_core::{Error, Request, ResponseSnapshot};

use crate::lifecycle::{ControlMessage, Lifecycle};
use crate::policy::Router;

/// Events delivered by the host.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Install,
    Activate,
    Fetch(Request),
    Message(ControlMessage),
}

impl WorkerEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerEvent::Install => "install",
            WorkerEvent::Activate => "activate",
            WorkerEvent::Fetch(_) => "fetch",
            WorkerEvent::Message(_) => "message",
        }
    }
}

#[derive(Debug)]
pub enum EventOutcome {
    Installed,
    /// Names of the generations removed during activation.
    Activated(Vec<String>),
    /// `None` means the host should fetch the request itself.
    Response(Option<ResponseSnapshot>),
    MessageHandled,
}

#[derive(Clone)]
pub struct Worker {
    lifecycle: Arc<Lifecycle>,
    router: Arc<Router>,
}

impl Worker {
    pub fn new(lifecycle: Arc<Lifecycle>, router: Arc<Router>) -> Self {
        Self { lifecycle, router }
    }

    pub fn lifecycle(&self) -> &Arc<Lifecycle> {
        &self.lifecycle
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub async fn dispatch(&self, event: WorkerEvent) -> Result<EventOutcome, Error> {
        tracing::debug!(worker = %self.lifecycle.id(), event = event.kind(), "dispatching");
        match event {
            WorkerEvent::Install => self.lifecycle.install().await.map(|()| EventOutcome::Installed),
            WorkerEvent::Activate => self.lifecycle.activate().await.map(EventOutcome::Activated),
            WorkerEvent::Fetch(request) => {
                if !self.lifecycle.is_controlling() {
                    return Ok(EventOutcome::Response(None));
                }
                self.router.handle(&request).await.map(EventOutcome::Response)
            }
            WorkerEvent::Message(message) => self.handle_message(message).await.map(|()| EventOutcome::MessageHandled),
        }
    }

    /// Handle a control message and wait for it to finish.
    pub async fn handle_message(&self, message: ControlMessage) -> Result<(), Error> {
        self.lifecycle.handle_message(message).await
    }

    /// Post a raw control message without waiting for it.
    ///
    /// Messages that do not parse are logged and ignored.
    pub fn post_message(&self, raw: &str) -> Option<JoinHandle<()>> {
        let message = match raw.parse::<ControlMessage>() {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(error = %e, "ignoring control message");
                return None;
            }
        };

        let worker = self.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = worker.handle_message(message).await {
                tracing::warn!(?message, error = %e, "control message failed");
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{LifecycleConfig, WorkerState};
    use crate::policy::RouterConfig;
    use crate::testing::{ScriptedNetwork, url};
    use vokabel_core::{CacheDb, Classifier};

    struct Fixture {
        db: CacheDb,
        network: Arc<ScriptedNetwork>,
        worker: Worker,
    }

    async fn fixture() -> Fixture {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = Arc::new(ScriptedNetwork::new());
        network
            .route("/", ResponseSnapshot::new(200, "root"))
            .route("/index.html", ResponseSnapshot::new(200, "<html>shell</html>"))
            .route("/vocab/english/voc3_4.json", ResponseSnapshot::new(200, "{\"words\":[]}"));

        let lifecycle = Lifecycle::new(
            db.clone(),
            network.clone(),
            LifecycleConfig {
                shell_cache: "lmg-vocab-v1".into(),
                runtime_cache: "lmg-vocab-runtime".into(),
                precache: vec![url("/"), url("/index.html")],
            },
        );
        let router = Router::new(db.clone(), network.clone(), Classifier::default(), RouterConfig::default());
        Fixture { db, network, worker: Worker::new(Arc::new(lifecycle), Arc::new(router)) }
    }

    #[tokio::test]
    async fn test_full_lifecycle_through_dispatch() {
        let f = fixture().await;
        f.db.open_cache("lmg-vocab-v0").await.unwrap();

        assert!(matches!(f.worker.dispatch(WorkerEvent::Install).await.unwrap(), EventOutcome::Installed));
        let EventOutcome::Activated(deleted) = f.worker.dispatch(WorkerEvent::Activate).await.unwrap() else {
            panic!("expected activation");
        };
        assert_eq!(deleted, vec!["lmg-vocab-v0".to_string()]);
        assert_eq!(f.worker.lifecycle().state(), WorkerState::Activated);
    }

    #[tokio::test]
    async fn test_fetch_before_activation_passes_through() {
        let f = fixture().await;
        let request = Request::get(url("/vocab/english/voc3_4.json"));
        let outcome = f.worker.dispatch(WorkerEvent::Fetch(request)).await.unwrap();
        assert!(matches!(outcome, EventOutcome::Response(None)));
        assert_eq!(f.network.calls(), 0);
    }

    #[tokio::test]
    async fn test_fetch_after_activation_is_routed() {
        let f = fixture().await;
        f.worker.dispatch(WorkerEvent::Install).await.unwrap();
        f.worker.dispatch(WorkerEvent::Activate).await.unwrap();

        let request = Request::get(url("/vocab/english/voc3_4.json"));
        let EventOutcome::Response(Some(response)) = f.worker.dispatch(WorkerEvent::Fetch(request)).await.unwrap()
        else {
            panic!("expected a routed response");
        };
        assert_eq!(response.status, 200);
        f.worker.router().settle().await;
        assert!(f.db.has_cache("lmg-vocab-runtime").await.unwrap());
    }

    #[tokio::test]
    async fn test_clear_cache_message() {
        let f = fixture().await;
        f.worker.dispatch(WorkerEvent::Install).await.unwrap();
        f.worker.dispatch(WorkerEvent::Activate).await.unwrap();

        let outcome = f.worker.dispatch(WorkerEvent::Message(ControlMessage::ClearCache)).await.unwrap();
        assert!(matches!(outcome, EventOutcome::MessageHandled));
        assert!(f.db.cache_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_post_message_runs_in_background() {
        let f = fixture().await;
        f.worker.dispatch(WorkerEvent::Install).await.unwrap();

        let handle = f.worker.post_message("{\"type\":\"SKIP_WAITING\"}").unwrap();
        handle.await.unwrap();
        assert_eq!(f.worker.lifecycle().state(), WorkerState::Activated);
    }

    #[tokio::test]
    async fn test_post_message_ignores_unknown_type() {
        let f = fixture().await;
        assert!(f.worker.post_message("{\"type\":\"RELOAD_ALL\"}").is_none());
        assert!(f.worker.post_message("{}").is_none());
    }

    #[tokio::test]
    async fn test_failed_install_through_dispatch() {
        let f = fixture().await;
        f.network.set_offline(true);
        let result = f.worker.dispatch(WorkerEvent::Install).await;
        assert!(matches!(result, Err(Error::PrecacheFailed { .. })));
        assert!(f.db.match_request(&Request::get(url("/index.html")).identity(), &[]).await.unwrap().is_none());
    }
}
