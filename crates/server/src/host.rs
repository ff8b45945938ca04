//! Shared state for the proxy listener and the control channel.

use std::sync::Arc;

use tokio::sync::broadcast;
use vokabel_client::{FetchClient, FetchConfig, Lifecycle, LifecycleConfig, Registration, Router, RouterConfig, Worker};
use vokabel_core::{AppConfig, CacheDb, Classifier, Error, Fetch};

/// Owns the cache database, the upstream client and the worker registration.
pub struct WorkerHost {
    config: AppConfig,
    db: CacheDb,
    network: Arc<dyn Fetch>,
    router: Arc<Router>,
    registration: Registration,
}

impl WorkerHost {
    /// Open the database at the configured path and build the upstream client.
    pub async fn open(config: AppConfig) -> anyhow::Result<Arc<Self>> {
        let db = CacheDb::open(&config.db_path).await?;
        let network: Arc<dyn Fetch> = Arc::new(FetchClient::new(FetchConfig::from(&config))?);
        Ok(Self::with_parts(config, db, network))
    }

    pub fn with_parts(config: AppConfig, db: CacheDb, network: Arc<dyn Fetch>) -> Arc<Self> {
        let classifier = Classifier::new(config.live_host_pattern.clone());
        let router = Router::new(db.clone(), network.clone(), classifier, RouterConfig::from(&config));
        let (events, _) = broadcast::channel(16);
        Arc::new(Self { config, db, network, router: Arc::new(router), registration: Registration::new(events) })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn db(&self) -> &CacheDb {
        &self.db
    }

    pub fn network(&self) -> &Arc<dyn Fetch> {
        &self.network
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub fn registration(&self) -> &Registration {
        &self.registration
    }

    /// Start a fresh worker: install it and let the registration promote it.
    ///
    /// On failure the current controller (if any) keeps serving.
    pub async fn boot_worker(&self) -> Result<Arc<Lifecycle>, Error> {
        let config =
            LifecycleConfig::try_from(&self.config).map_err(|e| Error::InvalidUrl(format!("precache manifest: {e}")))?;
        let lifecycle = Arc::new(Lifecycle::new(self.db.clone(), self.network.clone(), config));
        self.registration.register(lifecycle.clone()).await?;
        Ok(lifecycle)
    }

    /// Dispatch table for the controlling worker.
    pub async fn worker(&self) -> Option<Worker> {
        let controller = self.registration.controller().await?;
        Some(Worker::new(controller, self.router.clone()))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use vokabel_core::{Request, ResponseSnapshot};

    use super::*;

    pub const ORIGIN: &str = "https://vokabeln.example.org";

    /// Upstream fake keyed by path.
    #[derive(Default)]
    pub struct FakeUpstream {
        routes: Mutex<HashMap<String, ResponseSnapshot>>,
        offline: AtomicBool,
    }

    impl FakeUpstream {
        pub fn serve(&self, path: &str, response: ResponseSnapshot) {
            self.routes.lock().unwrap().insert(path.to_string(), response);
        }

        pub fn set_offline(&self, offline: bool) {
            self.offline.store(offline, Ordering::SeqCst);
        }
    }

    #[async_trait::async_trait]
    impl Fetch for FakeUpstream {
        async fn fetch(&self, request: &Request) -> Result<ResponseSnapshot, Error> {
            if self.offline.load(Ordering::SeqCst) {
                return Err(Error::Network("connection refused".into()));
            }
            Ok(self
                .routes
                .lock()
                .unwrap()
                .get(request.url.path())
                .cloned()
                .unwrap_or_else(|| ResponseSnapshot::new(404, "not found")))
        }
    }

    /// Host with a two-entry precache manifest served by a fake upstream.
    pub async fn host() -> (Arc<WorkerHost>, Arc<FakeUpstream>) {
        let upstream = Arc::new(FakeUpstream::default());
        upstream.serve("/", ResponseSnapshot::new(200, "root"));
        upstream.serve("/index.html", ResponseSnapshot::new(200, "<html>shell</html>"));

        let config = AppConfig {
            origin: ORIGIN.into(),
            precache_urls: vec!["/".into(), "/index.html".into()],
            ..AppConfig::default()
        };
        let db = CacheDb::open_in_memory().await.unwrap();
        (WorkerHost::with_parts(config, db, upstream.clone()), upstream)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::host;
    use vokabel_client::WorkerState;

    #[tokio::test]
    async fn test_boot_worker_takes_control() {
        let (host, _) = host().await;
        assert!(host.worker().await.is_none());

        let lifecycle = host.boot_worker().await.unwrap();
        assert_eq!(lifecycle.state(), WorkerState::Activated);
        let worker = host.worker().await.unwrap();
        assert_eq!(worker.lifecycle().id(), lifecycle.id());
    }

    #[tokio::test]
    async fn test_failed_boot_leaves_no_controller() {
        let (host, upstream) = host().await;
        upstream.set_offline(true);
        assert!(host.boot_worker().await.is_err());
        assert!(host.worker().await.is_none());
    }
}
