//! Fetch routing policy.
//!
//! Every intercepted request is classified and then answered by one of
//! three strategies:
//!
//! | Class      | Strategy                                                        |
//! |------------|-----------------------------------------------------------------|
//! | `Live`     | network only, failures propagate, cache never touched           |
//! | `Volatile` | network first; cached copy, then offline JSON, on failure       |
//! | `Static`   | cache first; network on miss; app shell or 503 on failure       |
//!
//! Successful network responses are written through to the runtime
//! generation on a background task. The response goes back to the requester
//! without waiting for that write, and a failed write is only logged.
//!
//! Cache lookups search the runtime generation first, then the app-shell
//! generation, then any older generation still on disk (newest first).

pub mod offline;

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinSet;
use vokabel_core::{
    AppConfig, CacheDb, Classification, Classifier, Destination, Error, Fetch, Request, ResponseSnapshot, RoutingClass,
};

/// Names and messages the router needs from the application config.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub shell_cache: String,
    pub runtime_cache: String,
    pub app_shell_entry: String,
    pub offline_message: String,
}

impl From<&AppConfig> for RouterConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            shell_cache: config.shell_cache.clone(),
            runtime_cache: config.runtime_cache.clone(),
            app_shell_entry: config.app_shell_entry.clone(),
            offline_message: config.offline_message.clone(),
        }
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

/// Executes the routing strategy for intercepted requests.
pub struct Router {
    db: CacheDb,
    network: Arc<dyn Fetch>,
    classifier: Classifier,
    config: RouterConfig,
    writes: Mutex<JoinSet<()>>,
}

impl Router {
    pub fn new(db: CacheDb, network: Arc<dyn Fetch>, classifier: Classifier, config: RouterConfig) -> Self {
        Self { db, network, classifier, config, writes: Mutex::new(JoinSet::new()) }
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Answer an intercepted request.
    ///
    /// Returns `Ok(None)` when the request is not intercepted (non-http(s)
    /// scheme); the host should then fetch it without involving the cache.
    /// `Err` is only returned for `Live` requests whose fetch failed.
    pub async fn handle(&self, request: &Request) -> Result<Option<ResponseSnapshot>, Error> {
        match self.classifier.classify(&request.url, &request.method) {
            Classification::Ignore => {
                tracing::trace!(url = %request.url, "not intercepted");
                Ok(None)
            }
            Classification::Route(class) => self.route(class, request).await.map(Some),
        }
    }

    /// Run the strategy for an already classified request.
    pub async fn route(&self, class: RoutingClass, request: &Request) -> Result<ResponseSnapshot, Error> {
        match class {
            RoutingClass::Live => self.network.fetch(request).await,
            RoutingClass::Volatile => Ok(self.network_first(request).await),
            RoutingClass::Static => Ok(self.cache_first(request).await),
        }
    }

    async fn network_first(&self, request: &Request) -> ResponseSnapshot {
        match self.network.fetch(request).await {
            Ok(response) => {
                if response.status == 200 && request.is_get() {
                    self.write_through(request, &response).await;
                }
                response
            }
            Err(err) => {
                tracing::debug!(url = %request.url, error = %err, "network failed, trying cache");
                match self.lookup(request).await {
                    Some(cached) => {
                        tracing::info!(path = request.url.path(), "serving cached content while offline");
                        cached
                    }
                    None => offline::unavailable_json(&self.config.offline_message),
                }
            }
        }
    }

    async fn cache_first(&self, request: &Request) -> ResponseSnapshot {
        if let Some(cached) = self.lookup(request).await {
            tracing::debug!(path = request.url.path(), "serving from cache");
            return cached;
        }

        match self.network.fetch(request).await {
            Ok(response) => {
                if response.status == 200 && request.is_get() {
                    self.write_through(request, &response).await;
                }
                response
            }
            Err(err) => {
                tracing::warn!(url = %request.url, error = %err, "fetch failed");
                if request.destination == Destination::Document
                    && let Some(shell) = self.app_shell(request).await
                {
                    return shell;
                }
                offline::service_unavailable()
            }
        }
    }

    /// Cross-generation lookup. Storage errors count as a miss.
    async fn lookup(&self, request: &Request) -> Option<ResponseSnapshot> {
        let precedence = [self.config.runtime_cache.as_str(), self.config.shell_cache.as_str()];
        match self.db.match_request(&request.identity(), &precedence).await {
            Ok(found) => found,
            Err(err) => {
                tracing::warn!(url = %request.url, error = %err, "cache lookup failed");
                None
            }
        }
    }

    async fn app_shell(&self, request: &Request) -> Option<ResponseSnapshot> {
        let entry = request.url.join(&self.config.app_shell_entry).ok()?;
        self.lookup(&Request::get(entry)).await
    }

    /// Queue a background write of `response` into the runtime generation.
    async fn write_through(&self, request: &Request, response: &ResponseSnapshot) {
        let db = self.db.clone();
        let generation = self.config.runtime_cache.clone();
        let request = request.clone();
        let copy = response.duplicate();

        let mut writes = self.writes.lock().await;
        while writes.try_join_next().is_some() {}
        writes.spawn(async move {
            let result = match db.open_cache(&generation).await {
                Ok(cache) => cache.put(&request, &copy).await,
                Err(err) => Err(err),
            };
            if let Err(err) = result {
                tracing::warn!(url = %request.url, error = %err, "write-through dropped");
            }
        });
    }

    /// Wait for every queued write-through to finish.
    pub async fn settle(&self) {
        let mut writes = self.writes.lock().await;
        while let Some(result) = writes.join_next().await {
            if let Err(err) = result {
                tracing::warn!(error = %err, "write-through task panicked");
            }
        }
    }
}
