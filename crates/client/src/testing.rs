//! Scripted network for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use url::Url;
use vokabel_core::{Error, Fetch, Request, ResponseSnapshot};

pub const ORIGIN: &str = "https://vokabeln.example.org";

pub fn url(path: &str) -> Url {
    Url::parse(ORIGIN).unwrap().join(path).unwrap()
}

/// Serves canned responses keyed by URL path, counts calls, and can be
/// switched offline to simulate connection errors.
#[derive(Default)]
pub struct ScriptedNetwork {
    routes: Mutex<HashMap<String, ResponseSnapshot>>,
    offline: AtomicBool,
    calls: AtomicUsize,
}

impl ScriptedNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(&self, path: &str, response: ResponseSnapshot) -> &Self {
        self.routes.lock().unwrap().insert(path.to_string(), response);
        self
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Fetch for ScriptedNetwork {
    async fn fetch(&self, request: &Request) -> Result<ResponseSnapshot, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network("connection refused".into()));
        }
        let routes = self.routes.lock().unwrap();
        Ok(routes
            .get(request.url.path())
            .cloned()
            .unwrap_or_else(|| ResponseSnapshot::new(404, "not found")))
    }
}
