//! Scripted network double shared by the executor, lifecycle and router tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use offgrid_core::{CacheDb, Error, InterceptedRequest, NamespaceManager, Response};
use url::Url;

use crate::fetch::Network;

/// Answers from a URL → response table. Unknown URLs get a 404, `offline()` fails everything.
#[derive(Default)]
pub struct ScriptedNetwork {
    routes: Mutex<HashMap<String, Response>>,
    calls: Mutex<Vec<String>>,
    total: AtomicUsize,
    offline: bool,
    delay: Option<Duration>,
}

impl ScriptedNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offline() -> Self {
        Self { offline: true, ..Self::default() }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn respond(self, url: &str, response: Response) -> Self {
        self.routes.lock().unwrap().insert(url.to_string(), response);
        self
    }

    pub fn calls(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    pub fn calls_for(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| u.as_str() == url).count()
    }
}

#[async_trait]
impl Network for ScriptedNetwork {
    async fn fetch(&self, request: &InterceptedRequest) -> Result<Response, Error> {
        self.total.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(request.url.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.offline {
            return Err(Error::Network(format!("{}: connection refused", request.url)));
        }

        let found = self.routes.lock().unwrap().get(request.url.as_str()).cloned();
        found.ok_or_else(|| Error::HttpStatus { status: 404, url: request.url.to_string() })
    }
}

pub fn url(path: &str) -> Url {
    Url::parse("https://app.test").unwrap().join(path).unwrap()
}

pub async fn manager(version: &str) -> NamespaceManager {
    store(version).await.1
}

/// Manager plus its raw database, for tests that stage rows or triggers by hand.
pub async fn store(version: &str) -> (CacheDb, NamespaceManager) {
    let db = CacheDb::open_in_memory().await.unwrap();
    (db.clone(), NamespaceManager::new(db, version))
}
