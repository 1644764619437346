//! Strategy executors.
//!
//! Each strategy makes at most one network attempt and walks exactly one
//! fallback chain. Storage errors on lookup count as misses and storage
//! errors on write are logged; neither ever fails a request. When a chain
//! ends without content the original network error is returned unchanged.

use std::sync::Arc;

use offgrid_core::{
    CacheEntry, Error, InterceptedRequest, Namespace, NamespaceManager, ResourceCategory, Response, ResponseSource,
    Route, Strategy,
};

use crate::fallback::FallbackProvider;
use crate::fetch::Network;
use crate::select::STATIC_NAMESPACE;
use crate::tasks::BackgroundTasks;

/// A response and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub response: Response,
    pub source: ResponseSource,
}

impl Outcome {
    fn network(response: Response) -> Self {
        Self { response, source: ResponseSource::Network }
    }

    fn cached(entry: CacheEntry) -> Self {
        Self { response: entry.response, source: ResponseSource::Cache }
    }

    fn fallback(response: Response) -> Self {
        Self { response, source: ResponseSource::Fallback }
    }
}

pub struct StrategyExecutor {
    network: Arc<dyn Network>,
    namespaces: NamespaceManager,
    fallback: FallbackProvider,
    tasks: BackgroundTasks,
    root_path: String,
}

impl StrategyExecutor {
    pub fn new(
        network: Arc<dyn Network>, namespaces: NamespaceManager, fallback: FallbackProvider, tasks: BackgroundTasks,
    ) -> Self {
        Self { network, namespaces, fallback, tasks, root_path: "/".to_string() }
    }

    /// Path of the cached root document used by navigation fallback.
    pub fn with_root_path(mut self, root_path: impl Into<String>) -> Self {
        self.root_path = root_path.into();
        self
    }

    pub fn tasks(&self) -> &BackgroundTasks {
        &self.tasks
    }

    pub async fn execute(
        &self, request: &InterceptedRequest, category: ResourceCategory, route: &Route,
    ) -> Result<Outcome, Error> {
        let namespace = self.namespaces.namespace(&route.namespace);
        match route.strategy {
            Strategy::StaleWhileRevalidate => self.stale_while_revalidate(request, &namespace).await,
            Strategy::CacheFirst => self.cache_first(request, category, &namespace).await,
            Strategy::NetworkFirst => self.network_first(request, &namespace).await,
            Strategy::NavigationFallback => self.navigation_fallback(request, &namespace).await,
        }
    }

    /// Cached entry returned at once; a refresh is spawned either way it resolves.
    /// Without an entry the caller waits on the network and gets its error.
    async fn stale_while_revalidate(
        &self, request: &InterceptedRequest, namespace: &Namespace,
    ) -> Result<Outcome, Error> {
        if let Some(entry) = self.lookup(namespace, request).await {
            tracing::debug!(url = %request.url, namespace = namespace.physical_name(), "serving stale, revalidating");
            self.spawn_revalidation(request, namespace).await;
            return Ok(Outcome::cached(entry));
        }

        let response = fetch(self.network.as_ref(), request).await?;
        self.store(namespace, request, &response).await;
        Ok(Outcome::network(response))
    }

    async fn cache_first(
        &self, request: &InterceptedRequest, category: ResourceCategory, namespace: &Namespace,
    ) -> Result<Outcome, Error> {
        if let Some(entry) = self.lookup(namespace, request).await {
            tracing::debug!(url = %request.url, namespace = namespace.physical_name(), "cache hit");
            return Ok(Outcome::cached(entry));
        }

        match fetch(self.network.as_ref(), request).await {
            Ok(response) => {
                self.store(namespace, request, &response).await;
                Ok(Outcome::network(response))
            }
            Err(e) => match self.fallback.fallback(category) {
                Some(placeholder) => {
                    tracing::debug!(url = %request.url, %category, error = %e, "serving placeholder");
                    Ok(Outcome::fallback(placeholder))
                }
                None => Err(e),
            },
        }
    }

    async fn network_first(&self, request: &InterceptedRequest, namespace: &Namespace) -> Result<Outcome, Error> {
        match fetch(self.network.as_ref(), request).await {
            Ok(response) => {
                self.store(namespace, request, &response).await;
                Ok(Outcome::network(response))
            }
            Err(e) => match self.lookup(namespace, request).await {
                Some(entry) => {
                    tracing::debug!(url = %request.url, error = %e, "network failed, serving cache");
                    Ok(Outcome::cached(entry))
                }
                None => Err(e),
            },
        }
    }

    /// Network, then the exact cached page, then the cached root document, then the offline page.
    async fn navigation_fallback(
        &self, request: &InterceptedRequest, namespace: &Namespace,
    ) -> Result<Outcome, Error> {
        let error = match fetch(self.network.as_ref(), request).await {
            Ok(response) => {
                self.store(namespace, request, &response).await;
                return Ok(Outcome::network(response));
            }
            Err(e) => e,
        };

        let search = [namespace.clone(), self.namespaces.namespace(STATIC_NAMESPACE)];

        if let Some(entry) = self.lookup_any(&search, request).await {
            tracing::debug!(url = %request.url, error = %error, "offline navigation, serving cached page");
            return Ok(Outcome::cached(entry));
        }

        match request.url.join(&self.root_path) {
            Ok(root_url) => {
                let root = InterceptedRequest::navigate(root_url);
                if let Some(entry) = self.lookup_any(&search, &root).await {
                    tracing::debug!(url = %request.url, root = %root.url, "offline navigation, serving root document");
                    return Ok(Outcome::cached(entry));
                }
            }
            Err(e) => tracing::warn!(root_path = %self.root_path, error = %e, "cannot resolve root document"),
        }

        match self.fallback.fallback(ResourceCategory::Navigation) {
            Some(document) => Ok(Outcome::fallback(document)),
            None => Err(error),
        }
    }

    async fn spawn_revalidation(&self, request: &InterceptedRequest, namespace: &Namespace) {
        let network = Arc::clone(&self.network);
        let namespaces = self.namespaces.clone();
        let namespace = namespace.clone();
        let request = request.clone();
        let label = format!("revalidate {}", request.url);

        self.tasks
            .spawn(label, async move {
                let response = fetch(network.as_ref(), &request).await?;
                namespaces.put(&namespace, &request, &response).await?;
                tracing::debug!(url = %request.url, namespace = namespace.physical_name(), "revalidated");
                Ok(())
            })
            .await;
    }

    async fn lookup(&self, namespace: &Namespace, request: &InterceptedRequest) -> Option<CacheEntry> {
        match self.namespaces.get(namespace, request).await {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(namespace = namespace.physical_name(), error = %e, "namespace unavailable, miss");
                None
            }
        }
    }

    async fn lookup_any(&self, namespaces: &[Namespace], request: &InterceptedRequest) -> Option<CacheEntry> {
        match self.namespaces.match_any(namespaces, request).await {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "namespace unavailable, treating as miss");
                None
            }
        }
    }

    async fn store(&self, namespace: &Namespace, request: &InterceptedRequest, response: &Response) {
        if let Err(e) = self.namespaces.put(namespace, request, response).await {
            let namespace = namespace.physical_name();
            tracing::warn!(url = %request.url, namespace, error = %e, "write-through failed");
        }
    }
}

/// One network attempt; a non-success status counts as a failure.
async fn fetch(network: &dyn Network, request: &InterceptedRequest) -> Result<Response, Error> {
    let response = network.fetch(request).await?;
    if !response.is_success() {
        return Err(Error::HttpStatus { status: response.status, url: request.url.to_string() });
    }
    Ok(response)
}
