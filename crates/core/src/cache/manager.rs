//! Version-aware namespace manager.
//!
//! Binds a [`CacheDb`] to the current build version so callers only ever
//! name logical namespaces. Destruction is unrestricted here; keeping the
//! current version alive is the lifecycle controller's job.

use std::collections::BTreeSet;

use super::connection::CacheDb;
use super::hash::request_key;
use super::namespaces::{Namespace, NamespaceRecord};
use crate::Error;
use crate::model::{CacheEntry, InterceptedRequest, Response};

#[derive(Clone, Debug)]
pub struct NamespaceManager {
    db: CacheDb,
    version: String,
}

impl NamespaceManager {
    pub fn new(db: CacheDb, version: impl Into<String>) -> Self {
        Self { db, version: version.into() }
    }

    /// Current build version.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Handle for the current version of `logical_name`, without touching storage.
    pub fn namespace(&self, logical_name: &str) -> Namespace {
        Namespace::new(logical_name, &self.version)
    }

    /// Open (creating if absent) the current version of `logical_name`.
    pub async fn open(&self, logical_name: &str) -> Result<Namespace, Error> {
        let namespace = self.namespace(logical_name);
        self.db.ensure_namespace(&namespace).await?;
        Ok(namespace)
    }

    pub async fn get(&self, namespace: &Namespace, request: &InterceptedRequest) -> Result<Option<CacheEntry>, Error> {
        self.db.get_entry(namespace.physical_name(), &request_key(request)).await
    }

    /// Store a complete snapshot of `response` for `request`, replacing any previous entry.
    pub async fn put(
        &self, namespace: &Namespace, request: &InterceptedRequest, response: &Response,
    ) -> Result<(), Error> {
        let mut url = request.url.clone();
        url.set_fragment(None);
        self.db
            .put_entry(namespace, &request_key(request), request.method, url.as_str(), response)
            .await
    }

    /// Store every `(request, response)` pair in `namespace`, or none of them.
    pub async fn put_all(&self, namespace: &Namespace, pairs: &[(InterceptedRequest, Response)]) -> Result<(), Error> {
        let entries: Vec<_> = pairs
            .iter()
            .map(|(request, response)| {
                let mut url = request.url.clone();
                url.set_fragment(None);
                (request_key(request), request.method, url.to_string(), response.clone())
            })
            .collect();
        self.db.put_entries(namespace, &entries).await
    }

    /// First entry for `request` across `namespaces`, in order.
    pub async fn match_any(
        &self, namespaces: &[Namespace], request: &InterceptedRequest,
    ) -> Result<Option<CacheEntry>, Error> {
        let names: Vec<String> = namespaces.iter().map(|ns| ns.physical_name().to_string()).collect();
        self.db.match_entry(&names, &request_key(request)).await
    }

    /// Physical names of every namespace in storage, old and current.
    pub async fn list_namespaces(&self) -> Result<BTreeSet<String>, Error> {
        Ok(self.db.namespace_records().await?.into_iter().map(|r| r.physical_name).collect())
    }

    pub async fn records(&self) -> Result<Vec<NamespaceRecord>, Error> {
        self.db.namespace_records().await
    }

    /// Irreversibly remove a namespace and all of its entries.
    pub async fn destroy(&self, physical_name: &str) -> Result<bool, Error> {
        let existed = self.db.drop_namespace(physical_name).await?;
        tracing::debug!(namespace = physical_name, existed, "destroyed namespace");
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    async fn manager(version: &str) -> NamespaceManager {
        NamespaceManager::new(CacheDb::open_in_memory().await.unwrap(), version)
    }

    fn request(path: &str) -> InterceptedRequest {
        InterceptedRequest::get(Url::parse("https://app.test").unwrap().join(path).unwrap())
    }

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let mgr = manager("v2").await;
        let a = mgr.open("static").await.unwrap();
        let b = mgr.open("static").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(mgr.list_namespaces().await.unwrap(), BTreeSet::from(["static-v2".to_string()]));
    }

    #[tokio::test]
    async fn test_put_then_get_deep_equal() {
        let mgr = manager("v2").await;
        let ns = mgr.open("dynamic").await.unwrap();
        let req = request("/api/journal?page=2");
        let response = Response::new(200, vec![0u8, 159, 146, 150])
            .with_header("content-type", "application/octet-stream")
            .with_header("x-trace", "1");

        mgr.put(&ns, &req, &response).await.unwrap();
        let entry = mgr.get(&ns, &req).await.unwrap().unwrap();
        assert_eq!(entry.response, response);
    }

    #[tokio::test]
    async fn test_put_creates_namespace_lazily() {
        let mgr = manager("v2").await;
        let ns = mgr.namespace("images");
        mgr.put(&ns, &request("/img/logo.png"), &Response::new(200, "png")).await.unwrap();
        assert!(mgr.list_namespaces().await.unwrap().contains("images-v2"));
    }

    #[tokio::test]
    async fn test_get_unopened_namespace_misses() {
        let mgr = manager("v2").await;
        let ns = mgr.namespace("fonts");
        assert!(mgr.get(&ns, &request("/fonts/a.woff2")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_destroy_removes_only_target() {
        let mgr = manager("v2").await;
        let current = mgr.open("static").await.unwrap();
        let old = Namespace::new("static", "v1");
        let req = request("/app.js");
        mgr.put(&old, &req, &Response::new(200, "old")).await.unwrap();
        mgr.put(&current, &req, &Response::new(200, "new")).await.unwrap();

        assert!(mgr.destroy("static-v1").await.unwrap());
        assert_eq!(mgr.list_namespaces().await.unwrap(), BTreeSet::from(["static-v2".to_string()]));
        assert!(mgr.get(&current, &req).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_put_all_matches_single_puts() {
        let mgr = manager("v2").await;
        let ns = mgr.namespace("static");
        let pairs = vec![
            (request("/#top"), Response::new(200, "<html>")),
            (request("/app.js"), Response::new(200, "js")),
        ];

        mgr.put_all(&ns, &pairs).await.unwrap();

        let root = mgr.get(&ns, &request("/")).await.unwrap().unwrap();
        assert_eq!(root.response.body, "<html>");
        assert!(mgr.get(&ns, &request("/app.js")).await.unwrap().is_some());
    }
}
