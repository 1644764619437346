//! Install/activate lifecycle.
//!
//! ```text
//! Idle -> Installing -> Installed -> Activating -> Activated
//!             |                                       |
//!             +------------------> Redundant <--------+
//! ```
//!
//! Install pre-populates the static namespace and opens the dynamic one.
//! Activation destroys every namespace whose version is not the current one
//! and then claims routing authority. Transitions are serialized; requests
//! are not, and one already in flight keeps using whatever namespace it opened.

use std::fmt;
use std::sync::Arc;

use offgrid_core::{AppConfig, Error, InterceptedRequest, NamespaceManager, PrecachePolicy, Response};
use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinSet;
use url::Url;

use crate::fetch::{Network, resolve};
use crate::select::{DYNAMIC_NAMESPACE, STATIC_NAMESPACE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Idle,
    Installing,
    Installed,
    Activating,
    Activated,
    /// Superseded by a newer instance, or failed to install.
    Redundant,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Idle => "idle",
            LifecycleState::Installing => "installing",
            LifecycleState::Installed => "installed",
            LifecycleState::Activating => "activating",
            LifecycleState::Activated => "activated",
            LifecycleState::Redundant => "redundant",
        };
        f.write_str(name)
    }
}

/// Install-time inputs.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    pub origin: Url,
    pub critical_assets: Vec<String>,
    pub high_priority_routes: Vec<String>,
    pub skip_waiting: bool,
    pub precache_policy: PrecachePolicy,
}

impl LifecycleConfig {
    pub fn from_app_config(config: &AppConfig) -> Result<Self, Error> {
        let origin = config.origin_url().map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self {
            origin,
            critical_assets: config.critical_assets.clone(),
            high_priority_routes: config.high_priority_routes.clone(),
            skip_waiting: config.skip_waiting,
            precache_policy: config.precache_policy,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrecacheFailure {
    pub url: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    /// URLs written to the static namespace, in declaration order.
    pub cached: Vec<String>,
    pub failed: Vec<PrecacheFailure>,
    /// Set when skip-waiting promoted the install straight into activation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activation: Option<ActivationReport>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActivationReport {
    pub destroyed: Vec<String>,
    pub retained: Vec<String>,
    /// Namespaces that could not be destroyed; the next activation retries them.
    pub failed: Vec<String>,
}

pub struct LifecycleController {
    namespaces: NamespaceManager,
    network: Arc<dyn Network>,
    config: LifecycleConfig,
    state: watch::Sender<LifecycleState>,
    transition: Mutex<()>,
}

impl LifecycleController {
    pub fn new(namespaces: NamespaceManager, network: Arc<dyn Network>, config: LifecycleConfig) -> Self {
        let (state, _) = watch::channel(LifecycleState::Idle);
        Self { namespaces, network, config, state, transition: Mutex::new(()) }
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Whether this instance has claimed routing authority.
    pub fn is_controlling(&self) -> bool {
        self.state() == LifecycleState::Activated
    }

    pub fn version(&self) -> &str {
        self.namespaces.version()
    }

    /// Handle the `install` event.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidTransition` unless the controller is idle
    /// - `Error::PrecacheFailed` under the all-or-nothing policy when any asset misses
    /// - storage errors opening the static or dynamic namespace
    ///
    /// Any error leaves the controller `Redundant`.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        let _guard = self.transition.lock().await;
        self.expect_state("install", LifecycleState::Idle)?;
        self.enter(LifecycleState::Installing);

        let mut report = match self.prepopulate().await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(error = %e, "install failed");
                self.enter(LifecycleState::Redundant);
                return Err(e);
            }
        };
        self.enter(LifecycleState::Installed);

        if self.config.skip_waiting {
            report.activation = Some(self.activate_locked().await?);
        }

        Ok(report)
    }

    /// Handle the `activate` event.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidTransition` unless the controller is installed.
    /// Namespace errors are reported, not returned.
    pub async fn activate(&self) -> Result<ActivationReport, Error> {
        let _guard = self.transition.lock().await;
        self.activate_locked().await
    }

    /// A newer instance took over.
    pub async fn supersede(&self) {
        let _guard = self.transition.lock().await;
        self.enter(LifecycleState::Redundant);
    }

    async fn activate_locked(&self) -> Result<ActivationReport, Error> {
        self.expect_state("activate", LifecycleState::Installed)?;
        self.enter(LifecycleState::Activating);

        let report = self.collect_garbage().await;
        if !report.failed.is_empty() {
            tracing::warn!(failed = ?report.failed, "some namespaces survived activation");
        }

        self.enter(LifecycleState::Activated);
        tracing::info!(version = self.version(), destroyed = report.destroyed.len(), "claimed routing authority");
        Ok(report)
    }

    async fn collect_garbage(&self) -> ActivationReport {
        let mut report = ActivationReport::default();
        let records = match self.namespaces.records().await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(error = %e, "cannot enumerate namespaces, skipping cleanup");
                return report;
            }
        };

        for record in records {
            if record.version == self.version() {
                report.retained.push(record.physical_name);
                continue;
            }
            match self.namespaces.destroy(&record.physical_name).await {
                Ok(_) => {
                    tracing::info!(namespace = %record.physical_name, "destroyed superseded namespace");
                    report.destroyed.push(record.physical_name);
                }
                Err(e) => {
                    tracing::warn!(namespace = %record.physical_name, error = %e, "destroy failed");
                    report.failed.push(record.physical_name);
                }
            }
        }
        report
    }

    async fn prepopulate(&self) -> Result<InstallReport, Error> {
        let static_ns = self.namespaces.open(STATIC_NAMESPACE).await?;

        let mut requests = Vec::new();
        let mut report = InstallReport::default();
        for path in &self.config.critical_assets {
            match resolve(&self.config.origin, path) {
                Ok(url) => requests.push(InterceptedRequest::get(url)),
                Err(e) => report.failed.push(PrecacheFailure { url: path.clone(), error: e.to_string() }),
            }
        }
        for path in &self.config.high_priority_routes {
            match resolve(&self.config.origin, path) {
                Ok(url) => requests.push(InterceptedRequest::navigate(url)),
                Err(e) => report.failed.push(PrecacheFailure { url: path.clone(), error: e.to_string() }),
            }
        }

        let fetched = self.fetch_all(requests).await;

        let all_or_nothing = self.config.precache_policy == PrecachePolicy::AllOrNothing;
        let any_failed = !report.failed.is_empty() || fetched.iter().any(|(_, r)| r.is_err());
        if all_or_nothing && any_failed {
            let mut missing: Vec<String> = report.failed.iter().map(|f| f.url.clone()).collect();
            missing.extend(fetched.iter().filter(|(_, r)| r.is_err()).map(|(req, _)| req.url.to_string()));
            return Err(Error::PrecacheFailed(format!("missing {}", missing.join(", "))));
        }

        if all_or_nothing {
            let pairs: Vec<_> = fetched.into_iter().filter_map(|(req, r)| r.ok().map(|resp| (req, resp))).collect();
            self.namespaces
                .put_all(&static_ns, &pairs)
                .await
                .map_err(|e| Error::PrecacheFailed(format!("write rolled back: {e}")))?;
            report.cached.extend(pairs.iter().map(|(req, _)| req.url.to_string()));
        } else {
            for (request, result) in fetched {
                let url = request.url.to_string();
                let outcome = match result {
                    Ok(response) => self.namespaces.put(&static_ns, &request, &response).await,
                    Err(e) => Err(e),
                };
                match outcome {
                    Ok(()) => report.cached.push(url),
                    Err(e) => {
                        tracing::warn!(url = %url, error = %e, "pre-population miss");
                        report.failed.push(PrecacheFailure { url, error: e.to_string() });
                    }
                }
            }
        }

        self.namespaces.open(DYNAMIC_NAMESPACE).await?;
        tracing::info!(cached = report.cached.len(), failed = report.failed.len(), "pre-population settled");
        Ok(report)
    }

    /// Fetch every request concurrently; results come back in input order.
    async fn fetch_all(&self, requests: Vec<InterceptedRequest>) -> Vec<(InterceptedRequest, Result<Response, Error>)> {
        let mut set = JoinSet::new();
        for (index, request) in requests.into_iter().enumerate() {
            let network = Arc::clone(&self.network);
            set.spawn(async move {
                let result = match network.fetch(&request).await {
                    Ok(response) if !response.is_success() => {
                        Err(Error::HttpStatus { status: response.status, url: request.url.to_string() })
                    }
                    other => other,
                };
                (index, request, result)
            });
        }

        let mut results = Vec::with_capacity(set.len());
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(item) => results.push(item),
                Err(e) => tracing::error!(error = %e, "pre-population task panicked"),
            }
        }
        results.sort_by_key(|(index, _, _)| *index);
        results.into_iter().map(|(_, request, result)| (request, result)).collect()
    }

    fn expect_state(&self, event: &'static str, expected: LifecycleState) -> Result<(), Error> {
        let current = self.state();
        if current != expected {
            return Err(Error::InvalidTransition { event, state: current.to_string() });
        }
        Ok(())
    }

    fn enter(&self, next: LifecycleState) {
        let previous = self.state.send_replace(next);
        tracing::info!(from = %previous, to = %next, version = self.version(), "lifecycle transition");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{ScriptedNetwork, manager, store};
    use offgrid_core::Namespace;
    use std::collections::BTreeSet;

    fn config(skip_waiting: bool, precache_policy: PrecachePolicy) -> LifecycleConfig {
        LifecycleConfig {
            origin: Url::parse("https://app.test").unwrap(),
            critical_assets: vec!["/".into(), "/app.js".into()],
            high_priority_routes: vec!["/journal".into()],
            skip_waiting,
            precache_policy,
        }
    }

    fn full_network() -> ScriptedNetwork {
        ScriptedNetwork::new()
            .respond("https://app.test/", Response::new(200, "<html>shell</html>"))
            .respond("https://app.test/app.js", Response::new(200, "js"))
            .respond("https://app.test/journal", Response::new(200, "<html>journal</html>"))
    }

    #[tokio::test]
    async fn test_install_without_skip_waiting_stops_at_installed() {
        let namespaces = manager("v2").await;
        let config = config(false, PrecachePolicy::BestEffort);
        let controller = LifecycleController::new(namespaces.clone(), Arc::new(full_network()), config);

        let report = controller.install().await.unwrap();
        assert_eq!(controller.state(), LifecycleState::Installed);
        assert!(!controller.is_controlling());
        assert_eq!(report.cached, ["https://app.test/", "https://app.test/app.js", "https://app.test/journal"]);
        assert!(report.failed.is_empty());
        assert!(report.activation.is_none());
        assert_eq!(
            namespaces.list_namespaces().await.unwrap(),
            BTreeSet::from(["dynamic-v2".to_string(), "static-v2".to_string()])
        );
    }

    #[tokio::test]
    async fn test_skip_waiting_activates_immediately() {
        let controller = LifecycleController::new(
            manager("v2").await,
            Arc::new(full_network()),
            config(true, PrecachePolicy::BestEffort),
        );

        let report = controller.install().await.unwrap();
        assert!(report.activation.is_some());
        assert_eq!(controller.state(), LifecycleState::Activated);
        assert!(controller.is_controlling());
    }

    #[tokio::test]
    async fn test_best_effort_install_tolerates_misses() {
        let network = ScriptedNetwork::new().respond("https://app.test/", Response::new(200, "shell"));
        let controller =
            LifecycleController::new(manager("v2").await, Arc::new(network), config(false, PrecachePolicy::BestEffort));

        let report = controller.install().await.unwrap();
        assert_eq!(report.cached, ["https://app.test/"]);
        assert_eq!(report.failed.len(), 2);
        assert_eq!(controller.state(), LifecycleState::Installed);
    }

    #[tokio::test]
    async fn test_all_or_nothing_install_fails_and_writes_nothing() {
        let namespaces = manager("v2").await;
        let network = ScriptedNetwork::new().respond("https://app.test/", Response::new(200, "shell"));
        let config = config(false, PrecachePolicy::AllOrNothing);
        let controller = LifecycleController::new(namespaces.clone(), Arc::new(network), config);

        let err = controller.install().await.unwrap_err();
        assert!(matches!(err, Error::PrecacheFailed(_)));
        assert_eq!(controller.state(), LifecycleState::Redundant);

        let static_ns = namespaces.namespace(STATIC_NAMESPACE);
        let root = InterceptedRequest::get(Url::parse("https://app.test/").unwrap());
        assert!(namespaces.get(&static_ns, &root).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_all_or_nothing_rolls_back_when_a_write_fails() {
        let (db, namespaces) = store("v2").await;
        db.execute_batch(
            "CREATE TRIGGER reject_app_js BEFORE INSERT ON entries
            WHEN NEW.url = 'https://app.test/app.js'
            BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
        )
        .await
        .unwrap();
        let controller = LifecycleController::new(
            namespaces.clone(),
            Arc::new(full_network()),
            config(false, PrecachePolicy::AllOrNothing),
        );

        let err = controller.install().await.unwrap_err();
        assert!(matches!(err, Error::PrecacheFailed(_)), "got {err:?}");
        assert_eq!(controller.state(), LifecycleState::Redundant);

        let static_ns = namespaces.namespace(STATIC_NAMESPACE);
        for path in ["https://app.test/", "https://app.test/journal"] {
            let req = InterceptedRequest::get(Url::parse(path).unwrap());
            assert!(namespaces.get(&static_ns, &req).await.unwrap().is_none(), "{path} was written");
        }
    }

    #[tokio::test]
    async fn test_activation_destroys_old_versions() {
        let namespaces = manager("v2").await;
        let req = InterceptedRequest::get(Url::parse("https://app.test/app.js").unwrap());
        namespaces.put(&Namespace::new("static", "v1"), &req, &Response::new(200, "old")).await.unwrap();
        namespaces.put(&Namespace::new("dynamic", "v1"), &req, &Response::new(200, "old")).await.unwrap();

        let controller = LifecycleController::new(
            namespaces.clone(),
            Arc::new(ScriptedNetwork::offline()),
            LifecycleConfig {
                critical_assets: vec![],
                high_priority_routes: vec![],
                ..config(false, PrecachePolicy::BestEffort)
            },
        );
        controller.install().await.unwrap();
        let report = controller.activate().await.unwrap();

        assert_eq!(report.destroyed, ["dynamic-v1", "static-v1"]);
        assert_eq!(report.retained, ["dynamic-v2", "static-v2"]);
        let remaining = namespaces.list_namespaces().await.unwrap();
        assert!(remaining.iter().all(|name| name.ends_with("-v2")));
    }

    #[tokio::test]
    async fn test_gc_with_nothing_current_leaves_empty_store() {
        let namespaces = manager("v2").await;
        let req = InterceptedRequest::get(Url::parse("https://app.test/").unwrap());
        namespaces.put(&Namespace::new("static", "v1"), &req, &Response::new(200, "a")).await.unwrap();
        namespaces.put(&Namespace::new("dynamic", "v1"), &req, &Response::new(200, "b")).await.unwrap();

        let controller = LifecycleController::new(
            namespaces.clone(),
            Arc::new(ScriptedNetwork::offline()),
            config(false, PrecachePolicy::BestEffort),
        );
        controller.state.send_replace(LifecycleState::Installed);

        let report = controller.activate().await.unwrap();
        assert_eq!(report.destroyed.len(), 2);
        assert!(namespaces.list_namespaces().await.unwrap().is_empty());
        assert!(controller.is_controlling());
    }

    #[tokio::test]
    async fn test_failed_destroy_is_reported_and_retried() {
        let (db, namespaces) = store("v2").await;
        let req = InterceptedRequest::get(Url::parse("https://app.test/").unwrap());
        namespaces.put(&Namespace::new("static", "v1"), &req, &Response::new(200, "a")).await.unwrap();
        namespaces.put(&Namespace::new("dynamic", "v1"), &req, &Response::new(200, "b")).await.unwrap();
        db.execute_batch(
            "CREATE TRIGGER keep_static_v1 BEFORE DELETE ON namespaces
            WHEN OLD.physical_name = 'static-v1'
            BEGIN SELECT RAISE(ABORT, 'locked'); END;",
        )
        .await
        .unwrap();

        let controller = LifecycleController::new(
            namespaces.clone(),
            Arc::new(ScriptedNetwork::offline()),
            config(false, PrecachePolicy::BestEffort),
        );
        controller.state.send_replace(LifecycleState::Installed);

        let report = controller.activate().await.unwrap();
        assert_eq!(report.failed, ["static-v1"]);
        assert_eq!(report.destroyed, ["dynamic-v1"]);
        assert!(controller.is_controlling());
        assert!(namespaces.list_namespaces().await.unwrap().contains("static-v1"));

        db.execute_batch("DROP TRIGGER keep_static_v1").await.unwrap();
        let next = LifecycleController::new(
            namespaces.clone(),
            Arc::new(ScriptedNetwork::offline()),
            config(false, PrecachePolicy::BestEffort),
        );
        next.state.send_replace(LifecycleState::Installed);

        let report = next.activate().await.unwrap();
        assert_eq!(report.destroyed, ["static-v1"]);
        assert!(report.failed.is_empty());
        assert!(namespaces.list_namespaces().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_activate_before_install_is_rejected() {
        let controller = LifecycleController::new(
            manager("v2").await,
            Arc::new(ScriptedNetwork::offline()),
            config(false, PrecachePolicy::BestEffort),
        );
        let err = controller.activate().await.unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { event: "activate", .. }));
        assert_eq!(controller.state(), LifecycleState::Idle);
    }

    #[tokio::test]
    async fn test_second_install_is_rejected() {
        let controller = LifecycleController::new(
            manager("v2").await,
            Arc::new(full_network()),
            config(true, PrecachePolicy::BestEffort),
        );
        controller.install().await.unwrap();
        assert!(matches!(controller.install().await, Err(Error::InvalidTransition { event: "install", .. })));
    }

    #[tokio::test]
    async fn test_supersede_and_subscribe() {
        let controller = LifecycleController::new(
            manager("v2").await,
            Arc::new(full_network()),
            config(true, PrecachePolicy::BestEffort),
        );
        let mut rx = controller.subscribe();
        controller.install().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), LifecycleState::Activated);

        controller.supersede().await;
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), LifecycleState::Redundant);
        assert!(!controller.is_controlling());
    }
}
