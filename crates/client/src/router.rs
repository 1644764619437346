//! Request routing: classify, select, execute.
//!
//! Built once at startup from its collaborators and shared by every request.

use std::sync::Arc;

use offgrid_core::{
    AppConfig, Error, InterceptedRequest, NamespaceManager, ResourceCategory, Response, ResponseSource, Strategy,
};

use crate::classify::Classifier;
use crate::fallback::FallbackProvider;
use crate::fetch::Network;
use crate::lifecycle::LifecycleController;
use crate::select::StrategyTable;
use crate::strategy::StrategyExecutor;
use crate::tasks::BackgroundTasks;

/// A routed response. Passthrough responses carry no category or strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Served {
    pub response: Response,
    pub source: ResponseSource,
    pub category: Option<ResourceCategory>,
    pub strategy: Option<Strategy>,
}

pub struct Router {
    classifier: Classifier,
    table: StrategyTable,
    executor: StrategyExecutor,
    lifecycle: Arc<LifecycleController>,
    network: Arc<dyn Network>,
}

impl Router {
    pub fn new(
        classifier: Classifier, table: StrategyTable, executor: StrategyExecutor, lifecycle: Arc<LifecycleController>,
        network: Arc<dyn Network>,
    ) -> Self {
        Self { classifier, table, executor, lifecycle, network }
    }

    /// Wire the default collaborators from `config`.
    pub fn from_config(
        config: &AppConfig, namespaces: NamespaceManager, network: Arc<dyn Network>,
        lifecycle: Arc<LifecycleController>, tasks: BackgroundTasks,
    ) -> Result<Self, Error> {
        let classifier = Classifier::from_config(config)?;
        let table = StrategyTable::from_config(config);
        let executor =
            StrategyExecutor::new(Arc::clone(&network), namespaces, FallbackProvider::new(&config.locale), tasks)
                .with_root_path(config.root_path.clone());
        Ok(Self::new(classifier, table, executor, lifecycle, network))
    }

    pub fn tasks(&self) -> &BackgroundTasks {
        self.executor.tasks()
    }

    /// Serve one intercepted request.
    ///
    /// Writes, and anything arriving before this instance controls routing,
    /// go straight to the network and are never cached.
    pub async fn handle(&self, request: &InterceptedRequest) -> Result<Served, Error> {
        if !request.method.is_read() {
            tracing::debug!(method = request.method.as_str(), url = %request.url, "passthrough");
            return self.passthrough(request).await;
        }
        if !self.lifecycle.is_controlling() {
            tracing::debug!(state = %self.lifecycle.state(), url = %request.url, "not controlling, passthrough");
            return self.passthrough(request).await;
        }

        let category = self.classifier.classify(request);
        let route = self.table.route(category);
        tracing::debug!(
            url = %request.url, %category, strategy = %route.strategy, namespace = %route.namespace, "routing"
        );

        let outcome = self.executor.execute(request, category, &route).await?;
        Ok(Served {
            response: outcome.response,
            source: outcome.source,
            category: Some(category),
            strategy: Some(route.strategy),
        })
    }

    async fn passthrough(&self, request: &InterceptedRequest) -> Result<Served, Error> {
        let response = self.network.fetch(request).await?;
        Ok(Served { response, source: ResponseSource::Passthrough, category: None, strategy: None })
    }
}
