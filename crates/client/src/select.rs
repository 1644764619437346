//! Strategy selection as data.
//!
//! The category → (strategy, namespace) mapping lives in a table so it can be
//! overridden from configuration and tested apart from the classifier.

use std::collections::BTreeMap;

use offgrid_core::{AppConfig, ResourceCategory, Route, Strategy};

/// Logical namespace for the application shell and static assets.
pub const STATIC_NAMESPACE: &str = "static";
/// Logical namespace for API responses and navigations.
pub const DYNAMIC_NAMESPACE: &str = "dynamic";
pub const FONTS_NAMESPACE: &str = "fonts";
pub const IMAGES_NAMESPACE: &str = "images";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyTable {
    routes: BTreeMap<ResourceCategory, Route>,
}

impl Default for StrategyTable {
    fn default() -> Self {
        let routes = BTreeMap::from([
            (ResourceCategory::Critical, Route::new(Strategy::CacheFirst, STATIC_NAMESPACE)),
            (ResourceCategory::Font, Route::new(Strategy::CacheFirst, FONTS_NAMESPACE)),
            (ResourceCategory::Image, Route::new(Strategy::CacheFirst, IMAGES_NAMESPACE)),
            (ResourceCategory::Api, Route::new(Strategy::NetworkFirst, DYNAMIC_NAMESPACE)),
            (ResourceCategory::StaticAsset, Route::new(Strategy::StaleWhileRevalidate, STATIC_NAMESPACE)),
            (ResourceCategory::Navigation, Route::new(Strategy::NavigationFallback, DYNAMIC_NAMESPACE)),
            (ResourceCategory::Other, Route::new(Strategy::NetworkFirst, DYNAMIC_NAMESPACE)),
        ]);
        Self { routes }
    }
}

impl StrategyTable {
    /// Defaults with the configured `routes` overrides applied on top.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut table = Self::default();
        for (category, route) in &config.routes {
            table = table.with_route(*category, route.clone());
        }
        table
    }

    pub fn with_route(mut self, category: ResourceCategory, route: Route) -> Self {
        self.routes.insert(category, route);
        self
    }

    pub fn select(&self, category: ResourceCategory) -> Strategy {
        self.route(category).strategy
    }

    /// The full row for `category`. Categories missing from an edited table
    /// fall back to the `other` row, then to network-first on the dynamic namespace.
    pub fn route(&self, category: ResourceCategory) -> Route {
        self.routes
            .get(&category)
            .or_else(|| self.routes.get(&ResourceCategory::Other))
            .cloned()
            .unwrap_or_else(|| Route::new(Strategy::NetworkFirst, DYNAMIC_NAMESPACE))
    }

    /// Distinct logical namespaces referenced by the table.
    pub fn namespaces(&self) -> Vec<String> {
        let mut names: Vec<String> = self.routes.values().map(|r| r.namespace.clone()).collect();
        names.sort();
        names.dedup();
        names
    }
}
