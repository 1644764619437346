//! Resource categories and the strategies they route to.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Classification assigned to an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum ResourceCategory {
    /// Application shell assets pre-populated at install.
    Critical,
    Font,
    Image,
    Api,
    StaticAsset,
    Navigation,
    Other,
}

impl ResourceCategory {
    pub const ALL: [ResourceCategory; 7] = [
        ResourceCategory::Critical,
        ResourceCategory::Font,
        ResourceCategory::Image,
        ResourceCategory::Api,
        ResourceCategory::StaticAsset,
        ResourceCategory::Navigation,
        ResourceCategory::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceCategory::Critical => "critical",
            ResourceCategory::Font => "font",
            ResourceCategory::Image => "image",
            ResourceCategory::Api => "api",
            ResourceCategory::StaticAsset => "staticAsset",
            ResourceCategory::Navigation => "navigation",
            ResourceCategory::Other => "other",
        }
    }
}

impl fmt::Display for ResourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read/write/fallback algorithm applied to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    StaleWhileRevalidate,
    CacheFirst,
    NetworkFirst,
    NavigationFallback,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::StaleWhileRevalidate => "stale-while-revalidate",
            Strategy::CacheFirst => "cache-first",
            Strategy::NetworkFirst => "network-first",
            Strategy::NavigationFallback => "navigation-fallback",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the strategy table: which algorithm, and which logical namespace it uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Route {
    pub strategy: Strategy,
    pub namespace: String,
}

impl Route {
    pub fn new(strategy: Strategy, namespace: impl Into<String>) -> Self {
        Self { strategy, namespace: namespace.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_serde_names() {
        let json = serde_json::to_string(&ResourceCategory::StaticAsset).unwrap();
        assert_eq!(json, r#""staticAsset""#);
        for category in ResourceCategory::ALL {
            let parsed: ResourceCategory = serde_json::from_str(&format!("\"{}\"", category.as_str())).unwrap();
            assert_eq!(parsed, category);
        }
    }

    #[test]
    fn test_strategy_serde_names() {
        let strategy: Strategy = serde_json::from_str(r#""stale-while-revalidate""#).unwrap();
        assert_eq!(strategy, Strategy::StaleWhileRevalidate);
        assert_eq!(Strategy::NavigationFallback.to_string(), "navigation-fallback");
    }
}
