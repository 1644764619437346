//! Worker configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (OFFGRID_*)
//! 2. TOML config file (if OFFGRID_CONFIG_FILE set)
//! 3. Built-in defaults

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::model::{ResourceCategory, Route};

mod validation;

pub use validation::ConfigError;

/// How install-time pre-population treats individual misses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrecachePolicy {
    /// Each asset is written independently; misses are logged.
    #[default]
    BestEffort,
    /// A single miss fails installation.
    AllOrNothing,
}

/// Worker configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (OFFGRID_*)
/// 2. TOML config file (if OFFGRID_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite namespace store.
    ///
    /// Set via OFFGRID_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Build tag suffixed onto every physical namespace name.
    ///
    /// Set via OFFGRID_VERSION environment variable.
    #[serde(default = "default_version")]
    pub version: String,

    /// Origin that install-time assets and routes are resolved against.
    ///
    /// Set via OFFGRID_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// User-Agent string for outbound requests.
    ///
    /// Set via OFFGRID_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Network request timeout in milliseconds.
    ///
    /// Set via OFFGRID_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum response body size accepted from the network.
    ///
    /// Set via OFFGRID_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Path prefix identifying API calls.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Path segment identifying font files.
    #[serde(default = "default_fonts_segment")]
    pub fonts_segment: String,

    /// Regex matched against the request path to identify static assets.
    #[serde(default = "default_static_asset_pattern")]
    pub static_asset_pattern: String,

    /// Path of the root document served when a navigation is offline.
    #[serde(default = "default_root_path")]
    pub root_path: String,

    /// Application shell assets pre-populated at install.
    #[serde(default = "default_critical_assets")]
    pub critical_assets: Vec<String>,

    /// Routes pre-populated at install after the critical assets.
    #[serde(default = "default_high_priority_routes")]
    pub high_priority_routes: Vec<String>,

    /// Promote straight from installed to activating.
    ///
    /// Set via OFFGRID_SKIP_WAITING environment variable.
    #[serde(default = "default_true")]
    pub skip_waiting: bool,

    /// Treatment of pre-population misses.
    #[serde(default)]
    pub precache_policy: PrecachePolicy,

    /// Locale of the synthesized offline document.
    #[serde(default = "default_locale")]
    pub locale: String,

    /// URL opened when the user interacts with a notification.
    #[serde(default = "default_primary_view_url")]
    pub primary_view_url: String,

    /// Per-category overrides of the default strategy table.
    #[serde(default)]
    pub routes: BTreeMap<ResourceCategory, Route>,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./offgrid-cache.sqlite")
}

fn default_version() -> String {
    concat!("v", env!("CARGO_PKG_VERSION")).into()
}

fn default_origin() -> String {
    "http://localhost:8080".into()
}

fn default_user_agent() -> String {
    "offgrid/0.1".into()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_max_bytes() -> usize {
    10_485_760 // 10MB
}

fn default_api_prefix() -> String {
    "/api/".into()
}

fn default_fonts_segment() -> String {
    "/fonts/".into()
}

fn default_static_asset_pattern() -> String {
    r"(\.(js|mjs|css|html)$)|(/static/)".into()
}

fn default_root_path() -> String {
    "/".into()
}

fn default_critical_assets() -> Vec<String> {
    vec!["/".into(), "/index.html".into(), "/manifest.json".into(), "/static/css/main.css".into()]
}

fn default_high_priority_routes() -> Vec<String> {
    vec!["/dashboard".into(), "/journal".into(), "/habits".into(), "/mood".into()]
}

fn default_true() -> bool {
    true
}

fn default_locale() -> String {
    "en".into()
}

fn default_primary_view_url() -> String {
    "/".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            version: default_version(),
            origin: default_origin(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
            api_prefix: default_api_prefix(),
            fonts_segment: default_fonts_segment(),
            static_asset_pattern: default_static_asset_pattern(),
            root_path: default_root_path(),
            critical_assets: default_critical_assets(),
            high_priority_routes: default_high_priority_routes(),
            skip_waiting: true,
            precache_policy: PrecachePolicy::BestEffort,
            locale: default_locale(),
            primary_view_url: default_primary_view_url(),
            routes: BTreeMap::new(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Origin as a parsed URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `origin` is not an absolute http(s) URL.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => {
                Err(ConfigError::Invalid { field: "origin".into(), reason: format!("unsupported scheme {scheme}") })
            }
        }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `OFFGRID_`
    /// 2. TOML file from `OFFGRID_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("OFFGRID_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("OFFGRID_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Strategy;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.db_path, PathBuf::from("./offgrid-cache.sqlite"));
        assert!(config.version.starts_with('v'));
        assert_eq!(config.user_agent, "offgrid/0.1");
        assert_eq!(config.timeout_ms, 10_000);
        assert_eq!(config.api_prefix, "/api/");
        assert_eq!(config.root_path, "/");
        assert!(config.skip_waiting);
        assert_eq!(config.precache_policy, PrecachePolicy::BestEffort);
        assert!(config.routes.is_empty());
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(10_000));
    }

    #[test]
    fn test_origin_url() {
        let config = AppConfig::default();
        assert_eq!(config.origin_url().unwrap().as_str(), "http://localhost:8080/");

        let config = AppConfig { origin: "ftp://files.test".into(), ..Default::default() };
        assert!(matches!(config.origin_url(), Err(ConfigError::Invalid { field, .. }) if field == "origin"));
    }

    #[test]
    fn test_load_layers_file_and_env() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "offgrid.toml",
                r#"
                version = "v9"
                precache_policy = "all_or_nothing"

                [routes.image]
                strategy = "network-first"
                namespace = "media"
                "#,
            )?;
            jail.set_env("OFFGRID_CONFIG_FILE", "offgrid.toml");
            jail.set_env("OFFGRID_TIMEOUT_MS", "2500");

            let config = AppConfig::load().expect("config loads");
            assert_eq!(config.version, "v9");
            assert_eq!(config.timeout_ms, 2500);
            assert_eq!(config.precache_policy, PrecachePolicy::AllOrNothing);
            assert_eq!(config.routes[&ResourceCategory::Image], Route::new(Strategy::NetworkFirst, "media"));
            Ok(())
        });
    }
}
