//! Request classification.
//!
//! An ordered list of named predicates; the first match decides the
//! [`ResourceCategory`]. A request no rule claims is `Other`.
//!
//! | Order | Rule | Category |
//! |---|---|---|
//! | 1 | path starts with the API prefix | `api` |
//! | 2 | font destination, or fonts path segment | `font` |
//! | 3 | image destination | `image` |
//! | 4 | static-asset pattern on the path | `staticAsset` |
//! | 5 | navigation mode | `navigation` |

use std::fmt;

use offgrid_core::{AppConfig, Destination, Error, InterceptedRequest, ResourceCategory};
use regex::Regex;

type Predicate = Box<dyn Fn(&InterceptedRequest) -> bool + Send + Sync>;

/// A named predicate mapped to a category.
pub struct ClassificationRule {
    name: &'static str,
    category: ResourceCategory,
    predicate: Predicate,
}

impl ClassificationRule {
    pub fn new(
        name: &'static str, category: ResourceCategory,
        predicate: impl Fn(&InterceptedRequest) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self { name, category, predicate: Box::new(predicate) }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn category(&self) -> ResourceCategory {
        self.category
    }

    pub fn matches(&self, request: &InterceptedRequest) -> bool {
        (self.predicate)(request)
    }
}

impl fmt::Debug for ClassificationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassificationRule")
            .field("name", &self.name)
            .field("category", &self.category)
            .finish_non_exhaustive()
    }
}

/// Path starts with `prefix`.
pub fn api_rule(prefix: impl Into<String>) -> ClassificationRule {
    let prefix = prefix.into();
    ClassificationRule::new("api-prefix", ResourceCategory::Api, move |req| req.path().starts_with(&prefix))
}

/// Font destination, or `segment` anywhere in the path.
pub fn font_rule(segment: impl Into<String>) -> ClassificationRule {
    let segment = segment.into();
    ClassificationRule::new("font", ResourceCategory::Font, move |req| {
        req.destination == Destination::Font || req.path().contains(&segment)
    })
}

pub fn image_rule() -> ClassificationRule {
    ClassificationRule::new("image-destination", ResourceCategory::Image, |req| req.destination == Destination::Image)
}

/// Static-asset regex on the path.
pub fn static_asset_rule(pattern: Regex) -> ClassificationRule {
    ClassificationRule::new("static-asset", ResourceCategory::StaticAsset, move |req| pattern.is_match(req.path()))
}

pub fn navigation_rule() -> ClassificationRule {
    ClassificationRule::new("navigation", ResourceCategory::Navigation, InterceptedRequest::is_navigation)
}

/// Ordered rule list.
#[derive(Debug)]
pub struct Classifier {
    rules: Vec<ClassificationRule>,
}

impl Classifier {
    pub fn new(rules: Vec<ClassificationRule>) -> Self {
        Self { rules }
    }

    /// The standard rule order, parameterized by configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if `static_asset_pattern` does not compile.
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let pattern = Regex::new(&config.static_asset_pattern)
            .map_err(|e| Error::InvalidInput(format!("static_asset_pattern: {e}")))?;

        Ok(Self::new(vec![
            api_rule(config.api_prefix.clone()),
            font_rule(config.fonts_segment.clone()),
            image_rule(),
            static_asset_rule(pattern),
            navigation_rule(),
        ]))
    }

    /// Category of the first matching rule, `Other` if none match.
    pub fn classify(&self, request: &InterceptedRequest) -> ResourceCategory {
        match self.rules.iter().find(|rule| rule.matches(request)) {
            Some(rule) => {
                tracing::trace!(url = %request.url, rule = rule.name(), category = %rule.category(), "classified");
                rule.category()
            }
            None => ResourceCategory::Other,
        }
    }

    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use offgrid_core::RequestMode;
    use url::Url;

    fn classifier() -> Classifier {
        Classifier::from_config(&AppConfig::default()).unwrap()
    }

    fn get(path: &str) -> InterceptedRequest {
        InterceptedRequest::get(Url::parse("https://app.test").unwrap().join(path).unwrap())
    }

    #[test]
    fn test_rule_order() {
        let names: Vec<_> = classifier().rules().iter().map(ClassificationRule::name).collect();
        assert_eq!(names, ["api-prefix", "font", "image-destination", "static-asset", "navigation"]);
    }

    #[test]
    fn test_api_prefix() {
        assert_eq!(classifier().classify(&get("/api/moods")), ResourceCategory::Api);
    }

    #[test]
    fn test_api_wins_over_static_extension() {
        assert_eq!(classifier().classify(&get("/api/export.js")), ResourceCategory::Api);
    }

    #[test]
    fn test_api_wins_over_image_destination() {
        let req = get("/api/avatar").with_destination(Destination::Image);
        assert_eq!(classifier().classify(&req), ResourceCategory::Api);
    }

    #[test]
    fn test_font_by_destination_or_segment() {
        let c = classifier();
        assert_eq!(c.classify(&get("/cdn/inter.woff2").with_destination(Destination::Font)), ResourceCategory::Font);
        assert_eq!(c.classify(&get("/static/fonts/inter.css")), ResourceCategory::Font);
    }

    #[test]
    fn test_image_destination() {
        let req = get("/uploads/photo.png").with_destination(Destination::Image);
        assert_eq!(classifier().classify(&req), ResourceCategory::Image);
    }

    #[test]
    fn test_image_extension_without_destination_is_other() {
        assert_eq!(classifier().classify(&get("/uploads/photo.png")), ResourceCategory::Other);
    }

    #[test]
    fn test_static_assets() {
        let c = classifier();
        assert_eq!(c.classify(&get("/app.js")), ResourceCategory::StaticAsset);
        assert_eq!(c.classify(&get("/theme.css")), ResourceCategory::StaticAsset);
        assert_eq!(c.classify(&get("/offline.html")), ResourceCategory::StaticAsset);
        assert_eq!(c.classify(&get("/static/media/logo")), ResourceCategory::StaticAsset);
    }

    #[test]
    fn test_navigation() {
        let req = InterceptedRequest::navigate(Url::parse("https://app.test/journal").unwrap());
        assert_eq!(classifier().classify(&req), ResourceCategory::Navigation);
    }

    #[test]
    fn test_navigation_to_html_file_is_static() {
        let req = InterceptedRequest::navigate(Url::parse("https://app.test/index.html").unwrap());
        assert_eq!(classifier().classify(&req), ResourceCategory::StaticAsset);
    }

    #[test]
    fn test_default_other() {
        let mut req = get("/manifest.webmanifest");
        req.mode = RequestMode::SameOrigin;
        assert_eq!(classifier().classify(&req), ResourceCategory::Other);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let c = classifier();
        let req = get("/static/js/bundle.js");
        let first = c.classify(&req);
        for _ in 0..10 {
            assert_eq!(c.classify(&req), first);
        }
    }

    #[test]
    fn test_custom_api_prefix() {
        let config = AppConfig { api_prefix: "/v2/".into(), ..Default::default() };
        let c = Classifier::from_config(&config).unwrap();
        assert_eq!(c.classify(&get("/v2/entries")), ResourceCategory::Api);
        assert_eq!(c.classify(&get("/api/entries")), ResourceCategory::Other);
    }

    #[test]
    fn test_single_rule_in_isolation() {
        let rule = image_rule();
        assert!(rule.matches(&get("/x").with_destination(Destination::Image)));
        assert!(!rule.matches(&get("/x.png")));
    }
}
