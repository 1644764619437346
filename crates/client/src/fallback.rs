//! Synthesized placeholder content.
//!
//! Only images and navigations have placeholders. Every other category gets
//! `None`, and the caller propagates its original failure.

use offgrid_core::{ResourceCategory, Response};

const PLACEHOLDER_WIDTH: u32 = 400;
const PLACEHOLDER_HEIGHT: u32 = 300;

/// Offline document wording for one locale.
#[derive(Debug, Clone, PartialEq, Eq)]
struct OfflineText {
    lang: &'static str,
    title: &'static str,
    heading: &'static str,
    message: &'static str,
}

static OFFLINE_TEXTS: &[OfflineText] = &[
    OfflineText {
        lang: "en",
        title: "Offline",
        heading: "You are offline",
        message: "This page is not available right now. Check your connection and try again.",
    },
    OfflineText {
        lang: "es",
        title: "Sin conexión",
        heading: "Estás sin conexión",
        message: "Esta página no está disponible ahora mismo. Revisa tu conexión e inténtalo de nuevo.",
    },
    OfflineText {
        lang: "fr",
        title: "Hors ligne",
        heading: "Vous êtes hors ligne",
        message: "Cette page n'est pas disponible pour le moment. Vérifiez votre connexion et réessayez.",
    },
    OfflineText {
        lang: "de",
        title: "Offline",
        heading: "Sie sind offline",
        message: "Diese Seite ist gerade nicht verfügbar. Prüfen Sie Ihre Verbindung und versuchen Sie es erneut.",
    },
];

#[derive(Debug, Clone)]
pub struct FallbackProvider {
    text: &'static OfflineText,
}

impl Default for FallbackProvider {
    fn default() -> Self {
        Self::new("en")
    }
}

impl FallbackProvider {
    /// Provider for `locale` (`es-MX` matches `es`); unknown locales use English.
    pub fn new(locale: &str) -> Self {
        let lang = locale.split(['-', '_']).next().unwrap_or_default().to_ascii_lowercase();
        let text = OFFLINE_TEXTS.iter().find(|t| t.lang == lang).unwrap_or(&OFFLINE_TEXTS[0]);
        Self { text }
    }

    pub fn fallback(&self, category: ResourceCategory) -> Option<Response> {
        match category {
            ResourceCategory::Image => Some(self.placeholder_image()),
            ResourceCategory::Navigation => Some(self.offline_document()),
            _ => None,
        }
    }

    /// Fixed-size SVG with "unavailable" text.
    pub fn placeholder_image(&self) -> Response {
        let svg = format!(
            r##"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}"><rect width="100%" height="100%" fill="#e5e7eb"/><text x="50%" y="50%" font-family="sans-serif" font-size="18" fill="#6b7280" text-anchor="middle" dominant-baseline="middle">Image unavailable</text></svg>"##,
            w = PLACEHOLDER_WIDTH,
            h = PLACEHOLDER_HEIGHT,
        );
        Response::new(200, svg)
            .with_header("content-type", "image/svg+xml")
            .with_header("cache-control", "no-store")
    }

    /// Minimal HTML page stating offline status.
    pub fn offline_document(&self) -> Response {
        let t = self.text;
        let html = format!(
            "<!DOCTYPE html>\n<html lang=\"{lang}\"><head><meta charset=\"utf-8\">\
             <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\
             <title>{title}</title></head><body><main><h1>{heading}</h1><p>{message}</p></main></body></html>\n",
            lang = t.lang,
            title = t.title,
            heading = t.heading,
            message = t.message,
        );
        Response::new(200, html)
            .with_header("content-type", "text/html; charset=utf-8")
            .with_header("cache-control", "no-store")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_image_and_navigation_have_fallbacks() {
        let provider = FallbackProvider::default();
        for category in ResourceCategory::ALL {
            let expected = matches!(category, ResourceCategory::Image | ResourceCategory::Navigation);
            assert_eq!(provider.fallback(category).is_some(), expected, "{category}");
        }
    }

    #[test]
    fn test_placeholder_image() {
        let resp = FallbackProvider::default().fallback(ResourceCategory::Image).unwrap();
        assert!(resp.content_type().unwrap().starts_with("image/"));
        let body = std::str::from_utf8(&resp.body).unwrap();
        assert!(body.contains(r#"width="400""#));
        assert!(body.contains(r#"height="300""#));
        assert!(body.contains("Image unavailable"));
    }

    #[test]
    fn test_offline_document_english() {
        let resp = FallbackProvider::default().fallback(ResourceCategory::Navigation).unwrap();
        assert_eq!(resp.content_type(), Some("text/html; charset=utf-8"));
        let body = std::str::from_utf8(&resp.body).unwrap();
        assert!(body.contains(r#"<html lang="en">"#));
        assert!(body.contains("You are offline"));
    }

    #[test]
    fn test_offline_document_region_locale() {
        let body = FallbackProvider::new("es-MX").offline_document().body;
        let body = std::str::from_utf8(&body).unwrap();
        assert!(body.contains(r#"lang="es""#));
        assert!(body.contains("Estás sin conexión"));
    }

    #[test]
    fn test_unknown_locale_uses_english() {
        let body = FallbackProvider::new("tlh").offline_document().body;
        assert!(std::str::from_utf8(&body).unwrap().contains("You are offline"));
    }
}
