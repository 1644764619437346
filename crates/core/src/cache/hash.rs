//! Request identity keys.

use sha2::{Digest, Sha256};

use crate::model::{InterceptedRequest, Method};

/// Compute the entry key for a request identity.
///
/// Only method and URL participate; the URL is expected to be canonical
/// already (no fragment, lowercase host).
pub fn compute_entry_key(method: Method, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_str().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

/// Entry key for an intercepted request, ignoring its fragment.
pub fn request_key(request: &InterceptedRequest) -> String {
    let mut url = request.url.clone();
    url.set_fragment(None);
    compute_entry_key(request.method, url.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    #[test]
    fn test_key_stability() {
        let a = compute_entry_key(Method::Get, "https://app.test/api/moods");
        let b = compute_entry_key(Method::Get, "https://app.test/api/moods");
        assert_eq!(a, b);
    }

    #[test]
    fn test_key_depends_on_method() {
        let get = compute_entry_key(Method::Get, "https://app.test/");
        let head = compute_entry_key(Method::Head, "https://app.test/");
        assert_ne!(get, head);
    }

    #[test]
    fn test_request_key_ignores_fragment() {
        let plain = InterceptedRequest::get(Url::parse("https://app.test/journal").unwrap());
        let anchored = InterceptedRequest::get(Url::parse("https://app.test/journal#today").unwrap());
        assert_eq!(request_key(&plain), request_key(&anchored));
    }

    #[test]
    fn test_key_format() {
        let key = compute_entry_key(Method::Get, "https://app.test/");
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
