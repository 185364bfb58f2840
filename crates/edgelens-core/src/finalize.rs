//! Response header policy applied on the way back to the client

use std::collections::BTreeMap;
use std::convert::Infallible;

/// Header carrying the worker version on every response
pub const VERSION_HEADER: &str = "cfw";

/// Semantic version stamped into [`VERSION_HEADER`]
pub const WORKER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Preflight cache lifetime, in seconds
pub const PREFLIGHT_MAX_AGE: &str = "86400";

const CORS_HEADERS: &[(&str, &str)] = &[
    ("access-control-allow-origin", "*"),
    ("access-control-allow-methods", "GET, POST, PUT, DELETE, OPTIONS"),
    ("access-control-allow-headers", "Content-Type"),
];

/// Mutable view of a response's headers.
///
/// Names are matched case-insensitively by implementations.
pub trait HeaderStore {
    type Error;

    fn get(&self, name: &str) -> Result<Option<String>, Self::Error>;
    fn set(&mut self, name: &str, value: &str) -> Result<(), Self::Error>;
    fn delete(&mut self, name: &str) -> Result<(), Self::Error>;
}

/// Plain in-memory header map
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryHeaders(BTreeMap<String, String>);

impl MemoryHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v.to_string()))
                .collect(),
        )
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.0.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(&name.to_ascii_lowercase())
    }
}

impl HeaderStore for MemoryHeaders {
    type Error = Infallible;

    fn get(&self, name: &str) -> Result<Option<String>, Infallible> {
        Ok(self.value(name).map(str::to_string))
    }

    fn set(&mut self, name: &str, value: &str) -> Result<(), Infallible> {
        self.0.insert(name.to_ascii_lowercase(), value.to_string());
        Ok(())
    }

    fn delete(&mut self, name: &str) -> Result<(), Infallible> {
        self.0.remove(&name.to_ascii_lowercase());
        Ok(())
    }
}

/// Permissive CORS plus the version stamp; every response gets these.
pub fn stamp<H: HeaderStore>(headers: &mut H) -> Result<(), H::Error> {
    for (name, value) in CORS_HEADERS {
        headers.set(name, value)?;
    }
    headers.set(VERSION_HEADER, WORKER_VERSION)
}

/// Headers for a locally answered `OPTIONS` request
pub fn preflight<H: HeaderStore>(headers: &mut H) -> Result<(), H::Error> {
    stamp(headers)?;
    headers.set("access-control-max-age", PREFLIGHT_MAX_AGE)
}

/// Clean up an origin response before it goes to the client.
///
/// `saved_search` is the query string the client originally sent (with its `?`).
/// A 301 without its own query gets it back, since sanitization may have removed
/// parameters the redirect target still wants.
pub fn finalize<H: HeaderStore>(
    status: u16,
    saved_search: &str,
    headers: &mut H,
) -> Result<(), H::Error> {
    if status == 301 && !saved_search.is_empty() {
        if let Some(location) = headers.get("location")?
            && !location.contains('?')
        {
            headers.set("location", &format!("{location}{saved_search}"))?;
        }
    }

    // a cached 304 must not revive a stale policy
    if status == 304 {
        headers.delete("content-security-policy")?;
    }

    headers.delete("age")?;
    headers.delete("x-robots-tag")?;
    stamp(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;
    use regex::Regex;

    static RE_SEMVER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\.\d+\.\d+$").unwrap());

    #[test]
    fn version_is_semver() {
        assert!(RE_SEMVER.is_match(WORKER_VERSION));
    }

    #[test]
    fn redirect_gets_original_query() {
        let mut headers = MemoryHeaders::from_pairs([("Location", "/new-page")]);
        finalize(301, "?utm_source=mail&id=3", &mut headers).unwrap();
        assert_eq!(headers.value("location"), Some("/new-page?utm_source=mail&id=3"));
    }

    #[test]
    fn redirect_with_own_query_is_untouched() {
        let mut headers = MemoryHeaders::from_pairs([("location", "/new-page?x=1")]);
        finalize(301, "?utm_source=mail", &mut headers).unwrap();
        assert_eq!(headers.value("location"), Some("/new-page?x=1"));
    }

    #[test]
    fn other_redirects_are_untouched() {
        let mut headers = MemoryHeaders::from_pairs([("location", "/new-page")]);
        finalize(302, "?a=1", &mut headers).unwrap();
        assert_eq!(headers.value("location"), Some("/new-page"));

        let mut no_search = MemoryHeaders::from_pairs([("location", "/new-page")]);
        finalize(301, "", &mut no_search).unwrap();
        assert_eq!(no_search.value("location"), Some("/new-page"));
    }

    #[test]
    fn not_modified_drops_csp() {
        let mut headers =
            MemoryHeaders::from_pairs([("Content-Security-Policy", "default-src 'self'")]);
        finalize(304, "", &mut headers).unwrap();
        assert!(!headers.contains("content-security-policy"));

        let mut ok = MemoryHeaders::from_pairs([("Content-Security-Policy", "default-src 'self'")]);
        finalize(200, "", &mut ok).unwrap();
        assert!(ok.contains("content-security-policy"));
    }

    #[test]
    fn strips_cache_age_and_robots() {
        let mut headers = MemoryHeaders::from_pairs([
            ("age", "120"),
            ("x-robots-tag", "noindex"),
            ("content-type", "text/html"),
        ]);
        finalize(200, "", &mut headers).unwrap();
        assert!(!headers.contains("age"));
        assert!(!headers.contains("x-robots-tag"));
        assert_eq!(headers.value("content-type"), Some("text/html"));
    }

    #[test]
    fn adds_cors_and_version() {
        let mut headers = MemoryHeaders::new();
        finalize(200, "", &mut headers).unwrap();
        assert_eq!(headers.value("Access-Control-Allow-Origin"), Some("*"));
        assert_eq!(
            headers.value("Access-Control-Allow-Methods"),
            Some("GET, POST, PUT, DELETE, OPTIONS")
        );
        assert_eq!(headers.value("Access-Control-Allow-Headers"), Some("Content-Type"));
        assert_eq!(headers.value(VERSION_HEADER), Some(WORKER_VERSION));
    }

    #[test]
    fn preflight_caches_for_a_day() {
        let mut headers = MemoryHeaders::new();
        preflight(&mut headers).unwrap();
        assert_eq!(headers.value("access-control-max-age"), Some("86400"));
        assert_eq!(headers.value("access-control-allow-origin"), Some("*"));
        assert!(headers.contains(VERSION_HEADER));
    }
}
