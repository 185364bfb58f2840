//! Request policy and origin request construction
//!
//! Everything here runs before the origin is contacted: port, draft and telemetry
//! policies, CORS preflight, then query sanitization and the host rewrite.

use crate::config::Config;
use crate::error::{EdgeError, Result};
use crate::paths::{self, NormalizedUrl, ResourceClass};
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static RE_ALLOWED_ORIGIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https://main--.*--.*\.(?:aem|hlx)\.(?:page|live)$")
        .expect("invalid origin regex")
});

/// Methods accepted on telemetry paths
const TELEMETRY_METHODS: &[&str] = &["GET", "POST", "OPTIONS"];

/// How a request is answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// 301 to the same URL without its port
    StripPort { location: String },
    /// 404, drafts are never served
    Draft,
    /// 405 on telemetry paths
    MethodNotAllowed,
    /// CORS preflight, answered locally
    Preflight,
    /// Forward to the origin
    Proxy,
}

impl Route {
    /// Status and plain-text body for routes answered without the origin
    pub fn local_response(&self) -> Option<(u16, String)> {
        match self {
            Route::StripPort { location } => {
                Some((301, format!("Moved permanently to {location}")))
            }
            Route::Draft => Some((404, "Not Found".to_string())),
            Route::MethodNotAllowed => Some((405, "Method Not Allowed".to_string())),
            Route::Preflight => Some((204, String::new())),
            Route::Proxy => None,
        }
    }
}

/// Decide how to answer a request from its method and URL alone.
pub fn route(method: &str, url: &Url) -> Route {
    if url.port().is_some() {
        let mut location = url.clone();
        // only fails for cannot-be-a-base URLs, which never carry a port
        let _ = location.set_port(None);
        return Route::StripPort {
            location: location.to_string(),
        };
    }

    let path = url.path();
    if paths::is_draft_path(path) {
        return Route::Draft;
    }

    let method = method.to_ascii_uppercase();
    if paths::is_telemetry_path(path) && !TELEMETRY_METHODS.contains(&method.as_str()) {
        return Route::MethodNotAllowed;
    }

    if method == "OPTIONS" {
        return Route::Preflight;
    }

    Route::Proxy
}

/// The rewritten request to send upstream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginRequest {
    pub url: Url,
    pub class: ResourceClass,
    /// Query string the client sent, kept for redirect rewriting
    pub saved_search: String,
    /// Headers to set on top of the inbound ones
    pub headers: Vec<(&'static str, String)>,
}

impl OriginRequest {
    /// Sanitize `url`, point it at the configured origin and attach trust headers.
    ///
    /// `inbound_host` is the client-facing `host` header, forwarded as
    /// `x-forwarded-host` so the origin can build absolute URLs.
    pub fn build(url: &Url, inbound_host: Option<&str>, config: &Config) -> Result<Self> {
        let origin_hostname = config
            .origin_hostname
            .as_deref()
            .ok_or(EdgeError::MissingOriginHostname)?;

        let NormalizedUrl {
            mut url,
            class,
            saved_search,
        } = paths::normalize(url);

        if url.set_host(Some(origin_hostname)).is_err() {
            return Err(EdgeError::InvalidOrigin {
                origin: origin_hostname.to_string(),
            });
        }

        let origin = url.origin().ascii_serialization();
        if !RE_ALLOWED_ORIGIN.is_match(&origin) {
            return Err(EdgeError::InvalidOrigin { origin });
        }

        let mut headers = Vec::with_capacity(4);
        if let Some(host) = inbound_host {
            headers.push(("x-forwarded-host", host.to_string()));
        }
        headers.push(("x-byo-cdn-type", "cloudflare".to_string()));
        if config.push_invalidation {
            headers.push(("x-push-invalidation", "enabled".to_string()));
        }
        if let Some(token) = &config.origin_authentication {
            headers.push(("authorization", format!("token {token}")));
        }

        Ok(Self {
            url,
            class,
            saved_search,
            headers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            origin_hostname: Some("main--site--owner.aem.live".to_string()),
            push_invalidation: true,
            ..Config::default()
        }
    }

    fn url(input: &str) -> Url {
        Url::parse(input).unwrap()
    }

    #[test]
    fn port_is_redirected_away() {
        let route = route("GET", &url("https://www.example.com:8443/blog/post?x=1"));
        assert_eq!(
            route,
            Route::StripPort {
                location: "https://www.example.com/blog/post?x=1".to_string()
            }
        );
        assert_eq!(
            route.local_response(),
            Some((
                301,
                "Moved permanently to https://www.example.com/blog/post?x=1".to_string()
            ))
        );
    }

    #[test]
    fn default_port_is_not_redirected() {
        assert_eq!(route("GET", &url("https://www.example.com:443/")), Route::Proxy);
    }

    #[test]
    fn drafts_are_hidden() {
        assert_eq!(route("GET", &url("https://www.example.com/drafts/wip")), Route::Draft);
    }

    #[test]
    fn telemetry_methods() {
        let rum = url("https://www.example.com/.rum/1");
        assert_eq!(route("PUT", &rum), Route::MethodNotAllowed);
        assert_eq!(route("DELETE", &rum), Route::MethodNotAllowed);
        assert_eq!(route("POST", &rum), Route::Proxy);
        assert_eq!(route("get", &rum), Route::Proxy);
        assert_eq!(route("OPTIONS", &rum), Route::Preflight);

        let nested = url("https://www.example.com/blog/.rum/x");
        assert_eq!(route("PUT", &nested), Route::Proxy);
        assert_eq!(
            route("PUT", &url("https://www.example.com/page")),
            Route::Proxy
        );
    }

    #[test]
    fn preflight_short_circuits() {
        assert_eq!(
            route("OPTIONS", &url("https://www.example.com/page")),
            Route::Preflight
        );
    }

    #[test]
    fn builds_origin_request() {
        let mut config = config();
        config.origin_authentication = Some("abc".to_string());

        let request = OriginRequest::build(
            &url("https://www.example.com/blog/post?utm=1"),
            Some("www.example.com"),
            &config,
        )
        .unwrap();

        assert_eq!(
            request.url.as_str(),
            "https://main--site--owner.aem.live/blog/post"
        );
        assert_eq!(request.saved_search, "?utm=1");
        assert!(request
            .headers
            .contains(&("x-forwarded-host", "www.example.com".to_string())));
        assert!(request
            .headers
            .contains(&("x-byo-cdn-type", "cloudflare".to_string())));
        assert!(request
            .headers
            .contains(&("x-push-invalidation", "enabled".to_string())));
        assert!(request
            .headers
            .contains(&("authorization", "token abc".to_string())));
    }

    #[test]
    fn push_invalidation_can_be_disabled() {
        let mut config = config();
        config.push_invalidation = false;
        let request =
            OriginRequest::build(&url("https://www.example.com/"), None, &config).unwrap();
        assert!(request.headers.iter().all(|(name, _)| *name != "x-push-invalidation"));
        assert!(request.headers.iter().all(|(name, _)| *name != "authorization"));
        assert!(request.headers.iter().all(|(name, _)| *name != "x-forwarded-host"));
    }

    #[test]
    fn missing_origin_fails_fast() {
        let err = OriginRequest::build(&url("https://www.example.com/"), None, &Config::default())
            .unwrap_err();
        assert!(matches!(err, EdgeError::MissingOriginHostname));
        assert_eq!(err.status(), 500);
    }

    #[test]
    fn rejects_origin_outside_allow_list() {
        for host in ["evil.example.com", "main--site--owner.aem.dev", "feature--site--owner.hlx.page"] {
            let config = Config {
                origin_hostname: Some(host.to_string()),
                ..Config::default()
            };
            let err = OriginRequest::build(&url("https://www.example.com/"), None, &config)
                .unwrap_err();
            assert!(matches!(err, EdgeError::InvalidOrigin { .. }), "{host} accepted");
        }
    }

    #[test]
    fn accepts_hlx_page_origin() {
        let config = Config {
            origin_hostname: Some("main--site--owner.hlx.page".to_string()),
            ..Config::default()
        };
        assert!(OriginRequest::build(&url("https://www.example.com/"), None, &config).is_ok());
    }
}
