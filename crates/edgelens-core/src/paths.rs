//! Request URL classification and query-string sanitization
//!
//! The CDN caches by full URL, so every query parameter the origin ignores would
//! fragment the cache. Media and JSON resources keep a small allow-list; pages keep
//! nothing.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

/// Query keys kept on content-hashed media requests
pub const MEDIA_PARAMS: &[&str] = &["format", "height", "optimize", "width"];

/// Query keys kept on `.json` requests
pub const DATA_PARAMS: &[&str] = &["limit", "offset", "sheet"];

static RE_MEDIA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/media_[0-9a-f]{40,}[/a-zA-Z0-9_-]*\.[0-9a-z]+$").expect("invalid media regex")
});

static RE_TELEMETRY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/\.(rum|optel)/").expect("invalid telemetry regex"));

/// What kind of resource a request targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceClass {
    /// Content-addressed image or video (`media_<hash>.<ext>`)
    Media,
    /// JSON spreadsheet or index
    Data,
    /// Everything else
    Page,
}

impl ResourceClass {
    pub fn classify(path: &str) -> Self {
        if RE_MEDIA.is_match(path) {
            ResourceClass::Media
        } else if extension(path) == "json" {
            ResourceClass::Data
        } else {
            ResourceClass::Page
        }
    }

    /// Query keys this class is allowed to forward
    pub fn allowed_params(self) -> &'static [&'static str] {
        match self {
            ResourceClass::Media => MEDIA_PARAMS,
            ResourceClass::Data => DATA_PARAMS,
            ResourceClass::Page => &[],
        }
    }
}

/// Extension of the last path segment, or `""` when there is none.
///
/// Hidden files (`.htaccess`), extensionless names and directory paths all yield `""`.
pub fn extension(path: &str) -> &str {
    let basename = path.rsplit('/').next().unwrap_or_default();
    match basename.rfind('.') {
        Some(pos) if pos >= 1 => &basename[pos + 1..],
        _ => "",
    }
}

/// Whether the path belongs to the real-user-monitoring endpoints
pub fn is_telemetry_path(path: &str) -> bool {
    RE_TELEMETRY.is_match(path)
}

/// Whether the path is an unpublished draft
pub fn is_draft_path(path: &str) -> bool {
    path.starts_with("/drafts/")
}

/// Result of sanitizing a request URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedUrl {
    pub url: Url,
    pub class: ResourceClass,
    /// Query string as received, including the leading `?` (empty when there was none)
    pub saved_search: String,
}

/// Filter the query string to the allow-list of the URL's class and sort what remains.
pub fn normalize(url: &Url) -> NormalizedUrl {
    let class = ResourceClass::classify(url.path());
    let saved_search = url.query().map(|q| format!("?{q}")).unwrap_or_default();

    let allowed = class.allowed_params();
    let mut kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| allowed.contains(&key.as_ref()))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    // stable, so repeated keys keep their relative order
    kept.sort_by(|a, b| a.0.cmp(&b.0));

    let mut url = url.clone();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }

    NormalizedUrl {
        url,
        class,
        saved_search,
    }
}
