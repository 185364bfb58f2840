//! Environment configuration for the worker

/// Variable names read from the worker environment
pub const ORIGIN_HOSTNAME: &str = "ORIGIN_HOSTNAME";
pub const DEBUG: &str = "DEBUG";
pub const PUSH_INVALIDATION: &str = "PUSH_INVALIDATION";
pub const ORIGIN_AUTHENTICATION: &str = "ORIGIN_AUTHENTICATION";

/// Per-deployment settings, read once at the start of each request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Hostname requests are forwarded to (required for proxying)
    pub origin_hostname: Option<String>,

    /// Verbose logging of extraction decisions
    pub debug: bool,

    /// Ask the origin to push cache invalidations to this CDN
    pub push_invalidation: bool,

    /// Token sent to the origin in the `authorization` header
    pub origin_authentication: Option<String>,
}

impl Config {
    /// Build a config from any key lookup (worker env, process env, a test map).
    ///
    /// Blank values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        Self {
            origin_hostname: read(ORIGIN_HOSTNAME),
            debug: read(DEBUG).is_some_and(|v| v == "true"),
            push_invalidation: read(PUSH_INVALIDATION).is_none_or(|v| v != "disabled"),
            origin_authentication: read(ORIGIN_AUTHENTICATION),
        }
    }
}
