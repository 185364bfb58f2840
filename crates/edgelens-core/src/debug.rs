//! DEBUG-gated diagnostics

use std::fmt::Display;

/// Logger for extraction decisions, switched on by `DEBUG=true`.
///
/// Built once per request and handed to everything that wants to explain itself.
/// Output only; nothing reads it back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebugLog {
    enabled: bool,
}

impl DebugLog {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn log(&self, message: impl Display) {
        if self.enabled {
            log::debug!(target: "edgelens", "{}", message);
        }
    }
}
