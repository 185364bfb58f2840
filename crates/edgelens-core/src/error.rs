//! Error taxonomy for the edge transformer

use thiserror::Error;

/// Errors that end a request before the origin is contacted, or that abort a rewrite.
///
/// Extraction and synthesis problems are deliberately absent: a bad date or a failed
/// JSON-LD serialization drops the affected output and the response carries on.
#[derive(Debug, Error)]
pub enum EdgeError {
    #[error("ORIGIN_HOSTNAME is not configured")]
    MissingOriginHostname,

    #[error("Invalid ORIGIN_HOSTNAME")]
    InvalidOrigin { origin: String },

    #[error("html rewrite failed: {0}")]
    Rewrite(String),
}

impl EdgeError {
    /// HTTP status the client receives for this error
    pub fn status(&self) -> u16 {
        match self {
            EdgeError::MissingOriginHostname | EdgeError::InvalidOrigin { .. } => 500,
            EdgeError::Rewrite(_) => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, EdgeError>;
