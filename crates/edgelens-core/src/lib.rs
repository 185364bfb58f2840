//! # edgelens-core
//!
//! Request and response handling for an edge worker that fronts an origin content
//! server and adds schema.org `Article` JSON-LD to its HTML.
//!
//! This crate has no dependency on the edge runtime:
//! - [`origin`] decides whether a request is answered locally or proxied, and builds
//!   the sanitized origin request ([`paths`] does the query filtering)
//! - [`extract`] streams HTML through `lol_html`, filling an [`Article`] and
//!   injecting JSON-LD after the viewport meta tag
//! - [`jsonld`] and [`dates`] turn the article into schema.org JSON
//! - [`finalize`] cleans response headers and adds CORS and the version stamp
//!
//! ## Example
//!
//! ```
//! use edgelens_core::{extract, DebugLog};
//!
//! let html = r#"<head>
//!     <meta property="og:title" content="Hello">
//!     <meta name="json-ld" content="article">
//!     <meta name="viewport" content="width=device-width">
//! </head>"#;
//!
//! let (rewritten, article) = extract::rewrite_html(html, "www.example.com", DebugLog::default())?;
//! assert_eq!(article.title.as_deref(), Some("Hello"));
//! assert!(rewritten.contains(r#"<script type="application/ld+json">"#));
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod article;
pub mod config;
pub mod dates;
pub mod debug;
pub mod error;
pub mod extract;
pub mod finalize;
pub mod jsonld;
pub mod origin;
pub mod paths;

pub use article::Article;
pub use config::Config;
pub use dates::format_iso8601_date;
pub use debug::DebugLog;
pub use error::{EdgeError, Result};
pub use extract::{ArticleRewriter, is_html, rewrite_html};
pub use finalize::{HeaderStore, MemoryHeaders, VERSION_HEADER, WORKER_VERSION, finalize, preflight, stamp};
pub use jsonld::{JsonLdArticle, build_json_ld};
pub use origin::{OriginRequest, Route, route};
pub use paths::{NormalizedUrl, ResourceClass, normalize};
