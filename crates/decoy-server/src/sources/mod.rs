//! Data-source strategies.
//!
//! Each strategy answers a matched action request with `Ok(Some(body))`
//! (data found, chain stops), `Ok(None)` (nothing to say, try the next
//! strategy), or `Err` (hard failure, chain aborts). A missing fixture or
//! template file is explicitly the `Ok(None)` case, never an error.

mod custom;
mod fixture;
mod template;
mod upstream;

pub use custom::SourceRegistry;
pub use fixture::FixtureSource;
pub use template::TemplateSource;
pub use upstream::UpstreamSource;

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use hyper::{header, HeaderMap, Method};

use crate::router::ActionMatch;

/// Read-only view of the inbound request handed to every strategy.
#[derive(Debug, Clone)]
pub struct ActionRequest {
    pub method: Method,
    /// Full request path including the action suffix, query string stripped.
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ActionRequest {
    /// User agent as it appears in access lines; "-" when absent.
    pub fn user_agent(&self) -> &str {
        self.headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-")
    }
}

/// Hard strategy failures. Soft "no data here" is `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid JSON in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("upstream request to {url} failed: {source}")]
    Upstream { url: String, source: reqwest::Error },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Outcome of a single strategy attempt.
pub type SourceResult = Result<Option<String>, SourceError>;

/// A data-source strategy.
///
/// One instance serves all requests concurrently behind an `Arc`, so
/// implementations hold only read-only state.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn resolve(&self, action: &ActionMatch, request: &ActionRequest) -> SourceResult;
}

/// `<root>/<logical path><suffix>`, or `None` when the logical path tries to
/// climb out of the root with `..` components.
pub(crate) fn resolve_under(root: &Path, logical_path: &str, suffix: &str) -> Option<PathBuf> {
    let relative = logical_path.trim_start_matches('/');
    if Path::new(relative)
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return None;
    }
    Some(root.join(format!("{relative}{suffix}")))
}
