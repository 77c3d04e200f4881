//! Cookie-authenticated passthrough to a real backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, COOKIE};
use reqwest::Client;
use tracing::{debug, warn};

use super::{ActionRequest, DataSource, SourceError, SourceResult};
use crate::config::CookieSourceConfig;
use crate::router::ActionMatch;

/// Forwards a matched action to the configured backend with a canned
/// authentication cookie, so endpoints without local mocks keep answering
/// with real data during development.
///
/// The upstream body is returned verbatim whatever the status code, an
/// empty body included; only transport failures (connect, TLS, timeout)
/// abort the chain.
pub struct UpstreamSource {
    client: Client,
    base_url: String,
    cookie: String,
}

impl UpstreamSource {
    pub fn new(config: &CookieSourceConfig) -> Result<Self, anyhow::Error> {
        let mut builder = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .danger_accept_invalid_certs(!config.reject_unauthorized);

        if let Some(ref protocol) = config.secure_protocol {
            match min_tls_version(protocol) {
                Some(version) => builder = builder.min_tls_version(version),
                None => warn!("Ignoring unrecognized secureProtocol '{}'", protocol),
            }
        }

        Ok(Self {
            client: builder.build()?,
            base_url: base_url(config),
            cookie: config.cookie.clone(),
        })
    }

    fn request_url(&self, action: &ActionMatch) -> String {
        format!("{}{}", self.base_url, action.action_key())
    }
}

#[async_trait]
impl DataSource for UpstreamSource {
    async fn resolve(&self, action: &ActionMatch, request: &ActionRequest) -> SourceResult {
        let url = self.request_url(action);
        debug!("Passing through to {}", url);

        let response = self
            .client
            .request(request.method.clone(), url.as_str())
            .header(COOKIE, self.cookie.as_str())
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(request.body.clone())
            .send()
            .await
            .map_err(|e| SourceError::Upstream {
                url: url.clone(),
                source: e,
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| SourceError::Upstream {
            url: url.clone(),
            source: e,
        })?;
        debug!(
            "Upstream {} answered {} with {} bytes",
            url,
            status,
            body.len()
        );

        Ok(Some(body))
    }
}

/// Base URL from the cookie section: scheme defaulted to http, trailing
/// slash trimmed, configured port applied only when the host carries none.
fn base_url(config: &CookieSourceConfig) -> String {
    let host = config.host.trim_end_matches('/');
    let host = if host.contains("://") {
        host.to_string()
    } else {
        format!("http://{host}")
    };

    let authority = host
        .split_once("://")
        .map_or(host.as_str(), |(_, rest)| rest);
    match config.port {
        Some(port) if !authority.contains(':') => format!("{host}:{port}"),
        _ => host,
    }
}

/// OpenSSL-style protocol names to a minimum TLS version. rustls floors out
/// at 1.2, so everything below maps there.
fn min_tls_version(protocol: &str) -> Option<reqwest::tls::Version> {
    let normalized = protocol.to_ascii_lowercase();
    if normalized.starts_with("tlsv1_3") || normalized.starts_with("tlsv1.3") {
        Some(reqwest::tls::Version::TLS_1_3)
    } else if normalized.starts_with("tlsv1") {
        Some(reqwest::tls::Version::TLS_1_2)
    } else {
        None
    }
}
