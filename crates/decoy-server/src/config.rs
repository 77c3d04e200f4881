//! Mock configuration types.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Top-level mock configuration, loaded once at startup from a JSON file
/// (`config/mockConfig.json` by default) and immutable afterwards.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MockConfig {
    /// Ordered list of data-source strategy identifiers. Strategies are tried
    /// strictly in this order; the first one that produces data wins.
    pub data_source: Vec<String>,

    /// Static JSON fixture lookup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<JsonSourceConfig>,

    /// Fake-data template expansion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<TemplateSourceConfig>,

    /// Passthrough to a real backend with a canned authentication cookie.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie: Option<CookieSourceConfig>,
}

/// Where static JSON fixtures live and how their files are named.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonSourceConfig {
    /// Base directory, resolved against the working directory when relative.
    pub path: String,
    /// File name suffix appended to the logical path (default: ".json").
    #[serde(default = "default_json_suffix")]
    pub suffix: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSourceConfig {
    /// Base directory holding `<logical path>.template` files.
    pub path: String,
}

/// Upstream passthrough configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieSourceConfig {
    /// Base URL of the real backend, e.g. "https://api.example.com".
    pub host: String,
    /// Applied only when `host` does not already carry an explicit port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// `Cookie` header value sent verbatim with every passthrough request.
    pub cookie: String,
    /// Verify upstream TLS certificates. Off by default so self-signed dev
    /// backends work out of the box.
    #[serde(default)]
    pub reject_unauthorized: bool,
    /// OpenSSL-style protocol name (e.g. "TLSv1_2_method") setting the
    /// minimum accepted TLS version. Unknown values are ignored with a
    /// warning.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure_protocol: Option<String>,
    /// Per-request timeout for passthrough calls, in milliseconds.
    #[serde(default = "default_upstream_timeout_ms")]
    pub timeout_ms: u64,
}

/// A configured data-source strategy.
///
/// Everything that is not one of the built-in identifiers resolves through
/// the custom source registry at dispatch time, so unknown ids are legal
/// here; a registry miss simply yields no data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSourceKind {
    Json,
    Template,
    Cookie,
    Custom(String),
}

impl DataSourceKind {
    pub fn from_id(id: &str) -> Self {
        match id {
            "json" => DataSourceKind::Json,
            "template" => DataSourceKind::Template,
            "cookie" => DataSourceKind::Cookie,
            other => DataSourceKind::Custom(other.to_string()),
        }
    }

    /// The identifier as written in `dataSource`, for logging.
    pub fn id(&self) -> &str {
        match self {
            DataSourceKind::Json => "json",
            DataSourceKind::Template => "template",
            DataSourceKind::Cookie => "cookie",
            DataSourceKind::Custom(id) => id.as_str(),
        }
    }
}

impl MockConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(path)?;
        let config: MockConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.data_source.is_empty() {
            anyhow::bail!(
                "'dataSource' must list at least one strategy; \
                 with an empty chain every mock request would be unanswerable"
            );
        }

        for id in &self.data_source {
            if id.trim().is_empty() {
                anyhow::bail!("'dataSource' entries must be non-empty strategy identifiers");
            }
            match DataSourceKind::from_id(id) {
                DataSourceKind::Json if self.json.is_none() => {
                    anyhow::bail!(
                        "'dataSource' lists 'json' but no 'json' section is configured"
                    );
                }
                DataSourceKind::Template if self.template.is_none() => {
                    anyhow::bail!(
                        "'dataSource' lists 'template' but no 'template' section is configured"
                    );
                }
                DataSourceKind::Cookie if self.cookie.is_none() => {
                    anyhow::bail!(
                        "'dataSource' lists 'cookie' but no 'cookie' section is configured"
                    );
                }
                _ => {}
            }
        }

        if let Some(ref json) = self.json {
            if json.path.is_empty() {
                anyhow::bail!("'json.path' must not be empty");
            }
        }
        if let Some(ref template) = self.template {
            if template.path.is_empty() {
                anyhow::bail!("'template.path' must not be empty");
            }
        }
        if let Some(ref cookie) = self.cookie {
            if cookie.host.is_empty() {
                anyhow::bail!("'cookie.host' must not be empty");
            }
        }

        Ok(())
    }

    /// The configured strategy identifiers resolved to kinds, in trial order.
    pub fn strategy_chain(&self) -> Vec<DataSourceKind> {
        self.data_source
            .iter()
            .map(|id| DataSourceKind::from_id(id))
            .collect()
    }
}

fn default_json_suffix() -> String {
    ".json".to_string()
}

fn default_upstream_timeout_ms() -> u64 {
    30_000
}
