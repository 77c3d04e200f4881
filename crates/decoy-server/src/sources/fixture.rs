//! Static JSON fixtures.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use super::{resolve_under, ActionRequest, DataSource, SourceError, SourceResult};
use crate::config::JsonSourceConfig;
use crate::router::ActionMatch;

/// Serves canned responses from JSON files on disk.
///
/// A fixture file is an envelope, not the payload itself:
///
/// ```json
/// { "enable": true, "value": "data", "data": {"a": 1} }
/// ```
///
/// With `enable` truthy the field named by `value` is returned as the
/// response body. A falsy `enable` or a missing file yields no data, so the
/// next strategy gets its turn; flipping `enable` is how a developer parks a
/// fixture without deleting it.
pub struct FixtureSource {
    root: PathBuf,
    suffix: String,
}

impl FixtureSource {
    pub fn new(config: &JsonSourceConfig) -> Self {
        Self {
            root: PathBuf::from(&config.path),
            suffix: config.suffix.clone(),
        }
    }
}

#[async_trait]
impl DataSource for FixtureSource {
    async fn resolve(&self, action: &ActionMatch, _request: &ActionRequest) -> SourceResult {
        let Some(path) = resolve_under(&self.root, &action.logical_path, &self.suffix) else {
            warn!(
                "Refusing fixture lookup outside the fixture root: {}",
                action.logical_path
            );
            return Ok(None);
        };

        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No fixture at {}", path.display());
                return Ok(None);
            }
            Err(e) => return Err(SourceError::Read { path, source: e }),
        };

        let envelope: Value = serde_json::from_str(&contents).map_err(|e| SourceError::Parse {
            path: path.clone(),
            source: e,
        })?;

        if !is_truthy(envelope.get("enable").unwrap_or(&Value::Null)) {
            debug!("Fixture {} is disabled", path.display());
            return Ok(None);
        }

        let Some(field) = envelope.get("value").and_then(Value::as_str) else {
            warn!("Fixture {} has no usable 'value' field", path.display());
            return Ok(None);
        };
        let Some(payload) = envelope.get(field) else {
            warn!(
                "Fixture {} names missing field '{}' in 'value'",
                path.display(),
                field
            );
            return Ok(None);
        };

        debug!("Fixture hit: {}", path.display());
        let body = serde_json::to_string(payload).map_err(|e| SourceError::Parse {
            path,
            source: e,
        })?;
        Ok(Some(body))
    }
}

/// JavaScript-style truthiness, which is what fixture authors expect from
/// the `enable` flag: false, null, 0 and "" are off, everything else is on.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
