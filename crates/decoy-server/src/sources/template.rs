//! Fake-data templates.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use super::{resolve_under, ActionRequest, DataSource, SourceError, SourceResult};
use crate::config::TemplateSourceConfig;
use crate::generator;
use crate::router::ActionMatch;

/// Expands `<root>/<logical path>.template` files through the fake-data
/// generator. A template file holds a JSON shape description; see the
/// [`generator`](crate::generator) module for the rule and placeholder
/// grammar.
pub struct TemplateSource {
    root: PathBuf,
}

impl TemplateSource {
    pub fn new(config: &TemplateSourceConfig) -> Self {
        Self {
            root: PathBuf::from(&config.path),
        }
    }
}

#[async_trait]
impl DataSource for TemplateSource {
    async fn resolve(&self, action: &ActionMatch, _request: &ActionRequest) -> SourceResult {
        let Some(path) = resolve_under(&self.root, &action.logical_path, ".template") else {
            warn!(
                "Refusing template lookup outside the template root: {}",
                action.logical_path
            );
            return Ok(None);
        };

        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No template at {}", path.display());
                return Ok(None);
            }
            Err(e) => return Err(SourceError::Read { path, source: e }),
        };

        // A broken template is a bug the developer wants to see, not a miss.
        let template: Value = serde_json::from_str(&contents).map_err(|e| SourceError::Parse {
            path: path.clone(),
            source: e,
        })?;

        let expanded = generator::expand(&template);
        debug!("Template hit: {}", path.display());
        let body = serde_json::to_string(&expanded).map_err(|e| SourceError::Parse {
            path,
            source: e,
        })?;
        Ok(Some(body))
    }
}
