//! Pluggable custom strategies.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::DataSource;

/// Named custom strategies, registered once at startup.
///
/// A `dataSource` entry that is not a built-in identifier resolves here. A
/// missing registration is not an error: the chain simply moves on, which
/// keeps a config usable while its custom strategy is still being written.
#[derive(Default)]
pub struct SourceRegistry {
    sources: HashMap<String, Arc<dyn DataSource>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a strategy under the id used in `dataSource`. Re-registering
    /// an id replaces the previous strategy.
    pub fn register(&mut self, id: impl Into<String>, source: Arc<dyn DataSource>) {
        let id = id.into();
        debug!("Registered custom data source '{}'", id);
        self.sources.insert(id, source);
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn DataSource>> {
        self.sources.get(id)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
