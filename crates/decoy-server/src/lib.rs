//! Mock dispatch engine for local development servers.
//!
//! `decoy-server` answers "action" requests (paths ending in a configurable
//! suffix, `.action` by default) from an ordered chain of data sources:
//! static JSON fixtures, fake-data templates, a cookie-authenticated
//! passthrough to a real backend, and custom pluggable sources. Sources are
//! tried strictly in the configured order; the first one that produces data
//! wins and the rest are never consulted. Requests that do not look like
//! actions are handed back untouched so an embedding server can serve them
//! some other way.

pub mod config;
pub mod dispatch;
pub mod generator;
pub mod router;
pub mod server;
pub mod sources;

pub use config::{
    CookieSourceConfig, DataSourceKind, JsonSourceConfig, MockConfig, TemplateSourceConfig,
};
pub use dispatch::{DispatchEngine, DispatchOutcome, EngineOptions};
pub use router::{ActionMatch, ActionRouter};
pub use server::{FallbackHandler, MockServer, NotFoundFallback};
pub use sources::{ActionRequest, DataSource, SourceError, SourceRegistry, SourceResult};
