//! The mock dispatch engine.
//!
//! One engine instance owns the route table, the configured strategy chain
//! and the custom source registry; the hosting server shares it behind an
//! `Arc`. Strategies run strictly one after another per request, never in
//! parallel.

use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::{header, Method, Request, Response, StatusCode};
use tracing::{debug, error, info, warn};

use crate::config::{DataSourceKind, MockConfig};
use crate::router::{ActionMatch, ActionRouter};
use crate::sources::{
    ActionRequest, DataSource, FixtureSource, SourceError, SourceRegistry, SourceResult,
    TemplateSource, UpstreamSource,
};

/// Which requests count as actions.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Path suffixes marking mock candidates, tried in order.
    pub suffixes: Vec<String>,
    /// Methods answered for each suffix.
    pub methods: Vec<Method>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            suffixes: vec![".action".to_string()],
            methods: vec![Method::POST, Method::GET],
        }
    }
}

impl EngineOptions {
    /// Default options with the suffixes taken from a comma-separated list,
    /// as accepted on the command line (".action,.do").
    pub fn with_suffix_list(list: &str) -> Self {
        let suffixes = list
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        Self {
            suffixes,
            ..Default::default()
        }
    }
}

/// Outcome of offering a request to the engine.
pub enum DispatchOutcome<B> {
    /// An action matched; the response is ready to send.
    Handled(Response<Full<Bytes>>),
    /// Not an action. The request comes back untouched, body unread, for
    /// whatever serves static content.
    Unmatched(Request<B>),
}

enum ChainOutcome {
    Success { id: String, body: String },
    Failed { id: String, error: SourceError },
    Exhausted,
}

pub struct DispatchEngine {
    options: EngineOptions,
    router: ActionRouter,
    chain: Vec<DataSourceKind>,
    fixture: Option<FixtureSource>,
    template: Option<TemplateSource>,
    upstream: Option<UpstreamSource>,
    registry: SourceRegistry,
}

impl DispatchEngine {
    pub fn new(config: MockConfig, options: EngineOptions) -> Result<Self, anyhow::Error> {
        config.validate()?;
        let router = ActionRouter::new(&options.suffixes, &options.methods)?;

        let fixture = config.json.as_ref().map(FixtureSource::new);
        let template = config.template.as_ref().map(TemplateSource::new);
        let upstream = config
            .cookie
            .as_ref()
            .map(UpstreamSource::new)
            .transpose()?;

        Ok(Self {
            options,
            router,
            chain: config.strategy_chain(),
            fixture,
            template,
            upstream,
            registry: SourceRegistry::new(),
        })
    }

    /// Register a custom strategy. Registrations happen before the engine
    /// starts serving; a `dataSource` id with no registration simply never
    /// produces data.
    pub fn register_source(&mut self, id: impl Into<String>, source: Arc<dyn DataSource>) {
        self.registry.register(id, source);
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// The configured strategy chain, in trial order.
    pub fn chain(&self) -> &[DataSourceKind] {
        &self.chain
    }

    /// Offer a request to the engine.
    ///
    /// A non-action request is returned untouched. A matched request always
    /// yields exactly one response: 200 with the first strategy's data, 404
    /// carrying the failure detail when a strategy fails hard, 404
    /// "not found" when every strategy passes, or 400 when the request body
    /// cannot be read.
    pub async fn dispatch<B>(&self, req: Request<B>) -> DispatchOutcome<B>
    where
        B: Body + Send,
        B::Data: Send,
        B::Error: std::fmt::Display,
    {
        let method = req.method().clone();
        let Some(action) = self.router.match_request(&method, req.uri().path()) else {
            return DispatchOutcome::Unmatched(req);
        };

        debug!("Action matched: {} {}", method, action.action_key());

        let (parts, body) = req.into_parts();
        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                error!(
                    "Failed to read request body for {}: {}",
                    action.action_key(),
                    e
                );
                return DispatchOutcome::Handled(plain_response(
                    StatusCode::BAD_REQUEST,
                    "failed to read request body".to_string(),
                ));
            }
        };

        let request = ActionRequest {
            method,
            path: action.action_key(),
            headers: parts.headers,
            body,
        };

        let outcome = self.run_chain(&action, &request).await;
        DispatchOutcome::Handled(self.finish(&request, outcome))
    }

    /// Try the configured strategies strictly in order, awaiting each before
    /// the next.
    async fn run_chain(&self, action: &ActionMatch, request: &ActionRequest) -> ChainOutcome {
        for kind in &self.chain {
            debug!("Trying data source '{}' for {}", kind.id(), request.path);
            match self.resolve_kind(kind, action, request).await {
                Ok(Some(body)) => {
                    return ChainOutcome::Success {
                        id: kind.id().to_string(),
                        body,
                    };
                }
                Ok(None) => continue,
                Err(error) => {
                    return ChainOutcome::Failed {
                        id: kind.id().to_string(),
                        error,
                    };
                }
            }
        }
        ChainOutcome::Exhausted
    }

    /// One strategy attempt. Custom strategies are lenient: a registry miss
    /// or a custom resolver error is logged and yields no data, unlike the
    /// built-ins whose errors abort the chain.
    async fn resolve_kind(
        &self,
        kind: &DataSourceKind,
        action: &ActionMatch,
        request: &ActionRequest,
    ) -> SourceResult {
        match kind {
            DataSourceKind::Json => match &self.fixture {
                Some(source) => source.resolve(action, request).await,
                None => Ok(None),
            },
            DataSourceKind::Template => match &self.template {
                Some(source) => source.resolve(action, request).await,
                None => Ok(None),
            },
            DataSourceKind::Cookie => match &self.upstream {
                Some(source) => source.resolve(action, request).await,
                None => Ok(None),
            },
            DataSourceKind::Custom(id) => {
                let Some(source) = self.registry.get(id) else {
                    debug!("No custom data source registered for '{}'", id);
                    return Ok(None);
                };
                match source.resolve(action, request).await {
                    Err(e) => {
                        warn!("Custom data source '{}' failed: {}", id, e);
                        Ok(None)
                    }
                    other => other,
                }
            }
        }
    }

    fn finish(&self, request: &ActionRequest, outcome: ChainOutcome) -> Response<Full<Bytes>> {
        match outcome {
            ChainOutcome::Success { id, body } => {
                info!(
                    "\"{} {}\" 200 via '{}' \"{}\"",
                    request.method,
                    request.path,
                    id,
                    request.user_agent()
                );
                json_response(body)
            }
            ChainOutcome::Failed { id, error } => {
                error!(
                    "\"{} {}\" 404 data source '{}' failed: {} \"{}\"",
                    request.method,
                    request.path,
                    id,
                    error,
                    request.user_agent()
                );
                plain_response(StatusCode::NOT_FOUND, error.to_string())
            }
            ChainOutcome::Exhausted => {
                info!(
                    "\"{} {}\" 404 no data source produced data \"{}\"",
                    request.method,
                    request.path,
                    request.user_agent()
                );
                plain_response(StatusCode::NOT_FOUND, "not found".to_string())
            }
        }
    }
}

fn json_response(body: String) -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

fn plain_response(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JsonSourceConfig;
    use async_trait::async_trait;
    use hyper::body::Frame;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::task::{Context, Poll};
    use tempfile::TempDir;

    #[derive(Clone, Copy)]
    enum Behavior {
        Data(&'static str),
        NoData,
        Fail,
    }

    struct Scripted {
        behavior: Behavior,
        calls: Arc<AtomicUsize>,
    }

    impl Scripted {
        fn new(behavior: Behavior) -> (Arc<Self>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Arc::new(Self {
                    behavior,
                    calls: Arc::clone(&calls),
                }),
                calls,
            )
        }
    }

    #[async_trait]
    impl DataSource for Scripted {
        async fn resolve(&self, _action: &ActionMatch, _request: &ActionRequest) -> SourceResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Data(body) => Ok(Some(body.to_string())),
                Behavior::NoData => Ok(None),
                Behavior::Fail => Err(SourceError::Other(anyhow::anyhow!("scripted failure"))),
            }
        }
    }

    /// A request body whose stream errors out mid-read.
    struct BrokenBody;

    impl Body for BrokenBody {
        type Data = Bytes;
        type Error = std::io::Error;

        fn poll_frame(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<Option<Result<Frame<Bytes>, Self::Error>>> {
            Poll::Ready(Some(Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection reset",
            ))))
        }
    }

    fn custom_config(chain: &[&str]) -> MockConfig {
        MockConfig {
            data_source: chain.iter().map(|s| s.to_string()).collect(),
            json: None,
            template: None,
            cookie: None,
        }
    }

    fn post(uri: &str) -> Request<Full<Bytes>> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    async fn response_body(response: Response<Full<Bytes>>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_chain_stops_at_first_success() {
        let mut engine =
            DispatchEngine::new(custom_config(&["a", "b", "c"]), EngineOptions::default()).unwrap();
        let (a, a_calls) = Scripted::new(Behavior::NoData);
        let (b, b_calls) = Scripted::new(Behavior::Data(r#"{"from":"b"}"#));
        let (c, c_calls) = Scripted::new(Behavior::Data(r#"{"from":"c"}"#));
        engine.register_source("a", a);
        engine.register_source("b", b);
        engine.register_source("c", c);

        let outcome = engine.dispatch(post("/user/list.action")).await;
        let DispatchOutcome::Handled(response) = outcome else {
            panic!("expected a handled action");
        };

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(response_body(response).await, r#"{"from":"b"}"#);

        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
        assert_eq!(b_calls.load(Ordering::SeqCst), 1);
        // Later strategies must never run once one succeeds.
        assert_eq!(c_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_builtin_failure_aborts_chain() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("bad.json"), "{not json").unwrap();

        let config = MockConfig {
            data_source: vec!["a".to_string(), "json".to_string(), "c".to_string()],
            json: Some(JsonSourceConfig {
                path: dir.path().to_string_lossy().to_string(),
                suffix: ".json".to_string(),
            }),
            template: None,
            cookie: None,
        };
        let mut engine = DispatchEngine::new(config, EngineOptions::default()).unwrap();
        let (a, a_calls) = Scripted::new(Behavior::NoData);
        let (c, c_calls) = Scripted::new(Behavior::Data("never"));
        engine.register_source("a", a);
        engine.register_source("c", c);

        let outcome = engine.dispatch(post("/bad.action")).await;
        let DispatchOutcome::Handled(response) = outcome else {
            panic!("expected a handled action");
        };

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = response_body(response).await;
        assert!(body.contains("invalid JSON"), "unexpected body: {body}");

        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
        assert_eq!(c_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_exhausted_chain_is_not_found() {
        let mut engine =
            DispatchEngine::new(custom_config(&["a", "b"]), EngineOptions::default()).unwrap();
        let (a, _) = Scripted::new(Behavior::NoData);
        let (b, _) = Scripted::new(Behavior::NoData);
        engine.register_source("a", a);
        engine.register_source("b", b);

        let outcome = engine.dispatch(post("/user/list.action")).await;
        let DispatchOutcome::Handled(response) = outcome else {
            panic!("expected a handled action");
        };

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response_body(response).await, "not found");
    }

    #[tokio::test]
    async fn test_unregistered_custom_id_is_no_data() {
        let engine =
            DispatchEngine::new(custom_config(&["ghost"]), EngineOptions::default()).unwrap();

        let outcome = engine.dispatch(post("/x.action")).await;
        let DispatchOutcome::Handled(response) = outcome else {
            panic!("expected a handled action");
        };
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response_body(response).await, "not found");
    }

    #[tokio::test]
    async fn test_custom_failure_is_lenient() {
        let mut engine =
            DispatchEngine::new(custom_config(&["failing", "b"]), EngineOptions::default())
                .unwrap();
        let (failing, failing_calls) = Scripted::new(Behavior::Fail);
        let (b, _) = Scripted::new(Behavior::Data("ok"));
        engine.register_source("failing", failing);
        engine.register_source("b", b);

        let outcome = engine.dispatch(post("/x.action")).await;
        let DispatchOutcome::Handled(response) = outcome else {
            panic!("expected a handled action");
        };

        // A custom strategy error does not abort the chain.
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response_body(response).await, "ok");
        assert_eq!(failing_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unreadable_body_is_bad_request() {
        let mut engine =
            DispatchEngine::new(custom_config(&["a"]), EngineOptions::default()).unwrap();
        let (a, a_calls) = Scripted::new(Behavior::Data("never"));
        engine.register_source("a", a);

        let request = Request::builder()
            .method(Method::POST)
            .uri("/x.action")
            .body(BrokenBody)
            .unwrap();
        let outcome = engine.dispatch(request).await;
        let DispatchOutcome::Handled(response) = outcome else {
            panic!("expected a handled action");
        };

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response_body(response).await, "failed to read request body");
        // The chain never runs on a request that could not be read.
        assert_eq!(a_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unmatched_request_returned_untouched() {
        let engine =
            DispatchEngine::new(custom_config(&["a"]), EngineOptions::default()).unwrap();

        let outcome = engine.dispatch(post("/assets/app.js")).await;
        let DispatchOutcome::Unmatched(request) = outcome else {
            panic!("expected the request back");
        };
        assert_eq!(request.method(), Method::POST);
        assert_eq!(request.uri().path(), "/assets/app.js");

        // Wrong method on a matching path is also not an action.
        let request = Request::builder()
            .method(Method::DELETE)
            .uri("/x.action")
            .body(Full::new(Bytes::new()))
            .unwrap();
        assert!(matches!(
            engine.dispatch(request).await,
            DispatchOutcome::Unmatched(_)
        ));
    }

    #[tokio::test]
    async fn test_dispatch_is_idempotent() {
        let mut engine =
            DispatchEngine::new(custom_config(&["a"]), EngineOptions::default()).unwrap();
        let (a, a_calls) = Scripted::new(Behavior::Data(r#"{"n":1}"#));
        engine.register_source("a", a);

        for _ in 0..2 {
            let outcome = engine.dispatch(post("/same.action?q=1")).await;
            let DispatchOutcome::Handled(response) = outcome else {
                panic!("expected a handled action");
            };
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(response_body(response).await, r#"{"n":1}"#);
        }
        assert_eq!(a_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_suffix_list_parsing() {
        let options = EngineOptions::with_suffix_list(".action,.do");
        assert_eq!(options.suffixes, vec![".action", ".do"]);
        assert_eq!(options.methods, vec![Method::POST, Method::GET]);

        let options = EngineOptions::with_suffix_list(" .action , ");
        assert_eq!(options.suffixes, vec![".action"]);
    }
}
