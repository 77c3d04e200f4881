//! MockServer struct and accept loop.
//!
//! The server owns one `DispatchEngine` behind an `Arc` and offers every
//! inbound request to it; whatever the engine hands back unmatched goes to
//! the fallback handler.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::dispatch::{DispatchEngine, DispatchOutcome};

/// Receives every request the engine hands back unmatched.
///
/// The default implementation answers 404; embedders that serve static
/// content alongside the mocks mount their own handler here.
#[async_trait]
pub trait FallbackHandler: Send + Sync {
    async fn handle(&self, request: Request<Incoming>) -> Response<Full<Bytes>>;
}

/// Default fallback: plain 404 for everything.
pub struct NotFoundFallback;

#[async_trait]
impl FallbackHandler for NotFoundFallback {
    async fn handle(&self, request: Request<Incoming>) -> Response<Full<Bytes>> {
        debug!("No handler for {} {}", request.method(), request.uri().path());
        Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::new()))
            .unwrap()
    }
}

/// The mock HTTP server.
pub struct MockServer {
    engine: Arc<DispatchEngine>,
    addr: SocketAddr,
    fallback: Arc<dyn FallbackHandler>,
}

impl MockServer {
    pub fn new(engine: DispatchEngine, addr: SocketAddr) -> Self {
        Self {
            engine: Arc::new(engine),
            addr,
            fallback: Arc::new(NotFoundFallback),
        }
    }

    /// Replace the handler for non-action requests.
    pub fn with_fallback(mut self, fallback: Arc<dyn FallbackHandler>) -> Self {
        self.fallback = fallback;
        self
    }

    /// Run the server, accepting connections and handling requests.
    pub async fn run(self) -> Result<(), anyhow::Error> {
        let listener = TcpListener::bind(self.addr).await?;
        let addr = listener.local_addr()?;

        let suffixes = self.engine.options().suffixes.clone();
        let chain: Vec<&str> = self.engine.chain().iter().map(|k| k.id()).collect();
        info!("Listening on http://{}", addr);
        info!("Action suffixes: {:?}", suffixes);
        info!("Data source chain: {:?}", chain);

        let engine = self.engine;
        let fallback = self.fallback;

        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let engine = Arc::clone(&engine);
            let fallback = Arc::clone(&fallback);

            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req| {
                    let engine = Arc::clone(&engine);
                    let fallback = Arc::clone(&fallback);
                    async move {
                        let response = match engine.dispatch(req).await {
                            DispatchOutcome::Handled(response) => response,
                            DispatchOutcome::Unmatched(request) => fallback.handle(request).await,
                        };
                        Ok::<_, Infallible>(response)
                    }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!("Error serving connection from {}: {}", remote_addr, err);
                }
            });
        }
    }
}
