//! HTTP server setup and the relay handler.
//!
//! # Responsibilities
//! - Create Axum Router with the catch-all relay handler
//! - Wire up middleware (tracing) and the optional status endpoint
//! - Build the pooled backend client and the connection semaphore
//! - Normalize target bodies, stream everything else
//! - Capture exchanges, response side included, when enabled
//! - Serve with graceful shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header::CONTENT_TYPE, request::Parts, Request},
    response::{IntoResponse, Response},
    routing::{any, get},
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::{TokioExecutor, TokioTimer},
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, OwnedSemaphorePermit, Semaphore};
use tower_http::trace::TraceLayer;
use tracing::Instrument;
use uuid::Uuid;

use crate::admin;
use crate::capture::{self, CaptureRecord, CaptureSink, CaptureWriter, PendingCapture};
use crate::config::ProxyConfig;
use crate::http::body::{self, Disposition};
use crate::http::error::{BuildError, RelayError};
use crate::http::forward::{Outbound, Upstream};
use crate::http::stream::RelayStream;
use crate::normalize::{Normalizer, RemovalCounts};
use crate::observability::{metrics, RequestSummary};
use crate::routing::Router as TargetRouter;

const PASSTHROUGH_ROUTE: &str = "passthrough";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ProxyConfig>,
    pub targets: Arc<TargetRouter>,
    pub normalizer: Arc<Normalizer>,
    pub upstream: Arc<Upstream>,
    pub client: Client<HttpConnector, Body>,
    pub permits: Arc<Semaphore>,
    pub capture: Option<CaptureWriter>,
}

/// HTTP server for the proxy.
pub struct HttpServer {
    router: Router,
    config: Arc<ProxyConfig>,
    capture: Option<CaptureSink>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> Result<Self, BuildError> {
        let config = Arc::new(config);
        let normalizer = Normalizer::new(&config.normalization)?;
        let upstream = Upstream::new(&config.backend.base_url)?;

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.timeouts.connect_secs)));
        connector.set_nodelay(true);
        let client = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(config.backend.max_idle_per_host)
            .pool_idle_timeout(Duration::from_secs(config.backend.idle_timeout_secs))
            .pool_timer(TokioTimer::new())
            .build(connector);

        let (capture, sink) = match &config.capture.path {
            Some(path) => {
                let (writer, sink) = capture::writer::open(path, capture::writer::DEFAULT_QUEUE)?;
                (Some(writer), Some(sink))
            }
            None => (None, None),
        };

        let state = AppState {
            config: config.clone(),
            targets: Arc::new(TargetRouter::from_config(&config.targets)),
            normalizer: Arc::new(normalizer),
            upstream: Arc::new(upstream),
            client,
            permits: Arc::new(Semaphore::new(config.backend.max_connections)),
            capture,
        };

        let router = Self::build_router(&config, state);
        Ok(Self {
            router,
            config,
            capture: sink,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        let mut router = Router::new()
            .route("/{*path}", any(relay_handler))
            .route("/", any(relay_handler));

        // Other methods on the status path still reach the backend.
        if let Some(path) = &config.status.path {
            router = router.route(path, get(admin::get_status).fallback(relay_handler));
        }

        router.with_state(state).layer(TraceLayer::new_for_http())
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            backend = %self.config.backend.base_url,
            strip_volatile_keys = self.config.normalization.strip_volatile_keys,
            strip_timestamp_prefixes = self.config.normalization.strip_timestamp_prefixes,
            targets = self.config.targets.len(),
            "HTTP server starting"
        );

        let capture_task = self.capture.map(|sink| {
            tokio::spawn(async move {
                match sink.run().await {
                    Ok(written) => tracing::debug!(written, "Capture writer finished"),
                    Err(err) => tracing::error!(error = %err, "Capture writer failed"),
                }
            })
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        if let Some(task) = capture_task {
            if tokio::time::timeout(Duration::from_secs(5), task).await.is_err() {
                tracing::warn!("Capture writer did not finish in time");
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

/// Relay handler for every path and method.
async fn relay_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start = Instant::now();
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!(
        "relay",
        %request_id,
        method = %request.method(),
        path = %request.uri().path(),
        %peer
    );

    let target = state.targets.match_request(&request).map(|t| t.name.clone());
    let route = target.clone().unwrap_or_else(|| PASSTHROUGH_ROUTE.to_string());

    match relay(&state, request, target.as_deref(), span.clone())
        .instrument(span.clone())
        .await
    {
        Ok(response) => {
            metrics::record_request(&route, response.status().as_u16(), start);
            response
        }
        Err(err) => {
            let status = err.status();
            span.in_scope(|| match &err {
                RelayError::Backend(_) | RelayError::Timeout(_) => {
                    tracing::warn!(error = %err, status = status.as_u16(), "Relay failed")
                }
                _ => tracing::info!(error = %err, status = status.as_u16(), "Request rejected"),
            });
            metrics::record_request(&route, status.as_u16(), start);
            err.into_response()
        }
    }
}

async fn relay(
    state: &AppState,
    request: Request<Body>,
    target: Option<&str>,
    span: tracing::Span,
) -> Result<Response, RelayError> {
    let (parts, body) = request.into_parts();
    let path = parts.uri.path_and_query().map_or("/", |pq| pq.as_str());
    let capture = state
        .capture
        .as_ref()
        .filter(|_| target.is_some() || state.config.capture.include_passthrough);

    let (outbound, report, pending) = match target {
        Some(name) => {
            let limit = state.config.normalization.max_body_bytes;
            let bytes = body::read_limited(body, limit).await?;

            let pending = capture.map(|writer| {
                let record = CaptureRecord::new(parts.method.as_str(), path, &bytes)
                    .with_target(Some(name.to_string()))
                    .with_headers(&parts.headers);
                PendingCapture::new(writer.clone(), record)
            });

            let prepared = body::prepare(&state.normalizer, bytes);
            match prepared.disposition {
                Disposition::Rewritten => tracing::debug!(
                    removed = prepared.counts.removals(),
                    bytes = prepared.bytes.len(),
                    "Volatile fragments stripped"
                ),
                Disposition::Unchanged => tracing::warn!("Nothing to strip, prompt sent as-is"),
                Disposition::FailOpen => metrics::record_fail_open(),
            }
            metrics::record_removals(&prepared.counts);

            (
                Outbound::Buffered(prepared.bytes),
                Some((prepared.counts, prepared.stream)),
                pending,
            )
        }
        None => {
            tracing::info!("Passthrough request, relayed without normalization");
            let pending = capture.map(|writer| {
                let record = CaptureRecord::new(parts.method.as_str(), path, &[]).with_headers(&parts.headers);
                PendingCapture::new(writer.clone(), record)
            });
            (Outbound::Streaming(body), None, pending)
        }
    };

    let (permit, response) = match forward(state, &parts, outbound).await {
        Ok(forwarded) => forwarded,
        Err(err) => {
            if let Some(pending) = pending {
                pending.reject(err.status().as_u16());
            }
            return Err(err);
        }
    };

    let (head, body) = response.into_parts();
    tracing::debug!(status = head.status.as_u16(), "Backend responded");

    let summary = report.map(|(counts, stream): (RemovalCounts, bool)| RequestSummary {
        method: parts.method.clone(),
        path: parts.uri.path().to_string(),
        counts,
        stream: stream || is_event_stream(&head.headers),
    });
    let pending = pending.map(|mut pending| {
        pending.responded(head.status.as_u16());
        pending
    });

    let body = RelayStream::new(body.into_data_stream(), permit, summary, pending, span);
    Ok(Response::from_parts(head, Body::from_stream(body)))
}

/// Send the request to the backend once a connection permit is free.
async fn forward(
    state: &AppState,
    parts: &Parts,
    outbound: Outbound,
) -> Result<(OwnedSemaphorePermit, Response), RelayError> {
    let permit = state
        .permits
        .clone()
        .acquire_owned()
        .await
        .map_err(|_| RelayError::Closed)?;

    let upstream_request = state.upstream.request(parts, outbound)?;
    let timeout = Duration::from_secs(state.config.timeouts.request_secs);
    match tokio::time::timeout(timeout, state.client.request(upstream_request)).await {
        Ok(result) => Ok((permit, result?.map(Body::new))),
        Err(_) => Err(RelayError::Timeout(timeout)),
    }
}

fn is_event_stream(headers: &axum::http::HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim_start().starts_with("text/event-stream"))
}
