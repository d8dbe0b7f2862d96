//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with a single catch-all proxy handler
//! - Wire up middleware (tracing, request ID)
//! - Buffer request bodies and record the client address
//! - Hand WebSocket upgrades to the pass-through
//! - Apply table reloads from the watcher
//! - Drain on shutdown

use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, Request},
    response::Response,
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::{DevConfig, ReloadEvent};
use crate::http::client::UpstreamClient;
use crate::http::dispatch::{Dispatcher, GENERATED};
use crate::http::request::{propagate_request_id_layer, set_request_id_layer, RequestIdExt};
use crate::http::{response, websocket};
use crate::lifecycle::StartupError;
use crate::observability::metrics;
use crate::routing::{DecisionEngine, EngineSettings, RequestContext, TableSet, TableSources, TargetKind};
use crate::security::headers::{set_forwarded_for, strip_hop_by_hop};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub app_origin: Arc<str>,
    pub max_body_size: usize,
    pub forward_client_ip: bool,
}

/// The routing proxy.
pub struct HttpServer {
    router: Router,
    config: DevConfig,
    tables: TableSet,
}

impl HttpServer {
    /// Build the proxy. `config_path` is re-read for inline rules on reload.
    pub fn new(config: DevConfig, config_path: Option<PathBuf>) -> Result<Self, StartupError> {
        let tables = TableSet::load(TableSources::from_config(&config, config_path));
        let engine = Arc::new(DecisionEngine::new(EngineSettings::from_config(&config)));
        let client = UpstreamClient::new(&config.timeouts)?;

        let state = AppState {
            dispatcher: Arc::new(Dispatcher::new(engine, tables.clone(), client)),
            app_origin: config.upstream.app_origin().into(),
            max_body_size: config.security.max_body_size,
            forward_client_ip: config.security.forward_client_ip,
        };

        let router = Self::build_router(state);
        Ok(Self {
            router,
            config,
            tables,
        })
    }

    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(set_request_id_layer())
                    .layer(TraceLayer::new_for_http())
                    .layer(propagate_request_id_layer()),
            )
    }

    /// Serve on `listener` until `shutdown` fires, applying table reloads
    /// received on `reloads` in the meantime.
    pub async fn run(
        self,
        listener: TcpListener,
        reloads: mpsc::UnboundedReceiver<ReloadEvent>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            origin = %self.config.upstream.app_origin(),
            "HTTP server starting"
        );

        let reloader = tokio::spawn(apply_reloads(self.tables.clone(), reloads));

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Draining connections");
            })
            .await?;

        reloader.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &DevConfig {
        &self.config
    }

    pub fn tables(&self) -> &TableSet {
        &self.tables
    }
}

/// Coalesce bursts of file events into one reload per table.
async fn apply_reloads(tables: TableSet, mut reloads: mpsc::UnboundedReceiver<ReloadEvent>) {
    while let Some(event) = reloads.recv().await {
        let mut pending = BTreeSet::from([event]);
        while let Ok(event) = reloads.try_recv() {
            pending.insert(event);
        }
        for event in pending {
            tables.reload(event);
        }
    }
}

/// Main proxy handler.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(client): ConnectInfo<SocketAddr>,
    mut request: Request<Body>,
) -> Response {
    let start = Instant::now();
    let request_id = request.request_id();
    let method = request.method().clone();

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        uri = %request.uri(),
        "Routing request"
    );

    if state.forward_client_ip {
        set_forwarded_for(request.headers_mut(), client);
    }

    if websocket::is_upgrade_request(&request) {
        let response = match websocket::forward(&state.app_origin, request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(request_id = %request_id, error = %e, "Upgrade forwarding failed");
                response::upstream_error(&e)
            }
        };
        metrics::record_request(method.as_str(), response.status().as_u16(), TargetKind::Internal.as_str(), start);
        return response;
    }

    let (parts, body) = request.into_parts();

    let declared_length = parts
        .headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared_length.is_some_and(|len| len > state.max_body_size) {
        metrics::record_request(method.as_str(), 413, GENERATED, start);
        return response::payload_too_large();
    }

    let body = match axum::body::to_bytes(body, state.max_body_size).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Failed to buffer request body");
            metrics::record_request(method.as_str(), 413, GENERATED, start);
            return response::payload_too_large();
        }
    };

    let mut headers = parts.headers;
    strip_hop_by_hop(&mut headers);
    let ctx = RequestContext::new(request_id.clone(), &parts.uri, headers);

    let (response, target) = state.dispatcher.dispatch(&method, ctx, body).await;
    let status = response.status().as_u16();

    tracing::debug!(
        request_id = %request_id,
        status,
        kind = target,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Request complete"
    );
    metrics::record_request(method.as_str(), status, target, start);
    response
}
