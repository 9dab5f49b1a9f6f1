//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the pipeline handler and liveness probe
//! - Wire up middleware (tracing, timeout, request ID, concurrency bound)
//! - Bind server to listener, plain or TLS
//! - Buffer the inbound body and run the transform pipeline
//! - Forward the transformed request to the origin and relay its response
//! - Apply reloaded configuration to the runtime snapshot
//! - Observability (metrics, correlation IDs)

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, Request, StatusCode, Uri},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::{GatewayConfig, ListenerConfig};
use crate::http::request::{RequestIdExt, RequestIdLayer};
use crate::http::response::{error_response, relay_response};
use crate::observability::metrics;
use crate::pipeline::{BodyReverse, ClaimExtraction, Forwarder, Pipeline, TransformRequest};

/// Everything a request needs, swapped atomically on config reload.
pub struct RuntimeSettings {
    pub pipeline: Pipeline,
    pub forwarder: Forwarder,
    pub origin: Uri,
    pub upstream_timeout: Duration,
    pub max_body_size: usize,
}

/// Error building runtime settings from a configuration.
///
/// `validate_config` catches these before a config is accepted, so this only
/// fires for configs constructed programmatically.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("origin URL {0:?} is not a valid URI: {1}")]
    Origin(String, axum::http::uri::InvalidUri),

    #[error("identity header {0:?} is not a valid header name")]
    IdentityHeader(String),
}

impl RuntimeSettings {
    pub fn from_config(config: &GatewayConfig) -> Result<Self, SettingsError> {
        let origin: Uri = config
            .origin
            .url
            .parse()
            .map_err(|e| SettingsError::Origin(config.origin.url.clone(), e))?;

        let header = HeaderName::from_bytes(config.identity.header.as_bytes())
            .map_err(|_| SettingsError::IdentityHeader(config.identity.header.clone()))?;

        let pipeline = Pipeline::new(vec![
            Box::new(ClaimExtraction::new(config.identity.claim.clone(), header)),
            Box::new(BodyReverse),
        ]);

        Ok(Self {
            pipeline,
            forwarder: Forwarder::new(Duration::from_secs(config.timeouts.connect_secs)),
            origin,
            upstream_timeout: Duration::from_secs(config.timeouts.upstream_secs),
            max_body_size: config.security.max_body_size,
        })
    }
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<ArcSwap<RuntimeSettings>>,
}

/// HTTP server for the perimeter gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    settings: Arc<ArcSwap<RuntimeSettings>>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: GatewayConfig) -> Result<Self, SettingsError> {
        let settings = Arc::new(ArcSwap::from_pointee(RuntimeSettings::from_config(&config)?));

        let state = AppState {
            settings: settings.clone(),
        };

        let router = Self::build_router(&config, state);
        Ok(Self {
            router,
            config,
            settings,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        Router::new()
            .route("/healthz", get(healthz))
            .route("/", post(transform_handler))
            .route("/{*path}", post(transform_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.timeouts.request_secs,
            )))
            .layer(RequestIdLayer)
            .layer(TraceLayer::new_for_http())
            .layer(GlobalConcurrencyLimitLayer::new(
                config.listener.max_concurrency,
            ))
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// `config_updates` delivers reloaded configurations; `shutdown` stops
    /// the server gracefully.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            origin = %self.config.origin.url,
            "HTTP server starting"
        );

        spawn_reload_task(
            self.settings.clone(),
            self.config.listener.clone(),
            config_updates,
        );

        let tls = self.config.listener.tls.clone();
        match tls {
            Some(tls) => {
                let tls_config = crate::net::tls::load_tls_config(
                    Path::new(&tls.cert_path),
                    Path::new(&tls.key_path),
                )
                .await?;

                let handle = axum_server::Handle::new();
                let drain = handle.clone();
                let mut shutdown = shutdown;
                tokio::spawn(async move {
                    let _ = shutdown.recv().await;
                    drain.graceful_shutdown(Some(Duration::from_secs(30)));
                });

                axum_server::from_tcp_rustls(listener.into_std()?, tls_config)
                    .handle(handle)
                    .serve(self.router.into_make_service())
                    .await?;
            }
            None => {
                axum::serve(listener, self.router)
                    .with_graceful_shutdown(wait_for_shutdown(shutdown))
                    .await?;
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Apply reloaded configurations to the runtime snapshot.
fn spawn_reload_task(
    settings: Arc<ArcSwap<RuntimeSettings>>,
    startup_listener: ListenerConfig,
    mut config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
) {
    tokio::spawn(async move {
        while let Some(new_config) = config_updates.recv().await {
            if new_config.listener.bind_address != startup_listener.bind_address {
                tracing::warn!(
                    configured = %new_config.listener.bind_address,
                    active = %startup_listener.bind_address,
                    "Listener changes require a restart; keeping current listener"
                );
            }
            match RuntimeSettings::from_config(&new_config) {
                Ok(new_settings) => {
                    settings.store(Arc::new(new_settings));
                    tracing::info!(
                        origin = %new_config.origin.url,
                        "Reloaded configuration applied"
                    );
                }
                Err(e) => {
                    tracing::error!(error = %e, "Rejected reloaded configuration");
                }
            }
        }
    });
}

async fn wait_for_shutdown(mut shutdown: broadcast::Receiver<()>) {
    let _ = shutdown.recv().await;
    tracing::info!("Shutdown signal received");
}

/// Liveness probe.
async fn healthz() -> &'static str {
    "ok"
}

/// Main pipeline handler.
/// Buffers the body, runs the transform steps, forwards to the origin.
async fn transform_handler(
    State(state): State<AppState>,
    request: Request<Body>,
) -> impl IntoResponse {
    let start_time = Instant::now();
    let request_id = request
        .request_id()
        .map(|id| id.to_string())
        .unwrap_or_default();

    let settings = state.settings.load_full();

    let (parts, body) = request.into_parts();
    let method = parts.method.as_str().to_string();

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %parts.uri.path(),
        "Transforming request"
    );

    let body_bytes = match axum::body::to_bytes(body, settings.max_body_size).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Request body rejected");
            metrics::record_rejected("body_too_large");
            metrics::record_request(&method, StatusCode::PAYLOAD_TOO_LARGE.as_u16(), start_time);
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body exceeds limit").into_response();
        }
    };

    let inbound = TransformRequest {
        headers: parts.headers,
        body: body_bytes,
    };

    let transformed = match settings.pipeline.apply(inbound) {
        Ok(transformed) => transformed,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Request rejected by pipeline");
            metrics::record_rejected(e.metric_reason());
            let response = error_response(&e);
            metrics::record_request(&method, response.status().as_u16(), start_time);
            return response.into_response();
        }
    };

    match settings
        .forwarder
        .send(&settings.origin, settings.upstream_timeout, transformed)
        .await
    {
        Ok(upstream) => {
            let response = relay_response(upstream);
            tracing::debug!(
                request_id = %request_id,
                status = %response.status(),
                "Origin response relayed"
            );
            metrics::record_request(&method, response.status().as_u16(), start_time);
            response.into_response()
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Forwarding failed");
            metrics::record_rejected(e.metric_reason());
            let response = error_response(&e);
            metrics::record_request(&method, response.status().as_u16(), start_time);
            response.into_response()
        }
    }
}
