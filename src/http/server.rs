//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the proxy handler and the admin API
//! - Wire up middleware (request ID, tracing, request timeout)
//! - Own the health check manager lifecycle around serving
//! - Hand every inbound request to the failover orchestrator

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin;
use crate::config::ProxyConfig;
use crate::health::{HealthError, HealthProbe, HealthcheckManager, JsonRpcProbe};
use crate::http::body::{capture, ReplayBody};
use crate::http::context::{attempt_from_response, client_ip};
use crate::http::forwarder::{Forwarder, HyperForwarder};
use crate::http::request::{InboundRequest, UuidRequestId};
use crate::observability::metrics;
use crate::resilience::{FailoverOrchestrator, FailoverPolicy};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<FailoverOrchestrator>,
    pub manager: Arc<HealthcheckManager>,
    pub config: Arc<ProxyConfig>,
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("health check manager: {0}")]
    Health(#[from] HealthError),
}

/// HTTP server for the failover proxy.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a server with the JSON-RPC probe and the hyper forwarder.
    pub fn new(config: ProxyConfig) -> Result<Self, HealthError> {
        let probe = Arc::new(JsonRpcProbe::new(config.health_check.probe_method.clone()));
        let forwarder = Arc::new(HyperForwarder::new(config.failover.upstream_timeout()));
        Self::with_components(config, probe, forwarder)
    }

    /// Create a server with caller-supplied probe and forwarder.
    pub fn with_components(
        config: ProxyConfig,
        probe: Arc<dyn HealthProbe>,
        forwarder: Arc<dyn Forwarder>,
    ) -> Result<Self, HealthError> {
        let manager = Arc::new(HealthcheckManager::new(
            config.targets.clone(),
            config.health_check.clone(),
            probe,
        )?);
        let orchestrator = Arc::new(FailoverOrchestrator::new(
            manager.clone(),
            forwarder,
            FailoverPolicy::from(&config.failover),
        ));

        let state = AppState {
            orchestrator,
            manager,
            config: Arc::new(config),
        };
        let router = Self::build_router(state.clone());
        Ok(Self { router, state })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState) -> Router {
        let request_timeout = Duration::from_secs(state.config.failover.request_timeout_secs);

        let mut router = Router::new()
            .route("/", any(proxy_handler))
            .route("/{*path}", any(proxy_handler));
        if state.config.admin.enabled {
            router = router.merge(admin::router(state.clone()));
        }

        router.with_state(state).layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TimeoutLayer::new(request_timeout)),
        )
    }

    /// Run the server until `shutdown` fires.
    ///
    /// The health scheduler runs for exactly as long as the server does.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        self.state.manager.start()?;

        tracing::info!(
            address = %addr,
            targets = self.state.manager.targets().len(),
            "HTTP server starting"
        );

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await;

        let stopped = self.state.manager.stop().await;
        served?;
        stopped?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// The fully layered router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn manager(&self) -> Arc<HealthcheckManager> {
        self.state.manager.clone()
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.state.config
    }
}

/// Main proxy handler.
/// Captures the body, then lets the orchestrator pick targets and forward.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let (parts, body) = request.into_parts();
    let inbound = InboundRequest::from_parts(&parts);
    let request_id = inbound.request_id().unwrap_or("unknown").to_string();
    let client = client_ip(&parts.headers, remote);

    tracing::debug!(
        request_id = %request_id,
        client_ip = %client,
        method = %parts.method,
        path = %parts.uri.path(),
        "Proxying request"
    );

    let bytes = match capture(body, state.config.failover.max_body_size).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(request_id = %request_id, client_ip = %client, error = %e, "Rejected request body");
            metrics::record_request(e.status().as_u16(), "none", start);
            return e.into_response();
        }
    };
    let body = ReplayBody::new(bytes, &parts.headers);

    match state.orchestrator.execute(inbound, body).await {
        Ok(response) => {
            let target = attempt_from_response(&response)
                .map(|a| a.target_name.as_str())
                .unwrap_or("none");
            metrics::record_request(response.status().as_u16(), target, start);
            response
        }
        Err(e) => {
            tracing::warn!(
                request_id = %request_id,
                client_ip = %client,
                code = e.code(),
                target_name = e.target().unwrap_or("none"),
                error = %e,
                "Request failed"
            );
            metrics::record_request(e.status().as_u16(), e.target().unwrap_or("none"), start);
            e.into_response()
        }
    }
}
