//! HTTP server setup.
//!
//! # Responsibilities
//! - Build the Axum router for the intake API
//! - Wire up middleware (request id, tracing, timeout, body limit, auth)
//! - Serve over plain TCP or rustls, stopping on the shared shutdown signal

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::chain::registry::ChainRegistry;
use crate::config::schema::ListenerConfig;
use crate::http::auth::bearer_auth_middleware;
use crate::http::handlers;
use crate::lifecycle::Shutdown;
use crate::net::tls::load_tls_config;
use crate::payout::intake::BatchIntake;
use crate::payout::queue::JobQueue;

/// How long in-flight TLS connections get to finish after shutdown.
const TLS_DRAIN_SECS: u64 = 10;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub intake: Arc<BatchIntake>,
    pub registry: Arc<ChainRegistry>,
    pub queue: Arc<dyn JobQueue>,
    pub api_secret: Option<Arc<str>>,
}

/// Build the router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(state: AppState, listener: &ListenerConfig) -> Router {
    let api = Router::new()
        .route("/v1/payouts/batch", post(handlers::submit_batch))
        .route("/v1/chains", get(handlers::list_chains))
        .route_layer(middleware::from_fn_with_state(state.clone(), bearer_auth_middleware));

    Router::new()
        .merge(api)
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(listener.max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(listener.request_timeout_secs)))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// HTTP intake server.
pub struct HttpServer {
    router: Router,
    config: ListenerConfig,
}

impl HttpServer {
    pub fn new(state: AppState, config: ListenerConfig) -> Self {
        let router = build_router(state, &config);
        Self { router, config }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until `shutdown` fires.
    pub async fn run(self, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr: SocketAddr = self
            .config
            .bind_address
            .parse()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

        match &self.config.tls {
            Some(tls) => {
                let rustls = load_tls_config(tls).await?;
                let handle = axum_server::Handle::new();
                let stop = shutdown.wait();
                {
                    let handle = handle.clone();
                    tokio::spawn(async move {
                        stop.await;
                        handle.graceful_shutdown(Some(Duration::from_secs(TLS_DRAIN_SECS)));
                    });
                }

                tracing::info!(address = %addr, "HTTPS server starting");
                axum_server::bind_rustls(addr, rustls)
                    .handle(handle)
                    .serve(self.router.into_make_service_with_connect_info::<SocketAddr>())
                    .await?;
            }
            None => {
                let listener = TcpListener::bind(addr).await?;
                tracing::info!(address = %listener.local_addr()?, "HTTP server starting");
                axum::serve(
                    listener,
                    self.router.into_make_service_with_connect_info::<SocketAddr>(),
                )
                .with_graceful_shutdown(shutdown.wait())
                .await?;
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
