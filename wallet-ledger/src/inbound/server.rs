//! HTTP Server configuration and startup.

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use wallet_types::{LedgerRepository, PspGateway};

use super::auth::{hash_api_key, psp_auth_middleware};
use super::handlers::{self, AppState};
use crate::LedgerService;

/// HTTP Server for the wallet API.
pub struct HttpServer<R: LedgerRepository, P: PspGateway> {
    state: Arc<AppState<R, P>>,
}

impl<R: LedgerRepository, P: PspGateway> HttpServer<R, P> {
    /// Creates a new HTTP server. `psp_api_key` is the secret PSP callbacks
    /// must present; only its digest is kept.
    pub fn new(service: LedgerService<R, P>, psp_api_key: &str) -> Self {
        Self {
            state: Arc::new(AppState {
                service,
                psp_key_hash: hash_api_key(psp_api_key),
            }),
        }
    }

    /// Builds the Axum router with all routes.
    pub fn router(&self) -> Router {
        // Build HTTP metrics layer (uses globally set MeterProvider)
        let metrics = axum_otel_metrics::HttpMetricsLayerBuilder::new().build();

        let callbacks = Router::new()
            .route("/confirm", post(handlers::confirm::<R, P>))
            .route("/cancel", post(handlers::cancel::<R, P>))
            .route_layer(middleware::from_fn_with_state(
                self.state.clone(),
                psp_auth_middleware::<R, P>,
            ));

        let payments = Router::new()
            .route("/deposit", post(handlers::deposit::<R, P>))
            .route("/withdraw", post(handlers::withdraw::<R, P>))
            .route("/transfer", post(handlers::transfer::<R, P>))
            .merge(callbacks);

        let api = Router::new()
            .route("/wallets", post(handlers::open_wallet::<R, P>))
            .route("/wallet", get(handlers::get_wallet::<R, P>))
            .nest("/payments", payments)
            .route(
                "/transactions/{id}",
                get(handlers::get_transaction::<R, P>),
            )
            .route(
                "/transactions/user/{user_id}",
                get(handlers::list_user_transactions::<R, P>),
            );

        Router::new()
            .route("/health", get(handlers::health))
            .nest("/api/v1", api)
            .layer(metrics)
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Runs the server on the given address with graceful shutdown.
    pub async fn run(self, addr: &str) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Server listening on {}", listener.local_addr()?);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown...");
}
