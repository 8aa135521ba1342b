//! # Wallet Application
//!
//! Binary that wires together all the components:
//! - Load configuration from environment
//! - Initialize the repository adapter
//! - Register the payment providers
//! - Create the ledger service
//! - Start the HTTP server, then close the store on shutdown

mod config;

use opentelemetry::global;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    metrics::{SdkMeterProvider, exporter::PushMetricExporter},
    propagation::TraceContextPropagator,
    trace as sdktrace,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wallet_ledger::{CallbackUrls, LedgerService, inbound::HttpServer, outbound::ProviderRegistry};
use wallet_repo::build_repo;

/// Providers that must be flushed before exit.
struct Telemetry {
    tracer_provider: sdktrace::SdkTracerProvider,
    meter_provider: SdkMeterProvider,
}

impl Telemetry {
    fn shutdown(self) {
        if let Err(e) = self.tracer_provider.shutdown() {
            eprintln!("failed to flush traces: {e}");
        }
        if let Err(e) = self.meter_provider.shutdown() {
            eprintln!("failed to flush metrics: {e}");
        }
    }
}

/// Sets the global MeterProvider. The HTTP metrics layer reads it when the
/// router is built, so this must run before `HttpServer::router`.
fn install_meter_provider<E: PushMetricExporter>(exporter: E) -> SdkMeterProvider {
    let provider = SdkMeterProvider::builder()
        .with_periodic_exporter(exporter)
        .build();
    global::set_meter_provider(provider.clone());
    provider
}

fn init_telemetry(endpoint: &str) -> anyhow::Result<(sdktrace::Tracer, Telemetry)> {
    global::set_text_map_propagator(TraceContextPropagator::new());

    // gRPC exporters with batch processing (non-blocking)
    let span_exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    let tracer_provider = sdktrace::SdkTracerProvider::builder()
        .with_batch_exporter(span_exporter)
        .build();
    global::set_tracer_provider(tracer_provider.clone());

    let metric_exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;
    let meter_provider = install_meter_provider(metric_exporter);

    use opentelemetry::trace::TracerProvider as _;
    let tracer = tracer_provider.tracer("wallet-service");

    Ok((
        tracer,
        Telemetry {
            tracer_provider,
            meter_provider,
        },
    ))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = config::Config::from_env()?;

    let (otel_layer, telemetry) = match config.otel_endpoint.as_deref() {
        Some(endpoint) => {
            let (tracer, telemetry) = init_telemetry(endpoint)?;
            (
                Some(tracing_opentelemetry::layer().with_tracer(tracer)),
                Some(telemetry),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,wallet_app=debug,wallet_ledger=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(otel_layer)
        .init();

    tracing::info!("Starting wallet server on port {}", config.port);
    if telemetry.is_none() {
        tracing::info!("OTEL_EXPORTER_OTLP_ENDPOINT not set; telemetry export disabled");
    }

    // Build repository (handles connection and migration)
    let repo = build_repo(&config.database_url).await?;

    let psp = ProviderRegistry::with_defaults(config.fake_payment_provider_url.as_str());
    let callbacks = CallbackUrls::from_base(&config.callback_base_url);
    tracing::info!(confirm = %callbacks.confirm, cancel = %callbacks.cancel, "PSP callbacks");

    let service = LedgerService::new(repo.clone(), psp, callbacks);

    let server = HttpServer::new(service, &config.psp_api_key);
    let addr = format!("0.0.0.0:{}", config.port);

    let result = server.run(&addr).await;

    repo.close().await;
    tracing::info!("Store closed");

    // Ensure traces and metrics are flushed before exit
    if let Some(telemetry) = telemetry {
        telemetry.shutdown();
    }

    result
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use http_body_util::BodyExt;
    use opentelemetry_sdk::metrics::InMemoryMetricExporter;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_http_metrics_reach_installed_provider() {
        let exporter = InMemoryMetricExporter::default();
        let provider = install_meter_provider(exporter.clone());

        let repo = build_repo("sqlite::memory:").await.unwrap();
        let service = LedgerService::new(
            repo,
            ProviderRegistry::with_defaults("http://localhost:4000"),
            CallbackUrls::from_base("http://localhost:3000"),
        );
        let app = HttpServer::new(service, "psp_secret").router();

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        response.into_body().collect().await.unwrap();

        provider.force_flush().unwrap();
        let exported = exporter.get_finished_metrics().unwrap();
        let names: Vec<String> = exported
            .iter()
            .flat_map(|rm| rm.scope_metrics())
            .flat_map(|sm| sm.metrics())
            .map(|m| m.name().to_string())
            .collect();

        assert!(
            names.iter().any(|n| n.starts_with("http.server")),
            "no HTTP server metrics exported: {names:?}"
        );
        provider.shutdown().unwrap();
    }
}
