// Prometheus metrics registry and exposition endpoint

use crate::Result;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use prometheus::{GaugeVec, IntCounterVec, Opts, Registry};
use std::net::SocketAddr;
use std::sync::Arc;

/// All application-level Prometheus metrics.
///
/// Constructed once at startup, wrapped in `Arc`, and shared between the
/// workers (which record probe outcomes) and the exposition endpoint.
pub struct AppMetrics {
    /// Number of successful probe invocations, per probe type and target
    pub probe_success_total: IntCounterVec,
    /// Number of failed probe invocations, per probe type and target
    pub probe_failures_total: IntCounterVec,
    /// Duration in seconds of the last completed probe invocation
    pub probe_duration: GaugeVec,
    /// The registry that owns all of the above metrics
    pub registry: Registry,
}

impl AppMetrics {
    /// Create and register all metrics
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let probe_success_total = IntCounterVec::new(
            Opts::new("probe_success_total", "Number of successful probes"),
            &["probe", "target"],
        )?;

        let probe_failures_total = IntCounterVec::new(
            Opts::new("probe_failures_total", "Number of failed probes"),
            &["probe", "target"],
        )?;

        let probe_duration = GaugeVec::new(
            Opts::new("probe_duration", "Duration of the probe"),
            &["probe", "target"],
        )?;

        registry.register(Box::new(probe_success_total.clone()))?;
        registry.register(Box::new(probe_failures_total.clone()))?;
        registry.register(Box::new(probe_duration.clone()))?;

        Ok(Self {
            probe_success_total,
            probe_failures_total,
            probe_duration,
            registry,
        })
    }

    /// Render all metrics in Prometheus text exposition format
    pub fn render(&self) -> Result<String> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buf = Vec::new();
        encoder.encode(&metric_families, &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}

async fn metrics_handler(State(metrics): State<Arc<AppMetrics>>) -> impl IntoResponse {
    match metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// Serve `GET /metrics` on the given port until the process exits
pub async fn serve(metrics: Arc<AppMetrics>, port: u16) -> Result<()> {
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Metrics exposed on http://{}/metrics", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_metrics_register_without_error() {
        let metrics = AppMetrics::new();
        assert!(metrics.is_ok());
    }

    #[test]
    fn test_counters_and_gauge_record() {
        let metrics = AppMetrics::new().unwrap();

        metrics
            .probe_success_total
            .with_label_values(&["ping", "example.com"])
            .inc();
        metrics
            .probe_failures_total
            .with_label_values(&["ping", "example.com"])
            .inc();
        metrics
            .probe_duration
            .with_label_values(&["ping", "example.com"])
            .set(0.25);

        let rendered = metrics.render().unwrap();
        assert!(rendered.contains("probe_success_total"));
        assert!(rendered.contains("probe_failures_total"));
        assert!(rendered.contains("probe_duration"));
        assert!(rendered.contains("example.com"));
    }
}
