//! HTTP metrics for the health surface, plus the registry assembly that
//! pulls in the pipeline metrics from `mediathek_core::metrics`.

use std::sync::Arc;

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

use crate::state::AppState;

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "mediathek_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
        &["method", "path", "status"],
    )
    .unwrap()
});

pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("mediathek_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// 1 while an update cycle is running (collected on scrape).
pub static UPDATER_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "mediathek_updater_running",
        "Whether an update cycle is currently running",
    )
    .unwrap()
});

/// Build the registry served on `/metrics`.
pub fn build_registry() -> Result<Registry, prometheus::Error> {
    let registry = Registry::new();
    registry.register(Box::new(HTTP_REQUEST_DURATION.clone()))?;
    registry.register(Box::new(HTTP_REQUESTS_TOTAL.clone()))?;
    registry.register(Box::new(UPDATER_RUNNING.clone()))?;
    mediathek_core::metrics::register(&registry)?;
    Ok(registry)
}

/// Encode everything in `registry` as Prometheus text.
pub fn encode_metrics(registry: &Registry) -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

/// Refresh gauges that mirror live state before a scrape.
pub async fn collect_dynamic_metrics(state: &AppState) {
    UPDATER_RUNNING.set(i64::from(state.updater().is_running()));

    let catalog = Arc::clone(state.catalog());
    if let Ok(Ok(count)) = tokio::task::spawn_blocking(move || catalog.count()).await {
        mediathek_core::metrics::CATALOG_ITEMS.set(count as i64);
    }
}
