//! Prometheus metrics for the sync pipeline.
//!
//! Statics are created lazily; the server registers them into its own
//! registry with [`register`].

use once_cell::sync::Lazy;
use prometheus::{
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};

// =============================================================================
// Cycle Metrics
// =============================================================================

/// Update cycles by outcome.
pub static CYCLES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("mediathek_cycles_total", "Total update cycles"),
        &["outcome"], // "updated", "not_modified", "validation_failed", "error"
    )
    .unwrap()
});

/// Cycle duration in seconds.
pub static CYCLE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("mediathek_cycle_duration_seconds", "Duration of update cycles")
            .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0]),
        &["outcome"],
    )
    .unwrap()
});

/// Unix time of the last successful cycle.
pub static LAST_SUCCESS_TIMESTAMP: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "mediathek_last_success_timestamp_seconds",
        "Unix time of the last successful update cycle",
    )
    .unwrap()
});

/// Compressed snapshot bytes downloaded.
pub static SNAPSHOT_BYTES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "mediathek_snapshot_bytes_total",
        "Total snapshot bytes downloaded",
    )
    .unwrap()
});

// =============================================================================
// Import Metrics
// =============================================================================

/// Snapshot rows by import result.
pub static ROWS_PROCESSED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("mediathek_rows_processed_total", "Snapshot rows processed"),
        &["result"], // "imported", "rejected", "failed"
    )
    .unwrap()
});

/// Items removed by retention pruning.
pub static ITEMS_PRUNED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("mediathek_items_pruned_total", "Total catalog items pruned").unwrap()
});

/// Catalog size after the last import.
pub static CATALOG_ITEMS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("mediathek_catalog_items", "Items in the catalog").unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(CYCLES_TOTAL.clone()),
        Box::new(CYCLE_DURATION.clone()),
        Box::new(LAST_SUCCESS_TIMESTAMP.clone()),
        Box::new(SNAPSHOT_BYTES.clone()),
        Box::new(ROWS_PROCESSED.clone()),
        Box::new(ITEMS_PRUNED.clone()),
        Box::new(CATALOG_ITEMS.clone()),
    ]
}

/// Register every core metric into `registry`.
pub fn register(registry: &Registry) -> Result<(), prometheus::Error> {
    for metric in all_metrics() {
        registry.register(metric)?;
    }
    Ok(())
}
