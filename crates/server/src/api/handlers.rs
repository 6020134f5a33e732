use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{error, warn};

use mediathek_core::{updater::UpdaterStatus, CatalogStats, CycleState};

use crate::metrics::{collect_dynamic_metrics, encode_metrics};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub updater: UpdaterStatus,
    pub state: CycleState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog: Option<CatalogStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `GET /health`. Reports 503 when the catalog cannot be read.
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let top_channels = state.config().import.top_channels;
    let catalog = Arc::clone(state.catalog());
    // SQLite reads block; keep them off the async workers.
    let stats = tokio::task::spawn_blocking(move || catalog.stats(top_channels))
        .await
        .map_err(|e| e.to_string())
        .and_then(|result| result.map_err(|e| e.to_string()));

    let mut response = HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.uptime_secs(),
        updater: state.updater().status().await,
        state: state.updater().state_store().load(),
        catalog: None,
        error: None,
    };

    match stats {
        Ok(stats) => {
            response.catalog = Some(stats);
            (StatusCode::OK, Json(response))
        }
        Err(e) => {
            warn!(error = %e, "Health check could not read the catalog");
            response.status = "unavailable";
            response.error = Some(e);
            (StatusCode::SERVICE_UNAVAILABLE, Json(response))
        }
    }
}

/// `GET /metrics` in Prometheus text format.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    collect_dynamic_metrics(&state).await;

    match encode_metrics(state.registry()) {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
