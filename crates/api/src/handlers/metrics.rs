//! The metrics endpoint.

use axum::{extract::State, Json};

use engine::metrics::MetricsSnapshot;

use super::AppState;

pub async fn get(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}
