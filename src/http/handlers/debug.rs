use axum::{extract::State, Json};

use crate::http::server::AppState;
use crate::observability::MetricsSnapshot;

/// Internal counters.
pub async fn vars(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}
