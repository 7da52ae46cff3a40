use axum::{Json, extract::State};

use crate::AppState;
use crate::models::status::ResultRecord;

/// One record per configured target, in configuration order. Per-target
/// failures are reported inside the records, so this always answers 200.
pub async fn list_deployments(State(state): State<AppState>) -> Json<Vec<ResultRecord>> {
    let records = state.aggregator.aggregate_all(&state.targets).await;
    Json(records)
}
