//! API endpoints.

mod committees;
mod votes;

use axum::{Json, Router};
use serde_json::{Value, json};

use crate::middleware::AppState;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/votes", votes::router())
        .nest("/committees", committees::router())
}

/// Liveness probe.
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
