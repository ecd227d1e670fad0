//! Liveness endpoints.

use axum::Json;
use serde_json::{Value, json};

/// `GET /`
pub async fn root() -> Json<Value> {
    Json(json!({ "success": true, "message": "Server is running" }))
}

/// `GET /ping`
pub async fn ping() -> Json<Value> {
    Json(json!({ "pong": true }))
}
