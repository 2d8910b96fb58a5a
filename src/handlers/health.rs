// handlers/health.rs - liveness and readiness

use axum::{extract::State, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::error::ApiResult;
use crate::server::AppState;

/// GET /api/v1/healthchecker - process is up
pub async fn healthchecker() -> Json<Value> {
    Json(json!({ "status": "available" }))
}

/// GET /health - process is up and the store answers
pub async fn health(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let store = match &state.db {
        Some(db) => {
            db.health_check().await?;
            "postgres"
        }
        None => "memory",
    };
    Ok(Json(json!({ "status": "available", "store": store })))
}
