// handlers/statuses.rs - /workout-exercises/:id/status handlers

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiResult;
use crate::models::{Principal, WEStatus, WEStatusUpdate};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    #[serde(default)]
    pub status: WEStatusUpdate,
}

/// Status of a workout exercise the principal owns through its workout.
async fn owned_status(state: &AppState, principal: &Principal, workout_exercise_id: i64) -> ApiResult<WEStatus> {
    let we = state.workout_exercises.find_workout_exercise_by_id(workout_exercise_id).await?;
    state.workouts.find_workout_by_id_user_id(we.workout_id, principal.id()).await?;
    Ok(state.statuses.find_status_by_workout_exercise_id(we.id).await?)
}

/// GET /workout-exercises/:id/status
pub async fn show(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(id) = path?;
    let status = owned_status(&state, &principal, id).await?;
    Ok(Json(json!({ "status": status })))
}

/// PATCH /workout-exercises/:id/status
///
/// Expected Input:
/// ```json
/// { "status": { "status": "completed", "comments": "felt strong" } }
/// ```
///
/// Completing without `completed_at` stamps the server time; setting the
/// status back to `pending` clears it.
pub async fn update(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(id) = path?;
    let Json(req) = body?;
    let current = owned_status(&state, &principal, id).await?;
    let status = state.statuses.update_status(Some(&principal), current.id, req.status).await?;
    Ok(Json(json!({ "message": "Status updated successfully.", "status": status })))
}
