// handlers/exercises.rs - /exercises catalog handlers

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiResult;
use crate::models::{Exercise, ExerciseFilter, ExerciseUpdate};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct NewExercise {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateExerciseRequest {
    pub exercise: NewExercise,
}

#[derive(Debug, Deserialize)]
pub struct UpdateExerciseRequest {
    #[serde(default)]
    pub exercise: ExerciseUpdate,
}

/// GET /exercises?name=&offset=&limit=
///
/// Expected Output: `{"count": 2, "exercises": [...]}` where `count` is the
/// total number of matches regardless of the page.
pub async fn list(
    State(state): State<AppState>,
    query: Result<Query<ExerciseFilter>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(filter) = query?;
    let (exercises, count) = state.exercises.find_exercises(filter).await?;
    Ok(Json(json!({ "count": count, "exercises": exercises })))
}

/// POST /exercises
///
/// Expected Input:
/// ```json
/// { "exercise": { "name": "Squat", "description": "Barbell back squat" } }
/// ```
pub async fn create(
    State(state): State<AppState>,
    body: Result<Json<CreateExerciseRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(CreateExerciseRequest { exercise: e }) = body?;
    let mut exercise = Exercise::new(e.name, e.description);
    state.exercises.create_exercise(&mut exercise).await?;
    Ok((StatusCode::CREATED, Json(json!({ "exercise": exercise }))))
}

/// GET /exercises/:id
pub async fn show(State(state): State<AppState>, path: Result<Path<i64>, PathRejection>) -> ApiResult<impl IntoResponse> {
    let Path(id) = path?;
    let exercise = state.exercises.find_exercise_by_id(id).await?;
    Ok(Json(json!({ "exercise": exercise })))
}

/// PATCH /exercises/:id
pub async fn update(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<UpdateExerciseRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(id) = path?;
    let Json(req) = body?;
    let exercise = state.exercises.update_exercise(id, req.exercise).await?;
    Ok(Json(json!({ "message": "Exercise updated successfully.", "exercise": exercise })))
}

/// DELETE /exercises/:id - refused while any workout still uses the exercise
pub async fn delete(State(state): State<AppState>, path: Result<Path<i64>, PathRejection>) -> ApiResult<impl IntoResponse> {
    let Path(id) = path?;
    state.exercises.delete_exercise(id).await?;
    Ok(Json(json!({ "message": "Exercise deleted successfully." })))
}
