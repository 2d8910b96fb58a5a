// handlers/workouts.rs - /workouts handlers
//
// Listing and lookup are always scoped to the principal; writes pass the
// principal down so the service enforces ownership.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiResult;
use crate::models::{Principal, Workout, WorkoutExerciseFilter, WorkoutFilter, WorkoutUpdate};
use crate::server::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListWorkoutsQuery {
    pub name: Option<String>,
    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub limit: i64,
}

#[derive(Debug, Deserialize)]
pub struct NewWorkout {
    #[serde(default)]
    pub name: String,
    pub scheduled_date: DateTime<Utc>,
    #[serde(default)]
    pub exercises: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateWorkoutRequest {
    pub workout: NewWorkout,
}

#[derive(Debug, Deserialize)]
pub struct UpdateWorkoutRequest {
    #[serde(default)]
    pub workout: WorkoutUpdate,
}

/// Body of the add/remove exercise endpoints.
#[derive(Debug, Deserialize)]
pub struct ExerciseNamesRequest {
    #[serde(default)]
    pub exercises: Vec<String>,
}

/// GET /workouts?name=&offset=&limit= - the caller's workouts only
pub async fn list(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    query: Result<Query<ListWorkoutsQuery>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(q) = query?;
    let filter = WorkoutFilter {
        user_id: Some(principal.id()),
        name: q.name,
        offset: q.offset,
        limit: q.limit,
        ..Default::default()
    };
    let (workouts, count) = state.workouts.find_workouts(filter).await?;
    Ok(Json(json!({ "count": count, "workouts": workouts })))
}

/// POST /workouts - create a workout from exercise names
///
/// Expected Input:
/// ```json
/// { "workout": { "name": "Leg Day", "scheduled_date": "2030-01-16T09:00:00Z",
///                "exercises": ["Squat", "Lunge"] } }
/// ```
///
/// Expected Output: `201 {"workout": {..., "exercises": [...]}}`
pub async fn create(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    body: Result<Json<CreateWorkoutRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(CreateWorkoutRequest { workout: w }) = body?;
    let mut workout = Workout::new(w.name, w.scheduled_date);
    state.workouts.create_workout(Some(&principal), &mut workout, &w.exercises).await?;
    Ok((StatusCode::CREATED, Json(json!({ "workout": workout }))))
}

/// GET /workouts/:id
pub async fn show(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(id) = path?;
    let workout = state.workouts.find_workout_by_id_user_id(id, principal.id()).await?;
    Ok(Json(json!({ "workout": workout })))
}

/// PATCH /workouts/:id - rename and/or reschedule
pub async fn update(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<UpdateWorkoutRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(id) = path?;
    let Json(req) = body?;
    let workout = state.workouts.update_workout(Some(&principal), id, req.workout).await?;
    Ok(Json(json!({ "message": "Workout updated successfully.", "workout": workout })))
}

/// DELETE /workouts/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(id) = path?;
    state.workouts.delete_workout(Some(&principal), id).await?;
    Ok(Json(json!({ "message": "Workout deleted successfully." })))
}

/// POST /workouts/:id/exercises
///
/// Expected Input: `{"exercises": ["Deadlift"]}`
pub async fn add_exercises(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<ExerciseNamesRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(id) = path?;
    let Json(req) = body?;
    let workout = state.workouts.add_exercises_to_workout(Some(&principal), id, &req.exercises).await?;
    Ok(Json(json!({ "workout": workout })))
}

/// DELETE /workouts/:id/exercises - a workout keeps at least one exercise
pub async fn remove_exercises(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<ExerciseNamesRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(id) = path?;
    let Json(req) = body?;
    let workout = state.workouts.remove_exercises_from_workout(Some(&principal), id, &req.exercises).await?;
    Ok(Json(json!({ "workout": workout })))
}

/// GET /workouts/:id/workout-exercises - join rows, so clients can address
/// the per-exercise status endpoints
pub async fn workout_exercises(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(id) = path?;
    let workout = state.workouts.find_workout_by_id_user_id(id, principal.id()).await?;

    let (mut rows, count) = state
        .workout_exercises
        .find_workout_exercises(WorkoutExerciseFilter::by_workout_id(workout.id))
        .await?;
    rows.sort_by_key(|we| (we.order, we.id));

    Ok(Json(json!({ "count": count, "workout_exercises": rows })))
}
