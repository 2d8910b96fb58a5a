// handlers/profiles.rs - /profiles handlers

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiResult;
use crate::models::{Principal, Profile, ProfileUpdate};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct NewProfile {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub dob: NaiveDate,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub height: f64,
    #[serde(default)]
    pub weight: f64,
}

#[derive(Debug, Deserialize)]
pub struct CreateProfileRequest {
    pub profile: NewProfile,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub profile: ProfileUpdate,
}

/// POST /profiles - create the caller's profile
///
/// Expected Input:
/// ```json
/// { "profile": { "first_name": "Jane", "last_name": "Doe", "dob": "1990-04-02",
///                "gender": "female", "height": 170.0, "weight": 62.5 } }
/// ```
pub async fn create(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    body: Result<Json<CreateProfileRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(CreateProfileRequest { profile: p }) = body?;
    let mut profile = Profile::new(p.first_name, p.last_name, p.dob, p.gender, p.height, p.weight);
    state.profiles.create_profile(Some(&principal), &mut profile).await?;
    Ok((StatusCode::CREATED, Json(json!({ "profile": profile }))))
}

/// GET /profiles/me
pub async fn me(State(state): State<AppState>, Extension(principal): Extension<Principal>) -> ApiResult<impl IntoResponse> {
    let profile = state.profiles.find_profile_by_user_id(principal.id()).await?;
    Ok(Json(json!({ "profile": profile })))
}

/// PATCH /profiles/:id - partial update; absent fields are left untouched
pub async fn update(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(id) = path?;
    let Json(req) = body?;
    let profile = state.profiles.update_profile(Some(&principal), id, req.profile).await?;
    Ok(Json(json!({ "message": "Profile updated successfully.", "profile": profile })))
}

/// DELETE /profiles/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(id) = path?;
    state.profiles.delete_profile(Some(&principal), id).await?;
    Ok(Json(json!({ "message": "Profile deleted successfully." })))
}
