// handlers/users.rs - /users/* handlers (register, login, logout, me, update, delete)

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header::SET_COOKIE, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::middleware::{expired_cookie, session_cookie};
use crate::models::{Principal, User, UserUpdate};
use crate::server::AppState;

const MIN_USERNAME_LEN: usize = 3;
const MIN_PASSWORD_LEN: usize = 8;
// bcrypt ignores everything past 72 bytes
const MAX_PASSWORD_LEN: usize = 72;

#[derive(Debug, Deserialize)]
pub struct NewUser {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl NewUser {
    fn validate(&self) -> ApiResult<()> {
        if self.username.chars().count() < MIN_USERNAME_LEN {
            return Err(ApiError::bad_request("Username must be at least 3 characters."));
        }
        if !self.email.contains('@') {
            return Err(ApiError::bad_request("Email must be a valid email address."));
        }
        let len = self.password.len();
        if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
            return Err(ApiError::bad_request("Password must be between 8 and 72 characters."));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub user: NewUser,
}

#[derive(Debug, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub user: Credentials,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub user: UserUpdate,
}

/// POST /users/register - create an account
///
/// Expected Input:
/// ```json
/// { "user": { "username": "jane", "email": "jane@email.com", "password": "secret123" } }
/// ```
///
/// Expected Output: `201 {"user": {...}}`
pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(RegisterRequest { user: req }) = body?;
    req.validate()?;

    let hashed = state.hasher.hash(&req.password).await?;
    let mut user = User::new(req.username, req.email, hashed);
    state.users.create_user(&mut user).await?;

    info!(user_id = user.id, "registered user");
    Ok((StatusCode::CREATED, Json(json!({ "user": user }))))
}

/// POST /users/login - exchange credentials for a session token
///
/// The token is returned in the body and also set as the `access_token`
/// cookie, whose max-age is the token's remaining lifetime.
///
/// Expected Input: `{"user": {"username": "jane", "password": "secret123"}}`
///
/// Expected Output:
/// ```json
/// { "access_token": "eyJhbGciOiJIUzI1NiI...", "user": {...} }
/// ```
pub async fn login(State(state): State<AppState>, body: Result<Json<LoginRequest>, JsonRejection>) -> ApiResult<Response> {
    let Json(LoginRequest { user: req }) = body?;
    if req.username.is_empty() || req.password.is_empty() {
        return Err(ApiError::bad_request("Username and password are required."));
    }

    let user = state.users.authenticate(&req.username, &req.password).await?;
    let (token, payload) = state.tokens.create_token(user.id, &user.username, state.session.token_duration)?;
    let cookie = session_cookie(&token, payload.remaining(), &state.session)?;

    info!(user_id = user.id, "user logged in");
    Ok(([(SET_COOKIE, cookie)], Json(json!({ "access_token": token, "user": user }))).into_response())
}

/// POST /users/logout - clear the session cookie
pub async fn logout(State(state): State<AppState>) -> ApiResult<Response> {
    let cookie = expired_cookie(&state.session)?;
    Ok(([(SET_COOKIE, cookie)], Json(json!({ "message": "Logged out successfully." }))).into_response())
}

/// GET /users/me
pub async fn me(Extension(principal): Extension<Principal>) -> Json<serde_json::Value> {
    Json(json!({ "user": principal.user() }))
}

/// PATCH /users/update - change username and/or email
///
/// Expected Input:
/// ```json
/// { "user": { "username": "jane2", "email": "jane2@email.com" } }
/// ```
pub async fn update(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    body: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = body?;
    let user = state.users.update_user(Some(&principal), principal.id(), req.user).await?;
    Ok(Json(json!({ "message": "User updated successfully.", "user": user })))
}

/// DELETE /users/delete - remove the account and everything it owns
pub async fn delete(State(state): State<AppState>, Extension(principal): Extension<Principal>) -> ApiResult<Response> {
    state.users.delete_user(Some(&principal), principal.id()).await?;
    let cookie = expired_cookie(&state.session)?;

    info!(user_id = principal.id(), "deleted user");
    Ok(([(SET_COOKIE, cookie)], Json(json!({ "message": "User deleted successfully." }))).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(username: &str, email: &str, password: &str) -> NewUser {
        NewUser { username: username.into(), email: email.into(), password: password.into() }
    }

    #[test]
    fn register_validation() {
        assert!(request("jane", "jane@email.com", "secret123").validate().is_ok());
        assert!(request("jo", "jane@email.com", "secret123").validate().is_err());
        assert!(request("jane", "jane.email.com", "secret123").validate().is_err());
        assert!(request("jane", "jane@email.com", "short").validate().is_err());
        assert!(request("jane", "jane@email.com", &"x".repeat(73)).validate().is_err());
        assert!(request("jane", "jane@email.com", &"x".repeat(72)).validate().is_ok());
    }

    #[test]
    fn bodies_are_wrapped_in_user() {
        let req: RegisterRequest = serde_json::from_value(json!({
            "user": { "username": "jane", "email": "jane@email.com", "password": "secret123" }
        }))
        .unwrap();
        assert_eq!(req.user.username, "jane");
        assert!(req.user.validate().is_ok());

        let flat = json!({ "username": "jane", "email": "jane@email.com", "password": "secret123" });
        assert!(serde_json::from_value::<RegisterRequest>(flat).is_err());

        let login: LoginRequest =
            serde_json::from_value(json!({ "user": { "username": "jane", "password": "secret123" } })).unwrap();
        assert_eq!(login.user.password, "secret123");
    }
}
