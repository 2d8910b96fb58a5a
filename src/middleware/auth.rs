use axum::{
    extract::{Request, State},
    http::{
        header::{AUTHORIZATION, COOKIE},
        HeaderMap, HeaderValue,
    },
    middleware::Next,
    response::Response,
};
use chrono::Duration;

use crate::error::ApiError;
use crate::models::{ErrorKind, Principal};
use crate::server::{AppState, SessionSettings};

/// Cookie carrying the session token for browser clients.
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// Resolve the request's session token to a [`Principal`].
///
/// The token comes from `Authorization: Bearer <token>`, falling back to the
/// `access_token` cookie. On success the principal and the verified
/// [`Payload`](crate::auth::Payload) are inserted into the request extensions.
pub async fn authenticate(State(state): State<AppState>, mut request: Request, next: Next) -> Result<Response, ApiError> {
    let token =
        extract_token(request.headers()).ok_or_else(|| ApiError::unauthorized("Unauthorized - No access token"))?;

    let payload = state.tokens.verify_token(&token)?;

    let user = state.users.find_user_by_id(payload.id).await.map_err(|err| match err.kind() {
        ErrorKind::NotFound => ApiError::not_found(err.message()),
        _ => {
            tracing::warn!("failed to load principal {}: {}", payload.id, err);
            ApiError::unauthorized("Unauthorized - unable to load user")
        }
    })?;

    tracing::debug!(user_id = user.id, "authenticated request");
    request.extensions_mut().insert(Principal(user));
    request.extensions_mut().insert(payload);

    Ok(next.run(request).await)
}

/// Token from the bearer header, else from the session cookie.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    bearer_token(headers).or_else(|| cookie_token(headers))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

fn cookie_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name == ACCESS_TOKEN_COOKIE && !value.is_empty()).then(|| value.to_string())
        })
}

/// `Set-Cookie` value for a fresh session token.
pub fn session_cookie(token: &str, max_age: Duration, settings: &SessionSettings) -> Result<HeaderValue, ApiError> {
    build_cookie(token, max_age.num_seconds(), settings)
}

/// `Set-Cookie` value that makes the browser drop the session cookie.
pub fn expired_cookie(settings: &SessionSettings) -> Result<HeaderValue, ApiError> {
    build_cookie("", -1, settings)
}

fn build_cookie(value: &str, max_age: i64, settings: &SessionSettings) -> Result<HeaderValue, ApiError> {
    let mut cookie = format!("{}={}; Path=/; Max-Age={}; HttpOnly", ACCESS_TOKEN_COOKIE, value, max_age);
    if let Some(domain) = &settings.cookie_domain {
        cookie.push_str("; Domain=");
        cookie.push_str(domain);
    }
    if settings.cookie_secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).map_err(|e| {
        tracing::error!("invalid session cookie: {}", e);
        ApiError::internal_server_error()
    })
}
