use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{ServiceError, ServiceResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip)]
    pub hashed_password: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// New, unsaved user. The store assigns `id` and the timestamps on create.
    pub fn new(username: impl Into<String>, email: impl Into<String>, hashed_password: impl Into<String>) -> Self {
        Self {
            id: 0,
            username: username.into(),
            email: email.into(),
            hashed_password: hashed_password.into(),
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    pub fn validate(&self) -> ServiceResult<()> {
        if self.username.is_empty() {
            return Err(ServiceError::invalid("Username is required."));
        }
        if self.email.is_empty() {
            return Err(ServiceError::invalid("Email is required."));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserFilter {
    pub id: Option<i64>,
    pub username: Option<String>,
    pub email: Option<String>,

    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub limit: i64,
}

impl UserFilter {
    pub fn by_id(id: i64) -> Self {
        Self { id: Some(id), ..Default::default() }
    }

    pub fn by_username(username: impl Into<String>) -> Self {
        Self { username: Some(username.into()), ..Default::default() }
    }

    pub fn matches(&self, user: &User) -> bool {
        self.id.map_or(true, |v| user.id == v)
            && self.username.as_ref().map_or(true, |v| &user.username == v)
            && self.email.as_ref().map_or(true, |v| &user.email == v)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
}

impl UserUpdate {
    pub fn apply(&self, user: &mut User) {
        if let Some(v) = &self.username {
            user.username = v.clone();
        }
        if let Some(v) = &self.email {
            user.email = v.clone();
        }
    }
}

/// The authenticated user attached to a request.
///
/// Services that need an owner take `Option<&Principal>` explicitly instead of
/// reading it from request-scoped state.
#[derive(Debug, Clone, PartialEq)]
pub struct Principal(pub User);

impl Principal {
    pub fn id(&self) -> i64 {
        self.0.id
    }

    pub fn user(&self) -> &User {
        &self.0
    }
}

impl From<User> for Principal {
    fn from(user: User) -> Self {
        Principal(user)
    }
}

/// Resolve the principal or fail with the given message.
pub fn require_principal<'a>(principal: Option<&'a Principal>, message: &str) -> ServiceResult<&'a Principal> {
    principal.ok_or_else(|| ServiceError::unauthenticated(message))
}
