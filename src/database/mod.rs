pub mod exercise;
pub mod manager;
pub mod profile;
pub mod query_builder;
pub mod user;
pub mod workout;
pub mod workout_exercise;
pub mod workout_exercise_status;

pub use manager::{system_clock, Clock, DatabaseError, DatabaseManager, Tx};
pub use query_builder::{FilterQuery, PageQuery};

use crate::auth::PasswordHasher;

/// Postgres implementation of every entity service.
///
/// Each call runs in its own transaction. Reads drop theirs, which rolls
/// back; writes commit only after every statement succeeded.
#[derive(Clone)]
pub struct PgStore {
    db: DatabaseManager,
    hasher: PasswordHasher,
}

impl PgStore {
    pub fn new(db: DatabaseManager, hasher: PasswordHasher) -> Self {
        Self { db, hasher }
    }

    pub fn db(&self) -> &DatabaseManager {
        &self.db
    }
}

/// Name of the unique constraint a failed write tripped, if any.
pub(crate) fn unique_violation(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => db.constraint().map(str::to_string),
        _ => None,
    }
}

pub(crate) fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}
