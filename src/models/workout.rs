use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{ServiceError, ServiceResult};
use super::exercise::Exercise;
use crate::services::messages;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workout {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub scheduled_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Attached exercises in workout order
    #[serde(default)]
    pub exercises: Vec<Exercise>,
}

impl Workout {
    pub fn new(name: impl Into<String>, scheduled_date: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            user_id: 0,
            name: name.into(),
            scheduled_date,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
            exercises: Vec::new(),
        }
    }

    /// Structural checks that hold for every persisted workout.
    pub fn validate(&self) -> ServiceResult<()> {
        if self.user_id <= 0 {
            return Err(ServiceError::invalid("UserID is required."));
        }
        if self.name.is_empty() {
            return Err(ServiceError::invalid("Name is required."));
        }
        if self.scheduled_date == DateTime::<Utc>::UNIX_EPOCH {
            return Err(ServiceError::invalid("Scheduled Date is required."));
        }
        if self.exercises.is_empty() {
            return Err(ServiceError::invalid(messages::WORKOUT_NO_EXERCISES));
        }
        Ok(())
    }

    /// The schedule must lie strictly after `now` whenever it is set.
    pub fn validate_schedule(&self, now: DateTime<Utc>) -> ServiceResult<()> {
        if self.scheduled_date <= now {
            return Err(ServiceError::invalid("Scheduled Date is invalid."));
        }
        Ok(())
    }

    pub fn has_exercise(&self, exercise_id: i64) -> bool {
        self.exercises.iter().any(|e| e.id == exercise_id)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkoutFilter {
    pub id: Option<i64>,
    pub user_id: Option<i64>,
    pub name: Option<String>,
    pub scheduled_date: Option<DateTime<Utc>>,

    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub limit: i64,
}

impl WorkoutFilter {
    pub fn by_id(id: i64) -> Self {
        Self { id: Some(id), ..Default::default() }
    }

    pub fn by_user_id(user_id: i64) -> Self {
        Self { user_id: Some(user_id), ..Default::default() }
    }

    pub fn matches(&self, workout: &Workout) -> bool {
        self.id.map_or(true, |v| workout.id == v)
            && self.user_id.map_or(true, |v| workout.user_id == v)
            && self.name.as_ref().map_or(true, |v| &workout.name == v)
            && self.scheduled_date.map_or(true, |v| workout.scheduled_date == v)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkoutUpdate {
    pub name: Option<String>,
    pub scheduled_date: Option<DateTime<Utc>>,
}

impl WorkoutUpdate {
    pub fn apply(&self, workout: &mut Workout) {
        if let Some(v) = &self.name {
            workout.name = v.clone();
        }
        if let Some(v) = self.scheduled_date {
            workout.scheduled_date = v;
        }
    }
}

/// Exercise names requested for a workout, in order, without repeats.
pub fn dedup_names(names: &[String]) -> Vec<String> {
    let mut seen = Vec::with_capacity(names.len());
    for name in names {
        if !seen.contains(name) {
            seen.push(name.clone());
        }
    }
    seen
}
