use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{ServiceError, ServiceResult};

/// Join row placing one exercise at a position inside one workout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutExercise {
    pub id: i64,
    pub workout_id: i64,
    pub exercise_id: i64,
    pub order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkoutExercise {
    pub fn new(workout_id: i64, exercise_id: i64, order: i32) -> Self {
        Self {
            id: 0,
            workout_id,
            exercise_id,
            order,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    pub fn validate(&self) -> ServiceResult<()> {
        if self.workout_id <= 0 {
            return Err(ServiceError::invalid("WorkoutID is required."));
        }
        if self.exercise_id <= 0 {
            return Err(ServiceError::invalid("ExerciseID is required."));
        }
        if self.order <= 0 {
            return Err(ServiceError::invalid("Order is required."));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkoutExerciseFilter {
    pub id: Option<i64>,
    pub workout_id: Option<i64>,
    pub exercise_id: Option<i64>,
    pub order: Option<i32>,

    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub limit: i64,
}

impl WorkoutExerciseFilter {
    pub fn by_id(id: i64) -> Self {
        Self { id: Some(id), ..Default::default() }
    }

    pub fn by_workout_id(workout_id: i64) -> Self {
        Self { workout_id: Some(workout_id), ..Default::default() }
    }

    pub fn matches(&self, we: &WorkoutExercise) -> bool {
        self.id.map_or(true, |v| we.id == v)
            && self.workout_id.map_or(true, |v| we.workout_id == v)
            && self.exercise_id.map_or(true, |v| we.exercise_id == v)
            && self.order.map_or(true, |v| we.order == v)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkoutExerciseUpdate {
    pub order: Option<i32>,
}

impl WorkoutExerciseUpdate {
    pub fn apply(&self, we: &mut WorkoutExercise) {
        if let Some(v) = self.order {
            we.order = v;
        }
    }
}
