use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{ServiceError, ServiceResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExerciseStatus {
    #[default]
    Pending,
    Completed,
}

impl ExerciseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExerciseStatus::Pending => "pending",
            ExerciseStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for ExerciseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExerciseStatus {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ExerciseStatus::Pending),
            "completed" => Ok(ExerciseStatus::Completed),
            "" => Err(ServiceError::invalid("Status is required.")),
            other => Err(ServiceError::invalid(format!("Status '{}' is invalid.", other))),
        }
    }
}

/// Completion state of one workout exercise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WEStatus {
    pub id: i64,
    pub workout_exercise_id: i64,
    pub status: ExerciseStatus,
    pub comments: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WEStatus {
    pub fn pending(workout_exercise_id: i64) -> Self {
        Self {
            id: 0,
            workout_exercise_id,
            status: ExerciseStatus::Pending,
            comments: None,
            completed_at: None,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    pub fn validate(&self) -> ServiceResult<()> {
        if self.workout_exercise_id <= 0 {
            return Err(ServiceError::invalid("WorkoutExerciseID is required."));
        }
        if self.status == ExerciseStatus::Pending && self.completed_at.is_some() {
            return Err(ServiceError::invalid("A pending exercise cannot have a completion time."));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WEStatusFilter {
    pub id: Option<i64>,
    pub workout_exercise_id: Option<i64>,
    pub status: Option<ExerciseStatus>,

    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub limit: i64,
}

impl WEStatusFilter {
    pub fn by_id(id: i64) -> Self {
        Self { id: Some(id), ..Default::default() }
    }

    pub fn by_workout_exercise_id(workout_exercise_id: i64) -> Self {
        Self { workout_exercise_id: Some(workout_exercise_id), ..Default::default() }
    }

    pub fn matches(&self, status: &WEStatus) -> bool {
        self.id.map_or(true, |v| status.id == v)
            && self.workout_exercise_id.map_or(true, |v| status.workout_exercise_id == v)
            && self.status.map_or(true, |v| status.status == v)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WEStatusUpdate {
    pub status: Option<ExerciseStatus>,
    /// `Some("")` clears the comments
    pub comments: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl WEStatusUpdate {
    /// Merge into `status`. Completing without a timestamp stamps `now`;
    /// moving back to pending clears the completion time.
    pub fn apply(&self, status: &mut WEStatus, now: DateTime<Utc>) {
        if let Some(v) = self.status {
            status.status = v;
        }
        if let Some(v) = &self.comments {
            status.comments = if v.is_empty() { None } else { Some(v.clone()) };
        }
        if let Some(v) = self.completed_at {
            status.completed_at = Some(v);
        }
        match status.status {
            ExerciseStatus::Completed if status.completed_at.is_none() => status.completed_at = Some(now),
            ExerciseStatus::Pending => status.completed_at = None,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_statuses() {
        assert_eq!("pending".parse::<ExerciseStatus>().unwrap(), ExerciseStatus::Pending);
        assert_eq!("completed".parse::<ExerciseStatus>().unwrap(), ExerciseStatus::Completed);
        assert_eq!("".parse::<ExerciseStatus>().unwrap_err().to_string(), "Status is required.");
        assert!("skipped".parse::<ExerciseStatus>().is_err());
    }

    #[test]
    fn completing_stamps_now_and_pending_clears() {
        let now = Utc::now();
        let mut s = WEStatus::pending(3);

        WEStatusUpdate { status: Some(ExerciseStatus::Completed), ..Default::default() }.apply(&mut s, now);
        assert_eq!(s.completed_at, Some(now));

        WEStatusUpdate { status: Some(ExerciseStatus::Pending), ..Default::default() }.apply(&mut s, now);
        assert_eq!(s.completed_at, None);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn empty_comment_clears() {
        let now = Utc::now();
        let mut s = WEStatus::pending(3);
        WEStatusUpdate { comments: Some("felt heavy".into()), ..Default::default() }.apply(&mut s, now);
        assert_eq!(s.comments.as_deref(), Some("felt heavy"));
        WEStatusUpdate { comments: Some(String::new()), ..Default::default() }.apply(&mut s, now);
        assert_eq!(s.comments, None);
    }

    #[test]
    fn serializes_status_lowercase() {
        let value = serde_json::to_value(WEStatus::pending(1)).unwrap();
        assert_eq!(value["status"], "pending");
    }
}
