use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{ServiceError, ServiceResult};

/// Catalog entry. Exercises are shared by all users and looked up by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Exercise {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            description: description.into(),
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    pub fn validate(&self) -> ServiceResult<()> {
        if self.name.is_empty() {
            return Err(ServiceError::invalid("Name is required."));
        }
        if self.description.is_empty() {
            return Err(ServiceError::invalid("Description is required."));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExerciseFilter {
    pub id: Option<i64>,
    pub name: Option<String>,

    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub limit: i64,
}

impl ExerciseFilter {
    pub fn by_id(id: i64) -> Self {
        Self { id: Some(id), ..Default::default() }
    }

    pub fn by_name(name: impl Into<String>) -> Self {
        Self { name: Some(name.into()), ..Default::default() }
    }

    pub fn matches(&self, exercise: &Exercise) -> bool {
        self.id.map_or(true, |v| exercise.id == v) && self.name.as_ref().map_or(true, |v| &exercise.name == v)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExerciseUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl ExerciseUpdate {
    pub fn apply(&self, exercise: &mut Exercise) {
        if let Some(v) = &self.name {
            exercise.name = v.clone();
        }
        if let Some(v) = &self.description {
            exercise.description = v.clone();
        }
    }
}
