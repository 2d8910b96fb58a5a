use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::error::{ServiceError, ServiceResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: i64,
    pub user_id: i64,
    pub first_name: String,
    pub last_name: String,
    #[serde(rename = "dob")]
    pub date_of_birth: NaiveDate,
    pub gender: String,
    pub height: f64,
    pub weight: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Unsaved profile; the owner is set from the principal on create.
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        date_of_birth: NaiveDate,
        gender: impl Into<String>,
        height: f64,
        weight: f64,
    ) -> Self {
        Self {
            id: 0,
            user_id: 0,
            first_name: first_name.into(),
            last_name: last_name.into(),
            date_of_birth,
            gender: gender.into(),
            height,
            weight,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    pub fn validate(&self) -> ServiceResult<()> {
        if self.user_id <= 0 {
            return Err(ServiceError::invalid("UserID is required."));
        }
        if self.first_name.is_empty() {
            return Err(ServiceError::invalid("First name is required."));
        }
        if self.last_name.is_empty() {
            return Err(ServiceError::invalid("Last name is required."));
        }
        if self.gender.is_empty() {
            return Err(ServiceError::invalid("Gender is required."));
        }
        if !(self.height > 0.0) {
            return Err(ServiceError::invalid("Height must be greater than zero."));
        }
        if !(self.weight > 0.0) {
            return Err(ServiceError::invalid("Weight must be greater than zero."));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileFilter {
    pub id: Option<i64>,
    pub user_id: Option<i64>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(rename = "dob")]
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub height: Option<f64>,
    pub weight: Option<f64>,

    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub limit: i64,
}

impl ProfileFilter {
    pub fn by_id(id: i64) -> Self {
        Self { id: Some(id), ..Default::default() }
    }

    pub fn by_user_id(user_id: i64) -> Self {
        Self { user_id: Some(user_id), ..Default::default() }
    }

    pub fn matches(&self, profile: &Profile) -> bool {
        self.id.map_or(true, |v| profile.id == v)
            && self.user_id.map_or(true, |v| profile.user_id == v)
            && self.first_name.as_ref().map_or(true, |v| &profile.first_name == v)
            && self.last_name.as_ref().map_or(true, |v| &profile.last_name == v)
            && self.date_of_birth.map_or(true, |v| profile.date_of_birth == v)
            && self.gender.as_ref().map_or(true, |v| &profile.gender == v)
            && self.height.map_or(true, |v| profile.height == v)
            && self.weight.map_or(true, |v| profile.weight == v)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(rename = "dob")]
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub height: Option<f64>,
    pub weight: Option<f64>,
}

impl ProfileUpdate {
    pub fn apply(&self, profile: &mut Profile) {
        if let Some(v) = &self.first_name {
            profile.first_name = v.clone();
        }
        if let Some(v) = &self.last_name {
            profile.last_name = v.clone();
        }
        if let Some(v) = self.date_of_birth {
            profile.date_of_birth = v;
        }
        if let Some(v) = &self.gender {
            profile.gender = v.clone();
        }
        if let Some(v) = self.height {
            profile.height = v;
        }
        if let Some(v) = self.weight {
            profile.weight = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> Profile {
        let mut p = Profile::new("Jane", "Doe", NaiveDate::from_ymd_opt(1990, 4, 2).unwrap(), "Female", 167.3, 55.4);
        p.user_id = 1;
        p
    }

    #[test]
    fn validate_requires_owner_and_names() {
        let mut p = profile();
        p.user_id = 0;
        assert_eq!(p.validate().unwrap_err().to_string(), "UserID is required.");

        let mut p = profile();
        p.first_name.clear();
        assert_eq!(p.validate().unwrap_err().to_string(), "First name is required.");

        let mut p = profile();
        p.weight = 0.0;
        assert_eq!(p.validate().unwrap_err().to_string(), "Weight must be greater than zero.");

        assert!(profile().validate().is_ok());
    }

    #[test]
    fn update_applies_only_set_fields() {
        let mut p = profile();
        ProfileUpdate { height: Some(170.0), ..Default::default() }.apply(&mut p);
        assert_eq!(p.height, 170.0);
        assert_eq!(p.first_name, "Jane");
    }

    #[test]
    fn dob_uses_short_wire_name() {
        let value = serde_json::to_value(profile()).unwrap();
        assert_eq!(value["dob"], "1990-04-02");
    }
}
