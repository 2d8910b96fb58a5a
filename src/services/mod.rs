//! Entity service interfaces.
//!
//! Each entity gets one capability trait. `database` provides the Postgres
//! implementations; [`memory::MemoryStore`] implements every trait in process
//! with the same invariants. The HTTP layer only sees `Arc<dyn ...Service>`.

use async_trait::async_trait;

use crate::models::{
    Exercise, ExerciseFilter, ExerciseUpdate, Principal, Profile, ProfileFilter, ProfileUpdate, ServiceResult, User,
    UserFilter, UserUpdate, WEStatus, WEStatusFilter, WEStatusUpdate, Workout, WorkoutExercise, WorkoutExerciseFilter,
    WorkoutExerciseUpdate, WorkoutFilter, WorkoutUpdate,
};

pub mod memory;
pub mod messages;

pub use memory::MemoryStore;

#[async_trait]
pub trait UserService: Send + Sync {
    async fn find_user_by_id(&self, id: i64) -> ServiceResult<User>;

    /// Resolve a user by username and check the password against the stored hash.
    async fn authenticate(&self, username: &str, password: &str) -> ServiceResult<User>;

    async fn find_users(&self, filter: UserFilter) -> ServiceResult<(Vec<User>, i64)>;

    /// Persist `user`, filling in its generated id and timestamps.
    async fn create_user(&self, user: &mut User) -> ServiceResult<()>;

    async fn update_user(&self, principal: Option<&Principal>, id: i64, upd: UserUpdate) -> ServiceResult<User>;

    async fn delete_user(&self, principal: Option<&Principal>, id: i64) -> ServiceResult<()>;
}

#[async_trait]
pub trait ProfileService: Send + Sync {
    async fn find_profile_by_id(&self, id: i64) -> ServiceResult<Profile>;

    async fn find_profile_by_user_id(&self, user_id: i64) -> ServiceResult<Profile>;

    async fn find_profiles(&self, filter: ProfileFilter) -> ServiceResult<(Vec<Profile>, i64)>;

    /// Owner comes from `principal`; at most one profile per user.
    async fn create_profile(&self, principal: Option<&Principal>, profile: &mut Profile) -> ServiceResult<()>;

    async fn update_profile(&self, principal: Option<&Principal>, id: i64, upd: ProfileUpdate) -> ServiceResult<Profile>;

    async fn delete_profile(&self, principal: Option<&Principal>, id: i64) -> ServiceResult<()>;
}

#[async_trait]
pub trait ExerciseService: Send + Sync {
    async fn find_exercise_by_id(&self, id: i64) -> ServiceResult<Exercise>;

    async fn find_exercise_by_name(&self, name: &str) -> ServiceResult<Exercise>;

    async fn find_exercises(&self, filter: ExerciseFilter) -> ServiceResult<(Vec<Exercise>, i64)>;

    async fn create_exercise(&self, exercise: &mut Exercise) -> ServiceResult<()>;

    async fn update_exercise(&self, id: i64, upd: ExerciseUpdate) -> ServiceResult<Exercise>;

    async fn delete_exercise(&self, id: i64) -> ServiceResult<()>;
}

#[async_trait]
pub trait WorkoutService: Send + Sync {
    async fn find_workout_by_id(&self, id: i64) -> ServiceResult<Workout>;

    async fn find_workout_by_id_user_id(&self, id: i64, user_id: i64) -> ServiceResult<Workout>;

    async fn find_workouts(&self, filter: WorkoutFilter) -> ServiceResult<(Vec<Workout>, i64)>;

    /// Creates the workout and one join row per named exercise, atomically.
    async fn create_workout(
        &self,
        principal: Option<&Principal>,
        workout: &mut Workout,
        exercise_names: &[String],
    ) -> ServiceResult<()>;

    async fn update_workout(&self, principal: Option<&Principal>, id: i64, upd: WorkoutUpdate) -> ServiceResult<Workout>;

    async fn add_exercises_to_workout(
        &self,
        principal: Option<&Principal>,
        id: i64,
        exercise_names: &[String],
    ) -> ServiceResult<Workout>;

    async fn remove_exercises_from_workout(
        &self,
        principal: Option<&Principal>,
        id: i64,
        exercise_names: &[String],
    ) -> ServiceResult<Workout>;

    async fn delete_workout(&self, principal: Option<&Principal>, id: i64) -> ServiceResult<()>;
}

#[async_trait]
pub trait WorkoutExerciseService: Send + Sync {
    async fn find_workout_exercise_by_id(&self, id: i64) -> ServiceResult<WorkoutExercise>;

    async fn find_workout_exercises(&self, filter: WorkoutExerciseFilter) -> ServiceResult<(Vec<WorkoutExercise>, i64)>;

    /// Also records a `pending` status for the new row.
    async fn create_workout_exercise(&self, principal: Option<&Principal>, we: &mut WorkoutExercise) -> ServiceResult<()>;

    async fn update_workout_exercise(
        &self,
        principal: Option<&Principal>,
        id: i64,
        upd: WorkoutExerciseUpdate,
    ) -> ServiceResult<WorkoutExercise>;

    async fn delete_workout_exercise(&self, principal: Option<&Principal>, id: i64) -> ServiceResult<()>;
}

#[async_trait]
pub trait WEStatusService: Send + Sync {
    async fn find_status_by_id(&self, id: i64) -> ServiceResult<WEStatus>;

    async fn find_status_by_workout_exercise_id(&self, workout_exercise_id: i64) -> ServiceResult<WEStatus>;

    async fn find_statuses(&self, filter: WEStatusFilter) -> ServiceResult<(Vec<WEStatus>, i64)>;

    async fn create_status(&self, principal: Option<&Principal>, status: &mut WEStatus) -> ServiceResult<()>;

    async fn update_status(&self, principal: Option<&Principal>, id: i64, upd: WEStatusUpdate) -> ServiceResult<WEStatus>;

    async fn delete_status(&self, principal: Option<&Principal>, id: i64) -> ServiceResult<()>;
}
