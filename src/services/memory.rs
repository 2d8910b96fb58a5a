//! In-process implementation of every entity service.
//!
//! All tables live behind one mutex. A write clones the tables, works on the
//! copy with a frozen `now`, and swaps the copy back only when the whole
//! operation succeeded, so a failed call leaves no partial state behind.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};

use super::messages as msg;
use super::{ExerciseService, ProfileService, UserService, WEStatusService, WorkoutExerciseService, WorkoutService};
use crate::auth::PasswordHasher;
use crate::database::{system_clock, Clock};
use crate::models::{
    dedup_names, require_principal, Exercise, ExerciseFilter, ExerciseStatus, ExerciseUpdate, Principal, Profile,
    ProfileFilter, ProfileUpdate, ServiceError, ServiceResult, User, UserFilter, UserUpdate, WEStatus, WEStatusFilter,
    WEStatusUpdate, Workout, WorkoutExercise, WorkoutExerciseFilter, WorkoutExerciseUpdate, WorkoutFilter,
    WorkoutUpdate,
};

#[derive(Debug, Clone, Default)]
struct Sequences {
    user: i64,
    profile: i64,
    exercise: i64,
    workout: i64,
    workout_exercise: i64,
    status: i64,
}

fn next(seq: &mut i64) -> i64 {
    *seq += 1;
    *seq
}

#[derive(Debug, Clone, Default)]
struct Tables {
    seq: Sequences,
    users: BTreeMap<i64, User>,
    profiles: BTreeMap<i64, Profile>,
    exercises: BTreeMap<i64, Exercise>,
    // stored without `exercises`; those are rebuilt from the join rows
    workouts: BTreeMap<i64, Workout>,
    workout_exercises: BTreeMap<i64, WorkoutExercise>,
    statuses: BTreeMap<i64, WEStatus>,
}

/// Apply offset/limit to an id-ordered row set, returning the page and the set size.
fn paginate<T>(rows: impl Iterator<Item = T>, offset: i64, limit: i64) -> (Vec<T>, i64) {
    let rows: Vec<T> = rows.collect();
    let total = rows.len() as i64;
    let rest = rows.into_iter().skip(offset.max(0) as usize);
    let page = if limit > 0 { rest.take(limit as usize).collect() } else { rest.collect() };
    (page, total)
}

impl Tables {
    fn find_users(&self, filter: &UserFilter) -> (Vec<User>, i64) {
        paginate(self.users.values().filter(|u| filter.matches(u)).cloned(), filter.offset, filter.limit)
    }

    fn find_user_by_id(&self, id: i64) -> ServiceResult<User> {
        self.users.get(&id).cloned().ok_or_else(|| ServiceError::not_found(msg::USER_NOT_FOUND))
    }

    fn find_profiles(&self, filter: &ProfileFilter) -> (Vec<Profile>, i64) {
        paginate(self.profiles.values().filter(|p| filter.matches(p)).cloned(), filter.offset, filter.limit)
    }

    fn find_profile_by_id(&self, id: i64) -> ServiceResult<Profile> {
        self.profiles.get(&id).cloned().ok_or_else(|| ServiceError::not_found(msg::PROFILE_NOT_FOUND))
    }

    fn find_exercises(&self, filter: &ExerciseFilter) -> (Vec<Exercise>, i64) {
        paginate(self.exercises.values().filter(|e| filter.matches(e)).cloned(), filter.offset, filter.limit)
    }

    fn find_exercise_by_id(&self, id: i64) -> ServiceResult<Exercise> {
        self.exercises.get(&id).cloned().ok_or_else(|| ServiceError::not_found(msg::EXERCISE_NOT_FOUND))
    }

    fn find_exercise_by_name(&self, name: &str) -> ServiceResult<Exercise> {
        self.exercises
            .values()
            .find(|e| e.name == name)
            .cloned()
            .ok_or_else(|| ServiceError::not_found(msg::EXERCISE_NOT_FOUND))
    }

    /// Join rows of a workout in workout order.
    fn rows_of(&self, workout_id: i64) -> Vec<&WorkoutExercise> {
        let mut rows: Vec<_> = self.workout_exercises.values().filter(|we| we.workout_id == workout_id).collect();
        rows.sort_by_key(|we| (we.order, we.id));
        rows
    }

    fn with_exercises(&self, mut workout: Workout) -> Workout {
        workout.exercises = self
            .rows_of(workout.id)
            .into_iter()
            .filter_map(|we| self.exercises.get(&we.exercise_id).cloned())
            .collect();
        workout
    }

    fn find_workouts(&self, filter: &WorkoutFilter) -> (Vec<Workout>, i64) {
        let (page, total) =
            paginate(self.workouts.values().filter(|w| filter.matches(w)).cloned(), filter.offset, filter.limit);
        (page.into_iter().map(|w| self.with_exercises(w)).collect(), total)
    }

    fn find_workout_by_id(&self, id: i64) -> ServiceResult<Workout> {
        self.workouts
            .get(&id)
            .cloned()
            .map(|w| self.with_exercises(w))
            .ok_or_else(|| ServiceError::not_found(msg::WORKOUT_NOT_FOUND))
    }

    /// Load a workout and check the principal owns it.
    fn owned_workout(&self, principal: &Principal, id: i64, forbidden: &str) -> ServiceResult<Workout> {
        let workout = self.find_workout_by_id(id)?;
        if workout.user_id != principal.id() {
            return Err(ServiceError::unauthorized(forbidden));
        }
        Ok(workout)
    }

    fn find_workout_exercises(&self, filter: &WorkoutExerciseFilter) -> (Vec<WorkoutExercise>, i64) {
        paginate(self.workout_exercises.values().filter(|we| filter.matches(we)).cloned(), filter.offset, filter.limit)
    }

    fn find_workout_exercise_by_id(&self, id: i64) -> ServiceResult<WorkoutExercise> {
        self.workout_exercises
            .get(&id)
            .cloned()
            .ok_or_else(|| ServiceError::not_found(msg::WORKOUT_EXERCISE_NOT_FOUND))
    }

    fn owned_workout_exercise(&self, principal: &Principal, id: i64) -> ServiceResult<WorkoutExercise> {
        let we = self.find_workout_exercise_by_id(id)?;
        self.owned_workout(principal, we.workout_id, msg::WORKOUT_FORBIDDEN_MODIFY)?;
        Ok(we)
    }

    fn find_statuses(&self, filter: &WEStatusFilter) -> (Vec<WEStatus>, i64) {
        paginate(self.statuses.values().filter(|s| filter.matches(s)).cloned(), filter.offset, filter.limit)
    }

    fn find_status_by_id(&self, id: i64) -> ServiceResult<WEStatus> {
        self.statuses.get(&id).cloned().ok_or_else(|| ServiceError::not_found(msg::STATUS_NOT_FOUND))
    }

    fn find_status_by_workout_exercise_id(&self, workout_exercise_id: i64) -> ServiceResult<WEStatus> {
        self.statuses
            .values()
            .find(|s| s.workout_exercise_id == workout_exercise_id)
            .cloned()
            .ok_or_else(|| ServiceError::not_found(msg::STATUS_NOT_FOUND))
    }

    fn owned_status(&self, principal: &Principal, id: i64) -> ServiceResult<WEStatus> {
        let status = self.find_status_by_id(id)?;
        self.owned_workout_exercise(principal, status.workout_exercise_id)?;
        Ok(status)
    }
}

/// Working copy of the tables for one operation.
struct MemoryTx {
    t: Tables,
    now: DateTime<Utc>,
}

impl MemoryTx {
    fn check_user_unique(&self, user: &User) -> ServiceResult<()> {
        for other in self.t.users.values().filter(|u| u.id != user.id) {
            if other.username == user.username {
                return Err(ServiceError::conflict(msg::USERNAME_TAKEN));
            }
            if other.email == user.email {
                return Err(ServiceError::conflict(msg::EMAIL_TAKEN));
            }
        }
        Ok(())
    }

    fn create_user(&mut self, user: &mut User) -> ServiceResult<()> {
        user.created_at = self.now;
        user.updated_at = self.now;
        user.validate()?;
        self.check_user_unique(user)?;

        user.id = next(&mut self.t.seq.user);
        self.t.users.insert(user.id, user.clone());
        Ok(())
    }

    fn update_user(&mut self, principal: Option<&Principal>, id: i64, upd: UserUpdate) -> ServiceResult<User> {
        let principal = require_principal(principal, msg::LOGIN_REQUIRED)?;
        let mut user = self.t.find_user_by_id(id)?;
        if user.id != principal.id() {
            return Err(ServiceError::unauthorized(msg::USER_FORBIDDEN));
        }

        upd.apply(&mut user);
        user.updated_at = self.now;
        user.validate()?;
        self.check_user_unique(&user)?;

        self.t.users.insert(user.id, user.clone());
        Ok(user)
    }

    fn delete_user(&mut self, principal: Option<&Principal>, id: i64) -> ServiceResult<()> {
        let principal = require_principal(principal, msg::LOGIN_REQUIRED)?;
        let user = self.t.find_user_by_id(id)?;
        if user.id != principal.id() {
            return Err(ServiceError::unauthorized(msg::USER_FORBIDDEN));
        }

        self.t.profiles.retain(|_, p| p.user_id != user.id);
        let workout_ids: Vec<i64> = self.t.workouts.values().filter(|w| w.user_id == user.id).map(|w| w.id).collect();
        for workout_id in workout_ids {
            self.remove_workout(workout_id);
        }
        self.t.users.remove(&user.id);
        Ok(())
    }

    fn create_profile(&mut self, principal: Option<&Principal>, profile: &mut Profile) -> ServiceResult<()> {
        let principal = require_principal(principal, msg::PROFILE_LOGIN_REQUIRED)?;
        profile.user_id = principal.id();
        profile.created_at = self.now;
        profile.updated_at = self.now;
        profile.validate()?;

        if self.t.profiles.values().any(|p| p.user_id == profile.user_id) {
            return Err(ServiceError::conflict(msg::PROFILE_EXISTS));
        }

        profile.id = next(&mut self.t.seq.profile);
        self.t.profiles.insert(profile.id, profile.clone());
        Ok(())
    }

    fn owned_profile(&self, principal: Option<&Principal>, id: i64) -> ServiceResult<Profile> {
        let principal = require_principal(principal, msg::LOGIN_REQUIRED)?;
        let profile = self.t.find_profile_by_id(id)?;
        if profile.user_id != principal.id() {
            return Err(ServiceError::unauthorized(msg::PROFILE_FORBIDDEN));
        }
        Ok(profile)
    }

    fn update_profile(&mut self, principal: Option<&Principal>, id: i64, upd: ProfileUpdate) -> ServiceResult<Profile> {
        let mut profile = self.owned_profile(principal, id)?;
        upd.apply(&mut profile);
        profile.updated_at = self.now;
        profile.validate()?;

        self.t.profiles.insert(profile.id, profile.clone());
        Ok(profile)
    }

    fn delete_profile(&mut self, principal: Option<&Principal>, id: i64) -> ServiceResult<()> {
        let profile = self.owned_profile(principal, id)?;
        self.t.profiles.remove(&profile.id);
        Ok(())
    }

    fn check_exercise_unique(&self, exercise: &Exercise) -> ServiceResult<()> {
        if self.t.exercises.values().any(|e| e.id != exercise.id && e.name == exercise.name) {
            return Err(ServiceError::conflict(msg::EXERCISE_EXISTS));
        }
        Ok(())
    }

    fn create_exercise(&mut self, exercise: &mut Exercise) -> ServiceResult<()> {
        exercise.created_at = self.now;
        exercise.updated_at = self.now;
        exercise.validate()?;
        self.check_exercise_unique(exercise)?;

        exercise.id = next(&mut self.t.seq.exercise);
        self.t.exercises.insert(exercise.id, exercise.clone());
        Ok(())
    }

    fn update_exercise(&mut self, id: i64, upd: ExerciseUpdate) -> ServiceResult<Exercise> {
        let mut exercise = self.t.find_exercise_by_id(id)?;
        upd.apply(&mut exercise);
        exercise.updated_at = self.now;
        exercise.validate()?;
        self.check_exercise_unique(&exercise)?;

        self.t.exercises.insert(exercise.id, exercise.clone());
        Ok(exercise)
    }

    fn delete_exercise(&mut self, id: i64) -> ServiceResult<()> {
        let exercise = self.t.find_exercise_by_id(id)?;
        if self.t.workout_exercises.values().any(|we| we.exercise_id == exercise.id) {
            return Err(ServiceError::conflict(msg::EXERCISE_IN_USE));
        }
        self.t.exercises.remove(&exercise.id);
        Ok(())
    }

    fn resolve_exercises(&self, names: &[String]) -> ServiceResult<Vec<Exercise>> {
        dedup_names(names).iter().map(|name| self.t.find_exercise_by_name(name)).collect()
    }

    /// Insert a join row and its pending status.
    fn attach(&mut self, we: &mut WorkoutExercise) {
        we.created_at = self.now;
        we.updated_at = self.now;
        we.id = next(&mut self.t.seq.workout_exercise);
        self.t.workout_exercises.insert(we.id, we.clone());

        let mut status = WEStatus::pending(we.id);
        status.created_at = self.now;
        status.updated_at = self.now;
        status.id = next(&mut self.t.seq.status);
        self.t.statuses.insert(status.id, status);
    }

    fn detach(&mut self, we_id: i64) {
        self.t.statuses.retain(|_, s| s.workout_exercise_id != we_id);
        self.t.workout_exercises.remove(&we_id);
    }

    fn remove_workout(&mut self, workout_id: i64) {
        let rows: Vec<i64> = self.t.rows_of(workout_id).iter().map(|we| we.id).collect();
        for we_id in rows {
            self.detach(we_id);
        }
        self.t.workouts.remove(&workout_id);
    }

    /// Store the workout row and bump its `updated_at`.
    fn save_workout(&mut self, workout: &mut Workout) {
        workout.updated_at = self.now;
        let mut row = workout.clone();
        row.exercises.clear();
        self.t.workouts.insert(row.id, row);
    }

    fn create_workout(
        &mut self,
        principal: Option<&Principal>,
        workout: &mut Workout,
        names: &[String],
    ) -> ServiceResult<()> {
        let principal = require_principal(principal, msg::WORKOUT_LOGIN_REQUIRED)?;
        workout.user_id = principal.id();
        workout.created_at = self.now;
        workout.updated_at = self.now;
        workout.exercises = self.resolve_exercises(names)?;
        workout.validate()?;
        workout.validate_schedule(self.now)?;

        workout.id = next(&mut self.t.seq.workout);
        self.save_workout(workout);
        for (i, exercise) in workout.exercises.iter().enumerate() {
            let mut we = WorkoutExercise::new(workout.id, exercise.id, i as i32 + 1);
            self.attach(&mut we);
        }
        Ok(())
    }

    fn update_workout(&mut self, principal: Option<&Principal>, id: i64, upd: WorkoutUpdate) -> ServiceResult<Workout> {
        let principal = require_principal(principal, msg::LOGIN_REQUIRED)?;
        let mut workout = self.t.owned_workout(principal, id, msg::WORKOUT_FORBIDDEN_UPDATE)?;

        upd.apply(&mut workout);
        workout.validate()?;
        if upd.scheduled_date.is_some() {
            workout.validate_schedule(self.now)?;
        }

        self.save_workout(&mut workout);
        Ok(workout)
    }

    fn add_exercises(&mut self, principal: Option<&Principal>, id: i64, names: &[String]) -> ServiceResult<Workout> {
        let principal = require_principal(principal, msg::LOGIN_REQUIRED)?;
        let mut workout = self.t.owned_workout(principal, id, msg::WORKOUT_FORBIDDEN_MODIFY)?;
        let exercises = self.resolve_exercises(names)?;
        if exercises.is_empty() {
            return Err(ServiceError::invalid(msg::WORKOUT_NO_EXERCISES));
        }

        let mut order = self.t.rows_of(workout.id).iter().map(|we| we.order).max().unwrap_or(0);
        for exercise in exercises.into_iter().filter(|e| !workout.has_exercise(e.id)) {
            order += 1;
            let mut we = WorkoutExercise::new(workout.id, exercise.id, order);
            self.attach(&mut we);
        }

        self.save_workout(&mut workout);
        Ok(self.t.with_exercises(workout))
    }

    fn remove_exercises(&mut self, principal: Option<&Principal>, id: i64, names: &[String]) -> ServiceResult<Workout> {
        let principal = require_principal(principal, msg::LOGIN_REQUIRED)?;
        let mut workout = self.t.owned_workout(principal, id, msg::WORKOUT_FORBIDDEN_MODIFY)?;
        let exercises = self.resolve_exercises(names)?;
        if exercises.is_empty() {
            return Err(ServiceError::invalid(msg::WORKOUT_NO_EXERCISES));
        }

        let rows: Vec<(i64, i64)> = self.t.rows_of(workout.id).iter().map(|we| (we.id, we.exercise_id)).collect();
        let doomed: Vec<i64> = rows
            .iter()
            .filter(|(_, exercise_id)| exercises.iter().any(|e| e.id == *exercise_id))
            .map(|(we_id, _)| *we_id)
            .collect();
        if doomed.len() == rows.len() {
            return Err(ServiceError::invalid(msg::WORKOUT_LAST_EXERCISE));
        }

        for we_id in doomed {
            self.detach(we_id);
        }
        self.save_workout(&mut workout);
        Ok(self.t.with_exercises(workout))
    }

    fn delete_workout(&mut self, principal: Option<&Principal>, id: i64) -> ServiceResult<()> {
        let principal = require_principal(principal, msg::LOGIN_REQUIRED)?;
        let workout = self.t.owned_workout(principal, id, msg::WORKOUT_FORBIDDEN_DELETE)?;
        self.remove_workout(workout.id);
        Ok(())
    }

    fn create_workout_exercise(&mut self, principal: Option<&Principal>, we: &mut WorkoutExercise) -> ServiceResult<()> {
        let principal = require_principal(principal, msg::LOGIN_REQUIRED)?;
        we.validate()?;
        self.t.owned_workout(principal, we.workout_id, msg::WORKOUT_FORBIDDEN_MODIFY)?;
        self.t.find_exercise_by_id(we.exercise_id)?;

        if self
            .t
            .workout_exercises
            .values()
            .any(|other| other.workout_id == we.workout_id && other.exercise_id == we.exercise_id)
        {
            return Err(ServiceError::conflict(msg::WORKOUT_EXERCISE_EXISTS));
        }

        self.attach(we);
        Ok(())
    }

    fn update_workout_exercise(
        &mut self,
        principal: Option<&Principal>,
        id: i64,
        upd: WorkoutExerciseUpdate,
    ) -> ServiceResult<WorkoutExercise> {
        let principal = require_principal(principal, msg::LOGIN_REQUIRED)?;
        let mut we = self.t.owned_workout_exercise(principal, id)?;

        upd.apply(&mut we);
        we.updated_at = self.now;
        we.validate()?;

        self.t.workout_exercises.insert(we.id, we.clone());
        Ok(we)
    }

    fn delete_workout_exercise(&mut self, principal: Option<&Principal>, id: i64) -> ServiceResult<()> {
        let principal = require_principal(principal, msg::LOGIN_REQUIRED)?;
        let we = self.t.owned_workout_exercise(principal, id)?;
        if self.t.rows_of(we.workout_id).len() <= 1 {
            return Err(ServiceError::invalid(msg::WORKOUT_LAST_EXERCISE));
        }
        self.detach(we.id);
        Ok(())
    }

    fn create_status(&mut self, principal: Option<&Principal>, status: &mut WEStatus) -> ServiceResult<()> {
        let principal = require_principal(principal, msg::LOGIN_REQUIRED)?;
        status.validate()?;
        self.t.owned_workout_exercise(principal, status.workout_exercise_id)?;

        if self.t.statuses.values().any(|s| s.workout_exercise_id == status.workout_exercise_id) {
            return Err(ServiceError::conflict(msg::STATUS_EXISTS));
        }
        if status.status == ExerciseStatus::Completed && status.completed_at.is_none() {
            status.completed_at = Some(self.now);
        }
        status.created_at = self.now;
        status.updated_at = self.now;

        status.id = next(&mut self.t.seq.status);
        self.t.statuses.insert(status.id, status.clone());
        Ok(())
    }

    fn update_status(&mut self, principal: Option<&Principal>, id: i64, upd: WEStatusUpdate) -> ServiceResult<WEStatus> {
        let principal = require_principal(principal, msg::LOGIN_REQUIRED)?;
        let mut status = self.t.owned_status(principal, id)?;

        upd.apply(&mut status, self.now);
        status.updated_at = self.now;
        status.validate()?;

        self.t.statuses.insert(status.id, status.clone());
        Ok(status)
    }

    fn delete_status(&mut self, principal: Option<&Principal>, id: i64) -> ServiceResult<()> {
        let principal = require_principal(principal, msg::LOGIN_REQUIRED)?;
        let status = self.t.owned_status(principal, id)?;
        self.t.statuses.remove(&status.id);
        Ok(())
    }
}

/// In-memory store implementing every service trait.
#[derive(Clone)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    clock: Clock,
    hasher: PasswordHasher,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Arc::new(Mutex::new(Tables::default())),
            clock: system_clock(),
            hasher: PasswordHasher::default(),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_hasher(mut self, hasher: PasswordHasher) -> Self {
        self.hasher = hasher;
        self
    }

    fn lock(&self) -> ServiceResult<MutexGuard<'_, Tables>> {
        self.tables.lock().map_err(|_| {
            tracing::error!("memory store lock poisoned");
            ServiceError::internal("memory store lock poisoned")
        })
    }

    fn read<T>(&self, op: impl FnOnce(&Tables) -> T) -> ServiceResult<T> {
        let tables = self.lock()?;
        Ok(op(&tables))
    }

    /// Run `op` against a copy of the tables and publish it only on success.
    fn write<T>(&self, op: impl FnOnce(&mut MemoryTx) -> ServiceResult<T>) -> ServiceResult<T> {
        let mut tables = self.lock()?;
        let mut tx = MemoryTx {
            t: tables.clone(),
            now: (self.clock)().trunc_subsecs(0),
        };
        let out = op(&mut tx)?;
        *tables = tx.t;
        Ok(out)
    }
}

#[async_trait]
impl UserService for MemoryStore {
    async fn find_user_by_id(&self, id: i64) -> ServiceResult<User> {
        self.read(|t| t.find_user_by_id(id))?
    }

    async fn authenticate(&self, username: &str, password: &str) -> ServiceResult<User> {
        let user = self.read(|t| t.find_users(&UserFilter::by_username(username)).0.into_iter().next())?;
        let user = user.ok_or_else(|| ServiceError::unauthenticated(msg::INVALID_CREDENTIALS))?;
        if !self.hasher.verify(password, &user.hashed_password).await? {
            return Err(ServiceError::unauthenticated(msg::INVALID_CREDENTIALS));
        }
        Ok(user)
    }

    async fn find_users(&self, filter: UserFilter) -> ServiceResult<(Vec<User>, i64)> {
        self.read(|t| t.find_users(&filter))
    }

    async fn create_user(&self, user: &mut User) -> ServiceResult<()> {
        self.write(|tx| tx.create_user(user))
    }

    async fn update_user(&self, principal: Option<&Principal>, id: i64, upd: UserUpdate) -> ServiceResult<User> {
        self.write(|tx| tx.update_user(principal, id, upd))
    }

    async fn delete_user(&self, principal: Option<&Principal>, id: i64) -> ServiceResult<()> {
        self.write(|tx| tx.delete_user(principal, id))
    }
}

#[async_trait]
impl ProfileService for MemoryStore {
    async fn find_profile_by_id(&self, id: i64) -> ServiceResult<Profile> {
        self.read(|t| t.find_profile_by_id(id))?
    }

    async fn find_profile_by_user_id(&self, user_id: i64) -> ServiceResult<Profile> {
        let (profiles, _) = self.read(|t| t.find_profiles(&ProfileFilter::by_user_id(user_id)))?;
        profiles.into_iter().next().ok_or_else(|| ServiceError::not_found(msg::PROFILE_NOT_FOUND))
    }

    async fn find_profiles(&self, filter: ProfileFilter) -> ServiceResult<(Vec<Profile>, i64)> {
        self.read(|t| t.find_profiles(&filter))
    }

    async fn create_profile(&self, principal: Option<&Principal>, profile: &mut Profile) -> ServiceResult<()> {
        self.write(|tx| tx.create_profile(principal, profile))
    }

    async fn update_profile(&self, principal: Option<&Principal>, id: i64, upd: ProfileUpdate) -> ServiceResult<Profile> {
        self.write(|tx| tx.update_profile(principal, id, upd))
    }

    async fn delete_profile(&self, principal: Option<&Principal>, id: i64) -> ServiceResult<()> {
        self.write(|tx| tx.delete_profile(principal, id))
    }
}

#[async_trait]
impl ExerciseService for MemoryStore {
    async fn find_exercise_by_id(&self, id: i64) -> ServiceResult<Exercise> {
        self.read(|t| t.find_exercise_by_id(id))?
    }

    async fn find_exercise_by_name(&self, name: &str) -> ServiceResult<Exercise> {
        self.read(|t| t.find_exercise_by_name(name))?
    }

    async fn find_exercises(&self, filter: ExerciseFilter) -> ServiceResult<(Vec<Exercise>, i64)> {
        self.read(|t| t.find_exercises(&filter))
    }

    async fn create_exercise(&self, exercise: &mut Exercise) -> ServiceResult<()> {
        self.write(|tx| tx.create_exercise(exercise))
    }

    async fn update_exercise(&self, id: i64, upd: ExerciseUpdate) -> ServiceResult<Exercise> {
        self.write(|tx| tx.update_exercise(id, upd))
    }

    async fn delete_exercise(&self, id: i64) -> ServiceResult<()> {
        self.write(|tx| tx.delete_exercise(id))
    }
}

#[async_trait]
impl WorkoutService for MemoryStore {
    async fn find_workout_by_id(&self, id: i64) -> ServiceResult<Workout> {
        self.read(|t| t.find_workout_by_id(id))?
    }

    async fn find_workout_by_id_user_id(&self, id: i64, user_id: i64) -> ServiceResult<Workout> {
        let filter = WorkoutFilter { id: Some(id), user_id: Some(user_id), ..Default::default() };
        let (workouts, _) = self.read(|t| t.find_workouts(&filter))?;
        workouts.into_iter().next().ok_or_else(|| ServiceError::not_found(msg::WORKOUT_NOT_FOUND))
    }

    async fn find_workouts(&self, filter: WorkoutFilter) -> ServiceResult<(Vec<Workout>, i64)> {
        self.read(|t| t.find_workouts(&filter))
    }

    async fn create_workout(
        &self,
        principal: Option<&Principal>,
        workout: &mut Workout,
        exercise_names: &[String],
    ) -> ServiceResult<()> {
        self.write(|tx| tx.create_workout(principal, workout, exercise_names))
    }

    async fn update_workout(&self, principal: Option<&Principal>, id: i64, upd: WorkoutUpdate) -> ServiceResult<Workout> {
        self.write(|tx| tx.update_workout(principal, id, upd))
    }

    async fn add_exercises_to_workout(
        &self,
        principal: Option<&Principal>,
        id: i64,
        exercise_names: &[String],
    ) -> ServiceResult<Workout> {
        self.write(|tx| tx.add_exercises(principal, id, exercise_names))
    }

    async fn remove_exercises_from_workout(
        &self,
        principal: Option<&Principal>,
        id: i64,
        exercise_names: &[String],
    ) -> ServiceResult<Workout> {
        self.write(|tx| tx.remove_exercises(principal, id, exercise_names))
    }

    async fn delete_workout(&self, principal: Option<&Principal>, id: i64) -> ServiceResult<()> {
        self.write(|tx| tx.delete_workout(principal, id))
    }
}

#[async_trait]
impl WorkoutExerciseService for MemoryStore {
    async fn find_workout_exercise_by_id(&self, id: i64) -> ServiceResult<WorkoutExercise> {
        self.read(|t| t.find_workout_exercise_by_id(id))?
    }

    async fn find_workout_exercises(&self, filter: WorkoutExerciseFilter) -> ServiceResult<(Vec<WorkoutExercise>, i64)> {
        self.read(|t| t.find_workout_exercises(&filter))
    }

    async fn create_workout_exercise(&self, principal: Option<&Principal>, we: &mut WorkoutExercise) -> ServiceResult<()> {
        self.write(|tx| tx.create_workout_exercise(principal, we))
    }

    async fn update_workout_exercise(
        &self,
        principal: Option<&Principal>,
        id: i64,
        upd: WorkoutExerciseUpdate,
    ) -> ServiceResult<WorkoutExercise> {
        self.write(|tx| tx.update_workout_exercise(principal, id, upd))
    }

    async fn delete_workout_exercise(&self, principal: Option<&Principal>, id: i64) -> ServiceResult<()> {
        self.write(|tx| tx.delete_workout_exercise(principal, id))
    }
}

#[async_trait]
impl WEStatusService for MemoryStore {
    async fn find_status_by_id(&self, id: i64) -> ServiceResult<WEStatus> {
        self.read(|t| t.find_status_by_id(id))?
    }

    async fn find_status_by_workout_exercise_id(&self, workout_exercise_id: i64) -> ServiceResult<WEStatus> {
        self.read(|t| t.find_status_by_workout_exercise_id(workout_exercise_id))?
    }

    async fn find_statuses(&self, filter: WEStatusFilter) -> ServiceResult<(Vec<WEStatus>, i64)> {
        self.read(|t| t.find_statuses(&filter))
    }

    async fn create_status(&self, principal: Option<&Principal>, status: &mut WEStatus) -> ServiceResult<()> {
        self.write(|tx| tx.create_status(principal, status))
    }

    async fn update_status(&self, principal: Option<&Principal>, id: i64, upd: WEStatusUpdate) -> ServiceResult<WEStatus> {
        self.write(|tx| tx.update_status(principal, id, upd))
    }

    async fn delete_status(&self, principal: Option<&Principal>, id: i64) -> ServiceResult<()> {
        self.write(|tx| tx.delete_status(principal, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ErrorKind;
    use crate::testing::TestContext;
    use chrono::{Duration, NaiveDate};

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn profile() -> Profile {
        Profile::new(
            "Jane",
            "Doe",
            NaiveDate::from_ymd_opt(1990, 4, 2).unwrap(),
            "female",
            170.0,
            62.5,
        )
    }

    #[tokio::test]
    async fn create_stamps_id_and_frozen_now() {
        let ctx = TestContext::new();
        let mut exercise = Exercise::new("Squat", "Back squat");
        ctx.store.create_exercise(&mut exercise).await.unwrap();

        assert!(exercise.id > 0);
        assert_eq!(exercise.created_at, exercise.updated_at);
        assert_eq!(exercise.created_at, ctx.clock.now().trunc_subsecs(0));
        assert_eq!(ctx.store.find_exercise_by_id(exercise.id).await.unwrap(), exercise);
    }

    #[tokio::test]
    async fn missing_field_is_invalid() {
        let ctx = TestContext::new();
        let err = ctx.store.create_exercise(&mut Exercise::new("Squat", "")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid);
        assert_eq!(err.to_string(), "Description is required.");
    }

    #[tokio::test]
    async fn duplicate_username_and_email_conflict() {
        let ctx = TestContext::new();
        ctx.store.create_user(&mut User::new("jane", "jane@email.com", "h")).await.unwrap();

        let err = ctx.store.create_user(&mut User::new("jane", "other@email.com", "h")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.to_string(), msg::USERNAME_TAKEN);

        let err = ctx.store.create_user(&mut User::new("janet", "jane@email.com", "h")).await.unwrap_err();
        assert_eq!(err.to_string(), msg::EMAIL_TAKEN);

        let (_, count) = ctx.store.find_users(UserFilter::default()).await.unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn authenticate_checks_password() {
        let ctx = TestContext::new();
        let hasher = PasswordHasher::new(4);
        let hashed = hasher.hash("password123").await.unwrap();
        ctx.store.create_user(&mut User::new("jane", "jane@email.com", hashed)).await.unwrap();

        let user = ctx.store.authenticate("jane", "password123").await.unwrap();
        assert_eq!(user.username, "jane");

        let err = ctx.store.authenticate("jane", "wrong-password").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthenticated);
        let err = ctx.store.authenticate("nobody", "password123").await.unwrap_err();
        assert_eq!(err.to_string(), msg::INVALID_CREDENTIALS);
    }

    #[tokio::test]
    async fn empty_update_only_refreshes_updated_at() {
        let ctx = TestContext::new();
        let principal = ctx.principal("jane").await;
        let mut created = profile();
        ctx.store.create_profile(Some(&principal), &mut created).await.unwrap();

        ctx.clock.advance(Duration::seconds(30));
        let updated = ctx
            .store
            .update_profile(Some(&principal), created.id, ProfileUpdate::default())
            .await
            .unwrap();

        assert_eq!(updated.updated_at, created.updated_at + Duration::seconds(30));
        assert_eq!(Profile { updated_at: created.updated_at, ..updated.clone() }, created);
        assert_eq!(ctx.store.find_profile_by_id(created.id).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn profile_rules() {
        let ctx = TestContext::new();
        let jane = ctx.principal("jane").await;
        let john = ctx.principal("john").await;

        let err = ctx.store.create_profile(None, &mut profile()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthenticated);

        let mut created = profile();
        ctx.store.create_profile(Some(&jane), &mut created).await.unwrap();
        assert_eq!(created.user_id, jane.id());

        let err = ctx.store.create_profile(Some(&jane), &mut profile()).await.unwrap_err();
        assert_eq!(err.to_string(), msg::PROFILE_EXISTS);

        let err = ctx.store.delete_profile(Some(&john), created.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);

        ctx.store.delete_profile(Some(&jane), created.id).await.unwrap();
        let err = ctx.store.find_profile_by_id(created.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "Profile not found.");
    }

    #[tokio::test]
    async fn filters_and_counts() {
        let ctx = TestContext::new();
        for name in ["Squat", "Lunge", "Deadlift", "Row"] {
            ctx.exercise(name).await;
        }

        let (all, count) = ctx.store.find_exercises(ExerciseFilter::default()).await.unwrap();
        assert_eq!(count, 4);
        assert_eq!(all.len(), 4);
        assert!(all.windows(2).all(|w| w[0].id < w[1].id));

        let (one, count) = ctx.store.find_exercises(ExerciseFilter::by_id(all[2].id)).await.unwrap();
        assert_eq!(count, 1);
        assert_eq!(one[0].name, "Deadlift");

        let filter = ExerciseFilter { offset: 1, limit: 2, ..Default::default() };
        let (page, count) = ctx.store.find_exercises(filter).await.unwrap();
        assert_eq!(count, 4);
        assert_eq!(page.iter().map(|e| e.name.as_str()).collect::<Vec<_>>(), vec!["Lunge", "Deadlift"]);
    }

    #[tokio::test]
    async fn workout_scenario() {
        let ctx = TestContext::new();
        let jane = ctx.principal("jane").await;
        ctx.exercise("Squat").await;
        ctx.exercise("Lunge").await;

        let mut workout = Workout::new("Leg Day", ctx.clock.now() + Duration::hours(1));
        ctx.store
            .create_workout(Some(&jane), &mut workout, &names(&["Squat", "Lunge", "Squat"]))
            .await
            .unwrap();
        assert_eq!(workout.user_id, jane.id());

        let (found, count) = ctx.store.find_workouts(WorkoutFilter::by_user_id(jane.id())).await.unwrap();
        assert_eq!(count, 1);
        let names: Vec<_> = found[0].exercises.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Squat", "Lunge"]);

        let (rows, _) = ctx
            .store
            .find_workout_exercises(WorkoutExerciseFilter::by_workout_id(workout.id))
            .await
            .unwrap();
        assert_eq!(rows.iter().map(|we| we.order).collect::<Vec<_>>(), vec![1, 2]);
        for we in rows {
            let status = ctx.store.find_status_by_workout_exercise_id(we.id).await.unwrap();
            assert_eq!(status.status, ExerciseStatus::Pending);
        }
    }

    #[tokio::test]
    async fn workout_creation_is_atomic() {
        let ctx = TestContext::new();
        let jane = ctx.principal("jane").await;
        ctx.exercise("Squat").await;

        let mut workout = Workout::new("Leg Day", ctx.tomorrow());
        let err = ctx
            .store
            .create_workout(Some(&jane), &mut workout, &names(&["Squat", "Missing"]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let mut past = Workout::new("Leg Day", ctx.clock.now() - Duration::hours(1));
        let err = ctx.store.create_workout(Some(&jane), &mut past, &names(&["Squat"])).await.unwrap_err();
        assert_eq!(err.to_string(), "Scheduled Date is invalid.");

        let (_, count) = ctx.store.find_workouts(WorkoutFilter::default()).await.unwrap();
        assert_eq!(count, 0);
        let (_, count) = ctx.store.find_workout_exercises(WorkoutExerciseFilter::default()).await.unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn non_owner_cannot_touch_workout() {
        let ctx = TestContext::new();
        let jane = ctx.principal("jane").await;
        let john = ctx.principal("john").await;
        ctx.exercise("Squat").await;

        let mut workout = Workout::new("Leg Day", ctx.tomorrow());
        ctx.store.create_workout(Some(&jane), &mut workout, &names(&["Squat"])).await.unwrap();

        let upd = WorkoutUpdate { name: Some("Stolen".into()), ..Default::default() };
        let err = ctx.store.update_workout(Some(&john), workout.id, upd).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        let err = ctx.store.delete_workout(Some(&john), workout.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        let err = ctx.store.delete_workout(None, workout.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthenticated);

        assert_eq!(ctx.store.find_workout_by_id(workout.id).await.unwrap(), workout);
        let err = ctx.store.find_workout_by_id_user_id(workout.id, john.id()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn add_and_remove_exercises() {
        let ctx = TestContext::new();
        let jane = ctx.principal("jane").await;
        for name in ["Squat", "Lunge", "Deadlift"] {
            ctx.exercise(name).await;
        }
        let mut workout = Workout::new("Leg Day", ctx.tomorrow());
        ctx.store.create_workout(Some(&jane), &mut workout, &names(&["Squat"])).await.unwrap();

        let updated = ctx
            .store
            .add_exercises_to_workout(Some(&jane), workout.id, &names(&["Squat", "Lunge", "Deadlift"]))
            .await
            .unwrap();
        assert_eq!(updated.exercises.len(), 3);

        let err = ctx
            .store
            .remove_exercises_from_workout(Some(&jane), workout.id, &names(&["Squat", "Lunge", "Deadlift"]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid);

        let updated = ctx
            .store
            .remove_exercises_from_workout(Some(&jane), workout.id, &names(&["Lunge"]))
            .await
            .unwrap();
        let names: Vec<_> = updated.exercises.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Squat", "Deadlift"]);
    }

    #[tokio::test]
    async fn delete_workout_cascades() {
        let ctx = TestContext::new();
        let jane = ctx.principal("jane").await;
        let squat = ctx.exercise("Squat").await;
        let mut workout = Workout::new("Leg Day", ctx.tomorrow());
        ctx.store.create_workout(Some(&jane), &mut workout, &names(&["Squat"])).await.unwrap();

        let err = ctx.store.delete_exercise(squat.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        ctx.store.delete_workout(Some(&jane), workout.id).await.unwrap();
        let (_, count) = ctx.store.find_workout_exercises(WorkoutExerciseFilter::default()).await.unwrap();
        assert_eq!(count, 0);
        let (_, count) = ctx.store.find_statuses(WEStatusFilter::default()).await.unwrap();
        assert_eq!(count, 0);
        ctx.store.delete_exercise(squat.id).await.unwrap();
    }

    #[tokio::test]
    async fn workout_exercise_requires_known_exercise() {
        let ctx = TestContext::new();
        let jane = ctx.principal("jane").await;
        ctx.exercise("Squat").await;
        let lunge = ctx.exercise("Lunge").await;
        let mut workout = Workout::new("Leg Day", ctx.tomorrow());
        ctx.store.create_workout(Some(&jane), &mut workout, &names(&["Squat"])).await.unwrap();

        let err = ctx
            .store
            .create_workout_exercise(Some(&jane), &mut WorkoutExercise::new(workout.id, 999, 2))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), msg::EXERCISE_NOT_FOUND);

        let mut we = WorkoutExercise::new(workout.id, lunge.id, 2);
        ctx.store.create_workout_exercise(Some(&jane), &mut we).await.unwrap();
        let status = ctx.store.find_status_by_workout_exercise_id(we.id).await.unwrap();
        assert_eq!(status.status, ExerciseStatus::Pending);

        let err = ctx
            .store
            .create_workout_exercise(Some(&jane), &mut WorkoutExercise::new(workout.id, lunge.id, 3))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn status_completion_tracks_time() {
        let ctx = TestContext::new();
        let jane = ctx.principal("jane").await;
        let john = ctx.principal("john").await;
        ctx.exercise("Squat").await;
        let mut workout = Workout::new("Leg Day", ctx.tomorrow());
        ctx.store.create_workout(Some(&jane), &mut workout, &names(&["Squat"])).await.unwrap();
        let (rows, _) = ctx
            .store
            .find_workout_exercises(WorkoutExerciseFilter::by_workout_id(workout.id))
            .await
            .unwrap();
        let status = ctx.store.find_status_by_workout_exercise_id(rows[0].id).await.unwrap();

        let done = WEStatusUpdate {
            status: Some(ExerciseStatus::Completed),
            comments: Some("felt strong".into()),
            ..Default::default()
        };
        let err = ctx.store.update_status(Some(&john), status.id, done.clone()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);

        let updated = ctx.store.update_status(Some(&jane), status.id, done).await.unwrap();
        assert_eq!(updated.completed_at, Some(ctx.clock.now().trunc_subsecs(0)));
        assert_eq!(updated.comments.as_deref(), Some("felt strong"));

        let reset = WEStatusUpdate { status: Some(ExerciseStatus::Pending), ..Default::default() };
        let updated = ctx.store.update_status(Some(&jane), status.id, reset).await.unwrap();
        assert_eq!(updated.completed_at, None);
        assert_eq!(updated.comments.as_deref(), Some("felt strong"));
    }

    #[tokio::test]
    async fn deleting_user_removes_owned_rows() {
        let ctx = TestContext::new();
        let jane = ctx.principal("jane").await;
        ctx.exercise("Squat").await;
        ctx.store.create_profile(Some(&jane), &mut profile()).await.unwrap();
        let mut workout = Workout::new("Leg Day", ctx.tomorrow());
        ctx.store.create_workout(Some(&jane), &mut workout, &names(&["Squat"])).await.unwrap();

        ctx.store.delete_user(Some(&jane), jane.id()).await.unwrap();

        assert!(ctx.store.find_user_by_id(jane.id()).await.unwrap_err().is_not_found());
        assert!(ctx.store.find_profile_by_user_id(jane.id()).await.unwrap_err().is_not_found());
        assert!(ctx.store.find_workout_by_id(workout.id).await.unwrap_err().is_not_found());
    }
}
