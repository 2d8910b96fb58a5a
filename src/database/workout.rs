use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::{postgres::PgRow, Row};

use super::exercise::{exercise_from_row, resolve_names};
use super::workout_exercise::attach;
use super::{PageQuery, PgStore, Tx};
use crate::models::{
    require_principal, Principal, ServiceError, ServiceResult, Workout, WorkoutExercise, WorkoutFilter, WorkoutUpdate,
};
use crate::services::{messages as msg, WorkoutService};

const COLUMNS: &str = "id, user_id, name, scheduled_date, created_at, updated_at";

fn workout_from_row(row: &PgRow) -> Result<Workout, sqlx::Error> {
    Ok(Workout {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        name: row.try_get("name")?,
        scheduled_date: row.try_get("scheduled_date")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        exercises: Vec::new(),
    })
}

/// Fill in the exercises of every workout with one query, in workout order.
async fn load_exercises(tx: &mut Tx, workouts: &mut [Workout]) -> ServiceResult<()> {
    if workouts.is_empty() {
        return Ok(());
    }
    let ids: Vec<i64> = workouts.iter().map(|w| w.id).collect();

    let mut rows = sqlx::query(
        r#"SELECT we.workout_id, e.id, e.name, e.description, e.created_at, e.updated_at
           FROM workout_exercise we
           JOIN exercise e ON e.id = we.exercise_id
           WHERE we.workout_id = ANY($1)
           ORDER BY we.workout_id, we."order", we.id"#,
    )
    .bind(ids)
    .fetch(tx.conn());

    while let Some(row) = rows.try_next().await? {
        let workout_id: i64 = row.try_get("workout_id")?;
        if let Some(workout) = workouts.iter_mut().find(|w| w.id == workout_id) {
            workout.exercises.push(exercise_from_row(&row)?);
        }
    }
    Ok(())
}

async fn find_workouts(tx: &mut Tx, filter: &WorkoutFilter) -> ServiceResult<(Vec<Workout>, i64)> {
    let page = PageQuery {
        table: "workout",
        columns: COLUMNS,
        order_by: "id ASC",
        offset: filter.offset,
        limit: filter.limit,
    };
    let (mut workouts, total) = page
        .fetch(
            tx,
            |q| {
                q.eq("id", filter.id)
                    .eq("user_id", filter.user_id)
                    .eq("name", filter.name.clone())
                    .eq("scheduled_date", filter.scheduled_date);
            },
            workout_from_row,
        )
        .await?;

    load_exercises(tx, &mut workouts).await?;
    Ok((workouts, total))
}

async fn find_one(tx: &mut Tx, filter: WorkoutFilter) -> ServiceResult<Workout> {
    let (workouts, _) = find_workouts(tx, &filter).await?;
    workouts.into_iter().next().ok_or_else(|| ServiceError::not_found(msg::WORKOUT_NOT_FOUND))
}

/// Load a workout and check the principal owns it.
pub(crate) async fn owned_workout(
    tx: &mut Tx,
    principal: &Principal,
    id: i64,
    forbidden: &str,
) -> ServiceResult<Workout> {
    let workout = find_one(tx, WorkoutFilter::by_id(id)).await?;
    if workout.user_id != principal.id() {
        return Err(ServiceError::unauthorized(forbidden));
    }
    Ok(workout)
}

async fn touch(tx: &mut Tx, workout: &mut Workout) -> ServiceResult<()> {
    workout.updated_at = tx.now();
    sqlx::query("UPDATE workout SET updated_at = $1 WHERE id = $2")
        .bind(workout.updated_at)
        .bind(workout.id)
        .execute(tx.conn())
        .await?;
    Ok(())
}

async fn create_workout(
    tx: &mut Tx,
    principal: Option<&Principal>,
    workout: &mut Workout,
    names: &[String],
) -> ServiceResult<()> {
    let principal = require_principal(principal, msg::WORKOUT_LOGIN_REQUIRED)?;
    workout.user_id = principal.id();
    workout.created_at = tx.now();
    workout.updated_at = tx.now();
    workout.exercises = resolve_names(tx, names).await?;
    workout.validate()?;
    workout.validate_schedule(tx.now())?;

    let row = sqlx::query(
        "INSERT INTO workout (user_id, name, scheduled_date, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING id",
    )
    .bind(workout.user_id)
    .bind(&workout.name)
    .bind(workout.scheduled_date)
    .bind(workout.created_at)
    .bind(workout.updated_at)
    .fetch_one(tx.conn())
    .await?;
    workout.id = row.try_get("id")?;

    for (i, exercise) in workout.exercises.iter().enumerate() {
        let mut we = WorkoutExercise::new(workout.id, exercise.id, i as i32 + 1);
        attach(tx, &mut we).await?;
    }
    Ok(())
}

async fn update_workout(
    tx: &mut Tx,
    principal: Option<&Principal>,
    id: i64,
    upd: WorkoutUpdate,
) -> ServiceResult<Workout> {
    let principal = require_principal(principal, msg::LOGIN_REQUIRED)?;
    let mut workout = owned_workout(tx, principal, id, msg::WORKOUT_FORBIDDEN_UPDATE).await?;

    upd.apply(&mut workout);
    workout.updated_at = tx.now();
    workout.validate()?;
    if upd.scheduled_date.is_some() {
        workout.validate_schedule(tx.now())?;
    }

    sqlx::query("UPDATE workout SET name = $1, scheduled_date = $2, updated_at = $3 WHERE id = $4")
        .bind(&workout.name)
        .bind(workout.scheduled_date)
        .bind(workout.updated_at)
        .bind(workout.id)
        .execute(tx.conn())
        .await?;

    Ok(workout)
}

async fn add_exercises(tx: &mut Tx, principal: Option<&Principal>, id: i64, names: &[String]) -> ServiceResult<Workout> {
    let principal = require_principal(principal, msg::LOGIN_REQUIRED)?;
    let mut workout = owned_workout(tx, principal, id, msg::WORKOUT_FORBIDDEN_MODIFY).await?;
    let exercises = resolve_names(tx, names).await?;
    if exercises.is_empty() {
        return Err(ServiceError::invalid(msg::WORKOUT_NO_EXERCISES));
    }

    let row = sqlx::query(r#"SELECT COALESCE(MAX("order"), 0) AS max_order FROM workout_exercise WHERE workout_id = $1"#)
        .bind(workout.id)
        .fetch_one(tx.conn())
        .await?;
    let mut order: i32 = row.try_get("max_order")?;

    for exercise in exercises.iter().filter(|e| !workout.has_exercise(e.id)) {
        order += 1;
        let mut we = WorkoutExercise::new(workout.id, exercise.id, order);
        attach(tx, &mut we).await?;
    }

    touch(tx, &mut workout).await?;
    workout.exercises.clear();
    load_exercises(tx, std::slice::from_mut(&mut workout)).await?;
    Ok(workout)
}

async fn remove_exercises(
    tx: &mut Tx,
    principal: Option<&Principal>,
    id: i64,
    names: &[String],
) -> ServiceResult<Workout> {
    let principal = require_principal(principal, msg::LOGIN_REQUIRED)?;
    let mut workout = owned_workout(tx, principal, id, msg::WORKOUT_FORBIDDEN_MODIFY).await?;
    let exercises = resolve_names(tx, names).await?;
    if exercises.is_empty() {
        return Err(ServiceError::invalid(msg::WORKOUT_NO_EXERCISES));
    }

    let doomed: Vec<i64> = workout
        .exercises
        .iter()
        .filter(|e| exercises.iter().any(|x| x.id == e.id))
        .map(|e| e.id)
        .collect();
    if doomed.len() == workout.exercises.len() {
        return Err(ServiceError::invalid(msg::WORKOUT_LAST_EXERCISE));
    }

    sqlx::query(
        "DELETE FROM workout_exercise_status WHERE workout_exercise_id IN
           (SELECT id FROM workout_exercise WHERE workout_id = $1 AND exercise_id = ANY($2))",
    )
    .bind(workout.id)
    .bind(&doomed)
    .execute(tx.conn())
    .await?;
    sqlx::query("DELETE FROM workout_exercise WHERE workout_id = $1 AND exercise_id = ANY($2)")
        .bind(workout.id)
        .bind(&doomed)
        .execute(tx.conn())
        .await?;

    touch(tx, &mut workout).await?;
    workout.exercises.retain(|e| !doomed.contains(&e.id));
    Ok(workout)
}

async fn delete_workout(tx: &mut Tx, principal: Option<&Principal>, id: i64) -> ServiceResult<()> {
    let principal = require_principal(principal, msg::LOGIN_REQUIRED)?;
    let workout = owned_workout(tx, principal, id, msg::WORKOUT_FORBIDDEN_DELETE).await?;

    sqlx::query(
        "DELETE FROM workout_exercise_status WHERE workout_exercise_id IN
           (SELECT id FROM workout_exercise WHERE workout_id = $1)",
    )
    .bind(workout.id)
    .execute(tx.conn())
    .await?;
    sqlx::query("DELETE FROM workout_exercise WHERE workout_id = $1")
        .bind(workout.id)
        .execute(tx.conn())
        .await?;
    sqlx::query("DELETE FROM workout WHERE id = $1")
        .bind(workout.id)
        .execute(tx.conn())
        .await?;
    Ok(())
}

#[async_trait]
impl WorkoutService for PgStore {
    async fn find_workout_by_id(&self, id: i64) -> ServiceResult<Workout> {
        let mut tx = self.db.begin_tx().await?;
        find_one(&mut tx, WorkoutFilter::by_id(id)).await
    }

    async fn find_workout_by_id_user_id(&self, id: i64, user_id: i64) -> ServiceResult<Workout> {
        let mut tx = self.db.begin_tx().await?;
        let filter = WorkoutFilter { id: Some(id), user_id: Some(user_id), ..Default::default() };
        find_one(&mut tx, filter).await
    }

    async fn find_workouts(&self, filter: WorkoutFilter) -> ServiceResult<(Vec<Workout>, i64)> {
        let mut tx = self.db.begin_tx().await?;
        find_workouts(&mut tx, &filter).await
    }

    async fn create_workout(
        &self,
        principal: Option<&Principal>,
        workout: &mut Workout,
        exercise_names: &[String],
    ) -> ServiceResult<()> {
        let mut tx = self.db.begin_tx().await?;
        create_workout(&mut tx, principal, workout, exercise_names).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn update_workout(&self, principal: Option<&Principal>, id: i64, upd: WorkoutUpdate) -> ServiceResult<Workout> {
        let mut tx = self.db.begin_tx().await?;
        let workout = update_workout(&mut tx, principal, id, upd).await?;
        tx.commit().await?;
        Ok(workout)
    }

    async fn add_exercises_to_workout(
        &self,
        principal: Option<&Principal>,
        id: i64,
        exercise_names: &[String],
    ) -> ServiceResult<Workout> {
        let mut tx = self.db.begin_tx().await?;
        let workout = add_exercises(&mut tx, principal, id, exercise_names).await?;
        tx.commit().await?;
        Ok(workout)
    }

    async fn remove_exercises_from_workout(
        &self,
        principal: Option<&Principal>,
        id: i64,
        exercise_names: &[String],
    ) -> ServiceResult<Workout> {
        let mut tx = self.db.begin_tx().await?;
        let workout = remove_exercises(&mut tx, principal, id, exercise_names).await?;
        tx.commit().await?;
        Ok(workout)
    }

    async fn delete_workout(&self, principal: Option<&Principal>, id: i64) -> ServiceResult<()> {
        let mut tx = self.db.begin_tx().await?;
        delete_workout(&mut tx, principal, id).await?;
        tx.commit().await?;
        Ok(())
    }
}
