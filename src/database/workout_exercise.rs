use async_trait::async_trait;
use sqlx::{postgres::PgRow, Row};

use super::exercise::find_exercise_by_id;
use super::workout::owned_workout;
use super::workout_exercise_status::insert_pending;
use super::{unique_violation, PageQuery, PgStore, Tx};
use crate::models::{
    require_principal, Principal, ServiceError, ServiceResult, WorkoutExercise, WorkoutExerciseFilter,
    WorkoutExerciseUpdate,
};
use crate::services::{messages as msg, WorkoutExerciseService};

const COLUMNS: &str = r#"id, workout_id, exercise_id, "order", created_at, updated_at"#;

fn workout_exercise_from_row(row: &PgRow) -> Result<WorkoutExercise, sqlx::Error> {
    Ok(WorkoutExercise {
        id: row.try_get("id")?,
        workout_id: row.try_get("workout_id")?,
        exercise_id: row.try_get("exercise_id")?,
        order: row.try_get("order")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

async fn find_workout_exercises(
    tx: &mut Tx,
    filter: &WorkoutExerciseFilter,
) -> ServiceResult<(Vec<WorkoutExercise>, i64)> {
    let page = PageQuery {
        table: "workout_exercise",
        columns: COLUMNS,
        order_by: "id ASC",
        offset: filter.offset,
        limit: filter.limit,
    };
    page.fetch(
        tx,
        |q| {
            q.eq("id", filter.id)
                .eq("workout_id", filter.workout_id)
                .eq("exercise_id", filter.exercise_id)
                .eq(r#""order""#, filter.order);
        },
        workout_exercise_from_row,
    )
    .await
}

pub(crate) async fn find_workout_exercise_by_id(tx: &mut Tx, id: i64) -> ServiceResult<WorkoutExercise> {
    let (rows, _) = find_workout_exercises(tx, &WorkoutExerciseFilter::by_id(id)).await?;
    rows.into_iter()
        .next()
        .ok_or_else(|| ServiceError::not_found(msg::WORKOUT_EXERCISE_NOT_FOUND))
}

/// Load a join row and check the principal owns its workout.
pub(crate) async fn owned_workout_exercise(
    tx: &mut Tx,
    principal: &Principal,
    id: i64,
) -> ServiceResult<WorkoutExercise> {
    let we = find_workout_exercise_by_id(tx, id).await?;
    owned_workout(tx, principal, we.workout_id, msg::WORKOUT_FORBIDDEN_MODIFY).await?;
    Ok(we)
}

/// Insert a join row along with its pending status.
pub(crate) async fn attach(tx: &mut Tx, we: &mut WorkoutExercise) -> ServiceResult<()> {
    we.created_at = tx.now();
    we.updated_at = tx.now();
    we.validate()?;

    let row = sqlx::query(
        r#"INSERT INTO workout_exercise (workout_id, exercise_id, "order", created_at, updated_at)
           VALUES ($1, $2, $3, $4, $5)
           RETURNING id"#,
    )
    .bind(we.workout_id)
    .bind(we.exercise_id)
    .bind(we.order)
    .bind(we.created_at)
    .bind(we.updated_at)
    .fetch_one(tx.conn())
    .await
    .map_err(|e| match unique_violation(&e).as_deref() {
        Some("workout_exercise_workout_id_exercise_id_key") => ServiceError::conflict(msg::WORKOUT_EXERCISE_EXISTS),
        _ => e.into(),
    })?;
    we.id = row.try_get("id")?;

    insert_pending(tx, we.id).await?;
    Ok(())
}

async fn create_workout_exercise(
    tx: &mut Tx,
    principal: Option<&Principal>,
    we: &mut WorkoutExercise,
) -> ServiceResult<()> {
    let principal = require_principal(principal, msg::LOGIN_REQUIRED)?;
    we.validate()?;
    owned_workout(tx, principal, we.workout_id, msg::WORKOUT_FORBIDDEN_MODIFY).await?;
    find_exercise_by_id(tx, we.exercise_id).await?;

    attach(tx, we).await
}

async fn update_workout_exercise(
    tx: &mut Tx,
    principal: Option<&Principal>,
    id: i64,
    upd: WorkoutExerciseUpdate,
) -> ServiceResult<WorkoutExercise> {
    let principal = require_principal(principal, msg::LOGIN_REQUIRED)?;
    let mut we = owned_workout_exercise(tx, principal, id).await?;

    upd.apply(&mut we);
    we.updated_at = tx.now();
    we.validate()?;

    sqlx::query(r#"UPDATE workout_exercise SET "order" = $1, updated_at = $2 WHERE id = $3"#)
        .bind(we.order)
        .bind(we.updated_at)
        .bind(we.id)
        .execute(tx.conn())
        .await?;

    Ok(we)
}

async fn delete_workout_exercise(tx: &mut Tx, principal: Option<&Principal>, id: i64) -> ServiceResult<()> {
    let principal = require_principal(principal, msg::LOGIN_REQUIRED)?;
    let we = owned_workout_exercise(tx, principal, id).await?;

    let (_, siblings) = find_workout_exercises(tx, &WorkoutExerciseFilter::by_workout_id(we.workout_id)).await?;
    if siblings <= 1 {
        return Err(ServiceError::invalid(msg::WORKOUT_LAST_EXERCISE));
    }

    sqlx::query("DELETE FROM workout_exercise_status WHERE workout_exercise_id = $1")
        .bind(we.id)
        .execute(tx.conn())
        .await?;
    sqlx::query("DELETE FROM workout_exercise WHERE id = $1")
        .bind(we.id)
        .execute(tx.conn())
        .await?;
    Ok(())
}

#[async_trait]
impl WorkoutExerciseService for PgStore {
    async fn find_workout_exercise_by_id(&self, id: i64) -> ServiceResult<WorkoutExercise> {
        let mut tx = self.db.begin_tx().await?;
        find_workout_exercise_by_id(&mut tx, id).await
    }

    async fn find_workout_exercises(&self, filter: WorkoutExerciseFilter) -> ServiceResult<(Vec<WorkoutExercise>, i64)> {
        let mut tx = self.db.begin_tx().await?;
        find_workout_exercises(&mut tx, &filter).await
    }

    async fn create_workout_exercise(&self, principal: Option<&Principal>, we: &mut WorkoutExercise) -> ServiceResult<()> {
        let mut tx = self.db.begin_tx().await?;
        create_workout_exercise(&mut tx, principal, we).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn update_workout_exercise(
        &self,
        principal: Option<&Principal>,
        id: i64,
        upd: WorkoutExerciseUpdate,
    ) -> ServiceResult<WorkoutExercise> {
        let mut tx = self.db.begin_tx().await?;
        let we = update_workout_exercise(&mut tx, principal, id, upd).await?;
        tx.commit().await?;
        Ok(we)
    }

    async fn delete_workout_exercise(&self, principal: Option<&Principal>, id: i64) -> ServiceResult<()> {
        let mut tx = self.db.begin_tx().await?;
        delete_workout_exercise(&mut tx, principal, id).await?;
        tx.commit().await?;
        Ok(())
    }
}
