use async_trait::async_trait;
use sqlx::{postgres::PgRow, Row};

use super::{is_foreign_key_violation, unique_violation, PageQuery, PgStore, Tx};
use crate::models::{Exercise, ExerciseFilter, ExerciseUpdate, ServiceError, ServiceResult};
use crate::services::{messages as msg, ExerciseService};

const COLUMNS: &str = "id, name, description, created_at, updated_at";

pub(crate) fn exercise_from_row(row: &PgRow) -> Result<Exercise, sqlx::Error> {
    Ok(Exercise {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn write_error(err: sqlx::Error) -> ServiceError {
    match unique_violation(&err).as_deref() {
        Some("exercise_name_key") => ServiceError::conflict(msg::EXERCISE_EXISTS),
        _ => err.into(),
    }
}

async fn find_exercises(tx: &mut Tx, filter: &ExerciseFilter) -> ServiceResult<(Vec<Exercise>, i64)> {
    let page = PageQuery {
        table: "exercise",
        columns: COLUMNS,
        order_by: "id ASC",
        offset: filter.offset,
        limit: filter.limit,
    };
    page.fetch(
        tx,
        |q| {
            q.eq("id", filter.id).eq("name", filter.name.clone());
        },
        exercise_from_row,
    )
    .await
}

async fn find_one(tx: &mut Tx, filter: ExerciseFilter) -> ServiceResult<Exercise> {
    let (exercises, _) = find_exercises(tx, &filter).await?;
    exercises.into_iter().next().ok_or_else(|| ServiceError::not_found(msg::EXERCISE_NOT_FOUND))
}

pub(crate) async fn find_exercise_by_id(tx: &mut Tx, id: i64) -> ServiceResult<Exercise> {
    find_one(tx, ExerciseFilter::by_id(id)).await
}

pub(crate) async fn find_exercise_by_name(tx: &mut Tx, name: &str) -> ServiceResult<Exercise> {
    find_one(tx, ExerciseFilter::by_name(name)).await
}

/// Look up each distinct name in request order.
pub(crate) async fn resolve_names(tx: &mut Tx, names: &[String]) -> ServiceResult<Vec<Exercise>> {
    let mut exercises = Vec::with_capacity(names.len());
    for name in crate::models::dedup_names(names) {
        exercises.push(find_exercise_by_name(tx, &name).await?);
    }
    Ok(exercises)
}

async fn create_exercise(tx: &mut Tx, exercise: &mut Exercise) -> ServiceResult<()> {
    exercise.created_at = tx.now();
    exercise.updated_at = tx.now();
    exercise.validate()?;

    let row = sqlx::query(
        "INSERT INTO exercise (name, description, created_at, updated_at) VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(&exercise.name)
    .bind(&exercise.description)
    .bind(exercise.created_at)
    .bind(exercise.updated_at)
    .fetch_one(tx.conn())
    .await
    .map_err(write_error)?;

    exercise.id = row.try_get("id")?;
    Ok(())
}

async fn update_exercise(tx: &mut Tx, id: i64, upd: ExerciseUpdate) -> ServiceResult<Exercise> {
    let mut exercise = find_exercise_by_id(tx, id).await?;
    upd.apply(&mut exercise);
    exercise.updated_at = tx.now();
    exercise.validate()?;

    sqlx::query("UPDATE exercise SET name = $1, description = $2, updated_at = $3 WHERE id = $4")
        .bind(&exercise.name)
        .bind(&exercise.description)
        .bind(exercise.updated_at)
        .bind(exercise.id)
        .execute(tx.conn())
        .await
        .map_err(write_error)?;

    Ok(exercise)
}

async fn delete_exercise(tx: &mut Tx, id: i64) -> ServiceResult<()> {
    let exercise = find_exercise_by_id(tx, id).await?;
    sqlx::query("DELETE FROM exercise WHERE id = $1")
        .bind(exercise.id)
        .execute(tx.conn())
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                ServiceError::conflict(msg::EXERCISE_IN_USE)
            } else {
                e.into()
            }
        })?;
    Ok(())
}

#[async_trait]
impl ExerciseService for PgStore {
    async fn find_exercise_by_id(&self, id: i64) -> ServiceResult<Exercise> {
        let mut tx = self.db.begin_tx().await?;
        find_exercise_by_id(&mut tx, id).await
    }

    async fn find_exercise_by_name(&self, name: &str) -> ServiceResult<Exercise> {
        let mut tx = self.db.begin_tx().await?;
        find_exercise_by_name(&mut tx, name).await
    }

    async fn find_exercises(&self, filter: ExerciseFilter) -> ServiceResult<(Vec<Exercise>, i64)> {
        let mut tx = self.db.begin_tx().await?;
        find_exercises(&mut tx, &filter).await
    }

    async fn create_exercise(&self, exercise: &mut Exercise) -> ServiceResult<()> {
        let mut tx = self.db.begin_tx().await?;
        create_exercise(&mut tx, exercise).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn update_exercise(&self, id: i64, upd: ExerciseUpdate) -> ServiceResult<Exercise> {
        let mut tx = self.db.begin_tx().await?;
        let exercise = update_exercise(&mut tx, id, upd).await?;
        tx.commit().await?;
        Ok(exercise)
    }

    async fn delete_exercise(&self, id: i64) -> ServiceResult<()> {
        let mut tx = self.db.begin_tx().await?;
        delete_exercise(&mut tx, id).await?;
        tx.commit().await?;
        Ok(())
    }
}
