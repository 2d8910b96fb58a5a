use async_trait::async_trait;
use sqlx::{postgres::PgRow, Row};

use super::workout_exercise::owned_workout_exercise;
use super::{unique_violation, PageQuery, PgStore, Tx};
use crate::models::{
    require_principal, ExerciseStatus, Principal, ServiceError, ServiceResult, WEStatus, WEStatusFilter, WEStatusUpdate,
};
use crate::services::{messages as msg, WEStatusService};

const COLUMNS: &str = "id, workout_exercise_id, status, comments, completed_at, created_at, updated_at";

fn status_from_row(row: &PgRow) -> Result<WEStatus, sqlx::Error> {
    let status: String = row.try_get("status")?;
    Ok(WEStatus {
        id: row.try_get("id")?,
        workout_exercise_id: row.try_get("workout_exercise_id")?,
        status: status.parse().map_err(|e: ServiceError| sqlx::Error::Decode(Box::new(e)))?,
        comments: row.try_get("comments")?,
        completed_at: row.try_get("completed_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

async fn find_statuses(tx: &mut Tx, filter: &WEStatusFilter) -> ServiceResult<(Vec<WEStatus>, i64)> {
    let page = PageQuery {
        table: "workout_exercise_status",
        columns: COLUMNS,
        order_by: "id ASC",
        offset: filter.offset,
        limit: filter.limit,
    };
    page.fetch(
        tx,
        |q| {
            q.eq("id", filter.id)
                .eq("workout_exercise_id", filter.workout_exercise_id)
                .eq("status", filter.status.map(|s| s.to_string()));
        },
        status_from_row,
    )
    .await
}

async fn find_one(tx: &mut Tx, filter: WEStatusFilter) -> ServiceResult<WEStatus> {
    let (statuses, _) = find_statuses(tx, &filter).await?;
    statuses.into_iter().next().ok_or_else(|| ServiceError::not_found(msg::STATUS_NOT_FOUND))
}

async fn insert(tx: &mut Tx, status: &mut WEStatus) -> ServiceResult<()> {
    let row = sqlx::query(
        "INSERT INTO workout_exercise_status (workout_exercise_id, status, comments, completed_at, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING id",
    )
    .bind(status.workout_exercise_id)
    .bind(status.status.as_str())
    .bind(&status.comments)
    .bind(status.completed_at)
    .bind(status.created_at)
    .bind(status.updated_at)
    .fetch_one(tx.conn())
    .await
    .map_err(|e| match unique_violation(&e).as_deref() {
        Some("workout_exercise_status_workout_exercise_id_key") => ServiceError::conflict(msg::STATUS_EXISTS),
        _ => e.into(),
    })?;

    status.id = row.try_get("id")?;
    Ok(())
}

/// Record the initial `pending` status of a new workout exercise.
pub(crate) async fn insert_pending(tx: &mut Tx, workout_exercise_id: i64) -> ServiceResult<WEStatus> {
    let mut status = WEStatus::pending(workout_exercise_id);
    status.created_at = tx.now();
    status.updated_at = tx.now();
    insert(tx, &mut status).await?;
    Ok(status)
}

async fn owned_status(tx: &mut Tx, principal: &Principal, id: i64) -> ServiceResult<WEStatus> {
    let status = find_one(tx, WEStatusFilter::by_id(id)).await?;
    owned_workout_exercise(tx, principal, status.workout_exercise_id).await?;
    Ok(status)
}

async fn create_status(tx: &mut Tx, principal: Option<&Principal>, status: &mut WEStatus) -> ServiceResult<()> {
    let principal = require_principal(principal, msg::LOGIN_REQUIRED)?;
    status.validate()?;
    owned_workout_exercise(tx, principal, status.workout_exercise_id).await?;

    let (_, existing) = find_statuses(tx, &WEStatusFilter::by_workout_exercise_id(status.workout_exercise_id)).await?;
    if existing > 0 {
        return Err(ServiceError::conflict(msg::STATUS_EXISTS));
    }

    if status.status == ExerciseStatus::Completed && status.completed_at.is_none() {
        status.completed_at = Some(tx.now());
    }
    status.created_at = tx.now();
    status.updated_at = tx.now();
    insert(tx, status).await
}

async fn update_status(
    tx: &mut Tx,
    principal: Option<&Principal>,
    id: i64,
    upd: WEStatusUpdate,
) -> ServiceResult<WEStatus> {
    let principal = require_principal(principal, msg::LOGIN_REQUIRED)?;
    let mut status = owned_status(tx, principal, id).await?;

    upd.apply(&mut status, tx.now());
    status.updated_at = tx.now();
    status.validate()?;

    sqlx::query(
        "UPDATE workout_exercise_status
         SET status = $1, comments = $2, completed_at = $3, updated_at = $4
         WHERE id = $5",
    )
    .bind(status.status.as_str())
    .bind(&status.comments)
    .bind(status.completed_at)
    .bind(status.updated_at)
    .bind(status.id)
    .execute(tx.conn())
    .await?;

    Ok(status)
}

async fn delete_status(tx: &mut Tx, principal: Option<&Principal>, id: i64) -> ServiceResult<()> {
    let principal = require_principal(principal, msg::LOGIN_REQUIRED)?;
    let status = owned_status(tx, principal, id).await?;
    sqlx::query("DELETE FROM workout_exercise_status WHERE id = $1")
        .bind(status.id)
        .execute(tx.conn())
        .await?;
    Ok(())
}

#[async_trait]
impl WEStatusService for PgStore {
    async fn find_status_by_id(&self, id: i64) -> ServiceResult<WEStatus> {
        let mut tx = self.db.begin_tx().await?;
        find_one(&mut tx, WEStatusFilter::by_id(id)).await
    }

    async fn find_status_by_workout_exercise_id(&self, workout_exercise_id: i64) -> ServiceResult<WEStatus> {
        let mut tx = self.db.begin_tx().await?;
        find_one(&mut tx, WEStatusFilter::by_workout_exercise_id(workout_exercise_id)).await
    }

    async fn find_statuses(&self, filter: WEStatusFilter) -> ServiceResult<(Vec<WEStatus>, i64)> {
        let mut tx = self.db.begin_tx().await?;
        find_statuses(&mut tx, &filter).await
    }

    async fn create_status(&self, principal: Option<&Principal>, status: &mut WEStatus) -> ServiceResult<()> {
        let mut tx = self.db.begin_tx().await?;
        create_status(&mut tx, principal, status).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn update_status(&self, principal: Option<&Principal>, id: i64, upd: WEStatusUpdate) -> ServiceResult<WEStatus> {
        let mut tx = self.db.begin_tx().await?;
        let status = update_status(&mut tx, principal, id, upd).await?;
        tx.commit().await?;
        Ok(status)
    }

    async fn delete_status(&self, principal: Option<&Principal>, id: i64) -> ServiceResult<()> {
        let mut tx = self.db.begin_tx().await?;
        delete_status(&mut tx, principal, id).await?;
        tx.commit().await?;
        Ok(())
    }
}
