use async_trait::async_trait;
use sqlx::{postgres::PgRow, Row};

use super::{unique_violation, PageQuery, PgStore, Tx};
use crate::models::{require_principal, Principal, ServiceError, ServiceResult, User, UserFilter, UserUpdate};
use crate::services::{messages as msg, UserService};

const TABLE: &str = r#""user""#;
const COLUMNS: &str = "id, username, email, hashed_password, created_at, updated_at";

fn user_from_row(row: &PgRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        hashed_password: row.try_get("hashed_password")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn write_error(err: sqlx::Error) -> ServiceError {
    match unique_violation(&err).as_deref() {
        Some("user_username_key") => ServiceError::conflict(msg::USERNAME_TAKEN),
        Some("user_email_key") => ServiceError::conflict(msg::EMAIL_TAKEN),
        _ => err.into(),
    }
}

pub(crate) async fn find_users(tx: &mut Tx, filter: &UserFilter) -> ServiceResult<(Vec<User>, i64)> {
    let page = PageQuery {
        table: TABLE,
        columns: COLUMNS,
        order_by: "id ASC",
        offset: filter.offset,
        limit: filter.limit,
    };
    page.fetch(
        tx,
        |q| {
            q.eq("id", filter.id)
                .eq("username", filter.username.clone())
                .eq("email", filter.email.clone());
        },
        user_from_row,
    )
    .await
}

pub(crate) async fn find_user_by_id(tx: &mut Tx, id: i64) -> ServiceResult<User> {
    let (users, _) = find_users(tx, &UserFilter::by_id(id)).await?;
    users.into_iter().next().ok_or_else(|| ServiceError::not_found(msg::USER_NOT_FOUND))
}

async fn create_user(tx: &mut Tx, user: &mut User) -> ServiceResult<()> {
    user.created_at = tx.now();
    user.updated_at = tx.now();
    user.validate()?;

    let row = sqlx::query(
        r#"INSERT INTO "user" (username, email, hashed_password, created_at, updated_at)
           VALUES ($1, $2, $3, $4, $5)
           RETURNING id"#,
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.hashed_password)
    .bind(user.created_at)
    .bind(user.updated_at)
    .fetch_one(tx.conn())
    .await
    .map_err(write_error)?;

    user.id = row.try_get("id")?;
    Ok(())
}

async fn owned_user(tx: &mut Tx, principal: Option<&Principal>, id: i64) -> ServiceResult<User> {
    let principal = require_principal(principal, msg::LOGIN_REQUIRED)?;
    let user = find_user_by_id(tx, id).await?;
    if user.id != principal.id() {
        return Err(ServiceError::unauthorized(msg::USER_FORBIDDEN));
    }
    Ok(user)
}

async fn update_user(tx: &mut Tx, principal: Option<&Principal>, id: i64, upd: UserUpdate) -> ServiceResult<User> {
    let mut user = owned_user(tx, principal, id).await?;
    upd.apply(&mut user);
    user.updated_at = tx.now();
    user.validate()?;

    sqlx::query(r#"UPDATE "user" SET username = $1, email = $2, updated_at = $3 WHERE id = $4"#)
        .bind(&user.username)
        .bind(&user.email)
        .bind(user.updated_at)
        .bind(user.id)
        .execute(tx.conn())
        .await
        .map_err(write_error)?;

    Ok(user)
}

async fn delete_user(tx: &mut Tx, principal: Option<&Principal>, id: i64) -> ServiceResult<()> {
    let user = owned_user(tx, principal, id).await?;
    // profile and workouts go with the user through ON DELETE CASCADE
    sqlx::query(r#"DELETE FROM "user" WHERE id = $1"#)
        .bind(user.id)
        .execute(tx.conn())
        .await?;
    Ok(())
}

#[async_trait]
impl UserService for PgStore {
    async fn find_user_by_id(&self, id: i64) -> ServiceResult<User> {
        let mut tx = self.db.begin_tx().await?;
        find_user_by_id(&mut tx, id).await
    }

    async fn authenticate(&self, username: &str, password: &str) -> ServiceResult<User> {
        let user = {
            let mut tx = self.db.begin_tx().await?;
            let (users, _) = find_users(&mut tx, &UserFilter::by_username(username)).await?;
            users.into_iter().next()
        };
        let user = user.ok_or_else(|| ServiceError::unauthenticated(msg::INVALID_CREDENTIALS))?;

        if !self.hasher.verify(password, &user.hashed_password).await? {
            return Err(ServiceError::unauthenticated(msg::INVALID_CREDENTIALS));
        }
        Ok(user)
    }

    async fn find_users(&self, filter: UserFilter) -> ServiceResult<(Vec<User>, i64)> {
        let mut tx = self.db.begin_tx().await?;
        find_users(&mut tx, &filter).await
    }

    async fn create_user(&self, user: &mut User) -> ServiceResult<()> {
        let mut tx = self.db.begin_tx().await?;
        create_user(&mut tx, user).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn update_user(&self, principal: Option<&Principal>, id: i64, upd: UserUpdate) -> ServiceResult<User> {
        let mut tx = self.db.begin_tx().await?;
        let user = update_user(&mut tx, principal, id, upd).await?;
        tx.commit().await?;
        Ok(user)
    }

    async fn delete_user(&self, principal: Option<&Principal>, id: i64) -> ServiceResult<()> {
        let mut tx = self.db.begin_tx().await?;
        delete_user(&mut tx, principal, id).await?;
        tx.commit().await?;
        Ok(())
    }
}
