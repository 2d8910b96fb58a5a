use async_trait::async_trait;
use sqlx::{postgres::PgRow, Row};

use super::{unique_violation, PageQuery, PgStore, Tx};
use crate::models::{
    require_principal, Principal, Profile, ProfileFilter, ProfileUpdate, ServiceError, ServiceResult,
};
use crate::services::{messages as msg, ProfileService};

const COLUMNS: &str = "id, user_id, first_name, last_name, date_of_birth, gender, height, weight, created_at, updated_at";

fn profile_from_row(row: &PgRow) -> Result<Profile, sqlx::Error> {
    Ok(Profile {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        date_of_birth: row.try_get("date_of_birth")?,
        gender: row.try_get("gender")?,
        height: row.try_get("height")?,
        weight: row.try_get("weight")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

async fn find_profiles(tx: &mut Tx, filter: &ProfileFilter) -> ServiceResult<(Vec<Profile>, i64)> {
    let page = PageQuery {
        table: "profile",
        columns: COLUMNS,
        order_by: "id ASC",
        offset: filter.offset,
        limit: filter.limit,
    };
    page.fetch(
        tx,
        |q| {
            q.eq("id", filter.id)
                .eq("user_id", filter.user_id)
                .eq("first_name", filter.first_name.clone())
                .eq("last_name", filter.last_name.clone())
                .eq("date_of_birth", filter.date_of_birth)
                .eq("gender", filter.gender.clone())
                .eq("height", filter.height)
                .eq("weight", filter.weight);
        },
        profile_from_row,
    )
    .await
}

async fn find_one(tx: &mut Tx, filter: ProfileFilter) -> ServiceResult<Profile> {
    let (profiles, _) = find_profiles(tx, &filter).await?;
    profiles.into_iter().next().ok_or_else(|| ServiceError::not_found(msg::PROFILE_NOT_FOUND))
}

async fn create_profile(tx: &mut Tx, principal: Option<&Principal>, profile: &mut Profile) -> ServiceResult<()> {
    let principal = require_principal(principal, msg::PROFILE_LOGIN_REQUIRED)?;
    profile.user_id = principal.id();
    profile.created_at = tx.now();
    profile.updated_at = tx.now();
    profile.validate()?;

    let (_, existing) = find_profiles(tx, &ProfileFilter::by_user_id(profile.user_id)).await?;
    if existing > 0 {
        return Err(ServiceError::conflict(msg::PROFILE_EXISTS));
    }

    let row = sqlx::query(
        r#"INSERT INTO profile (user_id, first_name, last_name, date_of_birth, gender, height, weight, created_at, updated_at)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
           RETURNING id"#,
    )
    .bind(profile.user_id)
    .bind(&profile.first_name)
    .bind(&profile.last_name)
    .bind(profile.date_of_birth)
    .bind(&profile.gender)
    .bind(profile.height)
    .bind(profile.weight)
    .bind(profile.created_at)
    .bind(profile.updated_at)
    .fetch_one(tx.conn())
    .await
    .map_err(|e| match unique_violation(&e).as_deref() {
        // lost a race with a concurrent create for the same user
        Some("profile_user_id_key") => ServiceError::conflict(msg::PROFILE_EXISTS),
        _ => e.into(),
    })?;

    profile.id = row.try_get("id")?;
    Ok(())
}

async fn owned_profile(tx: &mut Tx, principal: Option<&Principal>, id: i64) -> ServiceResult<Profile> {
    let principal = require_principal(principal, msg::LOGIN_REQUIRED)?;
    let profile = find_one(tx, ProfileFilter::by_id(id)).await?;
    if profile.user_id != principal.id() {
        return Err(ServiceError::unauthorized(msg::PROFILE_FORBIDDEN));
    }
    Ok(profile)
}

async fn update_profile(
    tx: &mut Tx,
    principal: Option<&Principal>,
    id: i64,
    upd: ProfileUpdate,
) -> ServiceResult<Profile> {
    let mut profile = owned_profile(tx, principal, id).await?;
    upd.apply(&mut profile);
    profile.updated_at = tx.now();
    profile.validate()?;

    sqlx::query(
        r#"UPDATE profile
           SET first_name = $1, last_name = $2, date_of_birth = $3, gender = $4, height = $5, weight = $6, updated_at = $7
           WHERE id = $8"#,
    )
    .bind(&profile.first_name)
    .bind(&profile.last_name)
    .bind(profile.date_of_birth)
    .bind(&profile.gender)
    .bind(profile.height)
    .bind(profile.weight)
    .bind(profile.updated_at)
    .bind(profile.id)
    .execute(tx.conn())
    .await?;

    Ok(profile)
}

async fn delete_profile(tx: &mut Tx, principal: Option<&Principal>, id: i64) -> ServiceResult<()> {
    let profile = owned_profile(tx, principal, id).await?;
    sqlx::query("DELETE FROM profile WHERE id = $1")
        .bind(profile.id)
        .execute(tx.conn())
        .await?;
    Ok(())
}

#[async_trait]
impl ProfileService for PgStore {
    async fn find_profile_by_id(&self, id: i64) -> ServiceResult<Profile> {
        let mut tx = self.db.begin_tx().await?;
        find_one(&mut tx, ProfileFilter::by_id(id)).await
    }

    async fn find_profile_by_user_id(&self, user_id: i64) -> ServiceResult<Profile> {
        let mut tx = self.db.begin_tx().await?;
        find_one(&mut tx, ProfileFilter::by_user_id(user_id)).await
    }

    async fn find_profiles(&self, filter: ProfileFilter) -> ServiceResult<(Vec<Profile>, i64)> {
        let mut tx = self.db.begin_tx().await?;
        find_profiles(&mut tx, &filter).await
    }

    async fn create_profile(&self, principal: Option<&Principal>, profile: &mut Profile) -> ServiceResult<()> {
        let mut tx = self.db.begin_tx().await?;
        create_profile(&mut tx, principal, profile).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn update_profile(&self, principal: Option<&Principal>, id: i64, upd: ProfileUpdate) -> ServiceResult<Profile> {
        let mut tx = self.db.begin_tx().await?;
        let profile = update_profile(&mut tx, principal, id, upd).await?;
        tx.commit().await?;
        Ok(profile)
    }

    async fn delete_profile(&self, principal: Option<&Principal>, id: i64) -> ServiceResult<()> {
        let mut tx = self.db.begin_tx().await?;
        delete_profile(&mut tx, principal, id).await?;
        tx.commit().await?;
        Ok(())
    }
}
