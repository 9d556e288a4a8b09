use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use profilehub_core::{RoleId, Timestamps, UserId};
use profilehub_profiles::{Profile, Role};

use super::{is_foreign_key_violation, map_sqlx_error};
use crate::repository::{ProfileRepository, StoreError, StoreResult};

const PROFILE_COLUMNS: &str =
    "user_id, first_name, last_name, avatar_url, bio, birth_date, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PgProfileRepository {
    pool: Arc<PgPool>,
}

impl PgProfileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

fn decode(row: &PgRow) -> Result<Profile, sqlx::Error> {
    Ok(Profile {
        user_id: UserId::from_uuid(row.try_get("user_id")?),
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        avatar_url: row.try_get("avatar_url")?,
        bio: row.try_get("bio")?,
        birth_date: row.try_get("birth_date")?,
        timestamps: Timestamps {
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        },
    })
}

pub(super) async fn insert_profile_row(
    tx: &mut Transaction<'_, Postgres>,
    profile: &Profile,
) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO profiles (
            user_id, first_name, last_name, avatar_url, bio, birth_date, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(profile.user_id.as_uuid())
    .bind(&profile.first_name)
    .bind(&profile.last_name)
    .bind(&profile.avatar_url)
    .bind(&profile.bio)
    .bind(profile.birth_date)
    .bind(profile.timestamps.created_at)
    .bind(profile.timestamps.updated_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| {
        if is_foreign_key_violation(&e) {
            StoreError::NotFound("User")
        } else {
            map_sqlx_error("insert_profile", e)
        }
    })?;
    Ok(())
}

async fn replace_roles(
    tx: &mut Transaction<'_, Postgres>,
    user_id: UserId,
    role_ids: &[RoleId],
) -> StoreResult<()> {
    sqlx::query("DELETE FROM profile_roles WHERE profile_user_id = $1")
        .bind(user_id.as_uuid())
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("clear_profile_roles", e))?;

    if role_ids.is_empty() {
        return Ok(());
    }

    let ids: Vec<i32> = role_ids.iter().map(|id| id.get()).collect();
    sqlx::query(
        r#"
        INSERT INTO profile_roles (profile_user_id, role_id)
        SELECT $1, role_id FROM UNNEST($2::INTEGER[]) AS t(role_id)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(user_id.as_uuid())
    .bind(&ids)
    .execute(&mut **tx)
    .await
    .map_err(|e| {
        if is_foreign_key_violation(&e) {
            StoreError::NotFound("Role")
        } else {
            map_sqlx_error("insert_profile_roles", e)
        }
    })?;
    Ok(())
}

#[async_trait]
impl ProfileRepository for PgProfileRepository {
    #[instrument(skip(self), fields(user_id = %user_id), err)]
    async fn get(&self, user_id: UserId) -> StoreResult<Option<Profile>> {
        let row = sqlx::query(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE user_id = $1"
        ))
        .bind(user_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_profile", e))?;

        Ok(row.as_ref().map(decode).transpose()?)
    }

    #[instrument(skip(self, profile), fields(user_id = %profile.user_id, role_count = role_ids.len()), err)]
    async fn insert(&self, profile: &Profile, role_ids: &[RoleId]) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        insert_profile_row(&mut tx, profile).await?;
        replace_roles(&mut tx, profile.user_id, role_ids).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    #[instrument(skip(self, profile, role_ids), fields(user_id = %profile.user_id, replaces_roles = role_ids.is_some()), err)]
    async fn update(&self, profile: &Profile, role_ids: Option<&[RoleId]>) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let result = sqlx::query(
            r#"
            UPDATE profiles SET
                first_name = $2,
                last_name = $3,
                avatar_url = $4,
                bio = $5,
                birth_date = $6,
                updated_at = $7
            WHERE user_id = $1
            "#,
        )
        .bind(profile.user_id.as_uuid())
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(&profile.avatar_url)
        .bind(&profile.bio)
        .bind(profile.birth_date)
        .bind(profile.timestamps.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_profile", e))?;

        if result.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(StoreError::NotFound("Profile"));
        }

        if let Some(role_ids) = role_ids {
            replace_roles(&mut tx, profile.user_id, role_ids).await?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %user_id), err)]
    async fn delete(&self, user_id: UserId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM profiles WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_profile", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("Profile"));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %user_id), err)]
    async fn roles_for(&self, user_id: UserId) -> StoreResult<Vec<Role>> {
        let rows = sqlx::query(
            r#"
            SELECT r.id, r.name
            FROM roles r
            JOIN profile_roles pr ON pr.role_id = r.id
            WHERE pr.profile_user_id = $1
            ORDER BY r.id ASC
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("roles_for_profile", e))?;

        rows.iter()
            .map(|row| -> StoreResult<Role> {
                Ok(Role {
                    id: RoleId::new(row.try_get("id")?),
                    name: row.try_get("name")?,
                })
            })
            .collect()
    }
}
