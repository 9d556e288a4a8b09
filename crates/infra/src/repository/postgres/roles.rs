use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;

use profilehub_core::{Page, RoleId};
use profilehub_profiles::Role;

use super::{count, map_sqlx_error, page_bounds};
use crate::repository::{RoleRepository, StoreError, StoreResult};

#[derive(Debug, Clone)]
pub struct PgRoleRepository {
    pool: Arc<PgPool>,
}

impl PgRoleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

fn decode(row: &PgRow) -> Result<Role, sqlx::Error> {
    Ok(Role {
        id: RoleId::new(row.try_get("id")?),
        name: row.try_get("name")?,
    })
}

fn decode_all(rows: &[PgRow]) -> StoreResult<Vec<Role>> {
    Ok(rows.iter().map(decode).collect::<Result<Vec<_>, _>>()?)
}

#[async_trait]
impl RoleRepository for PgRoleRepository {
    #[instrument(skip(self), fields(role_id = %id), err)]
    async fn get(&self, id: RoleId) -> StoreResult<Option<Role>> {
        let row = sqlx::query("SELECT id, name FROM roles WHERE id = $1")
            .bind(id.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_role", e))?;
        Ok(row.as_ref().map(decode).transpose()?)
    }

    #[instrument(skip(self), err)]
    async fn get_by_name(&self, name: &str) -> StoreResult<Option<Role>> {
        let row = sqlx::query("SELECT id, name FROM roles WHERE name = $1")
            .bind(name)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_role_by_name", e))?;
        Ok(row.as_ref().map(decode).transpose()?)
    }

    #[instrument(skip(self, ids), fields(requested = ids.len()), err)]
    async fn get_many(&self, ids: &[RoleId]) -> StoreResult<Vec<Role>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i32> = ids.iter().map(|id| id.get()).collect();
        let rows = sqlx::query("SELECT id, name FROM roles WHERE id = ANY($1) ORDER BY id ASC")
            .bind(&ids)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_roles", e))?;
        decode_all(&rows)
    }

    #[instrument(skip(self), err)]
    async fn list(&self, page: Page) -> StoreResult<(Vec<Role>, u64)> {
        let (offset, limit) = page_bounds(page);
        let rows = sqlx::query("SELECT id, name FROM roles ORDER BY id ASC OFFSET $1 LIMIT $2")
            .bind(offset)
            .bind(limit)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_roles", e))?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM roles")
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_roles", e))?;

        Ok((decode_all(&rows)?, count(total)))
    }

    #[instrument(skip(self), err)]
    async fn insert(&self, name: &str) -> StoreResult<Role> {
        let row = sqlx::query("INSERT INTO roles (name) VALUES ($1) RETURNING id, name")
            .bind(name)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_role", e))?;
        Ok(decode(&row)?)
    }

    #[instrument(skip(self), fields(role_id = %id), err)]
    async fn rename(&self, id: RoleId, name: &str) -> StoreResult<Role> {
        let row = sqlx::query("UPDATE roles SET name = $2 WHERE id = $1 RETURNING id, name")
            .bind(id.get())
            .bind(name)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("rename_role", e))?
            .ok_or(StoreError::NotFound("Role"))?;
        Ok(decode(&row)?)
    }

    #[instrument(skip(self), fields(role_id = %id), err)]
    async fn delete(&self, id: RoleId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id.get())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_role", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("Role"));
        }
        Ok(())
    }
}
