use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;

use profilehub_core::{ItemId, Page, Timestamps, UserId};
use profilehub_items::Item;

use super::{count, is_foreign_key_violation, map_sqlx_error, page_bounds};
use crate::repository::{ItemRepository, StoreError, StoreResult};

#[derive(Debug, Clone)]
pub struct PgItemRepository {
    pool: Arc<PgPool>,
}

impl PgItemRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

fn decode(row: &PgRow) -> Result<Item, sqlx::Error> {
    Ok(Item {
        id: ItemId::from_uuid(row.try_get("id")?),
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        owner_id: UserId::from_uuid(row.try_get("owner_id")?),
        timestamps: Timestamps {
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        },
    })
}

fn decode_all(rows: &[PgRow]) -> StoreResult<Vec<Item>> {
    Ok(rows.iter().map(decode).collect::<Result<Vec<_>, _>>()?)
}

#[async_trait]
impl ItemRepository for PgItemRepository {
    #[instrument(skip(self), fields(item_id = %id), err)]
    async fn get(&self, id: ItemId) -> StoreResult<Option<Item>> {
        let row = sqlx::query(
            "SELECT id, title, description, owner_id, created_at, updated_at FROM items WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_item", e))?;

        Ok(row.as_ref().map(decode).transpose()?)
    }

    #[instrument(skip(self), fields(owner_id = %owner), err)]
    async fn list_by_owner(&self, owner: UserId, page: Page) -> StoreResult<(Vec<Item>, u64)> {
        let (offset, limit) = page_bounds(page);
        let rows = sqlx::query(
            r#"
            SELECT id, title, description, owner_id, created_at, updated_at
            FROM items
            WHERE owner_id = $1
            ORDER BY created_at ASC, id ASC
            OFFSET $2 LIMIT $3
            "#,
        )
        .bind(owner.as_uuid())
        .bind(offset)
        .bind(limit)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_items_by_owner", e))?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items WHERE owner_id = $1")
            .bind(owner.as_uuid())
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_items_by_owner", e))?;

        Ok((decode_all(&rows)?, count(total)))
    }

    #[instrument(skip(self, item), fields(item_id = %item.id, owner_id = %item.owner_id), err)]
    async fn insert(&self, item: &Item) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO items (id, title, description, owner_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(&item.title)
        .bind(&item.description)
        .bind(item.owner_id.as_uuid())
        .bind(item.timestamps.created_at)
        .bind(item.timestamps.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                StoreError::NotFound("User")
            } else {
                map_sqlx_error("insert_item", e)
            }
        })?;
        Ok(())
    }

    #[instrument(skip(self, item), fields(item_id = %item.id), err)]
    async fn update(&self, item: &Item) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE items SET title = $2, description = $3, updated_at = $4 WHERE id = $1",
        )
        .bind(item.id.as_uuid())
        .bind(&item.title)
        .bind(&item.description)
        .bind(item.timestamps.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_item", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("Item"));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(item_id = %id), err)]
    async fn delete(&self, id: ItemId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM items WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_item", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("Item"));
        }
        Ok(())
    }
}
