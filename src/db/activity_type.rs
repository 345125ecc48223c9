use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;

use super::listing::{ListQuery, OrderColumn};

#[derive(Clone)]
pub struct ActivityTypeStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ActivityType {
    pub id: i64,
    pub name: String,
    pub last_updated_by: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewActivityType {
    #[serde(default)]
    pub name: String,
}

impl NewActivityType {
    pub fn missing_field(&self) -> Option<&'static str> {
        self.name.trim().is_empty().then_some("name")
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActivityTypeUpdate {
    pub name: Option<String>,
}

impl ActivityTypeStore {
    pub const ORDER_COLUMNS: &'static [&'static str] = &["name", "created_at", "updated_at", "id"];

    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        activity_type: &NewActivityType,
        actor: i64,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query("INSERT INTO activity_types (name, last_updated_by) VALUES (?, ?)")
            .bind(activity_type.name.trim())
            .bind(actor)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get(&self, id: i64) -> Result<Option<ActivityType>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, name, last_updated_by, created_at, updated_at
             FROM activity_types WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn update(
        &self,
        id: i64,
        update: &ActivityTypeUpdate,
        actor: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE activity_types SET
                name = COALESCE(?, name),
                last_updated_by = ?,
                updated_at = datetime('now')
             WHERE id = ?",
        )
        .bind(update.name.as_deref())
        .bind(actor)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list(
        &self,
        query: &ListQuery,
        order: OrderColumn,
    ) -> Result<Vec<ActivityType>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, name, last_updated_by, created_at, updated_at
             FROM activity_types
             WHERE (?1 IS NULL OR name LIKE '%' || ?1 || '%')
             ORDER BY
                CASE WHEN ?3 = 'asc' THEN CASE ?2
                    WHEN 'name' THEN name
                    WHEN 'created_at' THEN created_at
                    WHEN 'updated_at' THEN updated_at
                    ELSE id END END ASC,
                CASE WHEN ?3 = 'desc' THEN CASE ?2
                    WHEN 'name' THEN name
                    WHEN 'created_at' THEN created_at
                    WHEN 'updated_at' THEN updated_at
                    ELSE id END END DESC,
                id ASC
             LIMIT ?4 OFFSET ?5",
        )
        .bind(query.term())
        .bind(order.as_str())
        .bind(query.dir.as_str())
        .bind(query.limit())
        .bind(query.offset())
        .fetch_all(&self.pool)
        .await
    }
}
