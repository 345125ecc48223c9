use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;

use super::listing::{ListQuery, OrderColumn};

#[derive(Clone)]
pub struct RegionStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Region {
    pub id: i64,
    pub name: String,
    pub country_id: i64,
    pub last_updated_by: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewRegion {
    #[serde(default)]
    pub name: String,
    pub country_id: Option<i64>,
}

impl NewRegion {
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.name.trim().is_empty() {
            Some("name")
        } else if self.country_id.is_none() {
            Some("country_id")
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegionUpdate {
    pub name: Option<String>,
    pub country_id: Option<i64>,
}

impl RegionStore {
    pub const ORDER_COLUMNS: &'static [&'static str] =
        &["name", "country_id", "created_at", "updated_at", "id"];

    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Fails with a foreign key violation if the country does not exist.
    pub async fn create(&self, region: &NewRegion, actor: i64) -> Result<i64, sqlx::Error> {
        let result =
            sqlx::query("INSERT INTO regions (name, country_id, last_updated_by) VALUES (?, ?, ?)")
                .bind(region.name.trim())
                .bind(region.country_id)
                .bind(actor)
                .execute(&self.pool)
                .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get(&self, id: i64) -> Result<Option<Region>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, name, country_id, last_updated_by, created_at, updated_at
             FROM regions WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn update(
        &self,
        id: i64,
        update: &RegionUpdate,
        actor: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE regions SET
                name = COALESCE(?, name),
                country_id = COALESCE(?, country_id),
                last_updated_by = ?,
                updated_at = datetime('now')
             WHERE id = ?",
        )
        .bind(update.name.as_deref())
        .bind(update.country_id)
        .bind(actor)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// List regions, optionally restricted to `query.country_id`.
    pub async fn list(
        &self,
        query: &ListQuery,
        order: OrderColumn,
    ) -> Result<Vec<Region>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, name, country_id, last_updated_by, created_at, updated_at
             FROM regions
             WHERE (?1 IS NULL OR name LIKE '%' || ?1 || '%')
               AND (?6 IS NULL OR country_id = ?6)
             ORDER BY
                CASE WHEN ?3 = 'asc' THEN CASE ?2
                    WHEN 'name' THEN name
                    WHEN 'country_id' THEN country_id
                    WHEN 'created_at' THEN created_at
                    WHEN 'updated_at' THEN updated_at
                    ELSE id END END ASC,
                CASE WHEN ?3 = 'desc' THEN CASE ?2
                    WHEN 'name' THEN name
                    WHEN 'country_id' THEN country_id
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
        .bind(query.country_id)
        .fetch_all(&self.pool)
        .await
    }
}
