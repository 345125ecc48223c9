use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;

use super::listing::{ListQuery, OrderColumn};

#[derive(Clone)]
pub struct CountryStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Country {
    pub id: i64,
    pub name: String,
    pub abbreviation: String,
    pub last_updated_by: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewCountry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub abbreviation: String,
}

impl NewCountry {
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.name.trim().is_empty() {
            Some("name")
        } else if self.abbreviation.trim().is_empty() {
            Some("abbreviation")
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CountryUpdate {
    pub name: Option<String>,
    pub abbreviation: Option<String>,
}

impl CountryStore {
    pub const ORDER_COLUMNS: &'static [&'static str] =
        &["name", "abbreviation", "created_at", "updated_at", "id"];

    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, country: &NewCountry, actor: i64) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO countries (name, abbreviation, last_updated_by) VALUES (?, ?, ?)",
        )
        .bind(country.name.trim())
        .bind(country.abbreviation.trim())
        .bind(actor)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get(&self, id: i64) -> Result<Option<Country>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, name, abbreviation, last_updated_by, created_at, updated_at
             FROM countries WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Apply the fields present in `update`. Returns false if the row is gone.
    pub async fn update(
        &self,
        id: i64,
        update: &CountryUpdate,
        actor: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE countries SET
                name = COALESCE(?, name),
                abbreviation = COALESCE(?, abbreviation),
                last_updated_by = ?,
                updated_at = datetime('now')
             WHERE id = ?",
        )
        .bind(update.name.as_deref())
        .bind(update.abbreviation.as_deref())
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
    ) -> Result<Vec<Country>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, name, abbreviation, last_updated_by, created_at, updated_at
             FROM countries
             WHERE (?1 IS NULL OR name LIKE '%' || ?1 || '%' OR abbreviation LIKE '%' || ?1 || '%')
             ORDER BY
                CASE WHEN ?3 = 'asc' THEN CASE ?2
                    WHEN 'name' THEN name
                    WHEN 'abbreviation' THEN abbreviation
                    WHEN 'created_at' THEN created_at
                    WHEN 'updated_at' THEN updated_at
                    ELSE id END END ASC,
                CASE WHEN ?3 = 'desc' THEN CASE ?2
                    WHEN 'name' THEN name
                    WHEN 'abbreviation' THEN abbreviation
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
