use serde::Serialize;
use sqlx::sqlite::SqlitePool;

use crate::auth::{Permission, Permissions};

/// Built-in roles as `(name, permissions, is_default)`.
pub const DEFAULT_ROLES: [(&str, &[Permission], bool); 4] = [
    ("Test User", &[Permission::Read], true),
    (
        "User",
        &[
            Permission::Read,
            Permission::Like,
            Permission::Follow,
            Permission::Comment,
        ],
        false,
    ),
    (
        "Advanced User",
        &[
            Permission::Read,
            Permission::Like,
            Permission::Follow,
            Permission::Comment,
            Permission::Create,
        ],
        false,
    ),
    (
        "Admin",
        &[
            Permission::Read,
            Permission::Like,
            Permission::Follow,
            Permission::Comment,
            Permission::Create,
            Permission::Admin,
        ],
        false,
    ),
];

#[derive(Clone)]
pub struct RoleStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub is_default: bool,
    pub permissions: Permissions,
}

#[derive(sqlx::FromRow)]
struct RoleRow {
    id: i64,
    name: String,
    is_default: i32,
    permissions: i64,
}

impl From<RoleRow> for Role {
    fn from(row: RoleRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            is_default: row.is_default != 0,
            permissions: Permissions::from_bits(row.permissions),
        }
    }
}

impl RoleStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the built-in roles, updating their permissions if they already
    /// exist. Exactly one role ends up flagged as default.
    pub async fn insert_defaults(&self) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for (name, permissions, is_default) in DEFAULT_ROLES {
            let bits = permissions.iter().copied().collect::<Permissions>().bits();
            sqlx::query(
                "INSERT INTO roles (name, permissions, is_default, last_updated_by)
                 VALUES (?, ?, ?, 'system')
                 ON CONFLICT(name) DO UPDATE SET
                    permissions = excluded.permissions,
                    is_default = excluded.is_default,
                    updated_at = datetime('now')",
            )
            .bind(name)
            .bind(bits)
            .bind(is_default as i32)
            .execute(&mut *tx)
            .await?;
        }
        sqlx::query("UPDATE roles SET is_default = 0 WHERE is_default = 1 AND name <> ?")
            .bind(default_role_name())
            .execute(&mut *tx)
            .await?;
        tx.commit().await
    }

    pub async fn list(&self) -> Result<Vec<Role>, sqlx::Error> {
        let rows: Vec<RoleRow> = sqlx::query_as(
            "SELECT id, name, is_default, permissions FROM roles ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Role::from).collect())
    }

    pub async fn get_default(&self) -> Result<Option<Role>, sqlx::Error> {
        let row: Option<RoleRow> = sqlx::query_as(
            "SELECT id, name, is_default, permissions FROM roles WHERE is_default = 1 LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Role::from))
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Option<Role>, sqlx::Error> {
        let row: Option<RoleRow> = sqlx::query_as(
            "SELECT id, name, is_default, permissions FROM roles WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Role::from))
    }
}

fn default_role_name() -> &'static str {
    DEFAULT_ROLES
        .iter()
        .find(|(_, _, is_default)| *is_default)
        .map(|(name, _, _)| *name)
        .unwrap_or("Test User")
}
