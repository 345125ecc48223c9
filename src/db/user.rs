use serde::Serialize;
use sqlx::sqlite::SqlitePool;

use crate::auth::Permissions;

#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

/// A principal with its role's permissions resolved.
///
/// The password hash and the session marker are never serialized.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role_id: Option<i64>,
    pub role: Option<String>,
    pub permissions: Permissions,
    pub approved: bool,
    pub confirmed: bool,
    #[serde(skip_serializing)]
    pub session_id: String,
    pub last_updated_by: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    email: String,
    password_hash: String,
    role_id: Option<i64>,
    role_name: Option<String>,
    permissions: Option<i64>,
    approved: i32,
    confirmed: i32,
    session_id: String,
    last_updated_by: String,
    created_at: String,
    updated_at: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            role_id: row.role_id,
            role: row.role_name,
            permissions: Permissions::from_bits(row.permissions.unwrap_or(0)),
            approved: row.approved != 0,
            confirmed: row.confirmed != 0,
            session_id: row.session_id,
            last_updated_by: row.last_updated_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Row for the admin user listing.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: Option<String>,
    pub approved: bool,
    pub confirmed: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub session_id: &'a str,
    pub role_id: Option<i64>,
}

macro_rules! select_user {
    ($tail:literal) => {
        concat!(
            "SELECT u.id, u.username, u.email, u.password_hash, u.role_id,
                r.name AS role_name, r.permissions, u.approved, u.confirmed, u.session_id,
                u.last_updated_by, u.created_at, u.updated_at
            FROM users u LEFT JOIN roles r ON r.id = u.role_id ",
            $tail
        )
    };
}

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a principal, unapproved and unconfirmed. Returns the new id.
    pub async fn create(&self, new_user: &NewUser<'_>) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO users (username, email, password_hash, role_id, session_id, last_updated_by)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(new_user.username)
        .bind(new_user.email)
        .bind(new_user.password_hash)
        .bind(new_user.role_id)
        .bind(new_user.session_id)
        .bind(new_user.username)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(select_user!("WHERE u.id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> =
            sqlx::query_as(select_user!("WHERE u.username = ?"))
                .bind(username)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(User::from))
    }

    /// Look a principal up by username or email, both case-insensitive.
    pub async fn get_by_login(&self, identifier: &str) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> =
            sqlx::query_as(select_user!("WHERE u.username = ?1 OR u.email = ?1 LIMIT 1"))
                .bind(identifier)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(User::from))
    }

    /// Exact match on the session marker.
    pub async fn get_by_session_id(&self, session_id: &str) -> Result<Option<User>, sqlx::Error> {
        if session_id.is_empty() {
            return Ok(None);
        }
        let row: Option<UserRow> =
            sqlx::query_as(select_user!("WHERE u.session_id = ? COLLATE BINARY"))
                .bind(session_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(User::from))
    }

    pub async fn list(&self) -> Result<Vec<UserSummary>, sqlx::Error> {
        sqlx::query_as(
            "SELECT u.id, u.username, u.email, r.name AS role, u.approved, u.confirmed, u.created_at
             FROM users u LEFT JOIN roles r ON r.id = u.role_id
             ORDER BY u.id",
        )
        .fetch_all(&self.pool)
        .await
    }

    /// Replace the session marker. Every bearer token naming the old marker
    /// stops resolving. Returns true if the user exists.
    pub async fn set_session_id(&self, id: i64, session_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET session_id = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(session_id)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark as approved. Returns true if the flag changed.
    pub async fn set_approved(&self, id: i64, actor: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET approved = 1, last_updated_by = ?, updated_at = datetime('now')
             WHERE id = ? AND approved = 0",
        )
        .bind(actor)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark as confirmed. Returns true if the flag changed.
    pub async fn set_confirmed(&self, id: i64, actor: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET confirmed = 1, last_updated_by = ?, updated_at = datetime('now')
             WHERE id = ? AND confirmed = 0",
        )
        .bind(actor)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_password_hash(
        &self,
        id: i64,
        password_hash: &str,
        actor: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = ?, last_updated_by = ?, updated_at = datetime('now')
             WHERE id = ?",
        )
        .bind(password_hash)
        .bind(actor)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Fails with a unique violation if another principal owns `email`.
    pub async fn set_email(&self, id: i64, email: &str, actor: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET email = ?, last_updated_by = ?, updated_at = datetime('now')
             WHERE id = ?",
        )
        .bind(email)
        .bind(actor)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark approved and confirmed in one step. Used when an operator creates
    /// an account directly.
    pub async fn activate(&self, id: i64, role_id: i64, actor: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET approved = 1, confirmed = 1, role_id = ?, last_updated_by = ?,
                updated_at = datetime('now')
             WHERE id = ?",
        )
        .bind(role_id)
        .bind(actor)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
