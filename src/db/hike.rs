use serde::Serialize;
use sqlx::sqlite::SqlitePool;

/// Which activities a user has completed.
#[derive(Clone)]
pub struct HikeStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Hike {
    pub id: i64,
    pub user_id: i64,
    pub activity_id: i64,
    pub created_at: String,
}

impl HikeStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record a hike. Adding the same pair twice returns the existing row.
    pub async fn add(&self, user_id: i64, activity_id: i64) -> Result<Hike, sqlx::Error> {
        sqlx::query(
            "INSERT INTO hikes (user_id, activity_id) VALUES (?, ?)
             ON CONFLICT(user_id, activity_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(activity_id)
        .execute(&self.pool)
        .await?;

        sqlx::query_as(
            "SELECT id, user_id, activity_id, created_at FROM hikes
             WHERE user_id = ? AND activity_id = ?",
        )
        .bind(user_id)
        .bind(activity_id)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn get(&self, user_id: i64, activity_id: i64) -> Result<Option<Hike>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, user_id, activity_id, created_at FROM hikes
             WHERE user_id = ? AND activity_id = ?",
        )
        .bind(user_id)
        .bind(activity_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Returns true if a row was deleted.
    pub async fn remove(&self, user_id: i64, activity_id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM hikes WHERE user_id = ? AND activity_id = ?")
            .bind(user_id)
            .bind(activity_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use crate::db::{NewActivity, NewActivityType, test_support};

    #[tokio::test]
    async fn test_add_is_idempotent_and_remove() {
        let db = test_support::db_with_user().await;
        let user = test_support::first_user_id(&db).await;
        let kind = db
            .activity_types()
            .create(
                &NewActivityType {
                    name: "Hike".to_string(),
                },
                user,
            )
            .await
            .unwrap();
        let activity = db
            .activities()
            .create(
                &NewActivity {
                    name: "Ridge".to_string(),
                    description: String::new(),
                    activity_type_id: Some(kind),
                    source: "map".to_string(),
                    multi_day: true,
                },
                user,
            )
            .await
            .unwrap();

        assert!(db.hikes().get(user, activity).await.unwrap().is_none());

        let first = db.hikes().add(user, activity).await.unwrap();
        let second = db.hikes().add(user, activity).await.unwrap();
        assert_eq!(first.id, second.id);

        assert!(db.hikes().remove(user, activity).await.unwrap());
        assert!(!db.hikes().remove(user, activity).await.unwrap());
        assert!(db.hikes().get(user, activity).await.unwrap().is_none());
    }
}
