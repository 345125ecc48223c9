//! Principal-authored comments on activities.

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;

use super::listing::{ListQuery, OrderColumn};

#[derive(Clone)]
pub struct CommentStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Comment {
    pub id: i64,
    pub body: String,
    pub disabled: bool,
    pub author_id: i64,
    /// Author's username.
    pub author: String,
    pub activity_id: i64,
    pub last_updated_by: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewComment {
    #[serde(default)]
    pub body: String,
    pub activity_id: Option<i64>,
}

impl NewComment {
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.body.trim().is_empty() {
            Some("body")
        } else if self.activity_id.is_none() {
            Some("activity_id")
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommentUpdate {
    pub body: Option<String>,
    pub disabled: Option<bool>,
}

impl CommentUpdate {
    pub fn invalid_field(&self) -> Option<&'static str> {
        self.body
            .as_deref()
            .is_some_and(|body| body.trim().is_empty())
            .then_some("body")
    }
}

macro_rules! select_comment {
    ($tail:literal) => {
        concat!(
            "SELECT c.id, c.body, c.disabled, c.author_id, u.username AS author, c.activity_id,
                c.last_updated_by, c.created_at, c.updated_at
            FROM comments c JOIN users u ON u.id = c.author_id ",
            $tail
        )
    };
}

impl CommentStore {
    pub const ORDER_COLUMNS: &'static [&'static str] = &["created_at", "updated_at", "id"];

    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, comment: &NewComment, author: i64) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO comments (body, author_id, activity_id, last_updated_by)
             VALUES (?, ?, ?, ?)",
        )
        .bind(comment.body.trim())
        .bind(author)
        .bind(comment.activity_id)
        .bind(author)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get(&self, id: i64) -> Result<Option<Comment>, sqlx::Error> {
        sqlx::query_as(select_comment!("WHERE c.id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn update(
        &self,
        id: i64,
        update: &CommentUpdate,
        actor: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE comments SET
                body = COALESCE(?, body),
                disabled = COALESCE(?, disabled),
                last_updated_by = ?,
                updated_at = datetime('now')
             WHERE id = ?",
        )
        .bind(update.body.as_deref().map(str::trim))
        .bind(update.disabled)
        .bind(actor)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// List comments, optionally restricted to `query.activity_id`. Disabled
    /// comments are skipped unless `include_disabled`.
    pub async fn list(
        &self,
        query: &ListQuery,
        order: OrderColumn,
        include_disabled: bool,
    ) -> Result<Vec<Comment>, sqlx::Error> {
        sqlx::query_as(select_comment!(
            "WHERE (?1 IS NULL OR c.body LIKE '%' || ?1 || '%')
               AND (?6 IS NULL OR c.activity_id = ?6)
               AND (?7 OR c.disabled = 0)
             ORDER BY
                CASE WHEN ?3 = 'asc' THEN CASE ?2
                    WHEN 'created_at' THEN c.created_at
                    WHEN 'updated_at' THEN c.updated_at
                    ELSE c.id END END ASC,
                CASE WHEN ?3 = 'desc' THEN CASE ?2
                    WHEN 'created_at' THEN c.created_at
                    WHEN 'updated_at' THEN c.updated_at
                    ELSE c.id END END DESC,
                c.id ASC
             LIMIT ?4 OFFSET ?5"
        ))
        .bind(query.term())
        .bind(order.as_str())
        .bind(query.dir.as_str())
        .bind(query.limit())
        .bind(query.offset())
        .bind(query.activity_id)
        .bind(include_disabled)
        .fetch_all(&self.pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{db_with_user, first_user_id};
    use crate::db::{Database, NewActivity, NewActivityType};

    async fn activities(db: &Database, actor: i64) -> (i64, i64) {
        let kind = db
            .activity_types()
            .create(&NewActivityType { name: "Hike".to_string() }, actor)
            .await
            .unwrap();
        let mut ids = Vec::new();
        for name in ["Ridge Walk", "Lake Loop"] {
            let new_activity = NewActivity {
                name: name.to_string(),
                description: String::new(),
                activity_type_id: Some(kind),
                source: "club".to_string(),
                multi_day: false,
            };
            ids.push(db.activities().create(&new_activity, actor).await.unwrap());
        }
        (ids[0], ids[1])
    }

    fn comment(body: &str, activity_id: i64) -> NewComment {
        NewComment {
            body: body.to_string(),
            activity_id: Some(activity_id),
        }
    }

    #[tokio::test]
    async fn test_list_by_activity_hides_disabled() {
        let db = db_with_user().await;
        let author = first_user_id(&db).await;
        let (ridge, lake) = activities(&db, author).await;
        let store = db.comments();

        let first = store.create(&comment("Windy on top", ridge), author).await.unwrap();
        store.create(&comment("Great views", ridge), author).await.unwrap();
        store.create(&comment("Muddy", lake), author).await.unwrap();

        let disable = CommentUpdate {
            disabled: Some(true),
            ..Default::default()
        };
        assert!(store.update(first, &disable, author).await.unwrap());

        let query = ListQuery {
            activity_id: Some(ridge),
            ..Default::default()
        };
        let order = query.order_column(CommentStore::ORDER_COLUMNS).unwrap();

        let visible = store.list(&query, order, false).await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].body, "Great views");
        assert_eq!(visible[0].author, "curator");

        let all = store.list(&query, order, true).await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().any(|c| c.id == first && c.disabled));
    }

    #[tokio::test]
    async fn test_unknown_activity_is_rejected() {
        let db = db_with_user().await;
        let author = first_user_id(&db).await;

        let err = db
            .comments()
            .create(&comment("Lost", 999), author)
            .await
            .unwrap_err();
        assert!(crate::db::is_foreign_key_violation(&err));
    }

    #[test]
    fn test_missing_and_invalid_fields() {
        let blank = NewComment {
            body: " ".to_string(),
            activity_id: Some(1),
        };
        assert_eq!(blank.missing_field(), Some("body"));
        assert_eq!(comment("Nice", 1).missing_field(), None);

        let update = CommentUpdate {
            body: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(update.invalid_field(), Some("body"));
    }
}
