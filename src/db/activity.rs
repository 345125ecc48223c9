use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;

use super::listing::{ListQuery, OrderColumn};

const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Clone)]
pub struct ActivityStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Activity {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub activity_type_id: i64,
    pub source: String,
    pub multi_day: bool,
    pub last_updated_by: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewActivity {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub activity_type_id: Option<i64>,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub multi_day: bool,
}

impl NewActivity {
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.name.trim().is_empty() {
            Some("name")
        } else if self.activity_type_id.is_none() {
            Some("activity_type_id")
        } else if self.source.trim().is_empty() {
            Some("source")
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActivityUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub activity_type_id: Option<i64>,
    pub source: Option<String>,
    pub multi_day: Option<bool>,
}

/// An activity found near a point, with the closest of its locations.
#[derive(Debug, Clone, Serialize)]
pub struct NearbyActivity {
    #[serde(flatten)]
    pub activity: Activity,
    pub location_id: i64,
    pub location_name: String,
    /// Kilometres, rounded up.
    pub distance: f64,
}

#[derive(sqlx::FromRow)]
struct NearbyRow {
    id: i64,
    name: String,
    description: String,
    activity_type_id: i64,
    source: String,
    multi_day: bool,
    last_updated_by: i64,
    created_at: String,
    updated_at: String,
    location_id: i64,
    location_name: String,
    lat: f64,
    long: f64,
}

impl ActivityStore {
    pub const ORDER_COLUMNS: &'static [&'static str] = &[
        "name",
        "activity_type_id",
        "source",
        "multi_day",
        "created_at",
        "updated_at",
        "id",
    ];

    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, activity: &NewActivity, actor: i64) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO activities
                (name, description, activity_type_id, source, multi_day, last_updated_by)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(activity.name.trim())
        .bind(&activity.description)
        .bind(activity.activity_type_id)
        .bind(activity.source.trim())
        .bind(activity.multi_day)
        .bind(actor)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get(&self, id: i64) -> Result<Option<Activity>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, name, description, activity_type_id, source, multi_day,
                    last_updated_by, created_at, updated_at
             FROM activities WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn update(
        &self,
        id: i64,
        update: &ActivityUpdate,
        actor: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE activities SET
                name = COALESCE(?, name),
                description = COALESCE(?, description),
                activity_type_id = COALESCE(?, activity_type_id),
                source = COALESCE(?, source),
                multi_day = COALESCE(?, multi_day),
                last_updated_by = ?,
                updated_at = datetime('now')
             WHERE id = ?",
        )
        .bind(update.name.as_deref())
        .bind(update.description.as_deref())
        .bind(update.activity_type_id)
        .bind(update.source.as_deref())
        .bind(update.multi_day)
        .bind(actor)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// List activities, optionally restricted to `query.activity_type_id`.
    /// The term matches the name only; see [`Self::search`] for descriptions.
    pub async fn list(
        &self,
        query: &ListQuery,
        order: OrderColumn,
    ) -> Result<Vec<Activity>, sqlx::Error> {
        self.query_page(query, order, false).await
    }

    /// Term search over name and description.
    pub async fn search(
        &self,
        query: &ListQuery,
        order: OrderColumn,
    ) -> Result<Vec<Activity>, sqlx::Error> {
        self.query_page(query, order, true).await
    }

    async fn query_page(
        &self,
        query: &ListQuery,
        order: OrderColumn,
        match_description: bool,
    ) -> Result<Vec<Activity>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, name, description, activity_type_id, source, multi_day,
                    last_updated_by, created_at, updated_at
             FROM activities
             WHERE (?1 IS NULL OR name LIKE '%' || ?1 || '%'
                    OR (?7 AND description LIKE '%' || ?1 || '%'))
               AND (?6 IS NULL OR activity_type_id = ?6)
             ORDER BY
                CASE WHEN ?3 = 'asc' THEN CASE ?2
                    WHEN 'name' THEN name
                    WHEN 'activity_type_id' THEN activity_type_id
                    WHEN 'source' THEN source
                    WHEN 'multi_day' THEN multi_day
                    WHEN 'created_at' THEN created_at
                    WHEN 'updated_at' THEN updated_at
                    ELSE id END END ASC,
                CASE WHEN ?3 = 'desc' THEN CASE ?2
                    WHEN 'name' THEN name
                    WHEN 'activity_type_id' THEN activity_type_id
                    WHEN 'source' THEN source
                    WHEN 'multi_day' THEN multi_day
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
        .bind(query.activity_type_id)
        .bind(match_description)
        .fetch_all(&self.pool)
        .await
    }

    /// Activities with at least one location within `dist_km` of the point,
    /// nearest first, each activity reported once with its closest location.
    pub async fn nearby(
        &self,
        lat: f64,
        long: f64,
        dist_km: f64,
        limit: i64,
    ) -> Result<Vec<NearbyActivity>, sqlx::Error> {
        // Coarse box in degrees; the exact cut happens below.
        let delta = 3.0 * dist_km / 100.0;
        let rows: Vec<NearbyRow> = sqlx::query_as(
            "SELECT a.id, a.name, a.description, a.activity_type_id, a.source, a.multi_day,
                    a.last_updated_by, a.created_at, a.updated_at,
                    l.id AS location_id, l.name AS location_name, l.lat, l.long
             FROM activities a
             JOIN location_activities la ON la.activity_id = a.id
             JOIN locations l ON l.id = la.location_id
             WHERE l.lat BETWEEN ? AND ? AND l.long BETWEEN ? AND ?",
        )
        .bind(lat - delta)
        .bind(lat + delta)
        .bind(long - delta)
        .bind(long + delta)
        .fetch_all(&self.pool)
        .await?;

        let mut found: Vec<NearbyActivity> = rows
            .into_iter()
            .map(|row| {
                let distance = haversine_km(lat, long, row.lat, row.long);
                NearbyActivity {
                    activity: Activity {
                        id: row.id,
                        name: row.name,
                        description: row.description,
                        activity_type_id: row.activity_type_id,
                        source: row.source,
                        multi_day: row.multi_day,
                        last_updated_by: row.last_updated_by,
                        created_at: row.created_at,
                        updated_at: row.updated_at,
                    },
                    location_id: row.location_id,
                    location_name: row.location_name,
                    distance,
                }
            })
            .filter(|n| n.distance <= dist_km)
            .collect();

        found.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.activity.id.cmp(&b.activity.id))
        });
        let mut seen = std::collections::HashSet::new();
        found.retain(|n| seen.insert(n.activity.id));
        found.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(found)
    }
}

/// Great-circle distance in kilometres, rounded up to the next whole km.
pub fn haversine_km(lat1: f64, long1: f64, lat2: f64, long2: f64) -> f64 {
    let (lat1, lat2) = (lat1.to_radians(), lat2.to_radians());
    let d_lat = lat2 - lat1;
    let d_long = (long2 - long1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_long / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    (EARTH_RADIUS_KM * c).ceil()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{
        NewActivityType, NewCountry, NewLocation, NewLocationActivity, NewRegion, test_support,
    };

    #[test]
    fn test_haversine() {
        assert_eq!(haversine_km(46.0, 7.0, 46.0, 7.0), 0.0);
        // Zermatt to Grindelwald, roughly 71 km.
        let d = haversine_km(46.0207, 7.7491, 46.6242, 8.0414);
        assert!((70.0..=72.0).contains(&d), "got {d}");
        assert_eq!(d, d.ceil());
    }

    async fn seed(db: &crate::db::Database, actor: i64) -> (i64, i64) {
        let country = db
            .countries()
            .create(
                &NewCountry {
                    name: "Switzerland".to_string(),
                    abbreviation: "CH".to_string(),
                },
                actor,
            )
            .await
            .unwrap();
        let region = db
            .regions()
            .create(
                &NewRegion {
                    name: "Valais".to_string(),
                    country_id: Some(country),
                },
                actor,
            )
            .await
            .unwrap();
        let activity_type = db
            .activity_types()
            .create(
                &NewActivityType {
                    name: "Hike".to_string(),
                },
                actor,
            )
            .await
            .unwrap();
        (region, activity_type)
    }

    fn activity(name: &str, description: &str, activity_type_id: i64) -> NewActivity {
        NewActivity {
            name: name.to_string(),
            description: description.to_string(),
            activity_type_id: Some(activity_type_id),
            source: "guidebook".to_string(),
            multi_day: false,
        }
    }

    #[tokio::test]
    async fn test_search_matches_description() {
        let db = test_support::db_with_user().await;
        let actor = test_support::first_user_id(&db).await;
        let (_, kind) = seed(&db, actor).await;

        db.activities()
            .create(&activity("Hörnli Trail", "glacier views", kind), actor)
            .await
            .unwrap();
        db.activities()
            .create(&activity("Glacier Loop", "easy", kind), actor)
            .await
            .unwrap();
        db.activities()
            .create(&activity("Forest Walk", "shade", kind), actor)
            .await
            .unwrap();

        let query = ListQuery {
            term: Some("glacier".to_string()),
            ..Default::default()
        };
        let order = query.order_column(ActivityStore::ORDER_COLUMNS).unwrap();

        let listed = db.activities().list(&query, order).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "Glacier Loop");

        let found = db.activities().search(&query, order).await.unwrap();
        let names: Vec<_> = found.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Glacier Loop", "Hörnli Trail"]);
    }

    #[tokio::test]
    async fn test_nearby_keeps_closest_location_once() {
        let db = test_support::db_with_user().await;
        let actor = test_support::first_user_id(&db).await;
        let (region, kind) = seed(&db, actor).await;

        let mut location_ids = Vec::new();
        for (name, lat, long) in [
            ("Zermatt", 46.0207, 7.7491),
            ("Täsch", 46.0700, 7.7780),
            ("Geneva", 46.2044, 6.1432),
        ] {
            let id = db
                .locations()
                .create(
                    &NewLocation {
                        name: name.to_string(),
                        lat: Some(lat),
                        long: Some(long),
                        region_id: Some(region),
                        location_type_id: None,
                    },
                    actor,
                )
                .await
                .unwrap();
            location_ids.push(id);
        }

        let near = db
            .activities()
            .create(&activity("Matterhorn Trail", "", kind), actor)
            .await
            .unwrap();
        let far = db
            .activities()
            .create(&activity("Lake Walk", "", kind), actor)
            .await
            .unwrap();
        for (location, activity) in [(0, near), (1, near), (2, far)] {
            db.locations()
                .link_activity(
                    &NewLocationActivity {
                        location_id: Some(location_ids[location]),
                        activity_id: Some(activity),
                    },
                    actor,
                )
                .await
                .unwrap();
        }

        let found = db.activities().nearby(46.0207, 7.7491, 20.0, 10).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].activity.id, near);
        assert_eq!(found[0].location_id, location_ids[0]);
        assert_eq!(found[0].distance, 0.0);
    }
}
