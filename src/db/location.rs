use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;

use super::listing::{ListQuery, OrderColumn};

#[derive(Clone)]
pub struct LocationStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Location {
    pub id: i64,
    pub name: String,
    pub lat: f64,
    pub long: f64,
    pub region_id: i64,
    pub location_type_id: Option<i64>,
    pub last_updated_by: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewLocation {
    #[serde(default)]
    pub name: String,
    pub lat: Option<f64>,
    pub long: Option<f64>,
    pub region_id: Option<i64>,
    pub location_type_id: Option<i64>,
}

impl NewLocation {
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.name.trim().is_empty() {
            Some("name")
        } else if self.lat.is_none() {
            Some("lat")
        } else if self.long.is_none() {
            Some("long")
        } else if self.region_id.is_none() {
            Some("region_id")
        } else {
            None
        }
    }

    /// Name of the first coordinate outside the valid range.
    pub fn invalid_field(&self) -> Option<&'static str> {
        coordinates_out_of_range(self.lat, self.long)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocationUpdate {
    pub name: Option<String>,
    pub lat: Option<f64>,
    pub long: Option<f64>,
    pub region_id: Option<i64>,
    pub location_type_id: Option<i64>,
}

impl LocationUpdate {
    pub fn invalid_field(&self) -> Option<&'static str> {
        coordinates_out_of_range(self.lat, self.long)
    }
}

fn coordinates_out_of_range(lat: Option<f64>, long: Option<f64>) -> Option<&'static str> {
    if lat.is_some_and(|lat| !(-90.0..=90.0).contains(&lat)) {
        Some("lat")
    } else if long.is_some_and(|long| !(-180.0..=180.0).contains(&long)) {
        Some("long")
    } else {
        None
    }
}

/// Link between a location and an activity that starts or passes there.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LocationActivity {
    pub id: i64,
    pub location_id: i64,
    pub activity_id: i64,
    pub last_updated_by: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewLocationActivity {
    pub location_id: Option<i64>,
    pub activity_id: Option<i64>,
}

impl NewLocationActivity {
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.location_id.is_none() {
            Some("location_id")
        } else if self.activity_id.is_none() {
            Some("activity_id")
        } else {
            None
        }
    }
}

impl LocationStore {
    pub const ORDER_COLUMNS: &'static [&'static str] =
        &["name", "lat", "long", "region_id", "location_type_id", "created_at", "updated_at", "id"];

    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, location: &NewLocation, actor: i64) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO locations (name, lat, long, region_id, location_type_id, last_updated_by)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(location.name.trim())
        .bind(location.lat)
        .bind(location.long)
        .bind(location.region_id)
        .bind(location.location_type_id)
        .bind(actor)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get(&self, id: i64) -> Result<Option<Location>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, name, lat, long, region_id, location_type_id, last_updated_by,
                    created_at, updated_at
             FROM locations WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn update(
        &self,
        id: i64,
        update: &LocationUpdate,
        actor: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE locations SET
                name = COALESCE(?, name),
                lat = COALESCE(?, lat),
                long = COALESCE(?, long),
                region_id = COALESCE(?, region_id),
                location_type_id = COALESCE(?, location_type_id),
                last_updated_by = ?,
                updated_at = datetime('now')
             WHERE id = ?",
        )
        .bind(update.name.as_deref())
        .bind(update.lat)
        .bind(update.long)
        .bind(update.region_id)
        .bind(update.location_type_id)
        .bind(actor)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// List locations, optionally restricted to `query.region_id` and
    /// `query.location_type_id`.
    pub async fn list(
        &self,
        query: &ListQuery,
        order: OrderColumn,
    ) -> Result<Vec<Location>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, name, lat, long, region_id, location_type_id, last_updated_by,
                    created_at, updated_at
             FROM locations
             WHERE (?1 IS NULL OR name LIKE '%' || ?1 || '%')
               AND (?6 IS NULL OR region_id = ?6)
               AND (?7 IS NULL OR location_type_id = ?7)
             ORDER BY
                CASE WHEN ?3 = 'asc' THEN CASE ?2
                    WHEN 'name' THEN name
                    WHEN 'lat' THEN lat
                    WHEN 'long' THEN long
                    WHEN 'region_id' THEN region_id
                    WHEN 'location_type_id' THEN location_type_id
                    WHEN 'created_at' THEN created_at
                    WHEN 'updated_at' THEN updated_at
                    ELSE id END END ASC,
                CASE WHEN ?3 = 'desc' THEN CASE ?2
                    WHEN 'name' THEN name
                    WHEN 'lat' THEN lat
                    WHEN 'long' THEN long
                    WHEN 'region_id' THEN region_id
                    WHEN 'location_type_id' THEN location_type_id
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
        .bind(query.region_id)
        .bind(query.location_type_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Link a location to an activity. Fails with a unique violation when the
    /// pair is already linked.
    pub async fn link_activity(
        &self,
        link: &NewLocationActivity,
        actor: i64,
    ) -> Result<LocationActivity, sqlx::Error> {
        sqlx::query_as(
            "INSERT INTO location_activities (location_id, activity_id, last_updated_by)
             VALUES (?, ?, ?)
             RETURNING id, location_id, activity_id, last_updated_by, created_at, updated_at",
        )
        .bind(link.location_id)
        .bind(link.activity_id)
        .bind(actor)
        .fetch_one(&self.pool)
        .await
    }

    /// Locations linked to an activity.
    pub async fn for_activity(&self, activity_id: i64) -> Result<Vec<Location>, sqlx::Error> {
        sqlx::query_as(
            "SELECT l.id, l.name, l.lat, l.long, l.region_id, l.location_type_id,
                    l.last_updated_by, l.created_at, l.updated_at
             FROM locations l
             JOIN location_activities la ON la.location_id = l.id
             WHERE la.activity_id = ?
             ORDER BY l.id",
        )
        .bind(activity_id)
        .fetch_all(&self.pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_ranges() {
        let mut location = NewLocation {
            name: "Summit".to_string(),
            lat: Some(46.5),
            long: Some(7.9),
            region_id: Some(1),
            location_type_id: None,
        };
        assert_eq!(location.missing_field(), None);
        assert_eq!(location.invalid_field(), None);

        location.lat = Some(91.0);
        assert_eq!(location.invalid_field(), Some("lat"));

        let update = LocationUpdate {
            long: Some(-180.5),
            ..Default::default()
        };
        assert_eq!(update.invalid_field(), Some("long"));
    }

    #[test]
    fn test_missing_coordinates() {
        let location = NewLocation {
            name: "Summit".to_string(),
            lat: Some(1.0),
            long: None,
            region_id: Some(1),
            location_type_id: None,
        };
        assert_eq!(location.missing_field(), Some("long"));
    }
}
