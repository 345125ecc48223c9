//! Single-row lookups and activity search. Every route requires READ.

use axum::{Router, extract::State, routing::get};
use serde::{Deserialize, Serialize};

use super::{ApiPath, ApiQuery, CatalogState, require};
use crate::auth::{MaybeAuth, Permission};
use crate::db::{
    Activity, ActivityStore, ActivityType, Country, ListQuery, Location, LocationType,
    NearbyActivity, Region,
};
use crate::envelope::{ApiError, Entity, Envelope, Message, ResultExt};

pub fn router(state: CatalogState) -> Router {
    Router::new()
        .route("/country/{id}", get(find_country))
        .route("/region/{id}", get(find_region))
        .route("/location/{id}", get(find_location))
        .route("/location_type/{id}", get(find_location_type))
        .route("/activity_type/{id}", get(find_activity_type))
        .route("/activity/{id}", get(find_activity))
        .route("/activities/search", get(search_activities))
        .route("/activities/nearby", get(nearby_activities))
        .with_state(state)
}

fn found<T>(row: Option<T>, entity: Entity) -> Result<T, ApiError> {
    row.ok_or_else(|| ApiError::not_found(Message::FindNotFound).with_entity(entity))
}

fn missing(field: &str, entity: Entity) -> ApiError {
    ApiError::missing_parameter(Message::FindMissingParameter)
        .with_entity(entity)
        .with_data(serde_json::json!({ "missing": field }))
}

async fn find_country(
    State(state): State<CatalogState>,
    MaybeAuth(caller): MaybeAuth,
    ApiPath(id): ApiPath<i64>,
) -> Result<Envelope<Country>, ApiError> {
    require(&caller, Permission::Read, Message::FindNotAuthorized)?;
    let country = state.db.countries().get(id).await.db_err("Failed to load country")?;
    let country = found(country, Entity::Country)?;
    Ok(Envelope::ok(Message::FindSuccessful, Some(Entity::Country), country))
}

async fn find_region(
    State(state): State<CatalogState>,
    MaybeAuth(caller): MaybeAuth,
    ApiPath(id): ApiPath<i64>,
) -> Result<Envelope<Region>, ApiError> {
    require(&caller, Permission::Read, Message::FindNotAuthorized)?;
    let region = state.db.regions().get(id).await.db_err("Failed to load region")?;
    let region = found(region, Entity::Region)?;
    Ok(Envelope::ok(Message::FindSuccessful, Some(Entity::Region), region))
}

async fn find_location(
    State(state): State<CatalogState>,
    MaybeAuth(caller): MaybeAuth,
    ApiPath(id): ApiPath<i64>,
) -> Result<Envelope<Location>, ApiError> {
    require(&caller, Permission::Read, Message::FindNotAuthorized)?;
    let location = state.db.locations().get(id).await.db_err("Failed to load location")?;
    let location = found(location, Entity::Location)?;
    Ok(Envelope::ok(Message::FindSuccessful, Some(Entity::Location), location))
}

async fn find_location_type(
    State(state): State<CatalogState>,
    MaybeAuth(caller): MaybeAuth,
    ApiPath(id): ApiPath<i64>,
) -> Result<Envelope<LocationType>, ApiError> {
    require(&caller, Permission::Read, Message::FindNotAuthorized)?;
    let location_type = state
        .db
        .location_types()
        .get(id)
        .await
        .db_err("Failed to load location type")?;
    let location_type = found(location_type, Entity::LocationType)?;
    Ok(Envelope::ok(
        Message::FindSuccessful,
        Some(Entity::LocationType),
        location_type,
    ))
}

async fn find_activity_type(
    State(state): State<CatalogState>,
    MaybeAuth(caller): MaybeAuth,
    ApiPath(id): ApiPath<i64>,
) -> Result<Envelope<ActivityType>, ApiError> {
    require(&caller, Permission::Read, Message::FindNotAuthorized)?;
    let activity_type = state
        .db
        .activity_types()
        .get(id)
        .await
        .db_err("Failed to load activity type")?;
    let activity_type = found(activity_type, Entity::ActivityType)?;
    Ok(Envelope::ok(
        Message::FindSuccessful,
        Some(Entity::ActivityType),
        activity_type,
    ))
}

/// An activity together with every location it is linked to.
#[derive(Serialize)]
struct ActivityDetail {
    #[serde(flatten)]
    activity: Activity,
    locations: Vec<Location>,
}

async fn find_activity(
    State(state): State<CatalogState>,
    MaybeAuth(caller): MaybeAuth,
    ApiPath(id): ApiPath<i64>,
) -> Result<Envelope<ActivityDetail>, ApiError> {
    require(&caller, Permission::Read, Message::FindNotAuthorized)?;
    let activity = state.db.activities().get(id).await.db_err("Failed to load activity")?;
    let activity = found(activity, Entity::Activity)?;
    let locations = state
        .db
        .locations()
        .for_activity(activity.id)
        .await
        .db_err("Failed to load activity locations")?;

    Ok(Envelope::ok(
        Message::FindSuccessful,
        Some(Entity::Activity),
        ActivityDetail {
            activity,
            locations,
        },
    ))
}

/// Term search over activity names and descriptions.
async fn search_activities(
    State(state): State<CatalogState>,
    MaybeAuth(caller): MaybeAuth,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Envelope<Vec<Activity>>, ApiError> {
    require(&caller, Permission::Read, Message::FindNotAuthorized)?;
    if query.term().is_none() {
        return Err(missing("term", Entity::Activity));
    }
    let order = query
        .order_column(ActivityStore::ORDER_COLUMNS)
        .ok_or_else(|| {
            ApiError::invalid_input(Message::ListInvalidOrder).with_entity(Entity::Activity)
        })?;

    let activities = state
        .db
        .activities()
        .search(&query, order)
        .await
        .db_err("Failed to search activities")?;
    Ok(Envelope::ok(Message::FindSuccessful, Some(Entity::Activity), activities))
}

#[derive(Debug, Deserialize)]
struct NearbyQuery {
    lat: Option<f64>,
    long: Option<f64>,
    /// Radius in kilometres
    dist: Option<f64>,
    limit: Option<i64>,
}

async fn nearby_activities(
    State(state): State<CatalogState>,
    MaybeAuth(caller): MaybeAuth,
    ApiQuery(query): ApiQuery<NearbyQuery>,
) -> Result<Envelope<Vec<NearbyActivity>>, ApiError> {
    require(&caller, Permission::Read, Message::FindNotAuthorized)?;
    let lat = query.lat.ok_or_else(|| missing("lat", Entity::Activity))?;
    let long = query.long.ok_or_else(|| missing("long", Entity::Activity))?;
    let dist = query.dist.ok_or_else(|| missing("dist", Entity::Activity))?;

    let invalid = |field: &str| {
        ApiError::invalid_input(Message::MainInvalidRequest)
            .with_entity(Entity::Activity)
            .with_data(serde_json::json!({ "invalid": field }))
    };
    if !(-90.0..=90.0).contains(&lat) {
        return Err(invalid("lat"));
    }
    if !(-180.0..=180.0).contains(&long) {
        return Err(invalid("long"));
    }
    if !dist.is_finite() || dist <= 0.0 {
        return Err(invalid("dist"));
    }

    let limit = ListQuery {
        limit: query.limit,
        ..ListQuery::default()
    }
    .limit();
    let activities = state
        .db
        .activities()
        .nearby(lat, long, dist, limit)
        .await
        .db_err("Failed to search nearby activities")?;
    Ok(Envelope::ok(Message::FindSuccessful, Some(Entity::Activity), activities))
}
