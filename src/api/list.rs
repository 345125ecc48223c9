//! Paged catalog listings. Every route requires READ.

use axum::{Router, extract::State, routing::get};

use super::{ApiQuery, CatalogState, require};
use crate::auth::{MaybeAuth, Permission};
use crate::db::{
    Activity, ActivityStore, ActivityType, ActivityTypeStore, Comment, CommentStore, Country,
    CountryStore, ListQuery, Location, LocationStore, LocationType, LocationTypeStore,
    OrderColumn, Region, RegionStore,
};
use crate::envelope::{ApiError, Entity, Envelope, Message, ResultExt};

pub fn router(state: CatalogState) -> Router {
    Router::new()
        .route("/countries", get(list_countries))
        .route("/regions", get(list_regions))
        .route("/locations", get(list_locations))
        .route("/location_types", get(list_location_types))
        .route("/activity_types", get(list_activity_types))
        .route("/activities", get(list_activities))
        .route("/comments", get(list_comments))
        .with_state(state)
}

fn order(
    query: &ListQuery,
    allowed: &[&'static str],
    entity: Entity,
) -> Result<OrderColumn, ApiError> {
    query.order_column(allowed).ok_or_else(|| {
        ApiError::invalid_input(Message::ListInvalidOrder)
            .with_entity(entity)
            .with_data(serde_json::json!({ "allowed": allowed }))
    })
}

async fn list_countries(
    State(state): State<CatalogState>,
    MaybeAuth(caller): MaybeAuth,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Envelope<Vec<Country>>, ApiError> {
    require(&caller, Permission::Read, Message::ListNotAuthorized)?;
    let order = order(&query, CountryStore::ORDER_COLUMNS, Entity::Country)?;
    let countries = state
        .db
        .countries()
        .list(&query, order)
        .await
        .db_err("Failed to list countries")?;
    Ok(Envelope::ok(Message::ListSuccessful, Some(Entity::Country), countries))
}

/// Filtered by `country_id` when given.
async fn list_regions(
    State(state): State<CatalogState>,
    MaybeAuth(caller): MaybeAuth,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Envelope<Vec<Region>>, ApiError> {
    require(&caller, Permission::Read, Message::ListNotAuthorized)?;
    let order = order(&query, RegionStore::ORDER_COLUMNS, Entity::Region)?;
    let regions = state
        .db
        .regions()
        .list(&query, order)
        .await
        .db_err("Failed to list regions")?;
    Ok(Envelope::ok(Message::ListSuccessful, Some(Entity::Region), regions))
}

/// Filtered by `region_id` and `location_type_id` when given.
async fn list_locations(
    State(state): State<CatalogState>,
    MaybeAuth(caller): MaybeAuth,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Envelope<Vec<Location>>, ApiError> {
    require(&caller, Permission::Read, Message::ListNotAuthorized)?;
    let order = order(&query, LocationStore::ORDER_COLUMNS, Entity::Location)?;
    let locations = state
        .db
        .locations()
        .list(&query, order)
        .await
        .db_err("Failed to list locations")?;
    Ok(Envelope::ok(Message::ListSuccessful, Some(Entity::Location), locations))
}

async fn list_location_types(
    State(state): State<CatalogState>,
    MaybeAuth(caller): MaybeAuth,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Envelope<Vec<LocationType>>, ApiError> {
    require(&caller, Permission::Read, Message::ListNotAuthorized)?;
    let order = order(&query, LocationTypeStore::ORDER_COLUMNS, Entity::LocationType)?;
    let location_types = state
        .db
        .location_types()
        .list(&query, order)
        .await
        .db_err("Failed to list location types")?;
    Ok(Envelope::ok(
        Message::ListSuccessful,
        Some(Entity::LocationType),
        location_types,
    ))
}

async fn list_activity_types(
    State(state): State<CatalogState>,
    MaybeAuth(caller): MaybeAuth,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Envelope<Vec<ActivityType>>, ApiError> {
    require(&caller, Permission::Read, Message::ListNotAuthorized)?;
    let order = order(&query, ActivityTypeStore::ORDER_COLUMNS, Entity::ActivityType)?;
    let activity_types = state
        .db
        .activity_types()
        .list(&query, order)
        .await
        .db_err("Failed to list activity types")?;
    Ok(Envelope::ok(
        Message::ListSuccessful,
        Some(Entity::ActivityType),
        activity_types,
    ))
}

/// Filtered by `activity_type_id` when given.
async fn list_activities(
    State(state): State<CatalogState>,
    MaybeAuth(caller): MaybeAuth,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Envelope<Vec<Activity>>, ApiError> {
    require(&caller, Permission::Read, Message::ListNotAuthorized)?;
    let order = order(&query, ActivityStore::ORDER_COLUMNS, Entity::Activity)?;
    let activities = state
        .db
        .activities()
        .list(&query, order)
        .await
        .db_err("Failed to list activities")?;
    Ok(Envelope::ok(Message::ListSuccessful, Some(Entity::Activity), activities))
}

/// Filtered by `activity_id` when given. Disabled comments are only shown
/// to CREATE holders.
async fn list_comments(
    State(state): State<CatalogState>,
    MaybeAuth(caller): MaybeAuth,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Envelope<Vec<Comment>>, ApiError> {
    let reader = require(&caller, Permission::Read, Message::ListNotAuthorized)?;
    let order = order(&query, CommentStore::ORDER_COLUMNS, Entity::Comment)?;
    let comments = state
        .db
        .comments()
        .list(&query, order, reader.can(Permission::Create))
        .await
        .db_err("Failed to list comments")?;
    Ok(Envelope::ok(Message::ListSuccessful, Some(Entity::Comment), comments))
}
