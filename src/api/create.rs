//! Catalog creation. Every route requires the CREATE permission, except
//! comments, which require COMMENT.

use axum::{Router, extract::State, routing::post};
use tracing::info;

use super::{
    ApiJson, CatalogState, Write, invalid_field, missing_field, require, write_error, written,
};
use crate::auth::{Caller, MaybeAuth, Permission};
use crate::db::{
    Activity, ActivityType, Comment, Country, Location, LocationActivity, LocationType,
    NewActivity, NewActivityType, NewComment, NewCountry, NewLocation, NewLocationActivity,
    NewLocationType, NewRegion, Region,
};
use crate::envelope::{ApiError, Entity, Envelope, Message};

pub fn router(state: CatalogState) -> Router {
    Router::new()
        .route("/country", post(create_country))
        .route("/region", post(create_region))
        .route("/location", post(create_location))
        .route("/location_type", post(create_location_type))
        .route("/activity_type", post(create_activity_type))
        .route("/activity", post(create_activity))
        .route("/location_activity", post(create_location_activity))
        .route("/comment", post(create_comment))
        .with_state(state)
}

fn actor(caller: &Caller) -> Result<i64, ApiError> {
    require(caller, Permission::Create, Message::CreateNotAuthorized).map(|p| p.user.id)
}

async fn create_country(
    State(state): State<CatalogState>,
    MaybeAuth(caller): MaybeAuth,
    ApiJson(input): ApiJson<NewCountry>,
) -> Result<Envelope<Country>, ApiError> {
    let actor = actor(&caller)?;
    missing_field(Entity::Country, input.missing_field())?;

    let countries = state.db.countries();
    let id = countries
        .create(&input, actor)
        .await
        .map_err(|e| write_error(Write::Create, Entity::Country, e))?;
    let country = written(countries.get(id).await)?;
    Ok(Envelope::created(Message::CreateSuccessful, Entity::Country, country))
}

async fn create_region(
    State(state): State<CatalogState>,
    MaybeAuth(caller): MaybeAuth,
    ApiJson(input): ApiJson<NewRegion>,
) -> Result<Envelope<Region>, ApiError> {
    let actor = actor(&caller)?;
    missing_field(Entity::Region, input.missing_field())?;

    let regions = state.db.regions();
    let id = regions
        .create(&input, actor)
        .await
        .map_err(|e| write_error(Write::Create, Entity::Region, e))?;
    let region = written(regions.get(id).await)?;
    Ok(Envelope::created(Message::CreateSuccessful, Entity::Region, region))
}

async fn create_location(
    State(state): State<CatalogState>,
    MaybeAuth(caller): MaybeAuth,
    ApiJson(input): ApiJson<NewLocation>,
) -> Result<Envelope<Location>, ApiError> {
    let actor = actor(&caller)?;
    missing_field(Entity::Location, input.missing_field())?;
    invalid_field(Write::Create, Entity::Location, input.invalid_field())?;

    let locations = state.db.locations();
    let id = locations
        .create(&input, actor)
        .await
        .map_err(|e| write_error(Write::Create, Entity::Location, e))?;
    let location = written(locations.get(id).await)?;
    Ok(Envelope::created(Message::CreateSuccessful, Entity::Location, location))
}

async fn create_location_type(
    State(state): State<CatalogState>,
    MaybeAuth(caller): MaybeAuth,
    ApiJson(input): ApiJson<NewLocationType>,
) -> Result<Envelope<LocationType>, ApiError> {
    let actor = actor(&caller)?;
    missing_field(Entity::LocationType, input.missing_field())?;

    let location_types = state.db.location_types();
    let id = location_types
        .create(&input, actor)
        .await
        .map_err(|e| write_error(Write::Create, Entity::LocationType, e))?;
    let location_type = written(location_types.get(id).await)?;
    Ok(Envelope::created(
        Message::CreateSuccessful,
        Entity::LocationType,
        location_type,
    ))
}

async fn create_activity_type(
    State(state): State<CatalogState>,
    MaybeAuth(caller): MaybeAuth,
    ApiJson(input): ApiJson<NewActivityType>,
) -> Result<Envelope<ActivityType>, ApiError> {
    let actor = actor(&caller)?;
    missing_field(Entity::ActivityType, input.missing_field())?;

    let activity_types = state.db.activity_types();
    let id = activity_types
        .create(&input, actor)
        .await
        .map_err(|e| write_error(Write::Create, Entity::ActivityType, e))?;
    let activity_type = written(activity_types.get(id).await)?;
    Ok(Envelope::created(
        Message::CreateSuccessful,
        Entity::ActivityType,
        activity_type,
    ))
}

async fn create_activity(
    State(state): State<CatalogState>,
    MaybeAuth(caller): MaybeAuth,
    ApiJson(input): ApiJson<NewActivity>,
) -> Result<Envelope<Activity>, ApiError> {
    let actor = actor(&caller)?;
    missing_field(Entity::Activity, input.missing_field())?;

    let activities = state.db.activities();
    let id = activities
        .create(&input, actor)
        .await
        .map_err(|e| write_error(Write::Create, Entity::Activity, e))?;
    let activity = written(activities.get(id).await)?;
    Ok(Envelope::created(Message::CreateSuccessful, Entity::Activity, activity))
}

async fn create_location_activity(
    State(state): State<CatalogState>,
    MaybeAuth(caller): MaybeAuth,
    ApiJson(input): ApiJson<NewLocationActivity>,
) -> Result<Envelope<LocationActivity>, ApiError> {
    let actor = actor(&caller)?;
    missing_field(Entity::LocationActivity, input.missing_field())?;

    let link = state
        .db
        .locations()
        .link_activity(&input, actor)
        .await
        .map_err(|e| write_error(Write::Create, Entity::LocationActivity, e))?;
    Ok(Envelope::created(
        Message::CreateSuccessful,
        Entity::LocationActivity,
        link,
    ))
}

/// The caller becomes the comment's author.
async fn create_comment(
    State(state): State<CatalogState>,
    MaybeAuth(caller): MaybeAuth,
    ApiJson(input): ApiJson<NewComment>,
) -> Result<Envelope<Comment>, ApiError> {
    let author = require(&caller, Permission::Comment, Message::CreateNotAuthorized)?.user.id;
    missing_field(Entity::Comment, input.missing_field())?;

    let comments = state.db.comments();
    let id = comments
        .create(&input, author)
        .await
        .map_err(|e| write_error(Write::Create, Entity::Comment, e))?;
    let comment = written(comments.get(id).await)?;
    info!(
        comment_id = id,
        author_id = author,
        activity_id = comment.activity_id,
        "Comment added"
    );
    Ok(Envelope::created(Message::CreateSuccessful, Entity::Comment, comment))
}
