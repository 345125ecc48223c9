//! Partial catalog updates. Only the fields present in the body change;
//! unknown keys are rejected while decoding.

use axum::{Router, extract::State, routing::post};

use super::{
    ApiJson, ApiPath, CatalogState, Write, invalid_field, require, write_error, written,
};
use crate::auth::{Caller, MaybeAuth, Permission};
use crate::db::{
    Activity, ActivityType, ActivityTypeUpdate, ActivityUpdate, Comment, CommentUpdate, Country,
    CountryUpdate, Location, LocationType, LocationTypeUpdate, LocationUpdate, Region,
    RegionUpdate,
};
use crate::envelope::{ApiError, Entity, Envelope, Message, ResultExt};

pub fn router(state: CatalogState) -> Router {
    Router::new()
        .route("/country/{id}", post(update_country))
        .route("/region/{id}", post(update_region))
        .route("/location/{id}", post(update_location))
        .route("/location_type/{id}", post(update_location_type))
        .route("/activity_type/{id}", post(update_activity_type))
        .route("/activity/{id}", post(update_activity))
        .route("/comment/{id}", post(update_comment))
        .with_state(state)
}

fn actor(caller: &Caller) -> Result<i64, ApiError> {
    require(caller, Permission::Create, Message::UpdateNotAuthorized).map(|p| p.user.id)
}

fn applied(result: Result<bool, sqlx::Error>, entity: Entity) -> Result<(), ApiError> {
    match result {
        Ok(true) => Ok(()),
        Ok(false) => Err(ApiError::not_found(Message::UpdateNotFound).with_entity(entity)),
        Err(e) => Err(write_error(Write::Update, entity, e)),
    }
}

async fn update_country(
    State(state): State<CatalogState>,
    MaybeAuth(caller): MaybeAuth,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<CountryUpdate>,
) -> Result<Envelope<Country>, ApiError> {
    let actor = actor(&caller)?;
    let countries = state.db.countries();
    applied(countries.update(id, &input, actor).await, Entity::Country)?;
    let country = written(countries.get(id).await)?;
    Ok(Envelope::ok(Message::UpdateSuccessful, Some(Entity::Country), country))
}

async fn update_region(
    State(state): State<CatalogState>,
    MaybeAuth(caller): MaybeAuth,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<RegionUpdate>,
) -> Result<Envelope<Region>, ApiError> {
    let actor = actor(&caller)?;
    let regions = state.db.regions();
    applied(regions.update(id, &input, actor).await, Entity::Region)?;
    let region = written(regions.get(id).await)?;
    Ok(Envelope::ok(Message::UpdateSuccessful, Some(Entity::Region), region))
}

async fn update_location(
    State(state): State<CatalogState>,
    MaybeAuth(caller): MaybeAuth,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<LocationUpdate>,
) -> Result<Envelope<Location>, ApiError> {
    let actor = actor(&caller)?;
    invalid_field(Write::Update, Entity::Location, input.invalid_field())?;

    let locations = state.db.locations();
    applied(locations.update(id, &input, actor).await, Entity::Location)?;
    let location = written(locations.get(id).await)?;
    Ok(Envelope::ok(Message::UpdateSuccessful, Some(Entity::Location), location))
}

async fn update_location_type(
    State(state): State<CatalogState>,
    MaybeAuth(caller): MaybeAuth,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<LocationTypeUpdate>,
) -> Result<Envelope<LocationType>, ApiError> {
    let actor = actor(&caller)?;
    invalid_field(Write::Update, Entity::LocationType, input.invalid_field())?;

    let location_types = state.db.location_types();
    applied(
        location_types.update(id, &input, actor).await,
        Entity::LocationType,
    )?;
    let location_type = written(location_types.get(id).await)?;
    Ok(Envelope::ok(
        Message::UpdateSuccessful,
        Some(Entity::LocationType),
        location_type,
    ))
}

async fn update_activity_type(
    State(state): State<CatalogState>,
    MaybeAuth(caller): MaybeAuth,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<ActivityTypeUpdate>,
) -> Result<Envelope<ActivityType>, ApiError> {
    let actor = actor(&caller)?;
    let activity_types = state.db.activity_types();
    applied(
        activity_types.update(id, &input, actor).await,
        Entity::ActivityType,
    )?;
    let activity_type = written(activity_types.get(id).await)?;
    Ok(Envelope::ok(
        Message::UpdateSuccessful,
        Some(Entity::ActivityType),
        activity_type,
    ))
}

async fn update_activity(
    State(state): State<CatalogState>,
    MaybeAuth(caller): MaybeAuth,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<ActivityUpdate>,
) -> Result<Envelope<Activity>, ApiError> {
    let actor = actor(&caller)?;
    let activities = state.db.activities();
    applied(activities.update(id, &input, actor).await, Entity::Activity)?;
    let activity = written(activities.get(id).await)?;
    Ok(Envelope::ok(Message::UpdateSuccessful, Some(Entity::Activity), activity))
}

/// Authors with COMMENT may edit the body of their own comments. CREATE
/// holders may edit any comment and are the only ones who can toggle
/// `disabled`.
async fn update_comment(
    State(state): State<CatalogState>,
    MaybeAuth(caller): MaybeAuth,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<CommentUpdate>,
) -> Result<Envelope<Comment>, ApiError> {
    let denied = || {
        ApiError::not_authorized(Message::UpdateNotAuthorized).with_entity(Entity::Comment)
    };
    let principal = caller
        .principal()
        .filter(|p| p.can(Permission::Comment) || p.can(Permission::Create))
        .ok_or_else(denied)?;

    let comments = state.db.comments();
    let comment = comments
        .get(id)
        .await
        .db_err("Failed to load comment")?
        .ok_or_else(|| {
            ApiError::not_found(Message::UpdateNotFound).with_entity(Entity::Comment)
        })?;

    let moderator = principal.can(Permission::Create);
    let own = comment.author_id == principal.user.id && principal.can(Permission::Comment);
    if !moderator && (!own || input.disabled.is_some()) {
        return Err(denied());
    }
    invalid_field(Write::Update, Entity::Comment, input.invalid_field())?;

    applied(comments.update(id, &input, principal.user.id).await, Entity::Comment)?;
    let comment = written(comments.get(id).await)?;
    Ok(Envelope::ok(Message::UpdateSuccessful, Some(Entity::Comment), comment))
}
