//! Completed-activity records for the calling principal. Requires FOLLOW.

use axum::{Router, extract::State, routing::post};
use tracing::info;

use super::{ApiPath, CatalogState, require};
use crate::auth::{Caller, MaybeAuth, Permission, Principal};
use crate::db::Hike;
use crate::envelope::{ApiError, Entity, Envelope, Message, ResultExt};

pub fn router(state: CatalogState) -> Router {
    Router::new()
        .route(
            "/{activity_id}",
            post(add_hike).get(get_hike).delete(remove_hike),
        )
        .with_state(state)
}

async fn activity_exists(state: &CatalogState, activity_id: i64) -> Result<(), ApiError> {
    state
        .db
        .activities()
        .get(activity_id)
        .await
        .db_err("Failed to load activity")?
        .map(|_| ())
        .ok_or_else(|| {
            ApiError::not_found(Message::HikesActivityNotFound).with_entity(Entity::Activity)
        })
}

fn follower(caller: &Caller) -> Result<&Principal, ApiError> {
    require(caller, Permission::Follow, Message::HikesNotAuthorized)
}

/// Record the activity as done. Repeating the call returns the same row.
async fn add_hike(
    State(state): State<CatalogState>,
    MaybeAuth(caller): MaybeAuth,
    ApiPath(activity_id): ApiPath<i64>,
) -> Result<Envelope<Hike>, ApiError> {
    let principal = follower(&caller)?;
    activity_exists(&state, activity_id).await?;

    let hike = state
        .db
        .hikes()
        .add(principal.user.id, activity_id)
        .await
        .db_err("Failed to add hike")?;
    info!(user_id = principal.user.id, activity_id, "Hike recorded");
    Ok(Envelope::created(Message::HikesAdded, Entity::Hike, hike))
}

async fn get_hike(
    State(state): State<CatalogState>,
    MaybeAuth(caller): MaybeAuth,
    ApiPath(activity_id): ApiPath<i64>,
) -> Result<Envelope<Hike>, ApiError> {
    let principal = follower(&caller)?;
    activity_exists(&state, activity_id).await?;

    let hike = state
        .db
        .hikes()
        .get(principal.user.id, activity_id)
        .await
        .db_err("Failed to load hike")?
        .ok_or_else(|| ApiError::not_found(Message::HikesNotFound).with_entity(Entity::Hike))?;
    Ok(Envelope::ok(Message::HikesFound, Some(Entity::Hike), hike))
}

async fn remove_hike(
    State(state): State<CatalogState>,
    MaybeAuth(caller): MaybeAuth,
    ApiPath(activity_id): ApiPath<i64>,
) -> Result<Envelope<serde_json::Value>, ApiError> {
    let principal = follower(&caller)?;
    activity_exists(&state, activity_id).await?;

    let removed = state
        .db
        .hikes()
        .remove(principal.user.id, activity_id)
        .await
        .db_err("Failed to remove hike")?;
    if !removed {
        return Err(ApiError::not_found(Message::HikesNotFound).with_entity(Entity::Hike));
    }

    info!(user_id = principal.user.id, activity_id, "Hike removed");
    Ok(Envelope::ok(
        Message::HikesRemoved,
        Some(Entity::Hike),
        serde_json::Value::Null,
    ))
}
