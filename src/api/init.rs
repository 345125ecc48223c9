//! Administrative setup. Requires ADMIN.

use axum::{
    Router,
    extract::State,
    routing::{get, post},
};
use tracing::info;

use super::{CatalogState, require};
use crate::auth::{MaybeAuth, Permission};
use crate::db::{Role, UserSummary};
use crate::envelope::{ApiError, Entity, Envelope, Message, ResultExt};

pub fn router(state: CatalogState) -> Router {
    Router::new()
        .route("/roles", post(seed_roles))
        .route("/users", get(list_users))
        .with_state(state)
}

/// Insert or refresh the default roles. Safe to repeat.
async fn seed_roles(
    State(state): State<CatalogState>,
    MaybeAuth(caller): MaybeAuth,
) -> Result<Envelope<Vec<Role>>, ApiError> {
    let principal = require(&caller, Permission::Admin, Message::InitNotAuthorized)?;

    let roles = state.db.roles();
    roles.insert_defaults().await.db_err("Failed to seed roles")?;
    let all = roles.list().await.db_err("Failed to list roles")?;

    info!(user_id = principal.user.id, "Default roles seeded");
    Ok(Envelope::ok(Message::InitRolesCreated, Some(Entity::Role), all))
}

async fn list_users(
    State(state): State<CatalogState>,
    MaybeAuth(caller): MaybeAuth,
) -> Result<Envelope<Vec<UserSummary>>, ApiError> {
    require(&caller, Permission::Admin, Message::InitNotAuthorized)?;
    let users = state.db.users().list().await.db_err("Failed to list users")?;
    Ok(Envelope::ok(Message::InitUsersListed, Some(Entity::User), users))
}
