mod auth;
mod create;
mod extract;
mod find;
mod hikes;
mod init;
mod list;
mod update;

use std::sync::Arc;

use axum::Router;

use crate::account::AccountService;
use crate::auth::{Caller, PasswordService, Permission, Principal};
use crate::db::{Database, is_foreign_key_violation, unique_violation_field};
use crate::envelope::{ApiError, Entity, Message};
use crate::impl_has_auth_backend;
use crate::rate_limit::RateLimitConfig;
use crate::token::TokenCodec;

pub use extract::{ApiJson, ApiPath, ApiQuery};

/// State shared by the catalog, hikes and admin routers.
#[derive(Clone)]
pub struct CatalogState {
    pub db: Database,
    pub tokens: Arc<TokenCodec>,
    pub passwords: Arc<PasswordService>,
}

impl_has_auth_backend!(CatalogState);

/// Create the API router.
pub fn create_api_router(
    db: Database,
    tokens: Arc<TokenCodec>,
    passwords: Arc<PasswordService>,
    accounts: AccountService,
    rate_limit_config: Arc<RateLimitConfig>,
) -> Router {
    let auth_state = auth::AuthState {
        db: db.clone(),
        tokens: tokens.clone(),
        passwords: passwords.clone(),
        accounts,
        rate_limit_config,
    };

    let catalog_state = CatalogState {
        db,
        tokens,
        passwords,
    };

    Router::new()
        .nest("/auth", auth::router(auth_state))
        .nest("/create", create::router(catalog_state.clone()))
        .nest("/update", update::router(catalog_state.clone()))
        .nest("/find", find::router(catalog_state.clone()))
        .nest("/list", list::router(catalog_state.clone()))
        .nest("/hikes", hikes::router(catalog_state.clone()))
        .nest("/init", init::router(catalog_state))
}

/// The caller's principal if it holds `permission`, otherwise a 403 with
/// `denied`.
fn require(
    caller: &Caller,
    permission: Permission,
    denied: Message,
) -> Result<&Principal, ApiError> {
    caller
        .principal()
        .filter(|principal| principal.can(permission))
        .ok_or_else(|| ApiError::not_authorized(denied))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Write {
    Create,
    Update,
}

impl Write {
    fn duplicate(self) -> Message {
        match self {
            Write::Create => Message::CreateDuplicateParams,
            Write::Update => Message::UpdateDuplicateParams,
        }
    }

    fn invalid(self) -> Message {
        match self {
            Write::Create => Message::CreateInvalidParameter,
            Write::Update => Message::UpdateInvalidParameter,
        }
    }
}

fn missing_field(entity: Entity, field: Option<&'static str>) -> Result<(), ApiError> {
    match field {
        None => Ok(()),
        Some(field) => Err(ApiError::missing_parameter(Message::CreateMissingParameter)
            .with_entity(entity)
            .with_data(serde_json::json!({ "missing": field }))),
    }
}

fn invalid_field(
    write: Write,
    entity: Entity,
    field: Option<&'static str>,
) -> Result<(), ApiError> {
    match field {
        None => Ok(()),
        Some(field) => Err(ApiError::invalid_input(write.invalid())
            .with_entity(entity)
            .with_data(serde_json::json!({ "invalid": field }))),
    }
}

/// Map a failed insert or update. Uniqueness and reference violations are
/// the caller's fault; anything else is logged as a 500.
fn write_error(write: Write, entity: Entity, e: sqlx::Error) -> ApiError {
    if let Some(field) = unique_violation_field(&e) {
        return ApiError::invalid_input(write.duplicate())
            .with_entity(entity)
            .with_existing(&field);
    }
    if is_foreign_key_violation(&e) {
        return ApiError::invalid_input(write.invalid()).with_entity(entity);
    }
    ApiError::db_error(&format!("Failed to write {entity:?}"), e)
}

/// Unwrap a row that was just written; its absence is a server error.
fn written<T>(row: Result<Option<T>, sqlx::Error>) -> Result<T, ApiError> {
    match row {
        Ok(Some(row)) => Ok(row),
        Ok(None) => Err(ApiError::internal()),
        Err(e) => Err(ApiError::db_error("Failed to reload written row", e)),
    }
}
