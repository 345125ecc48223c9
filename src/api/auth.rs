//! Account routes: sign-up, lifecycle links, sessions and credential changes.

use std::sync::Arc;

use axum::{
    Router, middleware,
    extract::State,
    routing::{get, post},
};

use super::{ApiJson, ApiPath};
use crate::account::{
    AccountService, EmailChange, NewAccount, PasswordChange, PasswordReset, ResetRequest,
    SessionView,
};
use crate::auth::{Auth, PasswordService};
use crate::db::{Database, User};
use crate::envelope::{ApiError, Envelope};
use crate::impl_has_auth_backend;
use crate::rate_limit::{RateLimitConfig, rate_limit_reset, rate_limit_signup};
use crate::token::TokenCodec;

#[derive(Clone)]
pub struct AuthState {
    pub db: Database,
    pub tokens: Arc<TokenCodec>,
    pub passwords: Arc<PasswordService>,
    pub accounts: AccountService,
    pub rate_limit_config: Arc<RateLimitConfig>,
}

impl_has_auth_backend!(AuthState);

pub fn router(state: AuthState) -> Router {
    let signup_router = Router::new()
        .route("/users", post(create_user))
        .route("/confirm", post(resend_confirmation))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit_config.clone(),
            rate_limit_signup,
        ));

    let reset_router = Router::new()
        .route("/reset", post(request_password_reset))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit_config.clone(),
            rate_limit_reset,
        ));

    let router = Router::new()
        .route("/approve/{token}", get(approve))
        .route("/confirm/{token}", get(confirm))
        .route("/reset/{token}", post(perform_password_reset))
        .route("/tokens", get(login))
        .route("/user", get(current_user))
        .route("/change_password", post(change_password))
        .route("/change_email", post(request_email_change))
        .route("/change_email/{token}", get(perform_email_change))
        .with_state(state);

    Router::new()
        .merge(signup_router)
        .merge(reset_router)
        .merge(router)
}

async fn create_user(
    State(state): State<AuthState>,
    ApiJson(input): ApiJson<NewAccount>,
) -> Result<Envelope<User>, ApiError> {
    state.accounts.create_user(input).await
}

async fn approve(
    State(state): State<AuthState>,
    ApiPath(token): ApiPath<String>,
) -> Result<Envelope<User>, ApiError> {
    state.accounts.approve(&token).await
}

async fn confirm(
    State(state): State<AuthState>,
    ApiPath(token): ApiPath<String>,
) -> Result<Envelope<User>, ApiError> {
    state.accounts.confirm(&token).await
}

async fn resend_confirmation(
    State(state): State<AuthState>,
    Auth(principal): Auth,
) -> Result<Envelope<User>, ApiError> {
    state.accounts.resend_confirmation(&principal).await
}

/// Password-authenticated callers get a fresh bearer token; the previous
/// one stops working.
async fn login(
    State(state): State<AuthState>,
    Auth(principal): Auth,
) -> Result<Envelope<SessionView>, ApiError> {
    state.accounts.login(&principal).await
}

async fn current_user(
    State(state): State<AuthState>,
    Auth(principal): Auth,
) -> Result<Envelope<SessionView>, ApiError> {
    state.accounts.current_user(&principal).await
}

async fn change_password(
    State(state): State<AuthState>,
    Auth(principal): Auth,
    ApiJson(input): ApiJson<PasswordChange>,
) -> Result<Envelope<User>, ApiError> {
    state.accounts.change_password(&principal, input).await
}

async fn request_password_reset(
    State(state): State<AuthState>,
    ApiJson(input): ApiJson<ResetRequest>,
) -> Result<Envelope<serde_json::Value>, ApiError> {
    state.accounts.request_password_reset(input).await
}

async fn perform_password_reset(
    State(state): State<AuthState>,
    ApiPath(token): ApiPath<String>,
    ApiJson(input): ApiJson<PasswordReset>,
) -> Result<Envelope<User>, ApiError> {
    state.accounts.perform_password_reset(&token, input).await
}

async fn request_email_change(
    State(state): State<AuthState>,
    Auth(principal): Auth,
    ApiJson(input): ApiJson<EmailChange>,
) -> Result<Envelope<serde_json::Value>, ApiError> {
    state.accounts.request_email_change(&principal, input).await
}

async fn perform_email_change(
    State(state): State<AuthState>,
    ApiPath(token): ApiPath<String>,
) -> Result<Envelope<User>, ApiError> {
    state.accounts.perform_email_change(&token).await
}
