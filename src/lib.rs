pub mod account;
pub mod api;
pub mod auth;
pub mod cli;
pub mod db;
pub mod envelope;
pub mod mail;
pub mod rate_limit;
pub mod token;

use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

use account::AccountService;
use api::create_api_router;
use auth::{PasswordError, PasswordService};
use axum::Router;
use db::Database;
use envelope::{ApiError, Message};
use mail::Mailer;
use rate_limit::RateLimitConfig;
use token::TokenCodec;
use tokio::net::TcpListener;
use url::Url;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// Base URL for links in outgoing mail
    pub public_url: Url,
    /// Secret for signing action and bearer tokens
    pub token_secret: Vec<u8>,
    /// Operator address for approval requests
    pub approval_mail: String,
    /// IP extraction strategy (requires running behind a proxy)
    pub ip_header: Option<cli::ClientIpHeader>,
    /// Per-IP quota for sign-up and reset requests
    pub requests_per_minute: NonZeroU32,
    pub mailer: Arc<dyn Mailer>,
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Result<Router, PasswordError> {
    let rate_limit_config = Arc::new(RateLimitConfig::new(
        config.requests_per_minute,
        config.ip_header,
    ));
    build_app(config, rate_limit_config)
}

fn build_app(
    config: &ServerConfig,
    rate_limit_config: Arc<RateLimitConfig>,
) -> Result<Router, PasswordError> {
    let tokens = Arc::new(TokenCodec::new(&config.token_secret));
    let passwords = Arc::new(PasswordService::new()?);

    let accounts = AccountService::new(
        config.db.clone(),
        tokens.clone(),
        passwords.clone(),
        config.mailer.clone(),
        config.public_url.as_str(),
        config.approval_mail.clone(),
    );

    Ok(
        create_api_router(config.db.clone(), tokens, passwords, accounts, rate_limit_config)
            .fallback(not_found),
    )
}

async fn not_found() -> ApiError {
    ApiError::not_found(Message::MainNotFound)
}

/// Run the server on the given listener. This function blocks until the server exits.
/// Idle rate limiter buckets are pruned in the background while it runs.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let rate_limit_config = Arc::new(RateLimitConfig::new(
        config.requests_per_minute,
        config.ip_header,
    ));
    let app = build_app(&config, rate_limit_config.clone()).map_err(std::io::Error::other)?;
    let pruner = rate_limit::spawn_pruner(rate_limit_config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    let served = axum::serve(listener, make_service).await;
    pruner.abort();
    served
}

/// Start the server on the given port in a background task. Use port 0 to let
/// the OS choose a random port.
/// Returns the actual address the server is listening on.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> Result<(tokio::task::JoinHandle<()>, SocketAddr), std::io::Error> {
    let addr = format!("127.0.0.1:{}", port);
    let listener = TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = run_server(config, listener).await {
            tracing::error!(error = %e, "Server error");
        }
    });

    Ok((handle, local_addr))
}
