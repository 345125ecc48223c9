//! CLI argument parsing, validation, and startup helpers.

use std::net::IpAddr;
use std::num::NonZeroU32;

use clap::Parser;
use tracing::{error, info};
use url::Url;

use crate::ServerConfig;
use crate::auth::{PasswordService, new_session_marker};
use crate::db::{Database, NewUser};

const MIN_TOKEN_SECRET_LENGTH: usize = 32;
const GENERATED_PASSWORD_LENGTH: usize = 24;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

/// Header a trusted reverse proxy uses to pass the client address.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientIpHeader {
    /// First entry of `X-Forwarded-For`
    XForwardedFor,
    XRealIp,
    CfConnectingIp,
}

impl ClientIpHeader {
    pub fn header_name(self) -> &'static str {
        match self {
            ClientIpHeader::XForwardedFor => "x-forwarded-for",
            ClientIpHeader::XRealIp => "x-real-ip",
            ClientIpHeader::CfConnectingIp => "cf-connecting-ip",
        }
    }

    /// Parse the header value into a normalized IP address string.
    pub fn parse(self, value: &str) -> Result<String, &'static str> {
        let candidate = match self {
            ClientIpHeader::XForwardedFor => value.split(',').next().unwrap_or_default(),
            ClientIpHeader::XRealIp | ClientIpHeader::CfConnectingIp => value,
        };
        candidate
            .trim()
            .parse::<IpAddr>()
            .map(|ip| ip.to_string())
            .map_err(|_| "IP header does not contain a valid address")
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "Trailbook", about = "Hiking catalog backend")]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "7292")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, default_value = "trailbook.db")]
    pub database: String,

    /// Public base URL used in mailed links (e.g., "https://trails.example.com")
    #[arg(long, default_value = "http://localhost:7292")]
    pub public_url: String,

    /// Address that receives new-account approval requests
    #[arg(long, env = "TRAILBOOK_APPROVAL_MAIL", default_value = "admin@localhost")]
    pub approval_mail: String,

    /// Path to file containing the token secret. Prefer using TOKEN_SECRET env var instead
    #[arg(long)]
    pub token_secret_file: Option<String>,

    /// Take the client IP from this header (only behind a trusted proxy)
    #[arg(long, value_enum)]
    pub ip_header: Option<ClientIpHeader>,

    /// Sign-up and password-reset requests allowed per IP per minute
    #[arg(long, default_value = "3")]
    pub requests_per_minute: NonZeroU32,

    /// Create an admin account with a generated password and print it
    #[arg(long, value_name = "USERNAME:EMAIL")]
    pub create_admin: Option<String>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load the token signing secret from environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_token_secret(token_secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var("TOKEN_SECRET") {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var("TOKEN_SECRET") };
        secret
    } else if let Some(path) = token_secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read token secret file");
                return None;
            }
        }
    } else {
        error!(
            "Token secret is required. Set TOKEN_SECRET environment variable (recommended) or use --token-secret-file"
        );
        return None;
    };

    if secret.len() < MIN_TOKEN_SECRET_LENGTH {
        error!(
            "Token secret is shorter than {} characters. Use a longer secret",
            MIN_TOKEN_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Parse and validate the public URL.
/// Returns None and logs an error if validation fails.
pub fn validate_public_url(public_url: &str) -> Option<Url> {
    let url = match Url::parse(public_url) {
        Ok(url) => url,
        Err(e) => {
            error!(url = %public_url, error = %e, "Invalid public URL");
            return None;
        }
    };

    let is_https = url.scheme() == "https";
    let is_localhost = url.host_str() == Some("localhost");

    if !is_https && !is_localhost {
        error!("public-url must use HTTPS for non-localhost deployments");
        return None;
    }

    Some(url)
}

/// Handle `--create-admin username:email`: create an approved, confirmed
/// account with the Admin role and print its generated password.
pub async fn handle_create_admin(db: &Database, spec: &str) {
    let Some((username, email)) = spec
        .split_once(':')
        .map(|(u, e)| (u.trim(), e.trim()))
        .filter(|(u, e)| !u.is_empty() && !e.is_empty())
    else {
        error!("--create-admin expects USERNAME:EMAIL");
        std::process::exit(1);
    };

    match db.users().get_by_username(username).await {
        Ok(Some(existing)) => {
            println!();
            println!("User already exists: {}", existing.username);
            println!();
            return;
        }
        Ok(None) => {}
        Err(e) => {
            error!(error = %e, "Failed to check for existing user");
            std::process::exit(1);
        }
    }

    let admin_role = match db.roles().get_by_name("Admin").await {
        Ok(Some(role)) => role,
        Ok(None) => {
            error!("Admin role is missing");
            std::process::exit(1);
        }
        Err(e) => {
            error!(error = %e, "Failed to load admin role");
            std::process::exit(1);
        }
    };

    let password = generate_password();
    let hashed = match PasswordService::new() {
        Ok(passwords) => passwords.hash_password(&password).await,
        Err(e) => Err(e),
    };
    let password_hash = match hashed {
        Ok(hash) => hash,
        Err(e) => {
            error!(error = %e, "Failed to hash admin password");
            std::process::exit(1);
        }
    };
    let session_id = new_session_marker();

    let created = db
        .users()
        .create(&NewUser {
            username,
            email,
            password_hash: &password_hash,
            session_id: &session_id,
            role_id: Some(admin_role.id),
        })
        .await;
    let id = match created {
        Ok(id) => id,
        Err(e) => {
            error!(error = %e, "Failed to create admin user");
            std::process::exit(1);
        }
    };

    if let Err(e) = db.users().activate(id, admin_role.id, "cli").await {
        error!(error = %e, "Failed to activate admin user");
        std::process::exit(1);
    }

    println!();
    println!("Admin user created: {}", username);
    println!("Password: {}", password);
    println!();
}

fn generate_password() -> String {
    use rand::{Rng, distr::Alphanumeric};
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_PASSWORD_LENGTH)
        .map(char::from)
        .collect()
}

/// Build ServerConfig from validated arguments.
pub fn build_config(
    db: Database,
    public_url: Url,
    token_secret: String,
    approval_mail: String,
    ip_header: Option<ClientIpHeader>,
    requests_per_minute: NonZeroU32,
) -> ServerConfig {
    ServerConfig {
        db,
        public_url,
        token_secret: token_secret.into_bytes(),
        approval_mail,
        ip_header,
        requests_per_minute,
        mailer: std::sync::Arc::new(crate::mail::LogMailer),
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
