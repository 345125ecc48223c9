//! Bearer token issuance and single-session invalidation.
//!
//! Each principal has one session marker. Issuing a bearer token replaces the
//! marker first, so every token issued before it stops resolving.

use rand::{Rng, distr::Alphanumeric};

use super::types::{AuthMethod, Principal};
use crate::db::Database;
use crate::token::{Action, IssuedToken, TokenCodec, TokenError};

pub const SESSION_MARKER_LEN: usize = 16;

/// A fresh random alphanumeric session marker.
pub fn new_session_marker() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_MARKER_LEN)
        .map(char::from)
        .collect()
}

#[derive(Debug)]
pub enum SessionError {
    /// The caller presented a bearer token; only a password may mint a new one
    TokenAuthenticated,
    /// The principal disappeared between authentication and issuance
    UnknownPrincipal,
    Database(sqlx::Error),
    Token(TokenError),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::TokenAuthenticated => {
                write!(f, "Token-authenticated callers cannot issue tokens")
            }
            SessionError::UnknownPrincipal => write!(f, "Principal no longer exists"),
            SessionError::Database(e) => write!(f, "Database error: {}", e),
            SessionError::Token(e) => write!(f, "Token error: {}", e),
        }
    }
}

impl std::error::Error for SessionError {}

/// Rotate the principal's session marker, then sign a bearer token for it.
pub async fn issue_auth_token(
    db: &Database,
    codec: &TokenCodec,
    principal: &Principal,
    ttl_secs: u64,
) -> Result<IssuedToken, SessionError> {
    if principal.method == AuthMethod::Token {
        return Err(SessionError::TokenAuthenticated);
    }

    let marker = new_session_marker();
    let updated = db
        .users()
        .set_session_id(principal.user.id, &marker)
        .await
        .map_err(SessionError::Database)?;
    if !updated {
        return Err(SessionError::UnknownPrincipal);
    }

    codec
        .issue(
            Action::Authenticate {
                session_marker: marker,
            },
            ttl_secs,
        )
        .map_err(SessionError::Token)
}
