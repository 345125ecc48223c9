//! Signed, time-boxed action tokens.
//!
//! Every mail link and every bearer credential is an HS256 JWT whose claims
//! carry exactly one [`Action`]. Tokens are never stored: the signature and
//! the `exp` claim are the whole story. A `jti` nonce makes every issued
//! token unique even when two are minted within the same second.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Lifetime of confirm/approve/reset/change-email tokens: 24 hours
pub const LIFECYCLE_TOKEN_DURATION_SECS: u64 = 24 * 60 * 60;

/// Lifetime of bearer tokens: 20 minutes
pub const AUTH_TOKEN_DURATION_SECS: u64 = 20 * 60;

/// What a token entitles its bearer to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Confirm {
        subject: i64,
    },
    Approve {
        subject: i64,
    },
    Reset {
        subject: i64,
    },
    ChangeEmail {
        subject: i64,
        new_email: String,
        username: String,
    },
    Authenticate {
        session_marker: String,
    },
}

/// Discriminant of [`Action`], used to say which action a caller expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Confirm,
    Approve,
    Reset,
    ChangeEmail,
    Authenticate,
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Confirm { .. } => ActionKind::Confirm,
            Action::Approve { .. } => ActionKind::Approve,
            Action::Reset { .. } => ActionKind::Reset,
            Action::ChangeEmail { .. } => ActionKind::ChangeEmail,
            Action::Authenticate { .. } => ActionKind::Authenticate,
        }
    }

    /// The principal id the action applies to. Bearer tokens name a session
    /// marker instead of an id.
    pub fn subject(&self) -> Option<i64> {
        match self {
            Action::Confirm { subject }
            | Action::Approve { subject }
            | Action::Reset { subject }
            | Action::ChangeEmail { subject, .. } => Some(*subject),
            Action::Authenticate { .. } => None,
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ActionKind::Confirm => "confirm",
            ActionKind::Approve => "approve",
            ActionKind::Reset => "reset",
            ActionKind::ChangeEmail => "change_email",
            ActionKind::Authenticate => "authenticate",
        };
        f.write_str(name)
    }
}

/// JWT claims wrapping an action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionClaims {
    /// Nonce, unique per issued token
    pub jti: String,
    /// The capability being granted
    pub act: Action,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Result of issuing a token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// The JWT token string
    pub token: String,
    /// Expiration timestamp (Unix seconds)
    pub expires_at: u64,
    /// Token duration in seconds
    pub duration: u64,
}

/// Signs and verifies action tokens with a process-wide secret.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenCodec {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    /// Sign `action` so that it stays valid for `ttl_secs` seconds.
    pub fn issue(&self, action: Action, ttl_secs: u64) -> Result<IssuedToken, TokenError> {
        let now = unix_now()?;
        let exp = now + ttl_secs;

        let claims = ActionClaims {
            jti: uuid::Uuid::new_v4().to_string(),
            act: action,
            iat: now,
            exp,
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(TokenError::Encoding)?;

        Ok(IssuedToken {
            token,
            expires_at: exp,
            duration: ttl_secs,
        })
    }

    /// Verify signature and expiry and return the embedded action.
    pub fn verify(&self, token: &str) -> Result<Action, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let token_data =
            jsonwebtoken::decode::<ActionClaims>(token, &self.decoding_key, &validation).map_err(
                |e| match e.kind() {
                    ErrorKind::ExpiredSignature => TokenError::Expired,
                    _ => TokenError::Malformed(e),
                },
            )?;

        // jsonwebtoken accepts exp == now; a zero-lifetime token must not verify.
        if token_data.claims.exp <= unix_now()? {
            return Err(TokenError::Expired);
        }

        Ok(token_data.claims.act)
    }

    /// Verify a token and require it to carry the given kind of action.
    pub fn verify_expecting(
        &self,
        token: &str,
        expected: ActionKind,
    ) -> Result<Action, TokenError> {
        let action = self.verify(token)?;
        let found = action.kind();
        if found != expected {
            return Err(TokenError::WrongAction { expected, found });
        }
        Ok(action)
    }
}

fn unix_now() -> Result<u64, TokenError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| TokenError::TimeError)
}

/// Errors that can occur while issuing or verifying tokens.
///
/// Callers at the network boundary collapse all verification failures into
/// one response; the variants exist for logging.
#[derive(Debug)]
pub enum TokenError {
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
    /// Bad signature, bad encoding or missing claims
    Malformed(jsonwebtoken::errors::Error),
    /// The token's lifetime has elapsed
    Expired,
    /// The token is valid but grants a different action
    WrongAction {
        expected: ActionKind,
        found: ActionKind,
    },
    /// System time error
    TimeError,
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            TokenError::Malformed(e) => write!(f, "Malformed token: {}", e),
            TokenError::Expired => write!(f, "Token expired"),
            TokenError::WrongAction { expected, found } => {
                write!(f, "Expected a {} token, got {}", expected, found)
            }
            TokenError::TimeError => write!(f, "System time error"),
        }
    }
}

impl std::error::Error for TokenError {}
