//! Resolve an (identifier, secret) pair to a caller.
//!
//! An empty secret means the identifier is a bearer token; otherwise the
//! identifier is a username or email and the secret a password. A failed
//! attempt has no side effects.

use tracing::{debug, warn};

use super::password::{PasswordError, PasswordService};
use super::types::{AuthMethod, Caller, Principal};
use crate::db::Database;
use crate::token::{Action, ActionKind, TokenCodec};

/// Lookup or hashing failed. Bad credentials are never an error.
#[derive(Debug)]
pub enum AuthenticateError {
    Db(sqlx::Error),
    Password(PasswordError),
}

impl From<sqlx::Error> for AuthenticateError {
    fn from(err: sqlx::Error) -> Self {
        Self::Db(err)
    }
}

impl From<PasswordError> for AuthenticateError {
    fn from(err: PasswordError) -> Self {
        Self::Password(err)
    }
}

impl std::fmt::Display for AuthenticateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(e) => write!(f, "{e}"),
            Self::Password(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for AuthenticateError {}

pub async fn authenticate(
    db: &Database,
    codec: &TokenCodec,
    passwords: &PasswordService,
    identifier: &str,
    secret: &str,
) -> Result<Caller, AuthenticateError> {
    if identifier.is_empty() {
        return Ok(Caller::Anonymous);
    }

    if secret.is_empty() {
        return Ok(authenticate_token(db, codec, identifier).await?);
    }

    let Some(user) = db.users().get_by_login(identifier).await? else {
        passwords.verify_dummy(secret).await?;
        return Ok(Caller::Anonymous);
    };

    match passwords.verify_password(secret, &user.password_hash).await {
        Ok(true) => Ok(Caller::Authenticated(Principal {
            user,
            method: AuthMethod::Password,
        })),
        Ok(false) => Ok(Caller::Anonymous),
        Err(e @ PasswordError::Task(_)) => Err(e.into()),
        Err(PasswordError::Hash(e)) => {
            warn!(user_id = user.id, error = %e, "Stored password hash is unreadable");
            Ok(Caller::Anonymous)
        }
    }
}

async fn authenticate_token(
    db: &Database,
    codec: &TokenCodec,
    token: &str,
) -> Result<Caller, sqlx::Error> {
    let session_marker = match codec.verify_expecting(token, ActionKind::Authenticate) {
        Ok(Action::Authenticate { session_marker }) => session_marker,
        Ok(_) => return Ok(Caller::Anonymous),
        Err(e) => {
            debug!(error = %e, "Bearer token rejected");
            return Ok(Caller::Anonymous);
        }
    };

    Ok(db
        .users()
        .get_by_session_id(&session_marker)
        .await?
        .map(|user| {
            Caller::Authenticated(Principal {
                user,
                method: AuthMethod::Token,
            })
        })
        .unwrap_or(Caller::Anonymous))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Permission;
    use crate::db::NewUser;

    async fn setup() -> (Database, TokenCodec, PasswordService, i64) {
        let db = Database::open(":memory:").await.unwrap();
        let passwords = PasswordService::new().unwrap();
        let hash = passwords.hash_password("pw").await.unwrap();
        let role = db.roles().get_default().await.unwrap().unwrap();
        let id = db
            .users()
            .create(&NewUser {
                username: "alice",
                email: "a@x.com",
                password_hash: &hash,
                session_id: "S1S1S1S1S1S1S1S1",
                role_id: Some(role.id),
            })
            .await
            .unwrap();
        (db, TokenCodec::new(b"credential-test-secret"), passwords, id)
    }

    fn principal(caller: Caller) -> Principal {
        caller.into_principal().expect("expected an authenticated caller")
    }

    #[tokio::test]
    async fn test_password_by_username_or_email() {
        let (db, codec, passwords, id) = setup().await;

        let by_name = authenticate(&db, &codec, &passwords, "alice", "pw").await.unwrap();
        let by_name = principal(by_name);
        assert_eq!(by_name.user.id, id);
        assert_eq!(by_name.method, AuthMethod::Password);
        assert!(by_name.can(Permission::Read));

        let by_email = authenticate(&db, &codec, &passwords, "a@x.com", "pw").await.unwrap();
        let by_email = principal(by_email);
        assert_eq!(by_email.user.id, id);
    }

    #[tokio::test]
    async fn test_failures_are_anonymous() {
        let (db, codec, passwords, _) = setup().await;

        let attempts = [("", "pw"), ("alice", "wrong"), ("nobody", "pw"), ("alice", "")];
        for (identifier, secret) in attempts {
            let caller = authenticate(&db, &codec, &passwords, identifier, secret)
                .await
                .unwrap();
            assert!(
                matches!(caller, Caller::Anonymous),
                "{identifier:?}/{secret:?} should be anonymous"
            );
        }
    }

    #[tokio::test]
    async fn test_bearer_token_resolves_session_marker() {
        let (db, codec, passwords, id) = setup().await;
        let token = codec
            .issue(
                Action::Authenticate {
                    session_marker: "S1S1S1S1S1S1S1S1".to_string(),
                },
                60,
            )
            .unwrap()
            .token;

        let caller = principal(authenticate(&db, &codec, &passwords, &token, "").await.unwrap());
        assert_eq!(caller.user.id, id);
        assert_eq!(caller.method, AuthMethod::Token);

        db.users().set_session_id(id, "S2S2S2S2S2S2S2S2").await.unwrap();
        let caller = authenticate(&db, &codec, &passwords, &token, "").await.unwrap();
        assert!(matches!(caller, Caller::Anonymous));
    }

    #[tokio::test]
    async fn test_lifecycle_token_is_not_a_bearer_token() {
        let (db, codec, passwords, id) = setup().await;
        let token = codec.issue(Action::Confirm { subject: id }, 60).unwrap().token;

        let caller = authenticate(&db, &codec, &passwords, &token, "").await.unwrap();
        assert!(matches!(caller, Caller::Anonymous));
    }
}
