//! Account lifecycle: sign-up, operator approval, email confirmation,
//! password reset and email change.
//!
//! An account starts unapproved and unconfirmed. Sign-up mails an approval
//! link to the operator; approval mails a confirmation link to the user.
//! Every link carries a signed action token; nothing about pending workflows
//! is stored, so a token stays usable until it expires.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::{
    AuthMethod, PasswordService, Principal, SessionError, issue_auth_token, new_session_marker,
};
use crate::db::{Database, NewUser, User, unique_violation_field};
use crate::envelope::{ApiError, Entity, Envelope, Message, ResultExt};
use crate::mail::{Mailer, Notification, templates};
use crate::token::{
    AUTH_TOKEN_DURATION_SECS, Action, ActionKind, LIFECYCLE_TOKEN_DURATION_SECS, TokenCodec,
};

/// Recorded as `last_updated_by` for changes made through an operator link.
const OPERATOR: &str = "operator";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewAccount {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PasswordChange {
    pub password_new: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResetRequest {
    pub username: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PasswordReset {
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmailChange {
    pub email: Option<String>,
    pub username: Option<String>,
}

/// A principal, plus a bearer token when one was issued.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub user: User,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// RFC 3339
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_ts: Option<String>,
}

#[derive(Clone)]
pub struct AccountService {
    db: Database,
    tokens: Arc<TokenCodec>,
    passwords: Arc<PasswordService>,
    mailer: Arc<dyn Mailer>,
    public_url: String,
    approval_mail: String,
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl AccountService {
    pub fn new(
        db: Database,
        tokens: Arc<TokenCodec>,
        passwords: Arc<PasswordService>,
        mailer: Arc<dyn Mailer>,
        public_url: &str,
        approval_mail: impl Into<String>,
    ) -> Self {
        Self {
            db,
            tokens,
            passwords,
            mailer,
            public_url: public_url.trim_end_matches('/').to_string(),
            approval_mail: approval_mail.into(),
        }
    }

    fn link(&self, path: &str, token: &str) -> String {
        format!("{}/auth/{}/{}", self.public_url, path, token)
    }

    fn issue_lifecycle(&self, action: Action) -> Result<String, ApiError> {
        self.tokens
            .issue(action, LIFECYCLE_TOKEN_DURATION_SECS)
            .map(|issued| issued.token)
            .map_err(|e| ApiError::db_error("Failed to issue token", e))
    }

    fn notify(&self, notification: Notification) {
        let to = notification.to.clone();
        if let Err(e) = self.mailer.send(notification) {
            warn!(to = %to, error = %e, "Failed to send notification");
        }
    }

    async fn hash(&self, password: &str) -> Result<String, ApiError> {
        self.passwords
            .hash_password(password)
            .await
            .db_err("Failed to hash password")
    }

    async fn load(&self, id: i64) -> Result<User, ApiError> {
        self.db
            .users()
            .get_by_id(id)
            .await
            .db_err("Failed to load user")?
            .ok_or_else(ApiError::internal)
    }

    /// Verify a lifecycle token and load its subject. Both failures look the
    /// same to the caller.
    async fn resolve_subject(
        &self,
        token: &str,
        expected: ActionKind,
    ) -> Result<Option<User>, ApiError> {
        let action = match self.tokens.verify_expecting(token, expected) {
            Ok(action) => action,
            Err(e) => {
                info!(expected = %expected, error = %e, "Lifecycle token rejected");
                return Ok(None);
            }
        };
        let Some(subject) = action.subject() else {
            return Ok(None);
        };
        self.db
            .users()
            .get_by_id(subject)
            .await
            .db_err("Failed to load token subject")
    }

    pub async fn create_user(&self, input: NewAccount) -> Result<Envelope<User>, ApiError> {
        let missing = |field: &str| {
            ApiError::missing_parameter(Message::AuthMissingParameter)
                .with_entity(Entity::User)
                .with_data(serde_json::json!({ "missing": field }))
        };
        let username = present(input.username.as_deref()).ok_or_else(|| missing("username"))?;
        let email = present(input.email.as_deref()).ok_or_else(|| missing("email"))?;
        let password = input
            .password
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| missing("password"))?;

        let password_hash = self.hash(password).await?;
        let role = self
            .db
            .roles()
            .get_default()
            .await
            .db_err("Failed to load default role")?;
        let session_id = new_session_marker();

        let id = match self
            .db
            .users()
            .create(&NewUser {
                username,
                email,
                password_hash: &password_hash,
                session_id: &session_id,
                role_id: role.map(|r| r.id),
            })
            .await
        {
            Ok(id) => id,
            Err(e) => {
                if let Some(field) = unique_violation_field(&e) {
                    return Err(ApiError::bad_request(Message::AuthDuplicateParams)
                        .with_entity(Entity::User)
                        .with_existing(&field));
                }
                return Err(ApiError::db_error("Failed to create user", e));
            }
        };

        let token = self.issue_lifecycle(Action::Approve { subject: id })?;
        self.notify(
            Notification::new(
                &self.approval_mail,
                "New account awaiting approval",
                templates::APPROVAL_REQUEST,
            )
            .with("username", username)
            .with("email", email)
            .with("link", self.link("approve", &token)),
        );

        info!(user_id = id, username = %username, "User created");
        let user = self.load(id).await?;
        Ok(Envelope::created(Message::AuthUserCreated, Entity::User, user))
    }

    pub async fn approve(&self, token: &str) -> Result<Envelope<User>, ApiError> {
        let Some(user) = self.resolve_subject(token, ActionKind::Approve).await? else {
            return Err(token_invalid());
        };

        if user.confirmed {
            return Ok(Envelope::ok(Message::AuthAlreadyConfirmed, Some(Entity::User), user));
        }

        self.db
            .users()
            .set_approved(user.id, OPERATOR)
            .await
            .db_err("Failed to approve user")?;

        let confirm = self.issue_lifecycle(Action::Confirm { subject: user.id })?;
        self.notify(
            Notification::new(&user.email, "Confirm your account", templates::CONFIRM_ACCOUNT)
                .with("username", user.username.as_str())
                .with("link", self.link("confirm", &confirm)),
        );

        info!(user_id = user.id, "User approved");
        let user = self.load(user.id).await?;
        Ok(Envelope::ok(Message::AuthUserApproved, Some(Entity::User), user))
    }

    pub async fn confirm(&self, token: &str) -> Result<Envelope<User>, ApiError> {
        let Some(user) = self.resolve_subject(token, ActionKind::Confirm).await? else {
            return Err(token_invalid());
        };

        if user.confirmed {
            return Ok(Envelope::ok(Message::AuthAlreadyConfirmed, Some(Entity::User), user));
        }

        self.db
            .users()
            .set_confirmed(user.id, &user.username)
            .await
            .db_err("Failed to confirm user")?;

        info!(user_id = user.id, "User confirmed");
        let user = self.load(user.id).await?;
        Ok(Envelope::ok(Message::AuthUserConfirmed, Some(Entity::User), user))
    }

    pub async fn resend_confirmation(
        &self,
        principal: &Principal,
    ) -> Result<Envelope<User>, ApiError> {
        let user = &principal.user;
        if user.confirmed {
            return Err(
                ApiError::invalid_input(Message::AuthAlreadyConfirmed).with_entity(Entity::User),
            );
        }

        let confirm = self.issue_lifecycle(Action::Confirm { subject: user.id })?;
        self.notify(
            Notification::new(&user.email, "Confirm your account", templates::CONFIRM_ACCOUNT)
                .with("username", user.username.as_str())
                .with("link", self.link("confirm", &confirm)),
        );

        Ok(Envelope::ok(
            Message::AuthConfirmationResent,
            Some(Entity::User),
            user.clone(),
        ))
    }

    pub async fn request_password_reset(
        &self,
        input: ResetRequest,
    ) -> Result<Envelope<serde_json::Value>, ApiError> {
        let username = present(input.username.as_deref()).ok_or_else(|| {
            ApiError::missing_parameter(Message::AuthUsernameNotProvided)
                .with_entity(Entity::User)
        })?;

        let user = self
            .db
            .users()
            .get_by_username(username)
            .await
            .db_err("Failed to load user")?
            .ok_or_else(|| {
                ApiError::invalid_input(Message::AuthInvalidParams).with_entity(Entity::User)
            })?;

        let token = self.issue_lifecycle(Action::Reset { subject: user.id })?;
        self.notify(
            Notification::new(&user.email, "Reset your password", templates::RESET_PASSWORD)
                .with("username", user.username.as_str())
                .with("link", self.link("reset", &token)),
        );

        info!(user_id = user.id, "Password reset requested");
        Ok(Envelope::ok(
            Message::AuthPasswordResetRequested,
            Some(Entity::User),
            serde_json::Value::Null,
        ))
    }

    /// The session marker is not rotated, so bearer tokens issued before the
    /// reset stay valid until they expire.
    pub async fn perform_password_reset(
        &self,
        token: &str,
        input: PasswordReset,
    ) -> Result<Envelope<User>, ApiError> {
        let password = input
            .password
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| {
                ApiError::missing_parameter(Message::AuthPasswordNotProvided)
                    .with_entity(Entity::User)
            })?;

        let Some(user) = self.resolve_subject(token, ActionKind::Reset).await? else {
            return Err(ApiError::bad_request(Message::AuthResetFailed).with_entity(Entity::User));
        };

        let hash = self.hash(password).await?;
        self.db
            .users()
            .set_password_hash(user.id, &hash, &user.username)
            .await
            .db_err("Failed to reset password")?;

        info!(user_id = user.id, "Password reset");
        let user = self.load(user.id).await?;
        Ok(Envelope::ok(Message::AuthResetSuccessful, Some(Entity::User), user))
    }

    pub async fn request_email_change(
        &self,
        principal: &Principal,
        input: EmailChange,
    ) -> Result<Envelope<serde_json::Value>, ApiError> {
        let user = &principal.user;
        let new_email = present(input.email.as_deref()).ok_or_else(|| {
            ApiError::missing_parameter(Message::AuthMissingParameter)
                .with_entity(Entity::User)
                .with_data(serde_json::json!({ "missing": "email" }))
        })?;

        if new_email.eq_ignore_ascii_case(&user.email) {
            return Err(
                ApiError::invalid_input(Message::AuthEmailExists).with_entity(Entity::User)
            );
        }

        let username = present(input.username.as_deref()).unwrap_or(&user.username);
        let token = self.issue_lifecycle(Action::ChangeEmail {
            subject: user.id,
            new_email: new_email.to_string(),
            username: username.to_string(),
        })?;
        self.notify(
            Notification::new(
                new_email,
                "Confirm your new email address",
                templates::CHANGE_EMAIL,
            )
            .with("username", username)
            .with("link", self.link("change_email", &token)),
        );

        info!(user_id = user.id, "Email change requested");
        Ok(Envelope::ok(
            Message::AuthEmailChangeRequested,
            Some(Entity::User),
            serde_json::Value::Null,
        ))
    }

    pub async fn perform_email_change(&self, token: &str) -> Result<Envelope<User>, ApiError> {
        let (subject, new_email, username) =
            match self.tokens.verify_expecting(token, ActionKind::ChangeEmail) {
                Ok(Action::ChangeEmail {
                    subject,
                    new_email,
                    username,
                }) => (subject, new_email, username),
                Ok(_) => return Err(token_invalid()),
                Err(e) => {
                    info!(error = %e, "Email change token rejected");
                    return Err(token_invalid());
                }
            };

        let user = self
            .db
            .users()
            .get_by_username(&username)
            .await
            .db_err("Failed to load user")?
            .ok_or_else(|| {
                ApiError::invalid_input(Message::AuthInvalidParams).with_entity(Entity::User)
            })?;

        if user.id != subject {
            warn!(subject, user_id = user.id, "Email change token names another user");
            return Err(
                ApiError::bad_request(Message::AuthEmailChangeFailed).with_entity(Entity::User)
            );
        }

        let updated = self
            .db
            .users()
            .set_email(user.id, &new_email, &user.username)
            .await;
        if let Err(e) = updated {
            if let Some(field) = unique_violation_field(&e) {
                return Err(ApiError::bad_request(Message::AuthDuplicateParams)
                    .with_entity(Entity::User)
                    .with_existing(&field));
            }
            return Err(ApiError::db_error("Failed to change email", e));
        }

        info!(user_id = user.id, "Email changed");
        let user = self.load(user.id).await?;
        Ok(Envelope::ok(Message::AuthEmailChanged, Some(Entity::User), user))
    }

    pub async fn change_password(
        &self,
        principal: &Principal,
        input: PasswordChange,
    ) -> Result<Envelope<User>, ApiError> {
        let password = input
            .password_new
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| {
                ApiError::missing_parameter(Message::AuthPasswordNotProvided)
                    .with_entity(Entity::User)
            })?;

        let user = &principal.user;
        let hash = self.hash(password).await?;
        self.db
            .users()
            .set_password_hash(user.id, &hash, &user.username)
            .await
            .db_err("Failed to change password")?;

        info!(user_id = user.id, "Password changed");
        let user = self.load(user.id).await?;
        Ok(Envelope::ok(Message::AuthPasswordChanged, Some(Entity::User), user))
    }

    /// Mint a bearer token for a password-authenticated caller.
    pub async fn login(&self, principal: &Principal) -> Result<Envelope<SessionView>, ApiError> {
        let view = self.session_view(principal, true).await?;
        Ok(Envelope::ok(Message::AuthLoginSuccessful, Some(Entity::User), view))
    }

    /// The caller's account; a fresh bearer token is included only for
    /// password authentication.
    pub async fn current_user(
        &self,
        principal: &Principal,
    ) -> Result<Envelope<SessionView>, ApiError> {
        let with_token = principal.method == AuthMethod::Password;
        let view = self.session_view(principal, with_token).await?;
        Ok(Envelope::ok(Message::AuthCurrentUser, Some(Entity::User), view))
    }

    async fn session_view(
        &self,
        principal: &Principal,
        with_token: bool,
    ) -> Result<SessionView, ApiError> {
        if !with_token {
            return Ok(SessionView {
                user: principal.user.clone(),
                token: None,
                expiration_ts: None,
            });
        }

        let issued = issue_auth_token(&self.db, &self.tokens, principal, AUTH_TOKEN_DURATION_SECS)
            .await
            .map_err(|e| match e {
                SessionError::TokenAuthenticated => {
                    ApiError::not_authorized(Message::AuthInvalidParams).with_entity(Entity::User)
                }
                other => ApiError::db_error("Failed to issue auth token", other),
            })?;

        let expiration_ts = i64::try_from(issued.expires_at)
            .ok()
            .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
            .map(|ts| ts.to_rfc3339());

        Ok(SessionView {
            user: self.load(principal.user.id).await?,
            token: Some(issued.token),
            expiration_ts,
        })
    }
}

fn token_invalid() -> ApiError {
    ApiError::invalid_input(Message::AuthTokenInvalid).with_entity(Entity::User)
}
