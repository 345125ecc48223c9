//! The uniform response envelope.
//!
//! Every answer, success or failure, is rendered as
//! `{"data": ..., "response": <category>, "message": <code>, "entity": <kind|null>}`
//! with the HTTP status implied by the category.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Serialize, Serializer};
use tracing::error;

/// Outcome class of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    Success,
    BadRequest,
    InvalidInput,
    MissingParameter,
    NotAuthorized,
    ServerError,
    NotFound,
}

impl Category {
    pub fn status(self) -> StatusCode {
        match self {
            Category::Success => StatusCode::OK,
            Category::BadRequest => StatusCode::BAD_REQUEST,
            Category::InvalidInput | Category::MissingParameter => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Category::NotAuthorized => StatusCode::FORBIDDEN,
            Category::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
            Category::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

/// Kind of object an envelope talks about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Entity {
    User,
    Role,
    Country,
    Region,
    Location,
    LocationType,
    ActivityType,
    Activity,
    LocationActivity,
    Comment,
    Hike,
}

/// Stable message codes, serialized as `subsystem.snake_case`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    AuthMissingParameter,
    AuthDuplicateParams,
    AuthUserCreated,
    AuthUserApproved,
    AuthUserConfirmed,
    AuthAlreadyConfirmed,
    AuthTokenInvalid,
    AuthInvalidParams,
    AuthConfirmationResent,
    AuthUsernameNotProvided,
    AuthPasswordResetRequested,
    AuthPasswordNotProvided,
    AuthResetFailed,
    AuthResetSuccessful,
    AuthEmailExists,
    AuthEmailChangeRequested,
    AuthEmailChangeFailed,
    AuthEmailChanged,
    AuthPasswordChanged,
    AuthLoginSuccessful,
    AuthCurrentUser,

    CreateNotAuthorized,
    CreateMissingParameter,
    CreateDuplicateParams,
    CreateInvalidParameter,
    CreateSuccessful,

    UpdateNotAuthorized,
    UpdateNotFound,
    UpdateDuplicateParams,
    UpdateInvalidParameter,
    UpdateSuccessful,

    FindNotAuthorized,
    FindNotFound,
    FindMissingParameter,
    FindSuccessful,

    ListNotAuthorized,
    ListInvalidOrder,
    ListSuccessful,

    HikesNotAuthorized,
    HikesActivityNotFound,
    HikesAdded,
    HikesFound,
    HikesNotFound,
    HikesRemoved,

    InitNotAuthorized,
    InitRolesCreated,
    InitUsersListed,

    MainNotFound,
    MainInvalidRequest,
    MainRateLimited,
    MainIpUnavailable,
    MainServerError,
}

impl Message {
    pub fn as_str(self) -> &'static str {
        match self {
            Message::AuthMissingParameter => "auth.missing_parameter",
            Message::AuthDuplicateParams => "auth.duplicate_params",
            Message::AuthUserCreated => "auth.user_created",
            Message::AuthUserApproved => "auth.user_approved",
            Message::AuthUserConfirmed => "auth.user_confirmed",
            Message::AuthAlreadyConfirmed => "auth.already_confirmed",
            Message::AuthTokenInvalid => "auth.token_invalid",
            Message::AuthInvalidParams => "auth.invalid_params",
            Message::AuthConfirmationResent => "auth.confirmation_resent",
            Message::AuthUsernameNotProvided => "auth.username_not_provided",
            Message::AuthPasswordResetRequested => "auth.password_reset_requested",
            Message::AuthPasswordNotProvided => "auth.password_not_provided",
            Message::AuthResetFailed => "auth.reset_failed",
            Message::AuthResetSuccessful => "auth.reset_successful",
            Message::AuthEmailExists => "auth.email_exists",
            Message::AuthEmailChangeRequested => "auth.email_change_requested",
            Message::AuthEmailChangeFailed => "auth.email_change_failed",
            Message::AuthEmailChanged => "auth.email_changed",
            Message::AuthPasswordChanged => "auth.password_changed",
            Message::AuthLoginSuccessful => "auth.login_successful",
            Message::AuthCurrentUser => "auth.current_user",

            Message::CreateNotAuthorized => "create.not_authorized",
            Message::CreateMissingParameter => "create.missing_parameter",
            Message::CreateDuplicateParams => "create.duplicate_params",
            Message::CreateInvalidParameter => "create.invalid_parameter",
            Message::CreateSuccessful => "create.successful",

            Message::UpdateNotAuthorized => "update.not_authorized",
            Message::UpdateNotFound => "update.not_found",
            Message::UpdateDuplicateParams => "update.duplicate_params",
            Message::UpdateInvalidParameter => "update.invalid_parameter",
            Message::UpdateSuccessful => "update.successful",

            Message::FindNotAuthorized => "find.not_authorized",
            Message::FindNotFound => "find.not_found",
            Message::FindMissingParameter => "find.missing_parameter",
            Message::FindSuccessful => "find.successful",

            Message::ListNotAuthorized => "list.not_authorized",
            Message::ListInvalidOrder => "list.invalid_order",
            Message::ListSuccessful => "list.successful",

            Message::HikesNotAuthorized => "hikes.not_authorized",
            Message::HikesActivityNotFound => "hikes.activity_not_found",
            Message::HikesAdded => "hikes.added",
            Message::HikesFound => "hikes.found",
            Message::HikesNotFound => "hikes.not_found",
            Message::HikesRemoved => "hikes.removed",

            Message::InitNotAuthorized => "init.not_authorized",
            Message::InitRolesCreated => "init.roles_created",
            Message::InitUsersListed => "init.users_listed",

            Message::MainNotFound => "main.not_found",
            Message::MainInvalidRequest => "main.invalid_request",
            Message::MainRateLimited => "main.rate_limited",
            Message::MainIpUnavailable => "main.ip_unavailable",
            Message::MainServerError => "main.server_error",
        }
    }
}

impl Serialize for Message {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize)]
struct Body<T> {
    data: T,
    response: Category,
    message: Message,
    entity: Option<Entity>,
}

/// A successful answer.
#[derive(Debug)]
pub struct Envelope<T = serde_json::Value> {
    status: StatusCode,
    message: Message,
    entity: Option<Entity>,
    data: T,
}

impl<T: Serialize> Envelope<T> {
    /// 200 with `data`.
    pub fn ok(message: Message, entity: Option<Entity>, data: T) -> Self {
        Self {
            status: StatusCode::OK,
            message,
            entity,
            data,
        }
    }

    /// 201 with the new object.
    pub fn created(message: Message, entity: Entity, data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            message,
            entity: Some(entity),
            data,
        }
    }

    pub fn message(&self) -> Message {
        self.message
    }

    pub fn data(&self) -> &T {
        &self.data
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        let body = Body {
            data: self.data,
            response: Category::Success,
            message: self.message,
            entity: self.entity,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Extension trait for concise error mapping on Results.
pub trait ResultExt<T> {
    fn db_err(self, msg: &str) -> Result<T, ApiError>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn db_err(self, msg: &str) -> Result<T, ApiError> {
        self.map_err(|e| ApiError::db_error(msg, e))
    }
}

/// A failed answer. Rendered with the same envelope shape as success.
#[derive(Debug, Clone)]
pub struct ApiError {
    status: StatusCode,
    category: Category,
    message: Message,
    entity: Option<Entity>,
    data: serde_json::Value,
}

impl ApiError {
    pub fn new(category: Category, message: Message) -> Self {
        Self {
            status: category.status(),
            category,
            message,
            entity: None,
            data: serde_json::Value::Null,
        }
    }

    pub fn bad_request(message: Message) -> Self {
        Self::new(Category::BadRequest, message)
    }

    pub fn invalid_input(message: Message) -> Self {
        Self::new(Category::InvalidInput, message)
    }

    pub fn missing_parameter(message: Message) -> Self {
        Self::new(Category::MissingParameter, message)
    }

    pub fn not_authorized(message: Message) -> Self {
        Self::new(Category::NotAuthorized, message)
    }

    pub fn not_found(message: Message) -> Self {
        Self::new(Category::NotFound, message)
    }

    pub fn internal() -> Self {
        Self::new(Category::ServerError, Message::MainServerError)
    }

    /// 429, reported to clients as a bad request.
    pub fn rate_limited() -> Self {
        Self {
            status: StatusCode::TOO_MANY_REQUESTS,
            ..Self::bad_request(Message::MainRateLimited)
        }
    }

    /// Log the cause and answer with a detail-free 500.
    pub fn db_error(context: &str, e: impl std::fmt::Display) -> Self {
        error!("{}: {}", context, e);
        Self::internal()
    }

    pub fn with_entity(mut self, entity: Entity) -> Self {
        self.entity = Some(entity);
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    /// Attach `{"existing": field}` for a uniqueness violation.
    pub fn with_existing(self, field: &str) -> Self {
        self.with_data(serde_json::json!({ "existing": field }))
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn message(&self) -> Message {
        self.message
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.status)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Body {
            data: self.data,
            response: self.category,
            message: self.message,
            entity: self.entity,
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_success_shape() {
        let response = Envelope::created(
            Message::AuthUserCreated,
            Entity::User,
            serde_json::json!({"id": 1}),
        )
        .into_response();
        assert_eq!(response.status(), StatusCode::CREATED);

        let json = body_json(response).await;
        assert_eq!(json["response"], "success");
        assert_eq!(json["message"], "auth.user_created");
        assert_eq!(json["entity"], "User");
        assert_eq!(json["data"]["id"], 1);
    }

    #[tokio::test]
    async fn test_error_shape() {
        let response = ApiError::bad_request(Message::AuthDuplicateParams)
            .with_entity(Entity::User)
            .with_existing("email")
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = body_json(response).await;
        assert_eq!(json["response"], "badRequest");
        assert_eq!(json["message"], "auth.duplicate_params");
        assert_eq!(json["data"]["existing"], "email");
    }

    #[tokio::test]
    async fn test_server_error_has_no_detail() {
        let response = ApiError::db_error("Failed to load user", "disk I/O error").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(response).await;
        assert_eq!(json["response"], "serverError");
        assert_eq!(json["message"], "main.server_error");
        assert!(json["data"].is_null());
        assert!(json["entity"].is_null());
    }

    #[test]
    fn test_category_statuses() {
        assert_eq!(Category::MissingParameter.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(Category::InvalidInput.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(Category::NotAuthorized.status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::rate_limited().status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
