//! Axum extractors for authentication.
//!
//! Credentials travel in the `Authorization` header, either as HTTP Basic
//! (`base64(identifier:secret)`) or as `Bearer <token>`. Basic with an empty
//! secret also carries a bearer token in the identifier position.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use base64::{Engine, engine::general_purpose::STANDARD};

use super::credentials::authenticate;
use super::state::HasAuthBackend;
use super::types::{Caller, Principal};
use crate::envelope::{ApiError, Message, ResultExt};

/// Credentials parsed from the `Authorization` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCredentials {
    pub identifier: String,
    pub secret: String,
}

/// The `Authorization` header is present but cannot be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MalformedAuthorization;

/// Parse the `Authorization` header. `None` when the header is absent;
/// an error when it is present but unusable.
pub fn parse_authorization(
    headers: &HeaderMap,
) -> Result<Option<RawCredentials>, MalformedAuthorization> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value.to_str().map_err(|_| MalformedAuthorization)?;
    let (scheme, rest) = value.trim().split_once(' ').ok_or(MalformedAuthorization)?;
    let rest = rest.trim();

    if scheme.eq_ignore_ascii_case("basic") {
        let decoded = STANDARD.decode(rest).map_err(|_| MalformedAuthorization)?;
        let decoded = String::from_utf8(decoded).map_err(|_| MalformedAuthorization)?;
        let (identifier, secret) = decoded
            .split_once(':')
            .unwrap_or((decoded.as_str(), ""));
        Ok(Some(RawCredentials {
            identifier: identifier.to_string(),
            secret: secret.to_string(),
        }))
    } else if scheme.eq_ignore_ascii_case("bearer") {
        Ok(Some(RawCredentials {
            identifier: rest.to_string(),
            secret: String::new(),
        }))
    } else {
        Err(MalformedAuthorization)
    }
}

async fn resolve_caller<S>(parts: &Parts, state: &S) -> Result<Caller, ApiError>
where
    S: HasAuthBackend + Send + Sync,
{
    let credentials = match parse_authorization(&parts.headers) {
        Ok(Some(credentials)) => credentials,
        Ok(None) | Err(MalformedAuthorization) => return Ok(Caller::Anonymous),
    };

    authenticate(
        state.db(),
        state.tokens(),
        state.passwords(),
        &credentials.identifier,
        &credentials.secret,
    )
    .await
    .db_err("Failed to authenticate request")
}

/// Extractor for endpoints that require a principal.
/// Rejects with 403 `auth.invalid_params`.
pub struct Auth(pub Principal);

impl<S> FromRequestParts<S> for Auth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        resolve_caller(parts, state)
            .await?
            .into_principal()
            .map(Auth)
            .ok_or_else(|| ApiError::not_authorized(Message::AuthInvalidParams))
    }
}

/// Extractor that never rejects bad credentials; they resolve to
/// `Caller::Anonymous`. Permission checks happen in the handler.
pub struct MaybeAuth(pub Caller);

impl<S> FromRequestParts<S> for MaybeAuth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        resolve_caller(parts, state).await.map(MaybeAuth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_basic_credentials() {
        let encoded = STANDARD.encode("alice:pa:ss");
        let parsed = parse_authorization(&headers(&format!("Basic {encoded}")))
            .unwrap()
            .unwrap();
        assert_eq!(parsed.identifier, "alice");
        assert_eq!(parsed.secret, "pa:ss");
    }

    #[test]
    fn test_basic_token_with_empty_secret() {
        let encoded = STANDARD.encode("some.jwt.value:");
        let parsed = parse_authorization(&headers(&format!("Basic {encoded}")))
            .unwrap()
            .unwrap();
        assert_eq!(parsed.identifier, "some.jwt.value");
        assert_eq!(parsed.secret, "");
    }

    #[test]
    fn test_bearer() {
        let parsed = parse_authorization(&headers("Bearer abc.def.ghi"))
            .unwrap()
            .unwrap();
        assert_eq!(parsed.identifier, "abc.def.ghi");
        assert!(parsed.secret.is_empty());
    }

    #[test]
    fn test_unusable_headers() {
        assert_eq!(parse_authorization(&HeaderMap::new()), Ok(None));
        assert!(parse_authorization(&headers("Basic !!!")).is_err());
        assert!(parse_authorization(&headers("Digest abc")).is_err());
        assert!(parse_authorization(&headers("Basic")).is_err());
    }
}
