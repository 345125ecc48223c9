//! Credentials, sessions and permissions.
//!
//! A request authenticates either with a password or with a short-lived
//! bearer token bound to the principal's current session marker. Issuing a
//! new bearer token rotates the marker, which revokes every older token.

mod credentials;
mod extractors;
mod ip;
mod password;
mod permission;
mod session;
mod state;
mod types;

pub use credentials::{AuthenticateError, authenticate};
pub use extractors::{
    Auth, MalformedAuthorization, MaybeAuth, RawCredentials, parse_authorization,
};
pub use ip::extract_client_ip;
pub use password::{PasswordError, PasswordService};
pub use permission::{Permission, Permissions};
pub use session::{SESSION_MARKER_LEN, SessionError, issue_auth_token, new_session_marker};
pub use state::HasAuthBackend;
pub use types::{AuthMethod, Caller, Principal};
