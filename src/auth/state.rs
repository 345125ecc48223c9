//! Authentication state trait and macro.

use super::password::PasswordService;
use crate::db::Database;
use crate::token::TokenCodec;

/// Trait for state types that provide what the auth extractors need.
pub trait HasAuthBackend {
    fn db(&self) -> &Database;
    fn tokens(&self) -> &TokenCodec;
    fn passwords(&self) -> &PasswordService;
}

/// Macro to implement `HasAuthBackend` for state structs with the standard fields.
///
/// The struct must have these fields:
/// - `db: Database`
/// - `tokens: Arc<TokenCodec>`
/// - `passwords: Arc<PasswordService>`
///
/// # Example
/// ```ignore
/// use crate::impl_has_auth_backend;
///
/// #[derive(Clone)]
/// pub struct MyState {
///     pub db: Database,
///     pub tokens: Arc<TokenCodec>,
///     pub passwords: Arc<PasswordService>,
/// }
///
/// impl_has_auth_backend!(MyState);
/// ```
#[macro_export]
macro_rules! impl_has_auth_backend {
    ($state_type:ty) => {
        impl $crate::auth::HasAuthBackend for $state_type {
            fn db(&self) -> &$crate::db::Database {
                &self.db
            }
            fn tokens(&self) -> &$crate::token::TokenCodec {
                &self.tokens
            }
            fn passwords(&self) -> &$crate::auth::PasswordService {
                &self.passwords
            }
        }
    };
}
