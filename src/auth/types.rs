//! Authenticated caller types.

use super::permission::Permission;
use crate::db::User;

/// How the current request proved its identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    /// Username or email plus password
    Password,
    /// Bearer token naming the current session marker
    Token,
}

/// An authenticated account.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user: User,
    pub method: AuthMethod,
}

impl Principal {
    pub fn can(&self, permission: Permission) -> bool {
        self.user.permissions.contains(permission)
    }
}

/// Whoever is making the request.
#[derive(Debug, Clone)]
pub enum Caller {
    Anonymous,
    Authenticated(Principal),
}

impl Caller {
    /// Anonymous callers hold no permissions.
    pub fn can(&self, permission: Permission) -> bool {
        match self {
            Caller::Anonymous => false,
            Caller::Authenticated(principal) => principal.can(permission),
        }
    }

    pub fn principal(&self) -> Option<&Principal> {
        match self {
            Caller::Anonymous => None,
            Caller::Authenticated(principal) => Some(principal),
        }
    }

    pub fn into_principal(self) -> Option<Principal> {
        match self {
            Caller::Anonymous => None,
            Caller::Authenticated(principal) => Some(principal),
        }
    }
}
