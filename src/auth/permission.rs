//! Permission bits and the role bitmask.

use serde::{Deserialize, Serialize};

/// One capability a role can grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Read,
    Like,
    Follow,
    Comment,
    Create,
    Admin,
}

impl Permission {
    pub const ALL: [Permission; 6] = [
        Permission::Read,
        Permission::Like,
        Permission::Follow,
        Permission::Comment,
        Permission::Create,
        Permission::Admin,
    ];

    pub const fn bit(self) -> i64 {
        match self {
            Permission::Read => 1,
            Permission::Like => 2,
            Permission::Follow => 4,
            Permission::Comment => 8,
            Permission::Create => 16,
            Permission::Admin => 32,
        }
    }
}

/// Bitmask of granted permissions, as stored in `roles.permissions`.
///
/// Unknown bits in a stored mask are dropped on load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permissions(i64);

impl Permissions {
    const KNOWN: i64 = 0b11_1111;

    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn from_bits(bits: i64) -> Self {
        Self(bits & Self::KNOWN)
    }

    pub fn bits(self) -> i64 {
        self.0
    }

    pub fn with(self, permission: Permission) -> Self {
        Self(self.0 | permission.bit())
    }

    pub fn without(self, permission: Permission) -> Self {
        Self(self.0 & !permission.bit())
    }

    /// True iff every bit of `permission` is set. No bit implies another.
    pub fn contains(self, permission: Permission) -> bool {
        self.0 & permission.bit() == permission.bit()
    }

    pub fn iter(self) -> impl Iterator<Item = Permission> {
        Permission::ALL.into_iter().filter(move |p| self.contains(*p))
    }
}

impl FromIterator<Permission> for Permissions {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), Self::with)
    }
}
