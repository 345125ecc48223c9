//! Argon2id password hashing.

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use rand::RngCore;
use tokio::task;

const SALT_LEN: usize = 16;

/// Hashes and verifies passwords. Cheap to clone.
///
/// Argon2 work runs on the blocking pool so it never holds an executor
/// thread.
#[derive(Clone)]
pub struct PasswordService {
    argon2: Argon2<'static>,
    /// Verified against when the account does not exist, so a miss costs
    /// the same as a wrong password.
    dummy_hash: String,
}

impl PasswordService {
    pub fn new() -> Result<Self, PasswordError> {
        let argon2 = Argon2::default();
        let dummy_hash = hash_with(&argon2, "dummy-password-for-timing-parity")?;
        Ok(Self { argon2, dummy_hash })
    }

    pub async fn hash_password(&self, password: &str) -> Result<String, PasswordError> {
        let argon2 = self.argon2.clone();
        let password = password.to_string();
        task::spawn_blocking(move || hash_with(&argon2, &password)).await?
    }

    /// Check `password` against a PHC-encoded hash. The comparison itself is
    /// constant time.
    pub async fn verify_password(
        &self,
        password: &str,
        encoded: &str,
    ) -> Result<bool, PasswordError> {
        let argon2 = self.argon2.clone();
        let password = password.to_string();
        let encoded = encoded.to_string();
        task::spawn_blocking(move || verify_with(&argon2, &password, &encoded)).await?
    }

    /// Burn the same amount of work as a real verification.
    pub async fn verify_dummy(&self, password: &str) -> Result<(), PasswordError> {
        match self.verify_password(password, &self.dummy_hash).await {
            Err(e @ PasswordError::Task(_)) => Err(e),
            _ => Ok(()),
        }
    }
}

fn hash_with(argon2: &Argon2<'_>, password: &str) -> Result<String, PasswordError> {
    let mut salt_bytes = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes)?;
    let hash = argon2.hash_password(password.as_bytes(), &salt)?.to_string();
    Ok(hash)
}

fn verify_with(argon2: &Argon2<'_>, password: &str, encoded: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(encoded)?;
    match argon2.verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(err) => Err(PasswordError::Hash(err)),
    }
}

#[derive(Debug)]
pub enum PasswordError {
    Hash(argon2::password_hash::Error),
    /// The blocking task panicked or was cancelled.
    Task(task::JoinError),
}

impl From<argon2::password_hash::Error> for PasswordError {
    fn from(err: argon2::password_hash::Error) -> Self {
        Self::Hash(err)
    }
}

impl From<task::JoinError> for PasswordError {
    fn from(err: task::JoinError) -> Self {
        Self::Task(err)
    }
}

impl std::fmt::Display for PasswordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hash(e) => write!(f, "Password hashing failed: {e}"),
            Self::Task(e) => write!(f, "Password task failed: {e}"),
        }
    }
}

impl std::error::Error for PasswordError {}
