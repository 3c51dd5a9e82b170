//! Password verification.
//!
//! The session store never compares passwords itself; it asks an injected
//! `CredentialVerifier`. Demo deployments use a single shared secret, real
//! deployments store Argon2 hashes per account.

use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use rand::Rng;

use super::user::{DirectoryEntry, User, seed_users};

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("password hashing failed: {0}")]
    Hash(String),
}

pub trait CredentialVerifier: Send + Sync {
    /// Whether `password` unlocks `entry`.
    fn verify(&self, entry: &DirectoryEntry, password: &str) -> bool;

    /// Credential material to store for a new account, if this verifier keeps
    /// any.
    ///
    /// # Errors
    ///
    /// Returns an error if hashing fails.
    fn hash(&self, password: &str) -> Result<Option<String>, CredentialError>;
}

// =============================================================================
// SHARED SECRET
// =============================================================================

/// Accepts exactly one secret for every account in the directory.
pub struct SharedSecretVerifier {
    secret: String,
}

impl SharedSecretVerifier {
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: secret.into() }
    }
}

impl CredentialVerifier for SharedSecretVerifier {
    fn verify(&self, _entry: &DirectoryEntry, password: &str) -> bool {
        constant_time_eq::constant_time_eq(password.as_bytes(), self.secret.as_bytes())
    }

    fn hash(&self, _password: &str) -> Result<Option<String>, CredentialError> {
        Ok(None)
    }
}

// =============================================================================
// ARGON2
// =============================================================================

/// Verifies against per-account PHC hashes. Entries without a hash never
/// match.
#[derive(Default)]
pub struct Argon2Verifier {
    argon2: Argon2<'static>,
}

impl Argon2Verifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialVerifier for Argon2Verifier {
    fn verify(&self, entry: &DirectoryEntry, password: &str) -> bool {
        let Some(stored) = entry.password_hash.as_deref() else {
            return false;
        };
        match PasswordHash::new(stored) {
            Ok(parsed) => self.argon2.verify_password(password.as_bytes(), &parsed).is_ok(),
            Err(e) => {
                tracing::warn!(error = %e, user_id = %entry.user.id, "stored password hash is malformed");
                false
            }
        }
    }

    fn hash(&self, password: &str) -> Result<Option<String>, CredentialError> {
        let salt_bytes: [u8; 16] = rand::rng().random();
        let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| CredentialError::Hash(e.to_string()))?;
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| CredentialError::Hash(e.to_string()))?;
        Ok(Some(hash.to_string()))
    }
}

/// Directory entries for the seed accounts, with credential material produced
/// by `verifier` from `initial_password`.
///
/// # Errors
///
/// Returns an error if hashing fails.
pub fn seed_entries(verifier: &dyn CredentialVerifier, initial_password: &str) -> Result<Vec<DirectoryEntry>, CredentialError> {
    seed_users()
        .into_iter()
        .map(|user: User| {
            Ok(DirectoryEntry {
                user,
                password_hash: verifier.hash(initial_password)?,
            })
        })
        .collect()
}

#[cfg(test)]
#[path = "credentials_test.rs"]
mod tests;
