//! User records and the user directory.
//!
//! SYSTEM CONTEXT
//! ==============
//! The session store resolves identities through the `UserDirectory` trait.
//! Two implementations exist: an in-memory map seeded at startup (the default
//! for demo deployments) and a PostgreSQL table used when `DATABASE_URL` is
//! configured. Emails are normalized before they are used as keys.

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

const MIN_PASSWORD_LEN: usize = 6;

// =============================================================================
// USER
// =============================================================================

/// Coarse authorization tag attached to every user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }
}

impl FromStr for Role {
    type Err = DirectoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "user" => Ok(Self::User),
            other => Err(DirectoryError::InvalidRole(other.to_owned())),
        }
    }
}

/// An account known to the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    pub role: Role,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl User {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_owned()
    }
}

/// Directory row: the public user record plus credential material.
#[derive(Debug, Clone)]
pub struct DirectoryEntry {
    pub user: User,
    /// PHC-format password hash. `None` for accounts that rely on the shared
    /// secret.
    pub password_hash: Option<String>,
}

// =============================================================================
// REGISTRATION INPUT
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Please enter a valid email address")]
    Email,
    #[error("Password must be at least 6 characters")]
    PasswordTooShort,
    #[error("First and last name are required")]
    MissingName,
}

impl RegisterRequest {
    /// Field checks a registration form performs before submitting.
    /// Returns the normalized email on success.
    ///
    /// # Errors
    ///
    /// Returns the first failing field check.
    pub fn validate(&self) -> Result<String, ValidationError> {
        let email = normalize_email(&self.email).ok_or(ValidationError::Email)?;
        if self.first_name.trim().is_empty() || self.last_name.trim().is_empty() {
            return Err(ValidationError::MissingName);
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ValidationError::PasswordTooShort);
        }
        Ok(email)
    }

    /// Build the user record this request describes. Role is always `user`.
    #[must_use]
    pub fn into_user(self, email: String) -> User {
        User {
            id: Uuid::new_v4(),
            email,
            first_name: self.first_name.trim().to_owned(),
            last_name: self.last_name.trim().to_owned(),
            phone_number: self.phone_number.map(|p| p.trim().to_owned()).filter(|p| !p.is_empty()),
            role: Role::User,
            created_at: OffsetDateTime::now_utc(),
        }
    }
}

#[must_use]
pub fn normalize_email(email: &str) -> Option<String> {
    let normalized = email.trim().to_ascii_lowercase();
    let mut parts = normalized.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return None;
    };
    if local.is_empty() || domain.is_empty() || domain.starts_with('.') || domain.ends_with('.') {
        return None;
    }
    Some(normalized)
}

// =============================================================================
// DIRECTORY
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("user {0} already exists")]
    Duplicate(String),
    #[error("unknown role {0:?}")]
    InvalidRole(String),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

/// Lookup and insert of accounts by normalized email.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<DirectoryEntry>, DirectoryError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DirectoryError>;

    /// Insert a new entry. Fails with `Duplicate` if the email is taken.
    async fn insert(&self, entry: DirectoryEntry) -> Result<(), DirectoryError>;
}

/// Accounts present in every fresh deployment.
#[must_use]
pub fn seed_users() -> Vec<User> {
    let created_at = OffsetDateTime::UNIX_EPOCH + time::Duration::days(19_723);
    vec![
        User {
            id: Uuid::from_u128(0x0000_0000_0000_4000_8000_0000_0000_0001),
            email: "admin@manishphotography.com".to_owned(),
            first_name: "Manish".to_owned(),
            last_name: "Admin".to_owned(),
            phone_number: None,
            role: Role::Admin,
            created_at,
        },
        User {
            id: Uuid::from_u128(0x0000_0000_0000_4000_8000_0000_0000_0002),
            email: "user@example.com".to_owned(),
            first_name: "Demo".to_owned(),
            last_name: "Client".to_owned(),
            phone_number: Some("+1 555 0100".to_owned()),
            role: Role::User,
            created_at,
        },
    ]
}

/// Process-local directory keyed by normalized email.
#[derive(Default)]
pub struct InMemoryDirectory {
    entries: RwLock<HashMap<String, DirectoryEntry>>,
}

impl InMemoryDirectory {
    #[must_use]
    #[cfg(test)]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_entries(entries: impl IntoIterator<Item = DirectoryEntry>) -> Self {
        let entries = entries
            .into_iter()
            .map(|entry| (entry.user.email.to_ascii_lowercase(), entry))
            .collect();
        Self { entries: RwLock::new(entries) }
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl UserDirectory for InMemoryDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<DirectoryEntry>, DirectoryError> {
        Ok(self.entries.read().await.get(email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DirectoryError> {
        let entries = self.entries.read().await;
        Ok(entries
            .values()
            .find(|entry| entry.user.id == id)
            .map(|entry| entry.user.clone()))
    }

    async fn insert(&self, entry: DirectoryEntry) -> Result<(), DirectoryError> {
        let mut entries = self.entries.write().await;
        let key = entry.user.email.to_ascii_lowercase();
        if entries.contains_key(&key) {
            return Err(DirectoryError::Duplicate(key));
        }
        entries.insert(key, entry);
        Ok(())
    }
}

/// Directory backed by the `users` table.
pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn user_from_row(row: &sqlx::postgres::PgRow) -> Result<User, DirectoryError> {
    let role: String = row.try_get("role")?;
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        phone_number: row.try_get("phone_number")?,
        role: role.parse()?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl UserDirectory for PgDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<DirectoryEntry>, DirectoryError> {
        let row = sqlx::query(
            r"SELECT id, email, first_name, last_name, phone_number, role, password_hash, created_at
              FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| {
            Ok(DirectoryEntry {
                user: user_from_row(&r)?,
                password_hash: r.try_get("password_hash")?,
            })
        })
        .transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DirectoryError> {
        let row = sqlx::query(
            r"SELECT id, email, first_name, last_name, phone_number, role, created_at
              FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn insert(&self, entry: DirectoryEntry) -> Result<(), DirectoryError> {
        let user = entry.user;
        let inserted = sqlx::query(
            r"INSERT INTO users (id, email, first_name, last_name, phone_number, role, password_hash, created_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
              ON CONFLICT (email) DO NOTHING",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.phone_number)
        .bind(user.role.as_str())
        .bind(&entry.password_hash)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;

        if inserted.rows_affected() == 0 {
            return Err(DirectoryError::Duplicate(user.email));
        }
        Ok(())
    }
}

/// Insert every seed entry whose email is not yet present.
///
/// # Errors
///
/// Propagates directory failures other than duplicates.
pub async fn ensure_seeded(directory: &dyn UserDirectory, entries: Vec<DirectoryEntry>) -> Result<usize, DirectoryError> {
    let mut created = 0;
    for entry in entries {
        match directory.insert(entry).await {
            Ok(()) => created += 1,
            Err(DirectoryError::Duplicate(_)) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(created)
}

#[cfg(test)]
#[path = "user_test.rs"]
mod tests;
