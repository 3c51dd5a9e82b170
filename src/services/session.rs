//! Session token registry.
//!
//! ARCHITECTURE
//! ============
//! A successful login or registration issues an opaque random token that the
//! browser keeps in an HttpOnly cookie. The registry maps the token to a user
//! id until it expires or is revoked on logout; `check_auth` resolves it on
//! every request.
//!
//! TRADE-OFFS
//! ==========
//! Only the SHA-256 digest of a token is stored, so a leaked registry cannot be
//! replayed as cookies. Lookups hash the presented token first.

use std::collections::HashMap;
use std::fmt::Write;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::{PgPool, Row};
use uuid::Uuid;

pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Generate a cryptographically random 32-byte hex token.
#[must_use]
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    bytes_to_hex(&bytes)
}

/// Digest under which a token is stored.
#[must_use]
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    bytes_to_hex(&hasher.finalize())
}

#[derive(Debug, thiserror::Error)]
pub enum TokenStoreError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Issue a new token for `user_id`, valid for `ttl`.
    async fn create(&self, user_id: Uuid, ttl: Duration) -> Result<String, TokenStoreError>;

    /// Resolve a live token to its user id.
    async fn validate(&self, token: &str) -> Result<Option<Uuid>, TokenStoreError>;

    /// Forget a token. Unknown tokens are not an error.
    async fn revoke(&self, token: &str) -> Result<(), TokenStoreError>;
}

// =============================================================================
// IN-MEMORY
// =============================================================================

struct IssuedToken {
    user_id: Uuid,
    expires_at: Instant,
}

#[derive(Default)]
pub struct InMemoryTokenStore {
    tokens: Mutex<HashMap<String, IssuedToken>>,
}

impl InMemoryTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, IssuedToken>> {
        self.tokens.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Number of tokens currently held, expired ones included.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Issue a token at `now`, dropping every token already expired.
    fn create_at(&self, user_id: Uuid, ttl: Duration, now: Instant) -> String {
        let token = generate_token();
        let mut tokens = self.lock();
        tokens.retain(|_, issued| issued.expires_at > now);
        tokens.insert(hash_token(&token), IssuedToken { user_id, expires_at: now + ttl });
        token
    }

    fn validate_at(&self, token: &str, now: Instant) -> Option<Uuid> {
        let mut tokens = self.lock();
        let key = hash_token(token);
        match tokens.get(&key) {
            Some(issued) if issued.expires_at > now => Some(issued.user_id),
            Some(_) => {
                tokens.remove(&key);
                None
            }
            None => None,
        }
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn create(&self, user_id: Uuid, ttl: Duration) -> Result<String, TokenStoreError> {
        Ok(self.create_at(user_id, ttl, Instant::now()))
    }

    async fn validate(&self, token: &str) -> Result<Option<Uuid>, TokenStoreError> {
        Ok(self.validate_at(token, Instant::now()))
    }

    async fn revoke(&self, token: &str) -> Result<(), TokenStoreError> {
        self.lock().remove(&hash_token(token));
        Ok(())
    }
}

// =============================================================================
// POSTGRES
// =============================================================================

pub struct PgTokenStore {
    pool: PgPool,
}

impl PgTokenStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn create(&self, user_id: Uuid, ttl: Duration) -> Result<String, TokenStoreError> {
        let token = generate_token();
        sqlx::query(
            "INSERT INTO sessions (token_hash, user_id, expires_at) VALUES ($1, $2, now() + make_interval(secs => $3))",
        )
        .bind(hash_token(&token))
        .bind(user_id)
        .bind(ttl.as_secs_f64())
        .execute(&self.pool)
        .await?;
        Ok(token)
    }

    async fn validate(&self, token: &str) -> Result<Option<Uuid>, TokenStoreError> {
        let row = sqlx::query("SELECT user_id FROM sessions WHERE token_hash = $1 AND expires_at > now()")
            .bind(hash_token(token))
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("user_id")))
    }

    async fn revoke(&self, token: &str) -> Result<(), TokenStoreError> {
        sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
            .bind(hash_token(token))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Drop expired rows.
///
/// # Errors
///
/// Returns the database error if the delete fails.
pub async fn purge_expired(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= now()")
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Background task that purges expired sessions every `every`.
pub fn spawn_purge_task(pool: PgPool, every: Duration) -> tokio::task::JoinHandle<()> {
    tracing::info!(every_secs = every.as_secs(), "session purge configured");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            match purge_expired(&pool).await {
                Ok(0) => {}
                Ok(purged) => tracing::info!(purged, "purged expired sessions"),
                Err(e) => tracing::warn!(error = %e, "session purge failed"),
            }
        }
    })
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
