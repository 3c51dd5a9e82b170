//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds configuration, the authentication backend (directory, verifier,
//! token registry, limiter) and the lazily loaded page catalog. Per-request
//! session state is not stored here; see `routes::session::Session`.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::{Config, CredentialMode};
use crate::pages::PageCatalog;
use crate::rate_limit::RateLimiter;
use crate::services::auth_store::{AuthBackend, SessionStore};
use crate::services::credentials::{Argon2Verifier, CredentialError, CredentialVerifier, SharedSecretVerifier, seed_entries};
use crate::services::session::{InMemoryTokenStore, PgTokenStore, TokenStore};
use crate::services::user::{DirectoryError, InMemoryDirectory, PgDirectory, UserDirectory, ensure_seeded};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("seeding credentials: {0}")]
    Credential(#[from] CredentialError),
    #[error("seeding directory: {0}")]
    Directory(#[from] DirectoryError),
}

/// Shared application state. Clone is required by Axum; all inner fields are
/// Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub auth: AuthBackend,
    pub pages: Arc<PageCatalog>,
}

impl AppState {
    #[must_use]
    pub fn new(config: Config, auth: AuthBackend) -> Self {
        let pages = Arc::new(PageCatalog::new(config.site_dir.join("pages")));
        Self { config: Arc::new(config), auth, pages }
    }

    /// A fresh session store for one request.
    #[must_use]
    pub fn session_store(&self, token: Option<String>) -> SessionStore {
        SessionStore::new(self.auth.clone(), token)
    }
}

fn verifier_for(mode: CredentialMode, shared_secret: &str) -> Arc<dyn CredentialVerifier> {
    match mode {
        CredentialMode::SharedSecret => Arc::new(SharedSecretVerifier::new(shared_secret)),
        CredentialMode::Argon2 => Arc::new(Argon2Verifier::new()),
    }
}

/// Assemble the authentication backend. With a pool, users and sessions are
/// persisted in Postgres; otherwise they live in memory for the life of the
/// process. Seed accounts are created if missing.
///
/// # Errors
///
/// Returns an error if seed credentials cannot be produced or stored.
pub async fn build_auth_backend(config: &Config, pool: Option<PgPool>) -> Result<AuthBackend, StartupError> {
    let verifier = verifier_for(config.credentials, &config.shared_secret);
    let seeds = seed_entries(verifier.as_ref(), &config.shared_secret)?;

    let (directory, tokens): (Arc<dyn UserDirectory>, Arc<dyn TokenStore>) = match pool {
        Some(pool) => {
            let directory = PgDirectory::new(pool.clone());
            let created = ensure_seeded(&directory, seeds).await?;
            tracing::info!(created, "postgres user directory ready");
            (Arc::new(directory), Arc::new(PgTokenStore::new(pool)))
        }
        None => {
            tracing::info!(users = seeds.len(), "in-memory user directory ready");
            (Arc::new(InMemoryDirectory::with_entries(seeds)), Arc::new(InMemoryTokenStore::new()))
        }
    };

    Ok(AuthBackend {
        directory,
        verifier,
        tokens,
        limiter: RateLimiter::new(config.login_rate_limit, config.login_rate_global, config.login_rate_window),
        session_ttl: config.session_ttl,
        latency: config.simulated_latency,
    })
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn build_in_memory_backend_seeds_users() {
        let backend = build_auth_backend(&Config::default(), None).await.unwrap();
        let admin = backend
            .directory
            .find_by_email("admin@manishphotography.com")
            .await
            .unwrap();
        assert!(admin.is_some());
    }

    #[tokio::test]
    async fn argon2_backend_accepts_initial_password() {
        let config = Config { credentials: CredentialMode::Argon2, shared_secret: "initial-pw".into(), ..Config::default() };
        let backend = build_auth_backend(&config, None).await.unwrap();
        let entry = backend
            .directory
            .find_by_email("user@example.com")
            .await
            .unwrap()
            .unwrap();
        assert!(entry.password_hash.is_some());
        assert!(backend.verifier.verify(&entry, "initial-pw"));
        assert!(!backend.verifier.verify(&entry, "password"));
    }

    #[test]
    fn session_store_starts_unauthenticated() {
        let state = test_helpers::test_app_state();
        let store = state.session_store(Some("token".into()));
        assert!(!store.is_authenticated());
        assert_eq!(store.token().as_deref(), Some("token"));
    }
}
