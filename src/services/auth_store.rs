//! Session state store.
//!
//! SYSTEM CONTEXT
//! ==============
//! Single source of truth for "who is using this request". One `SessionStore`
//! is created per request from the session cookie and handed to guards and
//! handlers through the `Session` extractor; nothing here is process-global.
//!
//! DESIGN
//! ======
//! `login`, `register` and `check_auth` mark the store as loading, suspend on
//! the directory/token registry, then settle the outcome in one synchronous
//! critical section. Failures never escape as `Err`: they become a
//! human-readable `error` string that callers inspect after the call settles.
//!
//! TRADE-OFFS
//! ==========
//! Overlapping calls on the same store are not serialized; whichever settles
//! last wins. Stores can be detached when their owner goes away, after which
//! late settlements are discarded instead of applied.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use serde::Serialize;

use super::credentials::{CredentialError, CredentialVerifier};
use super::session::{TokenStore, TokenStoreError};
use super::user::{DirectoryEntry, DirectoryError, RegisterRequest, User, UserDirectory, ValidationError, normalize_email};
use crate::rate_limit::{RateLimitError, RateLimiter};

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("An account with this email already exists")]
    AlreadyExists,
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("Too many attempts. Please wait a moment and try again.")]
    RateLimited(#[from] RateLimitError),
    #[error("Something went wrong. Please try again.")]
    Unavailable,
}

/// Coarse classification of the last failure, for callers that need more
/// than the message (e.g. to pick an HTTP status).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Validation,
    InvalidCredentials,
    AlreadyExists,
    RateLimited,
    Unavailable,
}

impl SessionError {
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::InvalidCredentials => FailureKind::InvalidCredentials,
            Self::AlreadyExists => FailureKind::AlreadyExists,
            Self::Validation(_) => FailureKind::Validation,
            Self::RateLimited(_) => FailureKind::RateLimited,
            Self::Unavailable => FailureKind::Unavailable,
        }
    }
}

impl From<DirectoryError> for SessionError {
    fn from(e: DirectoryError) -> Self {
        match e {
            DirectoryError::Duplicate(_) => Self::AlreadyExists,
            other => {
                tracing::warn!(error = %other, "user directory failure");
                Self::Unavailable
            }
        }
    }
}

impl From<TokenStoreError> for SessionError {
    fn from(e: TokenStoreError) -> Self {
        tracing::warn!(error = %e, "session token store failure");
        Self::Unavailable
    }
}

impl From<CredentialError> for SessionError {
    fn from(e: CredentialError) -> Self {
        tracing::warn!(error = %e, "credential hashing failure");
        Self::Unavailable
    }
}

// =============================================================================
// BACKEND
// =============================================================================

/// Collaborators a session store delegates to. Cheap to clone.
#[derive(Clone)]
pub struct AuthBackend {
    pub directory: Arc<dyn UserDirectory>,
    pub verifier: Arc<dyn CredentialVerifier>,
    pub tokens: Arc<dyn TokenStore>,
    pub limiter: RateLimiter,
    pub session_ttl: Duration,
    /// Extra delay before every suspending operation.
    pub latency: Duration,
}

// =============================================================================
// STATE
// =============================================================================

/// Mutable session fields. Authentication is derived from `user`, so the
/// "authenticated iff user present" invariant cannot be broken.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub user: Option<User>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub failure: Option<FailureKind>,
    /// Opaque token backing this session, if one was presented or issued.
    pub token: Option<String>,
}

impl SessionState {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            user: self.user.clone(),
            is_authenticated: self.is_authenticated(),
            is_loading: self.is_loading,
            error: self.error.clone(),
        }
    }

    fn clear_identity(&mut self) {
        self.user = None;
        self.token = None;
    }

    fn record_failure(&mut self, err: &SessionError) {
        self.error = Some(err.to_string());
        self.failure = Some(err.kind());
    }

    fn clear_failure(&mut self) {
        self.error = None;
        self.failure = None;
    }
}

/// Read-only view of a session, as seen by guards, pages and the JSON API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub user: Option<User>,
    pub is_authenticated: bool,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl SessionSnapshot {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.user.as_ref().is_some_and(User::is_admin)
    }
}

// =============================================================================
// STORE
// =============================================================================

#[derive(Clone)]
pub struct SessionStore {
    backend: AuthBackend,
    state: Arc<RwLock<SessionState>>,
    live: Arc<AtomicBool>,
}

impl SessionStore {
    /// Fresh, unauthenticated store. `token` is the previously issued session
    /// token, if the client presented one; it is not trusted until
    /// `check_auth` validates it.
    #[must_use]
    pub fn new(backend: AuthBackend, token: Option<String>) -> Self {
        let state = SessionState { token: token.filter(|t| !t.is_empty()), ..SessionState::default() };
        Self { backend, state: Arc::new(RwLock::new(state)), live: Arc::new(AtomicBool::new(true)) }
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.read().snapshot()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.read().is_authenticated()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.read().is_loading
    }

    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.read().user.clone()
    }

    #[cfg(test)]
    pub fn error(&self) -> Option<String> {
        self.read().error.clone()
    }

    #[must_use]
    pub fn failure(&self) -> Option<FailureKind> {
        self.read().failure
    }

    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.read().token.clone()
    }

    /// Mark the owner as gone. Operations still in flight finish but their
    /// results are dropped.
    pub fn detach(&self) {
        self.live.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    fn begin(&self) {
        self.write().is_loading = true;
    }

    /// Apply a completed operation and clear the loading flag, unless the
    /// store was detached meanwhile.
    fn settle(&self, op: &'static str, apply: impl FnOnce(&mut SessionState)) -> SessionSnapshot {
        if !self.is_live() {
            tracing::debug!(op, "discarding result for detached session");
            return self.snapshot();
        }
        let mut state = self.write();
        apply(&mut state);
        state.is_loading = false;
        state.snapshot()
    }

    async fn simulate_latency(&self) {
        if !self.backend.latency.is_zero() {
            tokio::time::sleep(self.backend.latency).await;
        }
    }

    // -------------------------------------------------------------------------
    // login
    // -------------------------------------------------------------------------

    /// Authenticate with email and password. Check `error` on the returned
    /// snapshot (or the store) to see whether it worked.
    pub async fn login(&self, email: &str, password: &str) -> SessionSnapshot {
        self.begin();
        let outcome = self.authenticate(email, password).await;
        self.settle("login", |state| match outcome {
            Ok((user, token)) => {
                tracing::info!(user_id = %user.id, role = user.role.as_str(), "login succeeded");
                state.user = Some(user);
                state.token = Some(token);
                state.clear_failure();
            }
            Err(e) => {
                tracing::warn!(error = %e, "login failed");
                state.record_failure(&e);
            }
        })
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<(User, String), SessionError> {
        self.simulate_latency().await;
        let email = normalize_email(email).ok_or(SessionError::InvalidCredentials)?;
        self.backend.limiter.check_and_record(&email)?;

        let entry = self
            .backend
            .directory
            .find_by_email(&email)
            .await?
            .ok_or(SessionError::InvalidCredentials)?;
        if !self.backend.verifier.verify(&entry, password) {
            return Err(SessionError::InvalidCredentials);
        }

        self.backend.limiter.clear(&email);
        let token = self.backend.tokens.create(entry.user.id, self.backend.session_ttl).await?;
        Ok((entry.user, token))
    }

    // -------------------------------------------------------------------------
    // register
    // -------------------------------------------------------------------------

    /// Create an account and sign in as it. No confirmation step.
    pub async fn register(&self, request: RegisterRequest) -> SessionSnapshot {
        self.begin();
        let outcome = self.create_account(request).await;
        self.settle("register", |state| match outcome {
            Ok((user, token)) => {
                tracing::info!(user_id = %user.id, "account registered");
                state.user = Some(user);
                state.token = Some(token);
                state.clear_failure();
            }
            Err(e) => {
                tracing::warn!(error = %e, "registration failed");
                state.record_failure(&e);
            }
        })
    }

    async fn create_account(&self, request: RegisterRequest) -> Result<(User, String), SessionError> {
        self.simulate_latency().await;
        let email = request.validate()?;
        self.backend.limiter.check_and_record(&email)?;

        if self.backend.directory.find_by_email(&email).await?.is_some() {
            return Err(SessionError::AlreadyExists);
        }

        let password_hash = self.backend.verifier.hash(&request.password)?;
        let user = request.into_user(email);
        self.backend
            .directory
            .insert(DirectoryEntry { user: user.clone(), password_hash })
            .await?;

        let token = self.backend.tokens.create(user.id, self.backend.session_ttl).await?;
        Ok((user, token))
    }

    // -------------------------------------------------------------------------
    // logout
    // -------------------------------------------------------------------------

    /// Drop the identity and revoke the backing token. Leaves `is_loading`
    /// and `error` untouched. Calling it again is a no-op.
    pub async fn logout(&self) {
        let token = {
            let mut state = self.write();
            state.user = None;
            state.token.take()
        };
        if let Some(token) = token {
            if let Err(e) = self.backend.tokens.revoke(&token).await {
                tracing::warn!(error = %e, "failed to revoke session token");
            }
        }
    }

    // -------------------------------------------------------------------------
    // check_auth
    // -------------------------------------------------------------------------

    /// Re-validate the presented token and populate the store from it. A
    /// missing, expired or unknown token leaves the session empty. Always
    /// finishes with `is_loading == false`.
    pub async fn check_auth(&self) -> SessionSnapshot {
        self.begin();
        let token = self.token();
        let outcome = match token {
            Some(token) => self.resolve_token(&token).await,
            None => Ok(None),
        };
        self.settle("check_auth", |state| match outcome {
            Ok(Some(user)) => state.user = Some(user),
            Ok(None) => state.clear_identity(),
            Err(e) => {
                state.clear_identity();
                state.record_failure(&e);
            }
        })
    }

    async fn resolve_token(&self, token: &str) -> Result<Option<User>, SessionError> {
        self.simulate_latency().await;
        let Some(user_id) = self.backend.tokens.validate(token).await? else {
            return Ok(None);
        };
        Ok(self.backend.directory.find_by_id(user_id).await?)
    }
}

#[cfg(test)]
#[path = "auth_store_test.rs"]
mod tests;
