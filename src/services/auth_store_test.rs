use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Notify;
use uuid::Uuid;

use super::*;
use crate::services::user::{InMemoryDirectory, Role, seed_users};
use crate::state::test_helpers::{test_backend, test_backend_with};

const ADMIN_EMAIL: &str = "admin@manishphotography.com";

fn store() -> SessionStore {
    SessionStore::new(test_backend(), None)
}

fn registration(email: &str) -> RegisterRequest {
    RegisterRequest {
        email: email.to_owned(),
        password: "portrait-99".to_owned(),
        first_name: "Priya".to_owned(),
        last_name: "Shah".to_owned(),
        phone_number: Some("+91 98000 00000".to_owned()),
    }
}

/// Directory whose email lookups block until the gate is opened.
struct GatedDirectory {
    inner: InMemoryDirectory,
    gate: Arc<Notify>,
}

#[async_trait]
impl UserDirectory for GatedDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<DirectoryEntry>, DirectoryError> {
        self.gate.notified().await;
        self.inner.find_by_email(email).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DirectoryError> {
        self.inner.find_by_id(id).await
    }

    async fn insert(&self, entry: DirectoryEntry) -> Result<(), DirectoryError> {
        self.inner.insert(entry).await
    }
}

/// Directory that is always down.
struct BrokenDirectory;

#[async_trait]
impl UserDirectory for BrokenDirectory {
    async fn find_by_email(&self, _email: &str) -> Result<Option<DirectoryEntry>, DirectoryError> {
        Err(DirectoryError::Db(sqlx::Error::PoolTimedOut))
    }

    async fn find_by_id(&self, _id: Uuid) -> Result<Option<User>, DirectoryError> {
        Err(DirectoryError::Db(sqlx::Error::PoolTimedOut))
    }

    async fn insert(&self, _entry: DirectoryEntry) -> Result<(), DirectoryError> {
        Err(DirectoryError::Db(sqlx::Error::PoolTimedOut))
    }
}

fn seeded_directory() -> InMemoryDirectory {
    InMemoryDirectory::with_entries(seed_users().into_iter().map(|user| DirectoryEntry { user, password_hash: None }))
}

async fn wait_until_loading(store: &SessionStore) {
    for _ in 0..50 {
        if store.is_loading() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("store never entered loading state");
}

// =============================================================================
// initial state
// =============================================================================

#[test]
fn new_store_is_empty() {
    let snap = store().snapshot();
    assert!(snap.user.is_none());
    assert!(!snap.is_authenticated);
    assert!(!snap.is_loading);
    assert!(snap.error.is_none());
}

#[test]
fn empty_token_is_ignored() {
    let store = SessionStore::new(test_backend(), Some(String::new()));
    assert!(store.token().is_none());
}

#[test]
fn authenticated_tracks_user_presence() {
    let mut state = SessionState::default();
    assert!(!state.snapshot().is_authenticated);
    state.user = seed_users().into_iter().next();
    assert!(state.snapshot().is_authenticated);
    assert!(state.snapshot().is_admin());
}

// =============================================================================
// login
// =============================================================================

#[tokio::test]
async fn login_admin_with_shared_secret_succeeds() {
    let store = store();
    let snap = store.login(ADMIN_EMAIL, "password").await;
    assert!(snap.is_authenticated);
    assert!(!snap.is_loading);
    assert!(snap.error.is_none());
    let user = snap.user.unwrap();
    assert_eq!(user.email, ADMIN_EMAIL);
    assert_eq!(user.role, Role::Admin);
    assert_eq!(store.token().map(|t| t.len()), Some(64));
}

#[tokio::test]
async fn login_wrong_password_reports_invalid_credentials() {
    let store = store();
    let snap = store.login(ADMIN_EMAIL, "wrong").await;
    assert_eq!(snap.error.as_deref(), Some("Invalid email or password"));
    assert!(!snap.is_authenticated);
    assert!(snap.user.is_none());
    assert!(!snap.is_loading);
    assert_eq!(store.failure(), Some(FailureKind::InvalidCredentials));
}

#[tokio::test]
async fn login_unknown_emails_never_authenticate() {
    let store = store();
    for email in ["ghost@example.com", "nobody@manishphotography.com", "not-an-email", ""] {
        let snap = store.login(email, "password").await;
        assert!(!snap.is_authenticated, "{email:?} authenticated");
        assert!(snap.error.as_deref().is_some_and(|e| !e.is_empty()), "{email:?} left no error");
        assert!(!snap.is_loading);
    }
}

#[tokio::test]
async fn login_is_case_insensitive_on_email() {
    let snap = store().login("  ADMIN@ManishPhotography.com", "password").await;
    assert!(snap.is_authenticated);
    assert_eq!(snap.user.unwrap().email, ADMIN_EMAIL);
}

#[tokio::test]
async fn successful_login_clears_previous_error() {
    let store = store();
    store.login(ADMIN_EMAIL, "wrong").await;
    assert!(store.error().is_some());
    let snap = store.login(ADMIN_EMAIL, "password").await;
    assert!(snap.error.is_none());
    assert!(store.failure().is_none());
}

#[tokio::test]
async fn login_is_loading_while_in_flight() {
    let gate = Arc::new(Notify::new());
    let directory = Arc::new(GatedDirectory { inner: seeded_directory(), gate: gate.clone() });
    let store = SessionStore::new(test_backend_with(directory), None);

    let task = tokio::spawn({
        let store = store.clone();
        async move { store.login(ADMIN_EMAIL, "password").await }
    });

    wait_until_loading(&store).await;
    assert!(!store.is_authenticated());

    gate.notify_one();
    let snap = task.await.unwrap();
    assert!(!snap.is_loading);
    assert!(snap.is_authenticated);
}

#[tokio::test]
async fn login_failure_also_clears_loading() {
    let store = SessionStore::new(test_backend_with(Arc::new(BrokenDirectory)), None);
    let snap = store.login(ADMIN_EMAIL, "password").await;
    assert!(!snap.is_loading);
    assert!(!snap.is_authenticated);
    assert_eq!(snap.error.as_deref(), Some("Something went wrong. Please try again."));
    assert_eq!(store.failure(), Some(FailureKind::Unavailable));
}

#[tokio::test]
async fn login_rate_limited_after_repeated_failures() {
    let mut backend = test_backend();
    backend.limiter = RateLimiter::new(2, 100, Duration::from_secs(60));
    let store = SessionStore::new(backend, None);

    store.login(ADMIN_EMAIL, "wrong").await;
    store.login(ADMIN_EMAIL, "wrong").await;
    let snap = store.login(ADMIN_EMAIL, "password").await;
    assert!(!snap.is_authenticated);
    assert_eq!(store.failure(), Some(FailureKind::RateLimited));
}

#[tokio::test]
async fn later_login_replaces_earlier_identity() {
    let store = store();
    store.login(ADMIN_EMAIL, "password").await;
    store.login("user@example.com", "password").await;
    assert_eq!(store.user().unwrap().email, "user@example.com");
    assert!(!store.snapshot().is_admin());
}

// =============================================================================
// register
// =============================================================================

#[tokio::test]
async fn register_new_email_logs_in_as_user() {
    let directory = Arc::new(seeded_directory());
    let store = SessionStore::new(test_backend_with(directory.clone()), None);

    let snap = store.register(registration("new.client@example.com")).await;
    assert!(snap.is_authenticated);
    assert!(snap.error.is_none());
    assert!(!snap.is_loading);
    let user = snap.user.unwrap();
    assert_eq!(user.role, Role::User);
    assert_eq!(user.email, "new.client@example.com");
    assert_eq!(directory.len().await, 3);
    assert!(store.token().is_some());
}

#[tokio::test]
async fn register_existing_email_fails_without_mutation() {
    let directory = Arc::new(seeded_directory());
    let store = SessionStore::new(test_backend_with(directory.clone()), None);

    let snap = store.register(registration(ADMIN_EMAIL)).await;
    assert!(!snap.is_authenticated);
    assert!(snap.error.as_deref().unwrap().contains("already exists"));
    assert_eq!(store.failure(), Some(FailureKind::AlreadyExists));
    assert_eq!(directory.len().await, 2);
}

#[tokio::test]
async fn register_duplicate_keeps_existing_session() {
    let store = store();
    store.login("user@example.com", "password").await;
    let snap = store.register(registration(ADMIN_EMAIL)).await;
    assert!(snap.error.is_some());
    assert_eq!(snap.user.unwrap().email, "user@example.com");
}

#[tokio::test]
async fn register_validation_errors_surface_as_message() {
    let store = store();
    let mut req = registration("bad-email");
    let snap = store.register(req.clone()).await;
    assert_eq!(snap.error.as_deref(), Some("Please enter a valid email address"));
    assert_eq!(store.failure(), Some(FailureKind::Validation));

    req.email = "fine@example.com".to_owned();
    req.password = "123".to_owned();
    let snap = store.register(req).await;
    assert!(snap.error.unwrap().contains("at least 6"));
    assert!(!snap.is_authenticated);
}

#[tokio::test]
async fn registered_user_can_log_in_again() {
    let backend = test_backend();
    let first = SessionStore::new(backend.clone(), None);
    first.register(registration("returning@example.com")).await;

    let second = SessionStore::new(backend, None);
    let snap = second.login("returning@example.com", "password").await;
    assert!(snap.is_authenticated);
}

// =============================================================================
// logout
// =============================================================================

#[tokio::test]
async fn logout_resets_identity_idempotently() {
    let store = store();
    store.login(ADMIN_EMAIL, "password").await;
    assert!(store.is_authenticated());

    store.logout().await;
    let once = store.snapshot();
    store.logout().await;
    let twice = store.snapshot();

    assert!(!once.is_authenticated);
    assert!(once.user.is_none());
    assert_eq!(once, twice);
    assert!(store.token().is_none());
}

#[tokio::test]
async fn logout_leaves_error_untouched() {
    let store = store();
    store.login(ADMIN_EMAIL, "wrong").await;
    store.logout().await;
    assert_eq!(store.error().as_deref(), Some("Invalid email or password"));
    assert!(!store.is_loading());
}

#[tokio::test]
async fn logout_revokes_token() {
    let backend = test_backend();
    let store = SessionStore::new(backend.clone(), None);
    store.login(ADMIN_EMAIL, "password").await;
    let token = store.token().unwrap();

    store.logout().await;
    assert_eq!(backend.tokens.validate(&token).await.unwrap(), None);
}

// =============================================================================
// check_auth
// =============================================================================

#[tokio::test]
async fn check_auth_restores_session_from_token() {
    let backend = test_backend();
    let login = SessionStore::new(backend.clone(), None);
    login.login(ADMIN_EMAIL, "password").await;

    let restored = SessionStore::new(backend, login.token());
    let snap = restored.check_auth().await;
    assert!(snap.is_authenticated);
    assert!(!snap.is_loading);
    assert_eq!(snap.user.unwrap().email, ADMIN_EMAIL);
}

#[tokio::test]
async fn check_auth_with_unknown_token_resets() {
    let store = SessionStore::new(test_backend(), Some("f".repeat(64)));
    let snap = store.check_auth().await;
    assert!(!snap.is_authenticated);
    assert!(!snap.is_loading);
    assert!(snap.error.is_none());
    assert!(store.token().is_none());
}

#[tokio::test]
async fn check_auth_without_token_is_noop() {
    let store = store();
    let snap = store.check_auth().await;
    assert!(!snap.is_authenticated);
    assert!(!snap.is_loading);
}

#[tokio::test]
async fn check_auth_is_repeatable() {
    let backend = test_backend();
    let login = SessionStore::new(backend.clone(), None);
    login.login("user@example.com", "password").await;

    let store = SessionStore::new(backend, login.token());
    let a = store.check_auth().await;
    let b = store.check_auth().await;
    assert_eq!(a, b);
}

#[tokio::test]
async fn check_auth_backend_failure_clears_session() {
    let backend = test_backend_with(Arc::new(BrokenDirectory));
    let token = backend.tokens.create(Uuid::new_v4(), Duration::from_secs(60)).await.unwrap();
    let store = SessionStore::new(backend, Some(token));

    let snap = store.check_auth().await;
    assert!(!snap.is_authenticated);
    assert!(!snap.is_loading);
    assert!(snap.error.is_some());
    assert_eq!(store.failure(), Some(FailureKind::Unavailable));
    assert!(store.token().is_none());
}

// =============================================================================
// liveness
// =============================================================================

#[tokio::test]
async fn detached_store_discards_late_results() {
    let gate = Arc::new(Notify::new());
    let directory = Arc::new(GatedDirectory { inner: seeded_directory(), gate: gate.clone() });
    let store = SessionStore::new(test_backend_with(directory), None);

    let task = tokio::spawn({
        let store = store.clone();
        async move { store.login(ADMIN_EMAIL, "password").await }
    });
    wait_until_loading(&store).await;

    store.detach();
    gate.notify_one();
    task.await.unwrap();

    assert!(!store.is_authenticated());
    assert!(!store.is_live());
}
