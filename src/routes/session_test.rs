use std::time::Duration;

use axum::http::header;

use super::*;
use crate::config::Config;
use crate::services::auth_store::AuthBackend;
use crate::state::test_helpers::{test_app_state, test_backend};

fn headers_with_cookie(value: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::COOKIE, value.parse().unwrap());
    headers
}

async fn admin_token(state: &AppState) -> String {
    let store = state.session_store(None);
    store.login("admin@manishphotography.com", "password").await;
    store.token().unwrap()
}

#[test]
fn from_headers_reads_session_cookie() {
    let state = test_app_state();
    let session = Session::from_headers(&state, &headers_with_cookie("theme=dark; session_token=abc123"));
    assert_eq!(session.store().token().as_deref(), Some("abc123"));
    assert!(!session.store().is_authenticated());
}

#[test]
fn from_headers_without_cookie_has_no_token() {
    let session = Session::from_headers(&test_app_state(), &HeaderMap::new());
    assert!(session.store().token().is_none());
}

#[tokio::test]
async fn ensure_within_validates_cookie_token() {
    let state = test_app_state();
    let token = admin_token(&state).await;
    let session = Session::from_headers(&state, &headers_with_cookie(&format!("session_token={token}")));

    let status = session.ensure_within(Duration::from_secs(1)).await;
    assert!(status.is_authenticated);
    assert!(!status.is_loading);
    assert!(session.store().snapshot().is_admin());
    assert_eq!(session.check().validations(), 1);
}

#[tokio::test]
async fn ensure_within_unknown_token_settles_anonymous() {
    let session = Session::from_headers(&test_app_state(), &headers_with_cookie("session_token=nope"));
    let status = session.ensure_within(Duration::from_secs(1)).await;
    assert!(!status.is_authenticated);
    assert!(!status.is_loading);
    assert!(session.store().token().is_none());
}

#[tokio::test]
async fn ensure_within_timeout_leaves_session_loading() {
    let backend = AuthBackend { latency: Duration::from_millis(200), ..test_backend() };
    let state = AppState::new(Config::default(), backend);
    let session = Session::from_headers(&state, &headers_with_cookie("session_token=whatever"));

    let status = session.ensure_within(Duration::from_millis(10)).await;
    assert!(status.is_loading);
    assert!(!status.is_authenticated);
    assert!(!session.store().is_live());

    // The late result is discarded.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(session.store().is_loading());
}
