//! Request-scoped session extractor.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every request gets its own `SessionStore`, seeded from the `session_token`
//! cookie and validated once through `AuthCheck`. The guard middleware stores
//! the validated `Session` in the request extensions so handlers behind it
//! reuse the same instance instead of validating twice.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::HeaderMap;
use axum::http::request::Parts;
use axum_extra::extract::cookie::{Cookie, CookieJar};

use crate::services::auth_check::{AuthCheck, AuthStatus};
use crate::services::auth_store::SessionStore;
use crate::state::AppState;

pub const COOKIE_NAME: &str = "session_token";

#[derive(Clone)]
pub struct Session {
    check: Arc<AuthCheck>,
}

impl Session {
    /// Unvalidated session for the token carried by `headers`, if any.
    #[must_use]
    pub fn from_headers(state: &AppState, headers: &HeaderMap) -> Self {
        let jar = CookieJar::from_headers(headers);
        let token = jar.get(COOKIE_NAME).map(Cookie::value).map(str::to_owned);
        Self { check: Arc::new(AuthCheck::new(state.session_store(token))) }
    }

    #[must_use]
    pub fn store(&self) -> &SessionStore {
        self.check.store()
    }

    #[must_use]
    pub fn check(&self) -> &AuthCheck {
        &self.check
    }

    /// Run `AuthCheck::ensure`, giving up after `budget`. A validation that
    /// overruns keeps going in the background but the store is detached, so
    /// its result is discarded and the session stays in its loading state.
    pub async fn ensure_within(&self, budget: Duration) -> AuthStatus {
        let check = Arc::clone(&self.check);
        let task = tokio::spawn(async move { check.ensure().await });
        match tokio::time::timeout(budget, task).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                tracing::error!(error = %e, "session validation task failed");
                self.check.status()
            }
            Err(_) => {
                tracing::warn!(budget_ms = budget.as_millis(), "session validation timed out");
                self.store().detach();
                self.check.status()
            }
        }
    }
}

impl<S> FromRequestParts<S> for Session
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(session) = parts.extensions.get::<Self>() {
            return Ok(session.clone());
        }

        let app_state = AppState::from_ref(state);
        let session = Self::from_headers(&app_state, &parts.headers);
        session.ensure_within(app_state.config.session_check_timeout).await;
        parts.extensions.insert(session.clone());
        Ok(session)
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
