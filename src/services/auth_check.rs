//! Ensure-session-validated step.
//!
//! `AuthCheck` wraps a `SessionStore` and decides when `check_auth` must run.
//! It tracks the last observed `is_authenticated` value and only validates
//! when that value changes to (or starts as) `false`. Repeated calls while
//! authenticated are free, and a logout re-arms validation.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;

use super::auth_store::SessionStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthStatus {
    pub is_authenticated: bool,
    pub is_loading: bool,
}

pub struct AuthCheck {
    store: SessionStore,
    /// `is_authenticated` as of the last evaluation; `None` before the first.
    observed: Mutex<Option<bool>>,
    validations: AtomicUsize,
}

impl AuthCheck {
    #[must_use]
    pub fn new(store: SessionStore) -> Self {
        Self { store, observed: Mutex::new(None), validations: AtomicUsize::new(0) }
    }

    #[must_use]
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Validate the session if the authentication flag changed since the last
    /// call and is now false, then report the current status.
    pub async fn ensure(&self) -> AuthStatus {
        let authenticated = self.store.is_authenticated();
        let should_validate = {
            let mut observed = self
                .observed
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if *observed == Some(authenticated) {
                false
            } else {
                *observed = Some(authenticated);
                !authenticated
            }
        };

        if should_validate {
            let n = self.validations.fetch_add(1, Ordering::SeqCst) + 1;
            tracing::debug!(validations = n, "validating session");
            let settled = self.store.check_auth().await;
            // The validated state is what the next evaluation compares against.
            *self
                .observed
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(settled.is_authenticated);
        }
        self.status()
    }

    #[must_use]
    pub fn status(&self) -> AuthStatus {
        AuthStatus { is_authenticated: self.store.is_authenticated(), is_loading: self.store.is_loading() }
    }

    /// Forget the cached observation so the next `ensure` re-validates if the
    /// session is unauthenticated.
    pub fn invalidate(&self) {
        *self
            .observed
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = None;
    }

    /// How many times `check_auth` has been triggered.
    #[cfg(test)]
    pub fn validations(&self) -> usize {
        self.validations.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[path = "auth_check_test.rs"]
mod tests;
