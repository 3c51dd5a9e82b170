//! Route guards.
//!
//! SYSTEM CONTEXT
//! ==============
//! Guards decide, from a `SessionSnapshot`, whether a protected page renders,
//! shows a loading indicator, or redirects. The decision functions are pure;
//! `routes::guard_request` turns decisions into HTTP responses.
//!
//! There is one guard engine configured by `GuardOptions`. The generic
//! protected-route guard uses the defaults; the admin guard is the preset
//! returned by `GuardOptions::admin`, which additionally waits for session
//! validation before deciding and sends anonymous visitors to the admin login.

use crate::services::auth_store::SessionSnapshot;

pub const HOME_PATH: &str = "/";
pub const LOGIN_PATH: &str = "/login";
pub const ADMIN_LOGIN_PATH: &str = "/admin/login";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardOptions {
    pub require_auth: bool,
    pub require_admin: bool,
    /// Where unauthenticated visitors are sent.
    pub redirect_to: String,
    /// Hold the decision while the session is still loading.
    pub await_session: bool,
}

impl Default for GuardOptions {
    fn default() -> Self {
        Self { require_auth: true, require_admin: false, redirect_to: LOGIN_PATH.to_owned(), await_session: false }
    }
}

impl GuardOptions {
    /// Fixed policy for the admin area.
    #[must_use]
    pub fn admin() -> Self {
        Self { require_auth: true, require_admin: true, redirect_to: ADMIN_LOGIN_PATH.to_owned(), await_session: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Loading,
    Render,
    Redirect(String),
}

/// Generic protected-route guard. Pure function of the session; never waits.
#[must_use]
pub fn protected_route(options: &GuardOptions, session: &SessionSnapshot) -> GuardDecision {
    if options.require_auth && !session.is_authenticated {
        return GuardDecision::Redirect(options.redirect_to.clone());
    }
    if options.require_admin && !session.is_admin() {
        return GuardDecision::Redirect(HOME_PATH.to_owned());
    }
    GuardDecision::Render
}

/// Admin-area guard: loading indicator first, then the admin policy.
#[must_use]
pub fn admin_guard(session: &SessionSnapshot) -> GuardDecision {
    evaluate(&GuardOptions::admin(), session)
}

/// Apply `options`, honoring `await_session`.
#[must_use]
pub fn evaluate(options: &GuardOptions, session: &SessionSnapshot) -> GuardDecision {
    if options.await_session && session.is_loading {
        return GuardDecision::Loading;
    }
    protected_route(options, session)
}

// =============================================================================
// PER-INSTANCE STATE MACHINE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardPhase {
    Checking,
    RedirectUnauthenticated(String),
    RedirectUnauthorized,
    Authorized,
}

impl GuardPhase {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Checking)
    }

    #[must_use]
    pub fn decision(&self) -> GuardDecision {
        match self {
            Self::Checking => GuardDecision::Loading,
            Self::RedirectUnauthenticated(to) => GuardDecision::Redirect(to.clone()),
            Self::RedirectUnauthorized => GuardDecision::Redirect(HOME_PATH.to_owned()),
            Self::Authorized => GuardDecision::Render,
        }
    }
}

/// One mounted guard. Starts in `Checking`; the first conclusive observation
/// fixes the phase for the lifetime of the instance.
#[derive(Debug, Clone)]
pub struct GuardInstance {
    options: GuardOptions,
    phase: GuardPhase,
}

impl GuardInstance {
    #[must_use]
    pub fn new(options: GuardOptions) -> Self {
        Self { options, phase: GuardPhase::Checking }
    }

    #[cfg(test)]
    pub fn phase(&self) -> &GuardPhase {
        &self.phase
    }

    /// Feed the latest session state. Ignored once terminal.
    pub fn observe(&mut self, session: &SessionSnapshot) -> &GuardPhase {
        if self.phase.is_terminal() {
            return &self.phase;
        }
        self.phase = match evaluate(&self.options, session) {
            GuardDecision::Loading => GuardPhase::Checking,
            GuardDecision::Render => GuardPhase::Authorized,
            GuardDecision::Redirect(to) if self.options.require_auth && !session.is_authenticated => GuardPhase::RedirectUnauthenticated(to),
            GuardDecision::Redirect(_) => GuardPhase::RedirectUnauthorized,
        };
        &self.phase
    }
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;
