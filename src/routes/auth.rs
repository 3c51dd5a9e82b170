//! Auth routes: JSON API and HTML form posts for login, registration and
//! logout.
//!
//! Both surfaces drive the same request-scoped `SessionStore`. A settled
//! store with an `error` maps to a failure status; a store with a user gets a
//! fresh `session_token` cookie.

use axum::extract::{Form, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Json, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use time::Duration;

use super::session::{COOKIE_NAME, Session};
use crate::guard::{self, ADMIN_LOGIN_PATH, GuardDecision, HOME_PATH, LOGIN_PATH};
use crate::pages::{self, Page, RegisterValues};
use crate::services::auth_store::{FailureKind, SessionSnapshot};
use crate::services::user::RegisterRequest;
use crate::state::AppState;

const ACCOUNT_PATH: &str = "/account";
const ADMIN_HOME_PATH: &str = "/admin";

// =============================================================================
// COOKIES
// =============================================================================

fn session_cookie(state: &AppState, token: String) -> Cookie<'static> {
    let max_age = Duration::try_from(state.config.session_ttl).unwrap_or(Duration::MAX);
    Cookie::build((COOKIE_NAME, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.cookie_secure)
        .max_age(max_age)
        .build()
}

fn cleared_cookie(state: &AppState) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.cookie_secure)
        .max_age(Duration::ZERO)
        .build()
}

/// Attach the session cookie if the store holds a token.
fn with_session_cookie(state: &AppState, session: &Session, jar: CookieJar) -> CookieJar {
    match session.store().token() {
        Some(token) => jar.add(session_cookie(state, token)),
        None => jar,
    }
}

fn failure_status(kind: Option<FailureKind>) -> StatusCode {
    match kind {
        Some(FailureKind::Validation) => StatusCode::UNPROCESSABLE_ENTITY,
        Some(FailureKind::InvalidCredentials) => StatusCode::UNAUTHORIZED,
        Some(FailureKind::AlreadyExists) => StatusCode::CONFLICT,
        Some(FailureKind::RateLimited) => StatusCode::TOO_MANY_REQUESTS,
        Some(FailureKind::Unavailable) | None => StatusCode::SERVICE_UNAVAILABLE,
    }
}

// =============================================================================
// JSON API
// =============================================================================

/// Login body, shared by the JSON API and the HTML forms.
#[derive(Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}

/// Outcome of a settled login/register as a JSON response.
fn json_outcome(state: &AppState, session: &Session, jar: CookieJar, snapshot: SessionSnapshot, ok: StatusCode) -> Response {
    if snapshot.error.is_some() {
        let status = failure_status(session.store().failure());
        return (status, Json(snapshot)).into_response();
    }
    (ok, with_session_cookie(state, session, jar), Json(snapshot)).into_response()
}

/// `POST /api/auth/login`
pub async fn login(State(state): State<AppState>, session: Session, jar: CookieJar, Json(body): Json<LoginRequest>) -> Response {
    let snapshot = session.store().login(&body.email, &body.password).await;
    json_outcome(&state, &session, jar, snapshot, StatusCode::OK)
}

/// `POST /api/auth/register`
pub async fn register(State(state): State<AppState>, session: Session, jar: CookieJar, Json(body): Json<RegisterRequest>) -> Response {
    let snapshot = session.store().register(body).await;
    json_outcome(&state, &session, jar, snapshot, StatusCode::CREATED)
}

/// `POST /api/auth/logout` — revoke the session, clear the cookie.
pub async fn logout(State(state): State<AppState>, session: Session, jar: CookieJar) -> impl IntoResponse {
    end_session(&session).await;
    (jar.add(cleared_cookie(&state)), StatusCode::NO_CONTENT)
}

/// `GET /api/auth/me` — the signed-in user.
pub async fn me(session: Session) -> Response {
    match session.store().user() {
        Some(user) => Json(user).into_response(),
        None => StatusCode::UNAUTHORIZED.into_response(),
    }
}

/// `GET /api/auth/session` — the full session view, signed in or not.
pub async fn current_session(session: Session) -> Json<SessionSnapshot> {
    Json(session.store().snapshot())
}

async fn end_session(session: &Session) {
    session.store().logout().await;
    session.check().invalidate();
}

// =============================================================================
// HTML FORMS
// =============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterForm {
    email: String,
    password: String,
    first_name: String,
    last_name: String,
    #[serde(default)]
    phone_number: String,
}

impl RegisterForm {
    fn values(&self) -> RegisterValues<'_> {
        RegisterValues {
            email: &self.email,
            first_name: &self.first_name,
            last_name: &self.last_name,
            phone_number: &self.phone_number,
        }
    }

    fn to_request(&self) -> RegisterRequest {
        let phone = self.phone_number.trim();
        RegisterRequest {
            email: self.email.clone(),
            password: self.password.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            phone_number: (!phone.is_empty()).then(|| phone.to_owned()),
        }
    }
}

async fn login_page(state: &AppState, session: &Session, page: Page, error: Option<&str>, email: &str) -> String {
    let action = if page == Page::AdminLogin { ADMIN_LOGIN_PATH } else { LOGIN_PATH };
    let intro = state.pages.body(page).await;
    let body = format!("{intro}{}", pages::login_form(action, error, email));
    pages::render(page, &session.store().snapshot(), &body)
}

/// `GET /login`
pub async fn login_form(State(state): State<AppState>, session: Session) -> Html<String> {
    Html(login_page(&state, &session, Page::Login, None, "").await)
}

/// `GET /admin/login` — admins who are already signed in go straight to the
/// dashboard.
pub async fn admin_login_form(State(state): State<AppState>, session: Session) -> Response {
    if guard::admin_guard(&session.store().snapshot()) == GuardDecision::Render {
        return Redirect::to(ADMIN_HOME_PATH).into_response();
    }
    Html(login_page(&state, &session, Page::AdminLogin, None, "").await).into_response()
}

async fn submit_login(state: &AppState, session: &Session, jar: CookieJar, form: &LoginRequest, page: Page, success: &str) -> Response {
    let snapshot = session.store().login(&form.email, &form.password).await;
    if let Some(error) = snapshot.error.as_deref() {
        let status = failure_status(session.store().failure());
        let html = login_page(state, session, page, Some(error), &form.email).await;
        return (status, Html(html)).into_response();
    }
    (with_session_cookie(state, session, jar), Redirect::to(success)).into_response()
}

/// `POST /login`
pub async fn login_submit(State(state): State<AppState>, session: Session, jar: CookieJar, Form(form): Form<LoginRequest>) -> Response {
    submit_login(&state, &session, jar, &form, Page::Login, HOME_PATH).await
}

/// `POST /admin/login` — on success the admin guard decides whether the
/// account may actually enter.
pub async fn admin_login_submit(State(state): State<AppState>, session: Session, jar: CookieJar, Form(form): Form<LoginRequest>) -> Response {
    submit_login(&state, &session, jar, &form, Page::AdminLogin, ADMIN_HOME_PATH).await
}

async fn register_page(state: &AppState, session: &Session, error: Option<&str>, values: &RegisterValues<'_>) -> String {
    let intro = state.pages.body(Page::Register).await;
    let body = format!("{intro}{}", pages::register_form(error, values));
    pages::render(Page::Register, &session.store().snapshot(), &body)
}

/// `GET /register`
pub async fn register_form(State(state): State<AppState>, session: Session) -> Html<String> {
    Html(register_page(&state, &session, None, &RegisterValues::default()).await)
}

/// `POST /register`
pub async fn register_submit(State(state): State<AppState>, session: Session, jar: CookieJar, Form(form): Form<RegisterForm>) -> Response {
    let snapshot = session.store().register(form.to_request()).await;
    if let Some(error) = snapshot.error.as_deref() {
        let status = failure_status(session.store().failure());
        let html = register_page(&state, &session, Some(error), &form.values()).await;
        return (status, Html(html)).into_response();
    }
    (with_session_cookie(&state, &session, jar), Redirect::to(ACCOUNT_PATH)).into_response()
}

/// `POST /logout`
pub async fn logout_submit(State(state): State<AppState>, session: Session, jar: CookieJar) -> Response {
    end_session(&session).await;
    (jar.add(cleared_cookie(&state)), Redirect::to(HOME_PATH)).into_response()
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
