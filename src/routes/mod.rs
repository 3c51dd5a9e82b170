//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! One Axum router serves the public site, the guarded account and admin
//! areas, the JSON auth API and static assets. Guarded subtrees run
//! `guard_request` as a route layer; it validates the session once and hands
//! it to the page handler through the request extensions.

pub mod auth;
pub mod session;
pub mod site;

use axum::Router;
use axum::extract::{Request, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use self::session::Session;
use crate::guard::{GuardDecision, GuardInstance, GuardOptions};
use crate::pages::{self, Page};
use crate::services::auth_store::SessionSnapshot;
use crate::state::AppState;

/// Seconds the loading page waits before the browser retries.
const LOADING_REFRESH_SECS: &str = "1";

/// State for one guarded subtree.
#[derive(Clone)]
pub struct GuardState {
    pub app: AppState,
    pub options: GuardOptions,
}

/// Middleware that runs a fresh `GuardInstance` against the request's
/// session and renders, redirects (303) or shows the loading page.
pub async fn guard_request(State(guard): State<GuardState>, mut req: Request, next: Next) -> Response {
    let session = Session::from_headers(&guard.app, req.headers());
    session
        .ensure_within(guard.app.config.session_check_timeout)
        .await;

    let snapshot = session.store().snapshot();
    let mut instance = GuardInstance::new(guard.options);
    match instance.observe(&snapshot).decision() {
        GuardDecision::Render => {
            req.extensions_mut().insert(session);
            next.run(req).await
        }
        GuardDecision::Redirect(to) => {
            tracing::debug!(path = %req.uri().path(), to = %to, "guard redirect");
            Redirect::to(&to).into_response()
        }
        GuardDecision::Loading => loading_response(&guard.app, &snapshot).await,
    }
}

async fn loading_response(state: &AppState, snapshot: &SessionSnapshot) -> Response {
    let body = state.pages.body(Page::Loading).await;
    let html = pages::render(Page::Loading, snapshot, body);
    (
        StatusCode::OK,
        [(header::REFRESH, HeaderValue::from_static(LOADING_REFRESH_SECS))],
        Html(html),
    )
        .into_response()
}

fn guarded(state: &AppState, options: GuardOptions, routes: Router<AppState>) -> Router<AppState> {
    let guard = GuardState { app: state.clone(), options };
    routes.route_layer(middleware::from_fn_with_state(guard, guard_request))
}

/// JSON auth API.
fn api_routes() -> Router<AppState> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/session", get(auth::current_session))
        .layer(cors)
}

fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/", site::page(Page::Home))
        .route("/portfolio", site::page(Page::Portfolio))
        .route("/offers", site::page(Page::Offers))
        .route("/reviews", site::page(Page::Reviews))
        .route("/blog", site::page(Page::Blog))
        .route("/contact", site::page(Page::Contact))
        .route("/login", get(auth::login_form).post(auth::login_submit))
        .route("/register", get(auth::register_form).post(auth::register_submit))
        .route("/admin/login", get(auth::admin_login_form).post(auth::admin_login_submit))
        .route("/logout", post(auth::logout_submit))
}

fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin", site::page(Page::AdminDashboard))
        .route("/admin/portfolio", site::page(Page::AdminPortfolio))
        .route("/admin/team", site::page(Page::AdminTeam))
        .route("/admin/feedback", site::page(Page::AdminFeedback))
        .route("/admin/contacts", site::page(Page::AdminContacts))
}

/// Full application router.
pub fn app(state: AppState) -> Router {
    let assets = ServeDir::new(state.config.site_dir.join("assets"));
    let account = Router::new().route("/account", get(site::account));

    Router::new()
        .merge(public_routes())
        .merge(guarded(&state, GuardOptions::default(), account))
        .merge(guarded(&state, GuardOptions::admin(), admin_routes()))
        .merge(api_routes())
        .route("/healthz", get(healthz))
        .nest_service("/assets", assets)
        .fallback(site::not_found)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
