//! Page handlers for the public site, the account area and the admin area.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{MethodRouter, get};

use super::session::Session;
use crate::pages::{self, Page};
use crate::state::AppState;

/// `GET` route rendering `page` with its stored body.
pub fn page(page: Page) -> MethodRouter<AppState> {
    get(move |State(state): State<AppState>, session: Session| async move { show(&state, &session, page).await })
}

pub async fn show(state: &AppState, session: &Session, page: Page) -> Html<String> {
    let body = state.pages.body(page).await;
    Html(pages::render(page, &session.store().snapshot(), body))
}

/// `GET /account` — only reached through the account guard.
pub async fn account(State(state): State<AppState>, session: Session) -> Response {
    let snapshot = session.store().snapshot();
    let Some(user) = snapshot.user.as_ref() else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    let intro = state.pages.body(Page::Account).await;
    let body = format!("{intro}{}", pages::account_details(user));
    Html(pages::render(Page::Account, &snapshot, &body)).into_response()
}

/// Fallback for unknown paths.
pub async fn not_found(State(state): State<AppState>, session: Session) -> Response {
    (StatusCode::NOT_FOUND, show(&state, &session, Page::NotFound).await).into_response()
}
