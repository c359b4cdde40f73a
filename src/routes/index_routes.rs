//! Login page and dashboard.

use axum::extract::State;
use axum::response::{Html, IntoResponse};
use axum::{routing::get, Router};
use tera::Context;

use super::guards::{AuthUser, Guest};
use crate::state::AppState;
use crate::utils::http_helpers::HTTPError;
use crate::view::ViewContext;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(login))
        .route("/dashboard", get(dashboard))
}

async fn login(
    _guest: Guest,
    State(state): State<AppState>,
    view: ViewContext,
) -> Result<Html<String>, HTTPError> {
    state.templates.render("login.html", &view, Context::new())
}

/// The user's own stories, whatever their status.
async fn dashboard(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    view: ViewContext,
) -> Result<impl IntoResponse, HTTPError> {
    let stories = state.stores.stories.list_by_user(&user.id).await?;
    let mut context = Context::new();
    context.insert("stories", &stories);
    state.templates.render("dashboard.html", &view, context)
}
