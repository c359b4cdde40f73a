//! HTTP route definitions and the request pipeline around them.
//!
//! Outermost first, every request passes through: request tracing
//! (development only), security headers and CORS, XSS cleaning, method
//! override, routing, session resolution, user attachment, view context,
//! error pages, and finally the handler.

mod auth_routes;
mod guards;
mod health_routes;
mod index_routes;
mod story_routes;

pub use auth_routes::{callback_uri, OAUTH_STATE_KEY};
pub use guards::{AuthUser, Guest};

use axum::handler::HandlerWithoutStateExt;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::RunMode;
use crate::middleware::{method_override, with_security_headers, xss_clean};
use crate::session::{attach_user, resolve_session};
use crate::state::AppState;
use crate::utils::http_helpers::HTTPError;
use crate::view::{inject_view_context, render_error_pages};

async fn not_found() -> HTTPError {
    HTTPError::not_found()
}

/// Creates the application with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let development = state.config.node_env == RunMode::Development;
    let static_files = ServeDir::new(&state.config.static_dir).not_found_service(not_found.into_service());

    let pages = Router::new()
        .merge(index_routes::routes())
        .merge(auth_routes::routes())
        .merge(story_routes::routes())
        .merge(health_routes::routes())
        .fallback_service(static_files)
        .layer(
            ServiceBuilder::new()
                .layer(from_fn_with_state(state.sessions.clone(), resolve_session))
                .layer(from_fn_with_state(state.auth.clone(), attach_user))
                .layer(from_fn(inject_view_context))
                .layer(from_fn_with_state(state.templates.clone(), render_error_pages)),
        )
        .with_state(state);

    // Method override has to run before routing, so it wraps the whole router.
    let app = Router::new()
        .fallback_service(pages)
        .layer(from_fn(method_override))
        .layer(from_fn(xss_clean));
    let app = with_security_headers(app);

    if development {
        app.layer(TraceLayer::new_for_http())
    } else {
        app
    }
}
