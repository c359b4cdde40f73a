use std::sync::Arc;

use axum::body::Body;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::header::CONTENT_LENGTH;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::error;

use super::templates::Templates;
use crate::models::User;
use crate::session::CurrentUser;
use crate::utils::http_helpers::{ErrorPage, HTTPError};

/// Values every rendered page can see. Built once per request; all clones
/// share the same user.
#[derive(Debug, Clone, Default)]
pub struct ViewContext {
    user: Arc<Option<User>>,
}

impl ViewContext {
    pub fn new(user: Option<User>) -> Self {
        ViewContext {
            user: Arc::new(user),
        }
    }

    pub fn user(&self) -> Option<&User> {
        Option::as_ref(&self.user)
    }

    /// Whether two contexts were built from the same request.
    pub fn same_request(&self, other: &ViewContext) -> bool {
        Arc::ptr_eq(&self.user, &other.user)
    }
}

/// Middleware: publishes the request's user to the templates as `user`.
/// Runs inside `attach_user`.
pub async fn inject_view_context(mut request: Request, next: Next) -> Response {
    let Some(CurrentUser(user)) = request.extensions().get::<CurrentUser>().cloned() else {
        return HTTPError::internal("identity layer is not installed").into_response();
    };
    request.extensions_mut().insert(ViewContext::new(user));
    next.run(request).await
}

impl<S> FromRequestParts<S> for ViewContext
where
    S: Send + Sync,
{
    type Rejection = HTTPError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<ViewContext>()
            .cloned()
            .ok_or_else(|| HTTPError::internal("view context is not installed"))
    }
}

/// Middleware: replaces the bare body of `HTTPError` responses with the
/// styled 404 or 500 page. Session cookies and other headers are kept.
pub async fn render_error_pages(
    State(templates): State<Arc<Templates>>,
    request: Request,
    next: Next,
) -> Response {
    let view = request
        .extensions()
        .get::<ViewContext>()
        .cloned()
        .unwrap_or_default();

    let response = next.run(request).await;
    let Some(ErrorPage(status)) = response.extensions().get::<ErrorPage>().copied() else {
        return response;
    };

    let template = if status == StatusCode::NOT_FOUND {
        "error/404.html"
    } else if status.is_server_error() {
        "error/500.html"
    } else {
        return response;
    };

    match templates.render(template, &view, tera::Context::new()) {
        Ok(page) => {
            let (mut parts, _) = response.into_parts();
            parts.headers.remove(CONTENT_LENGTH);
            Response::from_parts(parts, Body::from(page.0))
        }
        Err(e) => {
            error!("Failed to render error page {}: {}", template, e.message());
            response
        }
    }
}
