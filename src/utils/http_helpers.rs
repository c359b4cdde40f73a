use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use tracing::error;

use crate::error::StoreError;

/// A general purpose HTTP error type that can be converted into an `IntoResponse`.
///
/// The response body is a bare HTML page. The status travels in the response
/// extensions as an `ErrorPage` so the view layer can swap in the styled page.
#[derive(Debug)]
pub struct HTTPError {
    status: StatusCode,
    message: String,
}

/// Marker left on responses produced from an `HTTPError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorPage(pub StatusCode);

impl HTTPError {
    /// Creates a new HTTP error with the given status code and message.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        HTTPError {
            status,
            message: message.into(),
        }
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "Page not found")
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Store failures are never shown to the browser; they are logged and become a 500.
impl From<StoreError> for HTTPError {
    fn from(e: StoreError) -> Self {
        error!(
            event_name = "http.store_error",
            event_domain = "http",
            "store error while handling request: {}",
            e
        );
        HTTPError::internal("Something went wrong")
    }
}

/// Converts our `HTTPError` into an HTTP response.
impl IntoResponse for HTTPError {
    fn into_response(self) -> Response {
        let body = format!(
            "<!DOCTYPE html><html><head><title>{status}</title></head>\
             <body><h1>{status}</h1><p>{message}</p></body></html>",
            status = self.status,
            message = tera::escape_html(&self.message),
        );
        let mut response = (self.status, Html(body)).into_response();
        response.extensions_mut().insert(ErrorPage(self.status));
        response
    }
}

/// 302 to `location`. Handlers answer form posts this way.
pub fn redirect(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(header::LOCATION, value)]).into_response(),
        Err(_) => HTTPError::internal("invalid redirect target").into_response(),
    }
}
