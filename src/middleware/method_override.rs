use axum::extract::Request;
use axum::http::Method;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use super::form::{buffer_body, rebuild, BodyKind, FormBody};

/// Verbs a form may switch to.
const ALLOWED_METHODS: [Method; 7] = [
    Method::GET,
    Method::HEAD,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::OPTIONS,
];

/// Maps an override value to a supported verb, case-insensitively.
pub fn resolve_override(value: &str) -> Option<Method> {
    let upper = value.trim().to_ascii_uppercase();
    ALLOWED_METHODS
        .iter()
        .find(|method| method.as_str() == upper)
        .cloned()
}

/// Middleware: lets HTML forms issue PUT and DELETE through a `_method` field.
///
/// Must wrap the router so the rewritten verb takes part in route matching.
/// Only POST bodies that parse as a form or a JSON object are touched; the
/// `_method` field is always removed from such bodies.
pub async fn method_override(request: Request, next: Next) -> Response {
    if request.method() != Method::POST {
        return next.run(request).await;
    }
    let Some(kind) = BodyKind::of(request.headers()) else {
        return next.run(request).await;
    };

    let (mut parts, bytes) = match buffer_body(request).await {
        Ok(buffered) => buffered,
        Err(e) => return e.into_response(),
    };

    let Some(form) = FormBody::parse(kind, &bytes).filter(|form| form.had_method_field) else {
        return next.run(rebuild(parts, bytes)).await;
    };
    let Some(stripped) = form.encode() else {
        return next.run(rebuild(parts, bytes)).await;
    };

    if let Some(method) = form.method.as_deref().and_then(resolve_override) {
        debug!(
            event_name = "http.method_override",
            event_domain = "http",
            "overriding POST {} with {}",
            parts.uri.path(),
            method
        );
        parts.method = method;
    }

    next.run(rebuild(parts, stripped)).await
}
