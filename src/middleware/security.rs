use axum::body::Bytes;
use axum::extract::Request;
use axum::http::header::HeaderName;
use axum::http::{HeaderValue, Method, Uri};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Router;
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;

use super::form::{buffer_body, rebuild, BodyKind};

const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; \
    script-src 'self' https://cdnjs.cloudflare.com; \
    style-src 'self' https://cdnjs.cloudflare.com https://fonts.googleapis.com; \
    font-src 'self' https://cdnjs.cloudflare.com https://fonts.gstatic.com; \
    img-src 'self' https: data:; \
    object-src 'none'; base-uri 'self'; form-action 'self'; frame-ancestors 'self'";

/// Hardening headers added to every response that does not set them itself.
const SECURITY_HEADERS: &[(&str, &str)] = &[
    ("content-security-policy", CONTENT_SECURITY_POLICY),
    ("cross-origin-opener-policy", "same-origin"),
    ("cross-origin-resource-policy", "same-origin"),
    ("origin-agent-cluster", "?1"),
    ("referrer-policy", "no-referrer"),
    ("strict-transport-security", "max-age=15552000; includeSubDomains"),
    ("x-content-type-options", "nosniff"),
    ("x-dns-prefetch-control", "off"),
    ("x-download-options", "noopen"),
    ("x-frame-options", "SAMEORIGIN"),
    ("x-permitted-cross-domain-policies", "none"),
    ("x-xss-protection", "0"),
];

/// Wraps `router` in the security headers and a permissive CORS policy.
pub fn with_security_headers(router: Router) -> Router {
    let router = router.layer(CorsLayer::permissive());
    SECURITY_HEADERS.iter().fold(router, |router, &(name, value)| {
        router.layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        ))
    })
}

/// Neutralises markup in user input by escaping `<`.
pub fn clean_text(input: &str) -> String {
    input.replace('<', "&lt;")
}

fn clean_json(value: &mut Value) -> bool {
    match value {
        Value::String(s) if s.contains('<') => {
            *s = clean_text(s);
            true
        }
        Value::Array(items) => items.iter_mut().fold(false, |changed, v| clean_json(v) || changed),
        Value::Object(map) => map
            .values_mut()
            .fold(false, |changed, v| clean_json(v) || changed),
        _ => false,
    }
}

fn clean_pairs(pairs: &mut [(String, String)]) -> bool {
    let mut changed = false;
    for (_, value) in pairs.iter_mut() {
        if value.contains('<') {
            *value = clean_text(value);
            changed = true;
        }
    }
    changed
}

/// Rewrites the query string with cleaned values. `None` when nothing changed.
fn clean_query(uri: &Uri) -> Option<Uri> {
    let query = uri.query()?;
    let mut pairs: Vec<(String, String)> = serde_urlencoded::from_str(query).ok()?;
    if !clean_pairs(&mut pairs) {
        return None;
    }
    let query = serde_urlencoded::to_string(&pairs).ok()?;
    let path_and_query = format!("{}?{}", uri.path(), query);

    let mut parts = uri.clone().into_parts();
    parts.path_and_query = path_and_query.parse().ok();
    Uri::from_parts(parts).ok()
}

/// Middleware: escapes markup in query values and in form or JSON body values.
pub async fn xss_clean(mut request: Request, next: Next) -> Response {
    if let Some(uri) = clean_query(request.uri()) {
        *request.uri_mut() = uri;
    }

    let has_body = matches!(
        *request.method(),
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    );
    let kind = BodyKind::of(request.headers());
    let (true, Some(kind)) = (has_body, kind) else {
        return next.run(request).await;
    };

    let (parts, bytes) = match buffer_body(request).await {
        Ok(buffered) => buffered,
        Err(e) => return e.into_response(),
    };

    let cleaned: Option<Bytes> = match kind {
        BodyKind::UrlEncoded => {
            let mut pairs: Vec<(String, String)> = match serde_urlencoded::from_bytes(&bytes) {
                Ok(pairs) => pairs,
                Err(_) => return next.run(rebuild(parts, bytes)).await,
            };
            if clean_pairs(&mut pairs) {
                serde_urlencoded::to_string(&pairs).ok().map(Into::into)
            } else {
                None
            }
        }
        BodyKind::Json => match serde_json::from_slice::<Value>(&bytes) {
            Ok(mut value) => {
                if clean_json(&mut value) {
                    serde_json::to_vec(&value).ok().map(Into::into)
                } else {
                    None
                }
            }
            Err(_) => None,
        },
    };

    next.run(rebuild(parts, cleaned.unwrap_or(bytes))).await
}
