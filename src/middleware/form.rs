use axum::body::{self, Body, Bytes};
use axum::extract::Request;
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use serde_json::{Map, Value};

use crate::utils::http_helpers::HTTPError;

/// Largest request body the pre-routing middleware will buffer.
pub const MAX_BODY_BYTES: usize = 100 * 1024;

/// Field carrying the overriding verb.
pub const METHOD_FIELD: &str = "_method";

/// Body encodings the pre-routing middleware understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    UrlEncoded,
    Json,
}

impl BodyKind {
    pub fn of(headers: &HeaderMap) -> Option<Self> {
        let content_type = headers.get(CONTENT_TYPE)?.to_str().ok()?;
        let essence = content_type.split(';').next()?.trim();
        if essence.eq_ignore_ascii_case("application/x-www-form-urlencoded") {
            Some(BodyKind::UrlEncoded)
        } else if essence.eq_ignore_ascii_case("application/json") {
            Some(BodyKind::Json)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormFields {
    UrlEncoded(Vec<(String, String)>),
    Json(Map<String, Value>),
}

/// A parsed form or JSON-object body, with any `_method` field split out.
#[derive(Debug, Clone, PartialEq)]
pub struct FormBody {
    /// Value of `_method` if the body had one. Non-string JSON values are dropped.
    pub method: Option<String>,
    /// Whether a `_method` field was present at all.
    pub had_method_field: bool,
    pub fields: FormFields,
}

impl FormBody {
    /// Parses a body. `None` when it does not parse, or when it is JSON but not an object.
    pub fn parse(kind: BodyKind, bytes: &[u8]) -> Option<Self> {
        match kind {
            BodyKind::UrlEncoded => {
                let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(bytes).ok()?;
                let mut method = None;
                let mut had_method_field = false;
                let mut fields = Vec::with_capacity(pairs.len());
                for (key, value) in pairs {
                    if key == METHOD_FIELD {
                        had_method_field = true;
                        method.get_or_insert(value);
                    } else {
                        fields.push((key, value));
                    }
                }
                Some(FormBody {
                    method,
                    had_method_field,
                    fields: FormFields::UrlEncoded(fields),
                })
            }
            BodyKind::Json => {
                let Value::Object(mut map) = serde_json::from_slice(bytes).ok()? else {
                    return None;
                };
                let removed = map.remove(METHOD_FIELD);
                Some(FormBody {
                    had_method_field: removed.is_some(),
                    method: removed.and_then(|v| v.as_str().map(str::to_string)),
                    fields: FormFields::Json(map),
                })
            }
        }
    }

    /// Re-encodes the remaining fields in the body's original encoding.
    pub fn encode(&self) -> Option<Bytes> {
        match &self.fields {
            FormFields::UrlEncoded(pairs) => serde_urlencoded::to_string(pairs).ok().map(Bytes::from),
            FormFields::Json(map) => serde_json::to_vec(map).ok().map(Bytes::from),
        }
    }
}

/// Buffers the request body, refusing anything over `MAX_BODY_BYTES` with 413.
pub async fn buffer_body(request: Request) -> Result<(axum::http::request::Parts, Bytes), HTTPError> {
    let (parts, body) = request.into_parts();

    let declared = parts
        .headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > MAX_BODY_BYTES) {
        return Err(payload_too_large());
    }

    let bytes = body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|_| payload_too_large())?;
    Ok((parts, bytes))
}

/// Puts a (possibly rewritten) body back, keeping `Content-Length` in step.
pub fn rebuild(mut parts: axum::http::request::Parts, bytes: Bytes) -> Request {
    if parts.headers.contains_key(CONTENT_LENGTH) {
        parts
            .headers
            .insert(CONTENT_LENGTH, HeaderValue::from(bytes.len()));
    }
    Request::from_parts(parts, Body::from(bytes))
}

fn payload_too_large() -> HTTPError {
    HTTPError::new(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_kind_ignores_parameters() {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        assert_eq!(BodyKind::of(&headers), Some(BodyKind::Json));

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        assert_eq!(BodyKind::of(&headers), None);
    }

    #[test]
    fn test_urlencoded_method_split_out() {
        let body = FormBody::parse(BodyKind::UrlEncoded, b"title=Hi&_method=PUT&body=x").unwrap();
        assert_eq!(body.method.as_deref(), Some("PUT"));
        assert!(body.had_method_field);
        assert_eq!(body.encode().unwrap(), Bytes::from("title=Hi&body=x"));
    }

    #[test]
    fn test_json_non_string_method_is_dropped() {
        let body = FormBody::parse(BodyKind::Json, br#"{"_method": 5, "a": 1}"#).unwrap();
        assert_eq!(body.method, None);
        assert!(body.had_method_field);
        assert_eq!(body.encode().unwrap(), Bytes::from(r#"{"a":1}"#));
    }

    #[test]
    fn test_json_array_is_not_a_form() {
        assert!(FormBody::parse(BodyKind::Json, b"[1, 2]").is_none());
        assert!(FormBody::parse(BodyKind::Json, b"{not json").is_none());
    }
}
