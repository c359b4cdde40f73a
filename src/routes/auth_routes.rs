//! Google login, callback and logout.

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum::{routing::get, Router};
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::AuthError;
use crate::models::{User, USER_ID_KEY};
use crate::providers::Credential;
use crate::session::Session;
use crate::state::AppState;
use crate::utils::http_helpers::{redirect, HTTPError};

/// Session key holding the OAuth `state` between the redirect and the callback.
pub const OAUTH_STATE_KEY: &str = "oauth_state";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/google", get(google_login))
        .route("/auth/google/callback", get(google_callback))
        .route("/auth/logout", get(logout))
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// Absolute redirect URI for the provider. A relative `callback_url` is
/// resolved against the request's `Host` and `X-Forwarded-Proto`.
pub fn callback_uri(callback_url: &str, headers: &HeaderMap) -> String {
    if callback_url.starts_with("http://") || callback_url.starts_with("https://") {
        return callback_url.to_string();
    }
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .unwrap_or("http");
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    format!("{}://{}{}", scheme, host, callback_url)
}

/// Starts the authorization-code flow.
async fn google_login(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
) -> Result<Response, HTTPError> {
    let oauth_state = uuid::Uuid::new_v4().simple().to_string();
    session
        .insert(OAUTH_STATE_KEY, &oauth_state)
        .map_err(|e| HTTPError::internal(e.to_string()))?;

    let redirect_uri = callback_uri(&state.config.google.callback_url, &headers);
    let url = state
        .auth
        .authorization_url(&oauth_state, &redirect_uri)
        .map_err(|e| HTTPError::internal(e.to_string()))?;
    Ok(redirect(&url))
}

async fn complete_login(
    state: &AppState,
    params: CallbackParams,
    expected_state: Option<String>,
    headers: &HeaderMap,
) -> Result<User, AuthError> {
    if let Some(error) = params.error {
        return Err(AuthError::MissingCredential(format!("provider returned '{}'", error)));
    }
    match (expected_state, params.state) {
        (Some(expected), Some(got)) if expected == got => {}
        _ => return Err(AuthError::StateMismatch),
    }
    let code = params
        .code
        .filter(|code| !code.is_empty())
        .ok_or_else(|| AuthError::MissingCredential("no authorization code".to_string()))?;

    let credential = Credential {
        code,
        redirect_uri: callback_uri(&state.config.google.callback_url, headers),
    };
    state.auth.authenticate(&credential).await
}

/// Finishes the flow. Success logs the browser in under a fresh session;
/// any failure drops the session and returns to the login page.
async fn google_callback(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Response {
    let expected_state = session.take::<String>(OAUTH_STATE_KEY);

    match complete_login(&state, params, expected_state, &headers).await {
        Ok(user) => {
            session.regenerate();
            if let Err(e) = session.insert(USER_ID_KEY, &user.id) {
                return HTTPError::internal(e.to_string()).into_response();
            }
            info!(
                event_name = "auth.session.created",
                event_domain = "auth",
                user_id = user.id.as_str(),
                "logged in"
            );
            redirect("/dashboard")
        }
        // The user store failing is an outage, not a rejected login.
        Err(AuthError::Store(e)) => HTTPError::from(e).into_response(),
        Err(e) => {
            warn!(
                event_name = "auth.login.failed",
                event_domain = "auth",
                "login failed: {}",
                e
            );
            session.destroy();
            redirect("/")
        }
    }
}

async fn logout(session: Session) -> Response {
    if let Some(user_id) = session.user_id() {
        info!(
            event_name = "auth.session.destroyed",
            event_domain = "auth",
            user_id = user_id.as_str(),
            "logged out"
        );
    }
    session.destroy();
    redirect("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_callback_uri_absolute_kept() {
        let uri = callback_uri("https://books.example/auth/google/callback", &HeaderMap::new());
        assert_eq!(uri, "https://books.example/auth/google/callback");
    }

    #[test]
    fn test_callback_uri_relative_resolved() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("localhost:5000"));
        assert_eq!(
            callback_uri("/auth/google/callback", &headers),
            "http://localhost:5000/auth/google/callback"
        );

        headers.insert("x-forwarded-proto", HeaderValue::from_static("https, http"));
        assert_eq!(
            callback_uri("/auth/google/callback", &headers),
            "https://localhost:5000/auth/google/callback"
        );
    }
}
