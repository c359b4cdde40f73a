use std::sync::Arc;

use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::SET_COOKIE;
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::{Duration, Utc};
use tracing::{debug, error};

use super::cookie::{expired_cookie, read_cookie, session_cookie, CookieSigner};
use super::session::{Session, SessionAction};
use crate::config::SessionConfig;
use crate::error::{ConfigError, StoreError};
use crate::store::SessionStore;
use crate::utils::http_helpers::HTTPError;

/// Loads sessions from the signed cookie and writes them back after the handler.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    signer: CookieSigner,
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, config: &SessionConfig) -> Result<Self, ConfigError> {
        Ok(SessionManager {
            store,
            signer: CookieSigner::new(&config.secret)?,
            config: config.clone(),
        })
    }

    pub fn cookie_name(&self) -> &str {
        &self.config.cookie_name
    }

    pub fn signer(&self) -> &CookieSigner {
        &self.signer
    }

    fn ttl(&self) -> Duration {
        Duration::seconds(i64::try_from(self.config.ttl_secs).unwrap_or(i64::MAX / 1000))
    }

    fn touch_after(&self) -> Duration {
        Duration::seconds(i64::try_from(self.config.touch_after_secs).unwrap_or(i64::MAX / 1000))
    }

    /// Resolves the session named by the request's cookie. A missing, forged,
    /// unknown or expired cookie yields a fresh unsaved session.
    pub async fn load(&self, headers: &HeaderMap) -> Result<Session, StoreError> {
        let Some(raw) = read_cookie(headers, &self.config.cookie_name) else {
            return Ok(Session::new());
        };
        let Some(token) = self.signer.unsign(&raw) else {
            debug!(
                event_name = "session.cookie.rejected",
                event_domain = "session",
                "ignoring session cookie with a bad signature"
            );
            return Ok(Session::new());
        };

        match self.store.load(&token).await? {
            Some(record) if !record.is_expired(Utc::now()) => Ok(Session::from_record(record)),
            _ => Ok(Session::new()),
        }
    }

    /// Applies the session's commit plan to the store and the response headers.
    pub async fn commit(&self, session: &Session, headers: &mut HeaderMap) -> Result<(), StoreError> {
        let plan = session.plan(Utc::now(), self.ttl(), self.touch_after());

        if let Some(old) = plan.discard {
            self.store.destroy(&old).await?;
        }

        match plan.action {
            SessionAction::None => {}
            SessionAction::Save { record, set_cookie } => {
                self.store.save(&record).await?;
                if set_cookie {
                    let value = self.signer.sign(&record.token);
                    self.set_cookie(
                        headers,
                        session_cookie(&self.config.cookie_name, &value, self.config.secure_cookie),
                    );
                }
            }
            SessionAction::Touch { token, expires_at } => {
                self.store.touch(&token, expires_at).await?;
            }
            SessionAction::Destroy { token } => {
                if let Some(token) = token {
                    self.store.destroy(&token).await?;
                }
                self.set_cookie(
                    headers,
                    expired_cookie(&self.config.cookie_name, self.config.secure_cookie),
                );
            }
        }
        Ok(())
    }

    fn set_cookie(&self, headers: &mut HeaderMap, cookie: String) {
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                headers.append(SET_COOKIE, value);
            }
            Err(e) => error!("Refusing to send malformed session cookie: {}", e),
        }
    }
}

/// Middleware: resolves the session before the handler and commits it after.
pub async fn resolve_session(
    State(manager): State<Arc<SessionManager>>,
    mut request: Request,
    next: Next,
) -> Response {
    let session = match manager.load(request.headers()).await {
        Ok(session) => session,
        Err(e) => return HTTPError::from(e).into_response(),
    };
    request.extensions_mut().insert(session.clone());

    let mut response = next.run(request).await;

    if let Err(e) = manager.commit(&session, response.headers_mut()).await {
        return HTTPError::from(e).into_response();
    }
    response
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = HTTPError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| HTTPError::internal("session layer is not installed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use axum::http::header::COOKIE;

    fn config() -> SessionConfig {
        SessionConfig {
            secret: "0123456789abcdef-test".to_string(),
            cookie_name: "sid".to_string(),
            ttl_secs: 3600,
            touch_after_secs: 0,
            secure_cookie: false,
        }
    }

    fn cookie_header(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(&format!("sid={}", value)).unwrap());
        headers
    }

    fn set_cookie_value(headers: &HeaderMap) -> String {
        let raw = headers[SET_COOKIE].to_str().unwrap();
        let first = raw.split(';').next().unwrap();
        first.trim_start_matches("sid=").to_string()
    }

    #[tokio::test]
    async fn test_unused_session_writes_nothing() {
        let store = Arc::new(MemoryStore::new());
        let manager = SessionManager::new(store.clone(), &config()).unwrap();

        let session = manager.load(&HeaderMap::new()).await.unwrap();
        let mut headers = HeaderMap::new();
        manager.commit(&session, &mut headers).await.unwrap();

        assert!(headers.get(SET_COOKIE).is_none());
        assert_eq!(store.session_writes(), 0);
    }

    #[tokio::test]
    async fn test_saved_session_round_trips_through_cookie() {
        let store = Arc::new(MemoryStore::new());
        let manager = SessionManager::new(store.clone(), &config()).unwrap();

        let session = manager.load(&HeaderMap::new()).await.unwrap();
        session.insert("user_id", "u1").unwrap();
        let mut headers = HeaderMap::new();
        manager.commit(&session, &mut headers).await.unwrap();
        let cookie = set_cookie_value(&headers);

        let again = manager.load(&cookie_header(&cookie)).await.unwrap();
        assert!(!again.is_new());
        assert_eq!(again.user_id().as_deref(), Some("u1"));

        // Unchanged and touching disabled: no further write, no cookie.
        let mut headers = HeaderMap::new();
        manager.commit(&again, &mut headers).await.unwrap();
        assert!(headers.get(SET_COOKIE).is_none());
        assert_eq!(store.session_writes(), 1);
    }

    #[tokio::test]
    async fn test_forged_cookie_yields_new_session() {
        let store = Arc::new(MemoryStore::new());
        let manager = SessionManager::new(store, &config()).unwrap();

        let session = manager.load(&cookie_header("abc.forged")).await.unwrap();
        assert!(session.is_new());
        assert_eq!(session.user_id(), None);
    }

    #[tokio::test]
    async fn test_destroy_removes_record_and_clears_cookie() {
        let store = Arc::new(MemoryStore::new());
        let manager = SessionManager::new(store.clone(), &config()).unwrap();

        let session = Session::new();
        session.insert("user_id", "u1").unwrap();
        manager.commit(&session, &mut HeaderMap::new()).await.unwrap();
        assert_eq!(store.session_count().await, 1);

        let cookie = manager.signer().sign(&session.token());
        let loaded = manager.load(&cookie_header(&cookie)).await.unwrap();
        loaded.destroy();
        let mut headers = HeaderMap::new();
        manager.commit(&loaded, &mut headers).await.unwrap();

        assert_eq!(store.session_count().await, 0);
        assert!(headers[SET_COOKIE].to_str().unwrap().contains("Max-Age=0"));
    }
}
