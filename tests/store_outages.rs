mod common;

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::*;
use storybooks::error::StoreError;
use storybooks::models::{NewUser, SessionRecord, User};
use storybooks::store::{MemoryStore, SessionStore, Stores, UserStore};

/// A backend whose every call fails as if the database were unreachable.
struct DownStore;

fn unavailable() -> StoreError {
    StoreError::Unavailable("connection refused".to_string())
}

#[async_trait]
impl SessionStore for DownStore {
    async fn load(&self, _token: &str) -> Result<Option<SessionRecord>, StoreError> {
        Err(unavailable())
    }

    async fn save(&self, _record: &SessionRecord) -> Result<(), StoreError> {
        Err(unavailable())
    }

    async fn touch(&self, _token: &str, _expires_at: DateTime<Utc>) -> Result<(), StoreError> {
        Err(unavailable())
    }

    async fn destroy(&self, _token: &str) -> Result<(), StoreError> {
        Err(unavailable())
    }
}

#[async_trait]
impl UserStore for DownStore {
    async fn find_by_id(&self, _id: &str) -> Result<Option<User>, StoreError> {
        Err(unavailable())
    }

    async fn find_by_google_id(&self, _google_id: &str) -> Result<Option<User>, StoreError> {
        Err(unavailable())
    }

    async fn create(&self, _new_user: NewUser) -> Result<User, StoreError> {
        Err(unavailable())
    }
}

fn sessions_down() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let mut stores = Stores::from_backend(store.clone());
    stores.sessions = Arc::new(DownStore);
    build_app_with_stores(store, stores)
}

fn users_down() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let mut stores = Stores::from_backend(store.clone());
    stores.users = Arc::new(DownStore);
    build_app_with_stores(store, stores)
}

#[tokio::test]
async fn session_save_failure_is_500() {
    let app = sessions_down();

    let response = app.send(get("/auth/google", None)).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(set_cookie(&response).is_none());
}

#[tokio::test]
async fn session_load_failure_is_500() {
    let app = sessions_down();
    let cookie = format!(
        "{}={}",
        app.state.sessions.cookie_name(),
        app.state.sessions.signer().sign("some-token")
    );

    let response = app.send(get("/dashboard", Some(&cookie))).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_text(response).await.contains("Something went wrong"));
}

#[tokio::test]
async fn anonymous_page_needs_no_session_store() {
    let app = sessions_down();
    let response = app.send(get("/", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn callback_with_user_store_down_is_500() {
    let app = users_down();
    let (cookie, state) = start_login(&app).await;

    let path = format!("/auth/google/callback?code={}&state={}", GOOD_CODE, state);
    let response = app.send(get(&path, Some(&cookie))).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(location(&response).is_none());
}

#[tokio::test]
async fn rejected_code_with_user_store_down_still_redirects() {
    let app = users_down();
    let (cookie, state) = start_login(&app).await;

    let path = format!("/auth/google/callback?code=bad-code&state={}", state);
    let response = app.send(get(&path, Some(&cookie))).await;

    assert_redirect(&response, "/");
}

#[tokio::test]
async fn user_lookup_failure_is_500() {
    let app = users_down();
    let cookie = cookie_for(&app, "65f0c0ffee0000000000beef").await;

    let response = app.send(get("/dashboard", Some(&cookie))).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
