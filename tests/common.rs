#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::{COOKIE, LOCATION, SET_COOKIE};
use axum::http::{Method, Request, Response, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use figment::{
    providers::{Format, Yaml},
    Figment,
};
use serde_json::{Map, Value};
use storybooks::config::ConfigV1;
use storybooks::error::AuthError;
use storybooks::models::{NewUser, SessionRecord, User, USER_ID_KEY};
use storybooks::providers::{Credential, ProviderProfile, Strategy};
use storybooks::routes::create_router;
use storybooks::state::AppState;
use storybooks::store::{MemoryStore, SessionStore, Stores, UserStore};
use tower::ServiceExt;

pub const TEST_CONFIG: &str = r#"
node_env: test
session:
  secret: "integration-test-secret-0123"
  cookie_name: "storybooks.sid"
  touch_after_secs: 0
google:
  client_id: "client-id"
  client_secret: "client-secret"
store:
  backend: memory
logging:
  level: "debug"
  format: "json"
"#;

/// The code `FakeStrategy` accepts.
pub const GOOD_CODE: &str = "good-code";

pub fn load_test_config() -> ConfigV1 {
    ConfigV1::from_figment(Figment::new().merge(Yaml::string(TEST_CONFIG)))
        .expect("Failed to parse test config YAML")
}

/// Stands in for Google: accepts `GOOD_CODE` as Grace Hopper, rejects anything else.
pub struct FakeStrategy;

#[async_trait]
impl Strategy for FakeStrategy {
    fn get_name(&self) -> &str {
        "fake"
    }

    fn authorization_url(&self, state: &str, redirect_uri: &str) -> Result<String, AuthError> {
        let query = serde_urlencoded::to_string([("state", state), ("redirect_uri", redirect_uri)])
            .map_err(|e| AuthError::MissingCredential(e.to_string()))?;
        Ok(format!("https://idp.test/authorize?{}", query))
    }

    async fn verify(&self, credential: &Credential) -> Result<ProviderProfile, AuthError> {
        if credential.code != GOOD_CODE {
            return Err(AuthError::TokenExchange("invalid_grant".to_string()));
        }
        Ok(ProviderProfile {
            id: "google-grace".to_string(),
            display_name: "Grace Hopper".to_string(),
            first_name: "Grace".to_string(),
            last_name: "Hopper".to_string(),
            image: Some("https://img.test/grace.png".to_string()),
        })
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub state: AppState,
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("request should complete")
    }
}

pub fn build_app() -> TestApp {
    build_app_with(load_test_config(), Box::new(FakeStrategy))
}

pub fn build_app_with(config: ConfigV1, strategy: Box<dyn Strategy>) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(
        Arc::new(config),
        Stores::from_backend(store.clone()),
        strategy,
    )
    .expect("state should build");
    TestApp {
        router: create_router(state.clone()),
        store,
        state,
    }
}

/// Like `build_app`, but with the store roles supplied by the caller.
/// `store` still backs any role the caller filled with it.
pub fn build_app_with_stores(store: Arc<MemoryStore>, stores: Stores) -> TestApp {
    let state = AppState::new(Arc::new(load_test_config()), stores, Box::new(FakeStrategy))
        .expect("state should build");
    TestApp {
        router: create_router(state.clone()),
        store,
        state,
    }
}

pub fn get(path: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::GET)
        .uri(path)
        .header("host", "localhost:5000");
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    builder.body(Body::empty()).expect("failed to build request")
}

pub fn post_form(path: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(path)
        .header("host", "localhost:5000")
        .header("content-type", "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("failed to build request")
}

pub fn location(response: &Response<Body>) -> Option<&str> {
    response.headers().get(LOCATION).and_then(|v| v.to_str().ok())
}

pub fn assert_redirect(response: &Response<Body>, to: &str) {
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(response), Some(to));
}

/// The raw `Set-Cookie` header, if any.
pub fn set_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// `name=value` from the `Set-Cookie` header, ready to send back.
pub fn cookie_pair(response: &Response<Body>) -> Option<String> {
    set_cookie(response).and_then(|c| c.split(';').next().map(str::to_string))
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should read");
    String::from_utf8(bytes.to_vec()).expect("body should be UTF-8")
}

/// Starts the OAuth flow. Returns the pre-login cookie and the issued state.
pub async fn start_login(app: &TestApp) -> (String, String) {
    let response = app.send(get("/auth/google", None)).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    let target = location(&response).expect("redirect to provider");
    let query = target.split_once('?').map(|(_, q)| q).unwrap_or_default();
    let params: Vec<(String, String)> = serde_urlencoded::from_str(query).expect("query");
    let state = params
        .into_iter()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v)
        .expect("state parameter");
    let cookie = cookie_pair(&response).expect("pre-login session cookie");
    (cookie, state)
}

/// Runs the full login flow and returns the logged-in cookie.
pub async fn login(app: &TestApp) -> String {
    let (cookie, state) = start_login(app).await;
    let path = format!("/auth/google/callback?code={}&state={}", GOOD_CODE, state);
    let response = app.send(get(&path, Some(&cookie))).await;
    assert_redirect(&response, "/dashboard");
    cookie_pair(&response).expect("logged-in session cookie")
}

pub async fn seed_user(app: &TestApp, name: &str) -> User {
    app.store
        .create(NewUser {
            google_id: format!("google-{}", name),
            display_name: format!("{} Tester", name),
            first_name: name.to_string(),
            last_name: "Tester".to_string(),
            image: None,
        })
        .await
        .expect("user should be created")
}

/// Stores a session logged in as `user_id` and returns its cookie.
pub async fn cookie_for(app: &TestApp, user_id: &str) -> String {
    let mut data = Map::new();
    data.insert(USER_ID_KEY.to_string(), Value::from(user_id));
    let record = SessionRecord::new(
        format!("seeded-{}", user_id),
        data,
        Utc::now() + Duration::hours(1),
    );
    app.store.save(&record).await.expect("session should save");
    format!(
        "{}={}",
        app.state.sessions.cookie_name(),
        app.state.sessions.signer().sign(&record.token)
    )
}
