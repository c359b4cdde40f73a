use async_trait::async_trait;
use reqwest::Client;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use super::base::{Credential, ProviderProfile, Strategy};
use crate::error::AuthError;

/// Config for the Google OAuth 2.0 authorization-code flow.
/// The endpoint URIs only need overriding in tests.
#[derive(Deserialize, Serialize, Debug, JsonSchema, Clone)]
pub struct GoogleProviderConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Absolute URL, or a path resolved against the request's host.
    #[serde(default = "default_callback_url")]
    pub callback_url: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default = "default_userinfo_uri")]
    pub userinfo_uri: String,
}

fn default_callback_url() -> String {
    "/auth/google/callback".to_string()
}

fn default_scopes() -> Vec<String> {
    vec!["openid".to_string(), "profile".to_string()]
}

fn default_auth_uri() -> String {
    "https://accounts.google.com/o/oauth2/v2/auth".to_string()
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_userinfo_uri() -> String {
    "https://openidconnect.googleapis.com/v1/userinfo".to_string()
}

/// Token endpoint response; only the access token is used.
#[derive(Deserialize, Debug)]
struct GoogleTokenResponse {
    access_token: String,
}

/// UserInfo endpoint response.
#[derive(Deserialize, Debug)]
struct GoogleUserInfo {
    sub: String,
    name: Option<String>,
    given_name: Option<String>,
    family_name: Option<String>,
    picture: Option<String>,
}

impl From<GoogleUserInfo> for ProviderProfile {
    fn from(info: GoogleUserInfo) -> Self {
        let first_name = info.given_name.unwrap_or_default();
        let last_name = info.family_name.unwrap_or_default();
        let display_name = info
            .name
            .unwrap_or_else(|| format!("{} {}", first_name, last_name).trim().to_string());
        ProviderProfile {
            id: info.sub,
            display_name,
            first_name,
            last_name,
            image: info.picture,
        }
    }
}

/// Logs users in with Google: code exchange, then a UserInfo lookup.
pub struct GoogleStrategy {
    config: GoogleProviderConfig,
    http_client: Client,
}

impl GoogleStrategy {
    pub fn new(config: &GoogleProviderConfig) -> Self {
        info!("Creating Google strategy for client_id='{}'", config.client_id);
        Self {
            config: config.clone(),
            http_client: Client::new(),
        }
    }

    async fn exchange_code(&self, credential: &Credential) -> Result<String, AuthError> {
        let params = [
            ("code", credential.code.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("redirect_uri", credential.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];

        let response = self
            .http_client
            .post(&self.config.token_uri)
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::TokenExchange(format!("Failed to call token endpoint: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Google token exchange failed with {}: {}", status, body);
            return Err(AuthError::TokenExchange(format!(
                "token endpoint returned {}",
                status
            )));
        }

        let token: GoogleTokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::TokenExchange(format!("Failed to parse token JSON: {}", e)))?;
        Ok(token.access_token)
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<ProviderProfile, AuthError> {
        let response = self
            .http_client
            .get(&self.config.userinfo_uri)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::Profile(format!("Failed to call userinfo endpoint: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            error!("Google userinfo request failed with {}", status);
            return Err(AuthError::Profile(format!(
                "userinfo endpoint returned {}",
                status
            )));
        }

        let info: GoogleUserInfo = response
            .json()
            .await
            .map_err(|e| AuthError::Profile(format!("Failed to parse userinfo JSON: {}", e)))?;
        Ok(info.into())
    }
}

#[async_trait]
impl Strategy for GoogleStrategy {
    fn get_name(&self) -> &str {
        "google"
    }

    fn authorization_url(&self, state: &str, redirect_uri: &str) -> Result<String, AuthError> {
        let scope = self.config.scopes.join(" ");
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", scope.as_str()),
            ("state", state),
        ];
        let query = serde_urlencoded::to_string(&params[..])
            .map_err(|e| AuthError::MissingCredential(format!("Failed to build URL: {}", e)))?;
        Ok(format!("{}?{}", self.config.auth_uri, query))
    }

    async fn verify(&self, credential: &Credential) -> Result<ProviderProfile, AuthError> {
        debug!("Exchanging authorization code with Google");
        let access_token = self.exchange_code(credential).await?;
        self.fetch_profile(&access_token).await
    }
}
