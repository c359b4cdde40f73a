use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::models::NewUser;

/// What the identity provider hands back after the user approved the login.
#[derive(Debug, Clone)]
pub struct Credential {
    /// The authorization code from the callback query.
    pub code: String,
    /// The redirect URI used when the flow started; the provider checks it matches.
    pub redirect_uri: String,
}

/// A provider-side identity, before it is mapped to a local user.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProviderProfile {
    /// Stable subject id at the provider.
    pub id: String,
    pub display_name: String,
    pub first_name: String,
    pub last_name: String,
    pub image: Option<String>,
}

impl From<ProviderProfile> for NewUser {
    fn from(profile: ProviderProfile) -> Self {
        NewUser {
            google_id: profile.id,
            display_name: profile.display_name,
            first_name: profile.first_name,
            last_name: profile.last_name,
            image: profile.image,
        }
    }
}

/// An identity strategy turns a provider credential into a provider profile.
#[async_trait]
pub trait Strategy: Send + Sync {
    fn get_name(&self) -> &str;
    /// Where to send the browser to start the login.
    fn authorization_url(&self, state: &str, redirect_uri: &str) -> Result<String, AuthError>;
    async fn verify(&self, credential: &Credential) -> Result<ProviderProfile, AuthError>;
}
