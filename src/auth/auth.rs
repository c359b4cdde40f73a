use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{AuthError, StoreError};
use crate::models::{NewUser, User};
use crate::providers::{Credential, Strategy};
use crate::store::UserStore;

/// Maps identities asserted by the strategy onto local users.
pub struct Auth {
    strategy: Box<dyn Strategy>,
    users: Arc<dyn UserStore>,
}

impl Auth {
    pub fn new(strategy: Box<dyn Strategy>, users: Arc<dyn UserStore>) -> Self {
        info!("Creating auth with strategy '{}'", strategy.get_name());
        Auth { strategy, users }
    }

    pub fn authorization_url(&self, state: &str, redirect_uri: &str) -> Result<String, AuthError> {
        self.strategy.authorization_url(state, redirect_uri)
    }

    /// Verifies the credential with the provider, then finds the local user
    /// by provider id, creating it on first login. Nothing is written when
    /// the provider rejects the credential.
    pub async fn authenticate(&self, credential: &Credential) -> Result<User, AuthError> {
        let profile = match self.strategy.verify(credential).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(
                    event_name = "auth.login.rejected",
                    event_domain = "auth",
                    strategy = self.strategy.get_name(),
                    "provider rejected credential: {}",
                    e
                );
                return Err(e);
            }
        };

        if let Some(user) = self.users.find_by_google_id(&profile.id).await? {
            info!(
                event_name = "auth.login.existing_user",
                event_domain = "auth",
                user_id = user.id.as_str(),
                "user '{}' logged in",
                user.display_name
            );
            return Ok(user);
        }

        let user = self.users.create(NewUser::from(profile)).await?;
        info!(
            event_name = "auth.login.new_user",
            event_domain = "auth",
            user_id = user.id.as_str(),
            "created user '{}' on first login",
            user.display_name
        );
        Ok(user)
    }

    /// Resolves the user id stored in a session. Ids that no longer exist resolve to `None`.
    pub async fn deserialize_user(&self, user_id: &str) -> Result<Option<User>, StoreError> {
        self.users.find_by_id(user_id).await
    }
}
