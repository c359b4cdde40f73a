use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use super::{memory_store::MemoryStore, mongodb_store::MongoDBStore};
use crate::config::{StoreBackend, StoreConfig};
use crate::error::StoreError;
use crate::models::{NewUser, SessionRecord, Story, StoryInput, User};

/// Key-value session persistence, keyed by the opaque session token.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Returns the record for `token`, or `None` if absent or expired.
    async fn load(&self, token: &str) -> Result<Option<SessionRecord>, StoreError>;
    /// Inserts or replaces the whole record.
    async fn save(&self, record: &SessionRecord) -> Result<(), StoreError>;
    /// Pushes the expiry of an existing record forward without touching its payload.
    async fn touch(&self, token: &str, expires_at: DateTime<Utc>) -> Result<(), StoreError>;
    async fn destroy(&self, token: &str) -> Result<(), StoreError>;
}

/// Lookup and creation of local users.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_google_id(&self, google_id: &str) -> Result<Option<User>, StoreError>;
    async fn create(&self, new_user: NewUser) -> Result<User, StoreError>;
}

/// Story persistence. All listings are ordered newest first.
#[async_trait]
pub trait StoryStore: Send + Sync {
    async fn create_story(&self, user_id: &str, input: StoryInput) -> Result<Story, StoreError>;
    async fn find_story(&self, id: &str) -> Result<Option<Story>, StoreError>;
    /// Every story owned by `user_id`, whatever its status.
    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Story>, StoreError>;
    /// Public stories, optionally restricted to one author.
    async fn list_public(&self, user_id: Option<&str>) -> Result<Vec<Story>, StoreError>;
    /// Returns the updated story, or `None` if `id` does not exist.
    async fn update_story(&self, id: &str, input: StoryInput) -> Result<Option<Story>, StoreError>;
    /// Returns whether a story was removed.
    async fn delete_story(&self, id: &str) -> Result<bool, StoreError>;
}

/// The three stores, usually backed by the same connection.
#[derive(Clone)]
pub struct Stores {
    pub sessions: Arc<dyn SessionStore>,
    pub users: Arc<dyn UserStore>,
    pub stories: Arc<dyn StoryStore>,
}

impl Stores {
    /// Shares one backend between all three roles.
    pub fn from_backend<S>(backend: Arc<S>) -> Self
    where
        S: SessionStore + UserStore + StoryStore + 'static,
    {
        Stores {
            sessions: backend.clone(),
            users: backend.clone(),
            stories: backend,
        }
    }
}

/// Creates the stores selected by `StoreConfig`.
/// Connection failures are returned to the caller, which treats them as fatal.
pub async fn create_stores(config: &StoreConfig) -> Result<Stores, StoreError> {
    match config.backend {
        StoreBackend::Memory => {
            warn!("Using the in-memory store. Sessions, users and stories are not persisted.");
            Ok(Stores::from_backend(Arc::new(MemoryStore::new())))
        }
        StoreBackend::Mongo => {
            let uri = config.mongo_uri.as_deref().ok_or_else(|| {
                StoreError::Unavailable("mongo store selected but MONGO_URI is not set".into())
            })?;
            match MongoDBStore::new(uri, &config.database).await {
                Ok(store) => {
                    info!("Successfully created MongoDB store.");
                    Ok(Stores::from_backend(Arc::new(store)))
                }
                Err(e) => {
                    error!("Failed to create MongoDB store: {}", e);
                    Err(e)
                }
            }
        }
    }
}
