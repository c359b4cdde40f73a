use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use tokio::sync::RwLock;

use super::{SessionStore, StoryStore, UserStore};
use crate::error::StoreError;
use crate::models::{NewUser, SessionRecord, Story, StoryInput, StoryStatus, User};

/// A process-local store, used for development and by the test suite.
/// Counts session writes so callers can check that nothing was persisted.
#[derive(Default)]
pub struct MemoryStore {
    sessions: RwLock<HashMap<String, SessionRecord>>,
    users: RwLock<HashMap<String, User>>,
    stories: RwLock<Vec<Story>>,
    session_writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `save` and `touch` calls that reached the store.
    pub fn session_writes(&self) -> usize {
        self.session_writes.load(Ordering::SeqCst)
    }

    /// Number of stored session records, expired ones included.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn user_count(&self) -> usize {
        self.users.read().await.len()
    }

    fn newest_first(mut stories: Vec<Story>) -> Vec<Story> {
        stories.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        stories
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load(&self, token: &str) -> Result<Option<SessionRecord>, StoreError> {
        let now = Utc::now();
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(token)
            .filter(|record| !record.is_expired(now))
            .cloned())
    }

    async fn save(&self, record: &SessionRecord) -> Result<(), StoreError> {
        self.session_writes.fetch_add(1, Ordering::SeqCst);
        self.sessions
            .write()
            .await
            .insert(record.token.clone(), record.clone());
        Ok(())
    }

    async fn touch(&self, token: &str, expires_at: DateTime<Utc>) -> Result<(), StoreError> {
        self.session_writes.fetch_add(1, Ordering::SeqCst);
        if let Some(record) = self.sessions.write().await.get_mut(token) {
            record.expires_at = expires_at;
            record.touched_at = Utc::now();
        }
        Ok(())
    }

    async fn destroy(&self, token: &str) -> Result<(), StoreError> {
        self.sessions.write().await.remove(token);
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(id).cloned())
    }

    async fn find_by_google_id(&self, google_id: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.google_id == google_id)
            .cloned())
    }

    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        // Same guarantee as the unique index on the mongo side.
        if let Some(existing) = users.values().find(|u| u.google_id == new_user.google_id) {
            return Ok(existing.clone());
        }
        let user = User::from_new(ObjectId::new().to_hex(), new_user);
        users.insert(user.id.clone(), user.clone());
        Ok(user)
    }
}

#[async_trait]
impl StoryStore for MemoryStore {
    async fn create_story(&self, user_id: &str, input: StoryInput) -> Result<Story, StoreError> {
        let story = Story::from_input(ObjectId::new().to_hex(), user_id.to_string(), input);
        self.stories.write().await.push(story.clone());
        Ok(story)
    }

    async fn find_story(&self, id: &str) -> Result<Option<Story>, StoreError> {
        Ok(self.stories.read().await.iter().find(|s| s.id == id).cloned())
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Story>, StoreError> {
        let stories = self.stories.read().await;
        Ok(Self::newest_first(
            stories.iter().filter(|s| s.user == user_id).cloned().collect(),
        ))
    }

    async fn list_public(&self, user_id: Option<&str>) -> Result<Vec<Story>, StoreError> {
        let stories = self.stories.read().await;
        Ok(Self::newest_first(
            stories
                .iter()
                .filter(|s| s.status == StoryStatus::Public)
                .filter(|s| user_id.map_or(true, |id| s.user == id))
                .cloned()
                .collect(),
        ))
    }

    async fn update_story(&self, id: &str, input: StoryInput) -> Result<Option<Story>, StoreError> {
        let mut stories = self.stories.write().await;
        Ok(stories.iter_mut().find(|s| s.id == id).map(|story| {
            story.title = input.title;
            story.body = input.body;
            story.status = input.status;
            story.clone()
        }))
    }

    async fn delete_story(&self, id: &str) -> Result<bool, StoreError> {
        let mut stories = self.stories.write().await;
        let before = stories.len();
        stories.retain(|s| s.id != id);
        Ok(stories.len() != before)
    }
}
