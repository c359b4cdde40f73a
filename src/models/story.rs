use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::user::User;

/// Who can see a story.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoryStatus {
    #[default]
    Public,
    Private,
    Draft,
}

impl StoryStatus {
    pub const ALL: [StoryStatus; 3] = [StoryStatus::Public, StoryStatus::Private, StoryStatus::Draft];

    pub fn as_str(&self) -> &'static str {
        match self {
            StoryStatus::Public => "public",
            StoryStatus::Private => "private",
            StoryStatus::Draft => "draft",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Story {
    pub id: String,
    pub title: String,
    pub body: String,
    pub status: StoryStatus,
    /// Id of the owning user.
    pub user: String,
    pub created_at: DateTime<Utc>,
}

/// Story fields as submitted by the add and edit forms.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct StoryInput {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub status: StoryStatus,
}

impl StoryInput {
    /// Trims the title and rejects empty titles.
    pub fn validate(mut self) -> Result<Self, String> {
        self.title = self.title.trim().to_string();
        if self.title.is_empty() {
            return Err("Title is required".to_string());
        }
        Ok(self)
    }
}

impl Story {
    pub fn from_input(id: String, user: String, input: StoryInput) -> Self {
        Story {
            id,
            title: input.title,
            body: input.body,
            status: input.status,
            user,
            created_at: Utc::now(),
        }
    }

    pub fn is_owned_by(&self, user: &User) -> bool {
        self.user == user.id
    }

    /// Public stories are visible to everyone, the rest only to their owner.
    pub fn is_visible_to(&self, viewer: Option<&User>) -> bool {
        match self.status {
            StoryStatus::Public => true,
            StoryStatus::Private | StoryStatus::Draft => viewer.is_some_and(|u| self.is_owned_by(u)),
        }
    }
}
