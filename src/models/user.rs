use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A local user record, created on first login through the identity provider.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct User {
    pub id: String,
    /// Stable subject id issued by Google.
    pub google_id: String,
    pub display_name: String,
    pub first_name: String,
    pub last_name: String,
    /// Avatar URL.
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The fields needed to create a `User`; the store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub google_id: String,
    pub display_name: String,
    pub first_name: String,
    pub last_name: String,
    pub image: Option<String>,
}

impl User {
    pub fn from_new(id: String, new_user: NewUser) -> Self {
        User {
            id,
            google_id: new_user.google_id,
            display_name: new_user.display_name,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            image: new_user.image,
            created_at: Utc::now(),
        }
    }
}
