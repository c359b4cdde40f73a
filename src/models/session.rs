use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Payload key holding the id of the logged-in user.
pub const USER_ID_KEY: &str = "user_id";

/// A persisted session: the opaque token, its payload and its expiry.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SessionRecord {
    pub token: String,
    pub data: Map<String, Value>,
    pub expires_at: DateTime<Utc>,
    /// Last time the expiry was pushed forward, by a save or a touch.
    pub touched_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new(token: String, data: Map<String, Value>, expires_at: DateTime<Utc>) -> Self {
        SessionRecord {
            token,
            data,
            expires_at,
            touched_at: Utc::now(),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// The user this session is logged in as, if any.
    pub fn user_id(&self) -> Option<&str> {
        self.data.get(USER_ID_KEY).and_then(Value::as_str)
    }
}
