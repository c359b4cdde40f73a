use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Session cookie and persistence settings.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct SessionConfig {
    /// HMAC key used to sign the session cookie.
    pub secret: String,
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Lifetime of a stored session after its last save or touch.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    /// Minimum age of the last touch before an unmodified session gets its
    /// expiry refreshed. 0 disables touching altogether.
    #[serde(default = "default_touch_after_secs")]
    pub touch_after_secs: u64,
    #[serde(default)]
    pub secure_cookie: bool,
}

/// Minimum accepted length of `session.secret`, in bytes.
pub const MIN_SECRET_LEN: usize = 16;

fn default_cookie_name() -> String {
    "storybooks.sid".to_string()
}

fn default_ttl_secs() -> u64 {
    14 * 24 * 60 * 60
}

fn default_touch_after_secs() -> u64 {
    24 * 60 * 60
}
