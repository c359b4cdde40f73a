use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Which persistence backend holds sessions, users and stories.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Mongo,
    /// Process-local maps; nothing survives a restart.
    Memory,
}

/// Store configuration. `MONGO_URI` is only required for the mongo backend.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default)]
    pub mongo_uri: Option<String>,
    #[serde(default = "default_database")]
    pub database: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            mongo_uri: None,
            database: default_database(),
        }
    }
}

fn default_database() -> String {
    "storybooks".to_string()
}
