use std::fmt;
use std::path::Path;

use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

use super::logging::LoggingConfig;
use super::session::{SessionConfig, MIN_SECRET_LEN};
use super::store::{StoreBackend, StoreConfig};
use crate::error::ConfigError;
use crate::providers::GoogleProviderConfig;

/// Dotenv file read before the process environment, if present.
pub const DEFAULT_ENV_FILE: &str = "./config/config.env";
/// Optional YAML file with the same keys, lowest precedence after defaults.
pub const DEFAULT_CONFIG_FILE: &str = "./config.yaml";

/// Environment keys read without a prefix, and where they land in `ConfigV1`.
const ENV_ALIASES: &[(&str, &str)] = &[
    ("node_env", "node_env"),
    ("host", "host"),
    ("port", "port"),
    ("mongo_uri", "store.mongo_uri"),
    ("mongo_database", "store.database"),
    ("store", "store.backend"),
    ("session_secret", "session.secret"),
    ("google_client_id", "google.client_id"),
    ("google_client_secret", "google.client_secret"),
    ("google_callback_url", "google.callback_url"),
];

/// Run mode. `development` turns on per-request HTTP logging.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Development,
    #[default]
    Production,
    Test,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunMode::Development => "development",
            RunMode::Production => "production",
            RunMode::Test => "test",
        };
        f.write_str(name)
    }
}

/// Process-wide settings, built once at startup and shared read-only.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct ConfigV1 {
    #[serde(default)]
    pub node_env: RunMode,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub store: StoreConfig,
    pub session: SessionConfig,
    pub google: GoogleProviderConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_static_dir() -> String {
    "public".to_string()
}

impl ConfigV1 {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Extracts and validates a config from an already assembled figment.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: ConfigV1 = figment.extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.session.secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::Invalid(format!(
                "session.secret must be at least {} bytes",
                MIN_SECRET_LEN
            )));
        }
        if self.store.backend == StoreBackend::Mongo
            && self.store.mongo_uri.as_deref().map_or(true, str::is_empty)
        {
            return Err(ConfigError::Invalid(
                "MONGO_URI is required when the mongo store is selected".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builds the layered figment: YAML file, then unprefixed well-known keys,
/// then `STORYBOOKS_`-prefixed keys with `__` as the nesting separator.
pub fn figment(config_file: impl AsRef<Path>) -> Figment {
    let known: Vec<&str> = ENV_ALIASES.iter().map(|(key, _)| *key).collect();

    Figment::new()
        .merge(Yaml::file(config_file.as_ref()))
        .merge(Env::raw().only(&known).map(|key| {
            let mapped = ENV_ALIASES
                .iter()
                .find(|(env_key, _)| key.as_str().eq_ignore_ascii_case(env_key))
                .map_or_else(|| key.as_str().to_string(), |(_, path)| path.to_string());
            mapped.into()
        }))
        .merge(Env::prefixed("STORYBOOKS_").split("__"))
}

/// Loads the dotenv file (if any) into the environment, then the config.
pub fn load_config() -> Result<ConfigV1, ConfigError> {
    if Path::new(DEFAULT_ENV_FILE).exists() {
        dotenvy::from_path(DEFAULT_ENV_FILE)
            .map_err(|e| ConfigError::Invalid(format!("{}: {}", DEFAULT_ENV_FILE, e)))?;
    }
    ConfigV1::from_figment(figment(DEFAULT_CONFIG_FILE))
}

/// Print the JSON schema for the configuration to stdout.
pub fn print_schema() {
    let schema = schema_for!(ConfigV1);
    match serde_json::to_string_pretty(&schema) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize schema: {}", e),
    }
}
