//! Error types shared across the stores, the identity layer and startup.

use thiserror::Error;

/// Errors raised by the session, user and story stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing database could not be reached or rejected the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A stored document could not be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    /// An id did not have the expected shape (e.g. not an ObjectId).
    #[error("invalid id: {0}")]
    InvalidId(String),
}

impl From<mongodb::error::Error> for StoreError {
    fn from(e: mongodb::error::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Corrupt(e.to_string())
    }
}

/// Errors raised while logging a user in through an identity provider.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The provider rejected the authorization code or could not be reached.
    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    /// The provider issued a token but the profile lookup failed.
    #[error("profile lookup failed: {0}")]
    Profile(String),

    /// The callback carried no code, or the provider reported an error.
    #[error("missing credential: {0}")]
    MissingCredential(String),

    /// The `state` parameter did not match the one stored in the session.
    #[error("oauth state mismatch")]
    StateMismatch,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors raised while assembling the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
