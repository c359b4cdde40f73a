//! Shared application state.
//!
//! Everything here is built once at startup and shared read-only (or behind
//! the stores' own synchronization) by all request handlers.

use std::sync::Arc;

use crate::auth::Auth;
use crate::config::ConfigV1;
use crate::providers::Strategy;
use crate::session::SessionManager;
use crate::store::Stores;
use crate::view::Templates;

/// Application state shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration loaded at startup.
    pub config: Arc<ConfigV1>,
    /// Session, user and story persistence.
    pub stores: Stores,
    /// Login through the identity strategy, and user lookup.
    pub auth: Arc<Auth>,
    /// Cookie signing and session persistence.
    pub sessions: Arc<SessionManager>,
    pub templates: Arc<Templates>,
}

impl AppState {
    /// Wires the shared services together. Fails on an unusable session
    /// secret or a template that does not compile.
    pub fn new(
        config: Arc<ConfigV1>,
        stores: Stores,
        strategy: Box<dyn Strategy>,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let sessions = Arc::new(SessionManager::new(stores.sessions.clone(), &config.session)?);
        let auth = Arc::new(Auth::new(strategy, stores.users.clone()));
        let templates = Arc::new(Templates::new()?);
        Ok(AppState {
            config,
            stores,
            auth,
            sessions,
            templates,
        })
    }
}
