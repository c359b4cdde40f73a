//! Application startup and server initialization.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use crate::config::ConfigV1;
use crate::providers::GoogleStrategy;
use crate::routes;
use crate::state::AppState;
use crate::store::create_stores;

/// Connects the stores, builds the router and serves until the process stops.
///
/// # Errors
///
/// Returns an error if the store cannot be reached, the shared state cannot
/// be built, or the listener fails to bind.
pub async fn run(config: Arc<ConfigV1>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let stores = create_stores(&config.store).await?;
    let strategy = Box::new(GoogleStrategy::new(&config.google));
    let state = AppState::new(config.clone(), stores, strategy)?;

    let app = routes::create_router(state);

    let address = config.bind_address();
    let listener = TcpListener::bind(&address).await?;
    info!(
        event_name = "server.started",
        event_domain = "server",
        "Server is running in {} mode on port {}",
        config.node_env,
        config.port
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
