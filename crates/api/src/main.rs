use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api::adapters::{
    DevTokenVerifier, InMemoryUserDirectory, JoinOrderTeamGenerator, LoggingPersistenceHooks,
    StaticChampionCatalog,
};
use api::{AppState, Config};
use websocket::hub::Hub;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api=debug,websocket=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Starting draft arena server");
    tracing::info!("Server will listen on: {}", config.server_address());

    // Wire the collaborators. The dev adapters are stand-ins for the real
    // identity, champion and matchmaking services.
    let directory = Arc::new(InMemoryUserDirectory::new());
    let hub = Hub::new(
        directory.clone(),
        Arc::new(StaticChampionCatalog::default()),
        Arc::new(JoinOrderTeamGenerator),
        Some(Arc::new(LoggingPersistenceHooks)),
    );
    let state = AppState::new(hub.clone(), Arc::new(DevTokenVerifier::new(directory)));

    // Create router
    let app = api::routes::create_router_with_cors(state, &config.cors_origins);

    // Create TCP listener
    let listener = tokio::net::TcpListener::bind(&config.server_address()).await?;
    tracing::info!("Server listening on {}", config.server_address());

    // Run the server; drain live sessions on ctrl-c.
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            hub.shutdown().await;
        })
        .await?;

    Ok(())
}
