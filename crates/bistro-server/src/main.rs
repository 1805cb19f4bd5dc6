//! bistro-server - Bistro backend server
//!
//! Hosts the realtime floor feeds over the bistro-core engines. The
//! HTTP/WebSocket surface consumes this process's state; the feeds
//! themselves run here as periodic background tasks.

use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod services;
mod state;

use services::FeedKind;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("bistro_server=info".parse()?))
        .init();

    info!("bistro-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = config::Config::load()?;
    info!("Data directory: {:?}", config.data_dir);

    // Open database and ensure schema
    let db = bistro_core::Database::open_path(&config.database_path)?;
    db.init_schema()?;

    let state = state::AppState::new(config, db);

    // Start the default restaurant scope's feeds
    state
        .realtime
        .start_feed("default", FeedKind::Floor, state.config.floor_interval)
        .await;
    state
        .realtime
        .start_feed("default", FeedKind::HeatMap, state.config.heat_map_interval)
        .await;

    info!("Server ready");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");
    state.realtime.stop_all().await;

    Ok(())
}
