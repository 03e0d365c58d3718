use anyhow::Result;
use atlas::api::{create_router, AppState};
use atlas::config;
use atlas::persist;
use atlas::timeline::MemoryTimeline;
use atlas::world::{gc, WorldServer};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "atlas=info".into()),
        )
        .init();

    info!("atlas starting...");

    // Load configuration
    let config_path = std::env::var("ATLAS_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let atlas_config = config::load_config(&config_path).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load config, using defaults");
        config::AtlasConfig::default()
    });

    // Create the world server
    let timeline = Arc::new(MemoryTimeline::new(atlas_config.timeline.retention));
    let world = Arc::new(WorldServer::with_timeline(timeline));
    info!("world server initialized");

    // Load the world file and start the periodic flush
    if let Some(file) = atlas_config.world.file.clone() {
        persist::load_world_file(&world, &file)?;

        let flush_world = Arc::clone(&world);
        let every = Duration::from_secs(atlas_config.world.flush_interval_seconds);
        tokio::spawn(async move {
            persist::run_flush_loop(flush_world, file, every).await;
        });
        info!("world file persistence started");
    }

    // Start the lifetime garbage collector
    let gc_world = Arc::clone(&world);
    let gc_every = Duration::from_secs(atlas_config.gc.interval_seconds.max(1));
    tokio::spawn(async move {
        gc::run_gc_loop(gc_world, gc_every).await;
    });
    info!("garbage collector started");

    // Initialize the HTTP server
    let port = match std::env::var("PORT") {
        Ok(port) => port.parse::<u16>()?,
        Err(_) => atlas_config.server.port,
    };

    let app = create_router(AppState {
        world: Arc::clone(&world),
    });

    let addr = format!("0.0.0.0:{}", port);
    info!("starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
