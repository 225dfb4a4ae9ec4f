use std::net::SocketAddr;
use std::sync::Arc;

use sqlx::sqlite::SqlitePoolOptions;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use edusync::api::router;
use edusync::lms::{LmsConfig, LmsHttpClient};
use edusync::state::AppState;
use edusync::sync::{SyncOptions, SyncScheduler, SyncService};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "edusync=debug".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://edusync.db".to_string());

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let config = LmsConfig::new_from_env()?;
    let lms = Arc::new(LmsHttpClient::new(config)?);
    let sync = Arc::new(SyncService::new(
        pool.clone(),
        lms,
        SyncOptions::new_from_env(),
    ));

    if let Ok(interval) = std::env::var("SYNC_INTERVAL_SECS") {
        let interval: u64 = interval.parse()?;
        let scheduler = SyncScheduler::new(sync.clone(), interval);
        tokio::spawn(scheduler.start());
    }

    let state = AppState {
        db: pool.clone(),
        sync,
    };

    let app = router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
