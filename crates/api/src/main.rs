use resident_house_api::{build_router, state::AppState};
use resident_house_config::Settings;
use resident_house_db::{connect, indexes::ensure_indexes};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file (silently ignore if missing)
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "resident_house_api=debug,resident_house_services=debug,resident_house_db=debug,tower_http=debug"
                .into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load config
    let settings = Settings::load()?;
    info!("Starting Resident House API on {}:{}", settings.app.host, settings.app.port);
    info!(
        database = %settings.database.name,
        transactions = settings.database.transactions,
        storage_root = %settings.storage.root_dir,
        "Storage config"
    );

    // Connect to MongoDB
    let db = connect(&settings.database).await?;

    // Ensure indexes
    ensure_indexes(&db).await?;

    let app_state = AppState::new(db, settings.clone());

    // Build router
    let app = build_router(app_state);

    // Start server
    let addr = format!("{}:{}", settings.app.host, settings.app.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
