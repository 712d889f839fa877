use std::sync::Arc;

use marketplace_chat::{
    create_router,
    db::{create_pool, run_migrations},
    message::{MessageRepository, MessageService},
    AppState, Config,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,marketplace_chat=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    tracing::info!("Connecting to database...");
    let db = create_pool(&config.database_url, config.database_max_connections).await?;

    tracing::info!("Running migrations...");
    run_migrations(&db).await?;

    let message_service = MessageService::new(Arc::new(MessageRepository::new(db.clone())));

    let addr = config.bind_addr();
    let state = AppState::new(config, message_service);
    let app = create_router(state);

    tracing::info!("Server starting on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
