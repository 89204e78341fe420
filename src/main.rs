//! tagpress - A lightweight blogging backend with tag-aware post search

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tagpress::{
    api::{self, AppState},
    cache::create_cache,
    config::Config,
    db::{
        self,
        repositories::{SqlxCommentRepository, SqlxPostRepository, SqlxSearchRepository},
    },
    services::{CommentService, ImageStorage, PostService},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tagpress=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting tagpress...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    let applied = db::migrations::run_migrations(&pool).await?;
    tracing::info!(applied, "Database migrations completed");

    // Initialize cache and image storage
    let cache = create_cache(&config.cache);
    let storage = Arc::new(ImageStorage::from_config(&config.storage));
    tracing::info!(path = %config.storage.path.display(), "Image storage ready");

    // Create repositories
    let post_repo = SqlxPostRepository::boxed(pool.clone());
    let search_repo = SqlxSearchRepository::boxed(pool.clone());
    let comment_repo = SqlxCommentRepository::boxed(pool.clone());

    // Initialize services
    let post_service = Arc::new(PostService::new(
        post_repo.clone(),
        search_repo,
        cache.clone(),
        storage,
    ));
    let comment_service = Arc::new(CommentService::new(comment_repo, post_repo, cache));

    let state = AppState {
        post_service,
        comment_service,
        max_image_size: config.storage.max_file_size,
    };

    // Build router
    let app = api::build_router(state, &config.server.cors_origin);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
