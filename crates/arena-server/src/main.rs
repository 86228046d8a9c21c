use std::sync::Arc;

use arena_server::arena::locks::TickLocks;
use arena_server::config::Config;
use arena_server::db;
use arena_server::engine::hub::EngineHub;
use arena_server::routes;

use axum::{
    routing::{get, post},
    Extension, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env();

    // Connect to Postgres
    tracing::info!("Connecting to database...");
    let pool = db::pool::create_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Run schema migrations
    tracing::info!("Running migrations...");
    db::pool::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    // Shared engine registry and per-game advisory tick locks.
    // Single-worker deployment assumption: one hub per process; the
    // row-level lock keeps multi-process deployments correct anyway.
    let hub = Arc::new(EngineHub::new(config.stockfish_path.clone()));
    let locks = TickLocks::new();

    // CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        // Health
        .route("/health", get(routes::health::health_check))
        // Games
        .route("/api/games", post(routes::games::create_game))
        .route("/api/games/{game_id}", get(routes::games::get_game))
        .route("/api/games/{game_id}/moves", get(routes::games::list_moves))
        .route(
            "/api/games/{game_id}/control/{action}",
            post(routes::games::control),
        )
        // Tick entry point
        .route("/api/games/{game_id}/tick", post(routes::tick::post_tick))
        // Dashboard projection
        .route("/api/records", get(routes::records::recent_records))
        // Shared state
        .layer(Extension(pool))
        .layer(Extension(config.clone()))
        .layer(Extension(hub.clone()))
        .layer(Extension(locks))
        .layer(cors);

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await
        .expect("Server error");

    // Engine subprocesses must not outlive the server.
    hub.shutdown().await;
}
