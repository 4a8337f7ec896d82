use std::sync::Arc;
use taskdesk_server::config::{Config, SEED_STATUSES};
use taskdesk_server::{map_routes, AppState, Store};
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── Open the store ─────────────────────────────────────────
    let store = Store::open(&config.db_path).expect("Failed to open store");

    // Seed the default statuses (idempotent get-or-create)
    for name in SEED_STATUSES {
        store.get_or_create_status(name).expect("Failed to seed statuses");
    }

    tracing::info!(
        tasks = store.list_tasks().map(|t| t.len()).unwrap_or(0),
        subtasks = store.list_subtasks().map(|s| s.len()).unwrap_or(0),
        statuses = store.list_statuses().map(|s| s.len()).unwrap_or(0),
        db = %config.db_path,
        "store opened"
    );

    // ── Shared state + router ──────────────────────────────────
    let state = Arc::new(AppState { store });

    let app = map_routes(state).layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    );

    // ── Start ──────────────────────────────────────────────────
    tracing::info!(addr = %config.bind_addr, "server running");

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind");
    axum::serve(listener, app).await.expect("Server error");
}
