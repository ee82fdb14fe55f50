use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};
use std::time::Instant;
use tracing::{error, info};

#[derive(Clone)]
struct ServerState {
    started: Instant,
}

async fn root() -> &'static str {
    "Bot is running ✅"
}

async fn health(State(state): State<ServerState>) -> Json<Value> {
    Json(json!({
        "ok": true,
        "uptime_secs": state.started.elapsed().as_secs(),
        "t": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Serves a tiny health endpoint so the hosting platform can probe the bot.
pub fn spawn(port: u16) {
    let state = ServerState {
        started: Instant::now(),
    };
    let app = Router::new()
        .route("/", get(root))
        .route("/healthz", get(health))
        .with_state(state);

    tokio::spawn(async move {
        let listener = match tokio::net::TcpListener::bind(("0.0.0.0", port)).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("Failed to bind health server on port {}: {}", port, e);
                return;
            }
        };
        info!("Health server listening on port {}", port);
        if let Err(e) = axum::serve(listener, app).await {
            error!("Health server stopped: {}", e);
        }
    });
}
