//! Chatroom Server
//!
//! Room-scoped chat relay with a WebSocket listener for browser clients and
//! an HTTP listener for liveness checks.

use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use chatroom_server::api;
use chatroom_server::config::ServerConfig;
use chatroom_server::net::handler::accept_websocket_connections;
use chatroom_server::state::AppState;
use chatroom_server::VERSION;

#[tokio::main]
async fn main() -> Result<()> {
    // Pick up a local .env before reading any CHATROOM_* overrides
    dotenv::dotenv().ok();

    // Load configuration
    let config = ServerConfig::load().await?;

    // Initialize logging
    init_logging(config.debug);

    info!("Chatroom Server v{} ({})", VERSION, config.server_name);
    if config.config_path.exists() {
        info!(
            "Configuration loaded from: {}",
            config.config_path.display()
        );
    } else {
        warn!(
            "Config file not found at {}, using defaults",
            config.config_path.display()
        );
    }

    // Create shutdown channel
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let state = Arc::new(AppState::new(config.clone(), shutdown_tx.clone()));
    info!("Application state initialized");

    // Start WebSocket listener for chat clients
    let ws_addr = config.websocket_addr();
    let ws_listener = TcpListener::bind(ws_addr).await?;
    info!("WebSocket server listening on: {}", ws_addr);

    // Start HTTP listener
    let http_addr = config.http_addr();
    let http_listener = TcpListener::bind(http_addr).await?;
    info!("HTTP server listening on: {}", http_addr);

    // Spawn WebSocket connection acceptor
    let ws_state = state.clone();
    let mut ws_shutdown_rx = shutdown_tx.subscribe();
    let ws_handle = tokio::spawn(async move {
        accept_websocket_connections(ws_listener, ws_state, &mut ws_shutdown_rx).await;
    });

    // Spawn HTTP server
    let http_state = state.clone();
    let http_shutdown_rx = shutdown_tx.subscribe();
    let http_handle = tokio::spawn(async move {
        run_http_server(http_listener, http_state, http_shutdown_rx).await;
    });

    info!("Server startup complete!");

    // Wait for shutdown signal
    wait_for_shutdown(shutdown_tx.clone()).await;

    info!("Shutting down server...");

    // Wait for acceptors to finish
    let _ = ws_handle.await;
    let _ = http_handle.await;

    info!(
        connections = state.connections.count(),
        rooms = state.rooms.room_count(),
        "Server shutdown complete. Goodbye!"
    );
    Ok(())
}

/// Initialize the logging/tracing system
fn init_logging(debug: bool) {
    let default_filter = if debug {
        "debug"
    } else {
        "info,chatroom_server=debug"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_level(true)
        .init();
}

/// Run the HTTP server
async fn run_http_server(
    listener: TcpListener,
    state: Arc<AppState>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let router = api::create_router(state);

    let shutdown_signal = async move {
        let _ = shutdown_rx.recv().await;
        info!("HTTP server shutting down");
    };

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .unwrap_or_else(|e| error!("HTTP server error: {}", e));
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn wait_for_shutdown(shutdown_tx: broadcast::Sender<()>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    // Signal all tasks to shut down
    let _ = shutdown_tx.send(());
}
