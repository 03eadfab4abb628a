//! Application state module
//!
//! Contains the shared state used across all chat sessions.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;

use crate::config::ServerConfig;
use crate::net::connection::ConnectionRegistry;
use crate::room::{FanoutRelay, RoomDirectory};

/// Application state shared across all connections
pub struct AppState {
    /// Server configuration
    pub config: ServerConfig,
    /// Registry of live connections
    pub connections: Arc<ConnectionRegistry>,
    /// Room name to member set
    pub rooms: Arc<RoomDirectory>,
    /// Room fan-out
    pub relay: FanoutRelay,
    /// Shutdown signal sender
    pub shutdown_tx: broadcast::Sender<()>,
}

impl AppState {
    /// Create a new application state
    pub fn new(config: ServerConfig, shutdown_tx: broadcast::Sender<()>) -> Self {
        let connections = Arc::new(ConnectionRegistry::new());
        let rooms = Arc::new(RoomDirectory::new(connections.clone()));
        let relay = FanoutRelay::new(rooms.clone(), connections.clone(), config.include_sender);

        info!(
            include_sender = config.include_sender,
            allow_empty_room_names = config.allow_empty_room_names,
            handshake_timeout = config.handshake_timeout,
            "Chat state initialized"
        );

        Self {
            config,
            connections,
            rooms,
            relay,
            shutdown_tx,
        }
    }

    /// Create a state with its own shutdown channel
    pub fn with_config(config: ServerConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self::new(config, shutdown_tx)
    }

    /// Signal every acceptor and session to stop
    pub fn shutdown(&self) {
        // No receivers simply means nothing is running yet
        let _ = self.shutdown_tx.send(());
    }
}
