//! Chatroom Server Library
//!
//! This library provides the core functionality for a room-scoped real-time
//! chat relay: clients connect over WebSocket, join named rooms and have
//! their messages fanned out to every member of the room.
//!
//! ## Modules
//!
//! - `api` - HTTP liveness and health routes
//! - `config` - Server configuration management
//! - `error` - Error types and result definitions
//! - `net` - WebSocket handling, connection registry and session lifecycle
//! - `protocol` - JSON wire events
//! - `room` - Room directory and fan-out relay
//! - `state` - Shared application state

pub mod api;
pub mod config;
pub mod error;
pub mod net;
pub mod protocol;
pub mod room;
pub mod state;

// Re-export commonly used types
pub use config::ServerConfig;
pub use error::{ChatError, Result};
pub use net::connection::{ConnectionId, ConnectionRegistry};
pub use net::session::{ChatSession, SessionState};
pub use room::{FanoutRelay, RelayReport, RoomDirectory};
pub use state::AppState;

/// Server version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
