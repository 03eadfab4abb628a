//! Session lifecycle module
//!
//! One `ChatSession` per client connection:
//! - Session state machine (connecting -> connected -> disconnected)
//! - Routing of client events to the room directory and fan-out relay
//! - Rejection of malformed requests without dropping the connection
//! - Guaranteed membership cleanup on disconnect, including abrupt ones

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::error::{ChatError, ProtocolError, Result};
use crate::net::connection::ConnectionId;
use crate::protocol::{ClientEvent, ServerEvent, Welcome};
use crate::state::AppState;

/// Session state in the connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Transport accepted, not registered yet
    Connecting,
    /// Registered and accepting client events
    Connected,
    /// Cleaned up (terminal)
    Disconnected,
}

impl SessionState {
    /// Get a human-readable name for the state
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Connecting => "Connecting",
            SessionState::Connected => "Connected",
            SessionState::Disconnected => "Disconnected",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A single client's chat session
pub struct ChatSession {
    state: Arc<AppState>,
    id: Option<ConnectionId>,
    phase: SessionState,
}

impl ChatSession {
    /// Create a session in the `Connecting` state
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            id: None,
            phase: SessionState::Connecting,
        }
    }

    /// Register the connection, greet the client and move to `Connected`
    pub fn connect(
        &mut self,
        address: SocketAddr,
        outbound_tx: mpsc::UnboundedSender<ServerEvent>,
    ) -> Result<ConnectionId> {
        if self.phase != SessionState::Connecting {
            return Err(self.invalid_state("connect"));
        }

        let id = self.state.connections.register(address, outbound_tx);
        self.id = Some(id);
        self.set_phase(SessionState::Connected);

        let connected_at = self
            .state
            .connections
            .get(id)
            .map(|connection| connection.connected_at)
            .unwrap_or_else(chrono::Utc::now);
        let welcome = ServerEvent::Welcome(Welcome {
            id,
            message: self.state.config.welcome_message.clone(),
            connected_at,
        });
        if !self.state.connections.send(id, welcome) {
            warn!(connection_id = %id, "Welcome could not be queued");
        }

        Ok(id)
    }

    /// Assigned connection identifier (set once connected)
    pub fn id(&self) -> Option<ConnectionId> {
        self.id
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.phase
    }

    /// Check if the session accepts client events
    pub fn is_connected(&self) -> bool {
        self.phase == SessionState::Connected
    }

    /// Handle one text frame from the client.
    ///
    /// Malformed or rejected requests are logged and answered with an
    /// `error` event; only fatal errors are returned.
    pub fn handle_frame(&self, text: &str) -> Result<()> {
        trace!(connection_id = ?self.id, len = text.len(), "Received frame");
        let result = ClientEvent::decode(text)
            .map_err(ChatError::from)
            .and_then(|event| self.handle_event(event));
        self.absorb(result)
    }

    /// Handle a binary frame. The protocol is text-only.
    pub fn handle_binary(&self, len: usize) -> Result<()> {
        let result: Result<()> = Err(ProtocolError::InvalidPayload(format!(
            "binary frames are not supported ({len} bytes)"
        ))
        .into());
        self.absorb(result)
    }

    /// Route a decoded client event
    pub fn handle_event(&self, event: ClientEvent) -> Result<()> {
        let id = match (self.phase, self.id) {
            (SessionState::Connected, Some(id)) => id,
            _ => return Err(self.invalid_state(event.name())),
        };

        if event.room().is_empty() && !self.state.config.allow_empty_room_names {
            return Err(ProtocolError::InvalidRoom(String::new()).into());
        }

        match event {
            ClientEvent::JoinRoom(room) => {
                if self.state.rooms.join(&room, id) {
                    info!(connection_id = %id, room = %room, "User joined room");
                }
            }
            ClientEvent::LeaveRoom(room) => {
                if let Err(e) = self.state.rooms.try_leave(&room, id) {
                    debug!(connection_id = %id, error = %e, "Leave ignored");
                } else {
                    info!(connection_id = %id, room = %room, "User left room");
                }
            }
            ClientEvent::Message(msg) => {
                debug!(
                    connection_id = %id,
                    room = %msg.room,
                    len = msg.message.len(),
                    "Message received"
                );
                self.state.relay.relay(&msg.room, &msg.message, id);
            }
        }
        Ok(())
    }

    /// Leave every room, unregister and move to `Disconnected`.
    ///
    /// Returns `false` if the session was already disconnected.
    pub fn disconnect(&mut self) -> bool {
        if self.phase == SessionState::Disconnected {
            return false;
        }

        if let Some(id) = self.id {
            let rooms_left = self.state.rooms.leave_all(id);
            self.state.connections.unregister(id);
            info!(connection_id = %id, rooms_left = rooms_left, "User disconnected");
        }
        self.set_phase(SessionState::Disconnected);
        true
    }

    /// Log and report a non-fatal error to the client, pass fatal ones through
    fn absorb(&self, result: Result<()>) -> Result<()> {
        match result {
            Err(e) if !e.is_fatal() => {
                warn!(connection_id = ?self.id, error = %e, "Rejected client request");
                if let Some(id) = self.id {
                    self.state.connections.send(id, ServerEvent::error(e.to_string()));
                }
                Ok(())
            }
            other => other,
        }
    }

    fn invalid_state(&self, event: &str) -> ChatError {
        ProtocolError::InvalidState {
            event: event.to_string(),
            state: self.phase.to_string(),
        }
        .into()
    }

    fn set_phase(&mut self, new_phase: SessionState) {
        let old_phase = std::mem::replace(&mut self.phase, new_phase);
        debug!(
            connection_id = ?self.id,
            old_state = %old_phase,
            new_state = %new_phase,
            "Session state changed"
        );
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        if self.disconnect() {
            trace!(connection_id = ?self.id, "Session cleaned up on drop");
        }
    }
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("id", &self.id)
            .field("state", &self.phase)
            .finish()
    }
}
