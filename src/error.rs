//! Error handling module
//!
//! Defines custom error types for the chat relay server.

use std::io;

use thiserror::Error;

use crate::net::connection::ConnectionId;

/// Main error type for the chat relay server
#[derive(Error, Debug)]
pub enum ChatError {
    /// Network-related errors
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// Protocol-related errors
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Room membership errors
    #[error("Room error: {0}")]
    Room(#[from] RoomError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ChatError {
    /// Whether this error ends the session it occurred in.
    ///
    /// Protocol and room errors stay local to the offending request; the
    /// connection keeps running.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ChatError::Protocol(_) | ChatError::Room(_))
    }
}

/// Network-specific errors
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Connection closed")]
    ConnectionClosed,

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("WebSocket handshake timed out")]
    HandshakeTimeout,

    #[error("Stale connection: {0}")]
    StaleConnection(ConnectionId),
}

/// Protocol-specific errors
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Invalid room name: {0:?}")]
    InvalidRoom(String),

    #[error("Event {event} not accepted in state {state}")]
    InvalidState { event: String, state: String },
}

/// Room membership errors
#[derive(Error, Debug)]
pub enum RoomError {
    #[error("Unknown room: {0:?}")]
    UnknownRoom(String),

    #[error("Connection {id} is not a member of {room:?}")]
    NotMember { room: String, id: ConnectionId },
}

/// Result type alias for chat server operations
pub type Result<T> = std::result::Result<T, ChatError>;
