//! Wire events
//!
//! Every WebSocket text frame carries one JSON envelope of the form
//! `{"event": "<name>", "data": <payload>}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ChatError, ProtocolError, Result};
use crate::net::connection::ConnectionId;

/// Payload of a `message` event: a text for a target room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Text payload
    pub message: String,
    /// Target room name
    pub room: String,
}

impl ChatMessage {
    /// Create a new chat message
    pub fn new(room: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            room: room.into(),
        }
    }
}

/// Events sent by clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Join the named room
    JoinRoom(String),
    /// Leave the named room
    LeaveRoom(String),
    /// Relay a message to a room
    Message(ChatMessage),
}

impl ClientEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::JoinRoom(_) => "join-room",
            ClientEvent::LeaveRoom(_) => "leave-room",
            ClientEvent::Message(_) => "message",
        }
    }

    /// Room the event targets
    pub fn room(&self) -> &str {
        match self {
            ClientEvent::JoinRoom(room) | ClientEvent::LeaveRoom(room) => room,
            ClientEvent::Message(msg) => &msg.room,
        }
    }

    /// Decode a client event from a text frame
    pub fn decode(text: &str) -> std::result::Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(|e| ProtocolError::InvalidPayload(e.to_string()))
    }

    /// Encode the event as a text frame
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ChatError::Internal(e.to_string()))
    }
}

/// Greeting sent once, right after a connection is registered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Welcome {
    /// Identifier assigned to the connection
    pub id: ConnectionId,
    /// Informational greeting
    pub message: String,
    /// When the connection was registered
    pub connected_at: DateTime<Utc>,
}

/// Error notice sent to the client whose request was rejected
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorNotice {
    pub message: String,
}

/// Events sent by the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// One-shot greeting on connect
    Welcome(Welcome),
    /// A relayed room message
    ReceiveMessage(String),
    /// A request from this client was rejected
    Error(ErrorNotice),
}

impl ServerEvent {
    /// Build an error notice
    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error(ErrorNotice {
            message: message.into(),
        })
    }

    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Welcome(_) => "welcome",
            ServerEvent::ReceiveMessage(_) => "receive-message",
            ServerEvent::Error(_) => "error",
        }
    }

    /// Encode the event as a text frame
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ChatError::Internal(e.to_string()))
    }

    /// Decode a server event from a text frame
    pub fn decode(text: &str) -> std::result::Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(|e| ProtocolError::InvalidPayload(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_decode_join_room() {
        let event = ClientEvent::decode(r#"{"event":"join-room","data":"lobby"}"#).unwrap();
        assert_eq!(event, ClientEvent::JoinRoom("lobby".to_string()));
        assert_eq!(event.name(), "join-room");
        assert_eq!(event.room(), "lobby");
    }

    #[test]
    fn test_decode_message() {
        let event =
            ClientEvent::decode(r#"{"event":"message","data":{"message":"hi","room":"lobby"}}"#)
                .unwrap();
        assert_eq!(event, ClientEvent::Message(ChatMessage::new("lobby", "hi")));
        assert_eq!(event.room(), "lobby");
    }

    #[test]
    fn test_decode_empty_room_name() {
        let event = ClientEvent::decode(r#"{"event":"join-room","data":""}"#).unwrap();
        assert_eq!(event.room(), "");
    }

    #[test]
    fn test_decode_rejects_malformed_frames() {
        let cases = [
            "not json",
            r#"{"event":"join-room"}"#,
            r#"{"event":"join-room","data":42}"#,
            r#"{"event":"message","data":{"message":"hi"}}"#,
            r#"{"event":"message","data":"hi"}"#,
            r#"{"event":"shout","data":"hi"}"#,
            r#"["join-room","lobby"]"#,
        ];
        for case in cases {
            let err = ClientEvent::decode(case).unwrap_err();
            assert!(
                matches!(err, ProtocolError::InvalidPayload(_)),
                "expected InvalidPayload for {case}"
            );
        }
    }

    #[test]
    fn test_encode_receive_message() {
        let json = ServerEvent::ReceiveMessage("hi".into()).encode().unwrap();
        assert_eq!(json, r#"{"event":"receive-message","data":"hi"}"#);
    }

    #[test]
    fn test_encode_error_notice() {
        let json = ServerEvent::error("bad frame").encode().unwrap();
        assert_eq!(json, r#"{"event":"error","data":{"message":"bad frame"}}"#);
    }

    #[test]
    fn test_welcome_shape() {
        let welcome = ServerEvent::Welcome(Welcome {
            id: ConnectionId::new(),
            message: "Welcome".into(),
            connected_at: Utc::now(),
        });
        let value: serde_json::Value = serde_json::from_str(&welcome.encode().unwrap()).unwrap();
        assert_eq!(value["event"], "welcome");
        assert!(value["data"]["id"].is_string());
        assert_eq!(value["data"]["message"], "Welcome");
        assert!(value["data"]["connected_at"].is_string());
    }
}
