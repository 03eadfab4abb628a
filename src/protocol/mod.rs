//! Protocol module
//!
//! JSON event envelopes exchanged with browser clients over WebSocket text
//! frames:
//! - `welcome`, `receive-message` and `error` (server to client)
//! - `join-room`, `leave-room` and `message` (client to server)

pub mod events;

pub use events::{ChatMessage, ClientEvent, ErrorNotice, ServerEvent, Welcome};
