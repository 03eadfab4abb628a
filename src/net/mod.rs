//! Networking module
//!
//! This module handles all network-related functionality for the chat server:
//! - WebSocket handling for browser clients
//! - Connection registry
//! - Session lifecycle

pub mod connection;
pub mod handler;
pub mod session;
