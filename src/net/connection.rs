//! Connection registry module
//!
//! Tracks every live client connection:
//! - Unique identifier assignment
//! - Per-connection outbound queue (drained by the connection's writer task)
//! - Per-connection room membership set
//! - Thread-safe registry keyed by identifier

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, trace};
use uuid::Uuid;

use crate::error::{NetworkError, Result};
use crate::protocol::ServerEvent;

/// Opaque connection identifier, stable for the lifetime of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generate a fresh random identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A live client connection
pub struct Connection {
    /// Unique connection identifier
    pub id: ConnectionId,
    /// Remote address of the client
    pub address: SocketAddr,
    /// Wall-clock time of registration
    pub connected_at: DateTime<Utc>,
    /// Monotonic time of registration
    created_at: Instant,
    /// Names of the rooms this connection has joined
    rooms: Mutex<HashSet<String>>,
    /// Outbound event queue, drained by the writer task
    outbound_tx: mpsc::UnboundedSender<ServerEvent>,
    /// Events dropped because the writer had already gone away
    dropped_events: AtomicU64,
}

impl Connection {
    fn new(
        id: ConnectionId,
        address: SocketAddr,
        outbound_tx: mpsc::UnboundedSender<ServerEvent>,
    ) -> Self {
        Self {
            id,
            address,
            connected_at: Utc::now(),
            created_at: Instant::now(),
            rooms: Mutex::new(HashSet::new()),
            outbound_tx,
            dropped_events: AtomicU64::new(0),
        }
    }

    /// Queue an event without waiting.
    ///
    /// The queue buffers until the writer drains it. A closed queue drops the
    /// event and bumps the dropped counter.
    pub fn try_send(&self, event: ServerEvent) -> Result<()> {
        self.outbound_tx.send(event).map_err(|_| {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
            NetworkError::ConnectionClosed.into()
        })
    }

    /// Total events dropped for this connection
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Snapshot of the rooms this connection has joined
    pub fn rooms(&self) -> HashSet<String> {
        self.rooms.lock().clone()
    }

    /// Whether the connection has joined the given room
    pub fn in_room(&self, room: &str) -> bool {
        self.rooms.lock().contains(room)
    }

    /// Lock the membership set.
    ///
    /// Only the room directory mutates membership, and always while holding
    /// its own lock first.
    pub(crate) fn rooms_mut(&self) -> parking_lot::MutexGuard<'_, HashSet<String>> {
        self.rooms.lock()
    }

    /// Connection age
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("address", &self.address)
            .field("connected_at", &self.connected_at)
            .field("rooms", &self.rooms())
            .field("dropped_events", &self.dropped_events())
            .finish()
    }
}

/// Thread-safe registry of live connections
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, Arc<Connection>>,
}

impl ConnectionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Register a new connection and return its fresh identifier
    pub fn register(
        &self,
        address: SocketAddr,
        outbound_tx: mpsc::UnboundedSender<ServerEvent>,
    ) -> ConnectionId {
        // v4 collisions are not a practical concern, but never hand out a live id twice
        let id = loop {
            let candidate = ConnectionId::new();
            if !self.connections.contains_key(&candidate) {
                break candidate;
            }
        };

        let connection = Arc::new(Connection::new(id, address, outbound_tx));
        self.connections.insert(id, connection);

        info!(connection_id = %id, address = %address, "Connection registered");
        id
    }

    /// Remove a connection. Returns `false` if it was already gone.
    pub fn unregister(&self, id: ConnectionId) -> bool {
        match self.connections.remove(&id) {
            Some((_, connection)) => {
                info!(
                    connection_id = %id,
                    age = ?connection.age(),
                    dropped_events = connection.dropped_events(),
                    "Connection unregistered"
                );
                true
            }
            None => {
                trace!(connection_id = %id, "Unregister of unknown connection ignored");
                false
            }
        }
    }

    /// Get a connection by ID
    pub fn get(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        self.connections.get(&id).map(|r| r.clone())
    }

    /// Whether a connection is registered
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    /// Deliver an event to a connection, reporting why it could not be delivered
    pub fn try_send(&self, id: ConnectionId, event: ServerEvent) -> Result<()> {
        let connection = self
            .get(id)
            .ok_or(NetworkError::StaleConnection(id))?;
        connection.try_send(event)
    }

    /// Deliver an event to a connection.
    ///
    /// Unregistered or closing connections are silent no-ops; the return
    /// value only says whether the event was queued.
    pub fn send(&self, id: ConnectionId, event: ServerEvent) -> bool {
        match self.try_send(id, event) {
            Ok(()) => true,
            Err(e) => {
                debug!(connection_id = %id, error = %e, "Event not delivered");
                false
            }
        }
    }

    /// Number of live connections
    pub fn count(&self) -> usize {
        self.connections.len()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
