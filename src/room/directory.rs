//! Room directory
//!
//! Maps room names to the set of connections joined to them. Rooms exist
//! only while they have members: an entry is created by the first join and
//! removed by the last leave, inside the same critical section.
//!
//! Lock order is always the directory lock first, then the joining
//! connection's own membership set.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::error::{Result, RoomError};
use crate::net::connection::{ConnectionId, ConnectionRegistry};

/// Directory of live rooms
pub struct RoomDirectory {
    rooms: RwLock<HashMap<String, HashSet<ConnectionId>>>,
    connections: Arc<ConnectionRegistry>,
}

impl RoomDirectory {
    /// Create an empty directory backed by the given registry
    pub fn new(connections: Arc<ConnectionRegistry>) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            connections,
        }
    }

    /// Add a connection to a room, creating the room if needed.
    ///
    /// Returns `true` if the connection was not already a member. Unregistered
    /// connections are ignored.
    pub fn join(&self, room: &str, id: ConnectionId) -> bool {
        let Some(connection) = self.connections.get(id) else {
            debug!(connection_id = %id, room = %room, "Join from unregistered connection ignored");
            return false;
        };

        let mut rooms = self.rooms.write();
        let added = rooms.entry(room.to_string()).or_default().insert(id);
        if added {
            connection.rooms_mut().insert(room.to_string());
            debug!(
                connection_id = %id,
                room = %room,
                members = rooms.get(room).map_or(0, HashSet::len),
                "Joined room"
            );
        } else {
            trace!(connection_id = %id, room = %room, "Already in room");
        }
        added
    }

    /// Remove a connection from a room, reporting why nothing was removed
    pub fn try_leave(&self, room: &str, id: ConnectionId) -> Result<()> {
        let mut rooms = self.rooms.write();
        let members = rooms
            .get_mut(room)
            .ok_or_else(|| RoomError::UnknownRoom(room.to_string()))?;

        if !members.remove(&id) {
            return Err(RoomError::NotMember {
                room: room.to_string(),
                id,
            }
            .into());
        }
        if members.is_empty() {
            rooms.remove(room);
            debug!(room = %room, "Room emptied and removed");
        }
        if let Some(connection) = self.connections.get(id) {
            connection.rooms_mut().remove(room);
        }

        debug!(connection_id = %id, room = %room, "Left room");
        Ok(())
    }

    /// Remove a connection from a room.
    ///
    /// Leaving an unknown room, or a room the connection is not in, is a
    /// no-op returning `false`.
    pub fn leave(&self, room: &str, id: ConnectionId) -> bool {
        match self.try_leave(room, id) {
            Ok(()) => true,
            Err(e) => {
                trace!(connection_id = %id, error = %e, "Leave ignored");
                false
            }
        }
    }

    /// Remove a connection from every room it has joined.
    ///
    /// Driven by the connection's own membership set. Returns the number of
    /// rooms left.
    pub fn leave_all(&self, id: ConnectionId) -> usize {
        let Some(connection) = self.connections.get(id) else {
            trace!(connection_id = %id, "Leave-all for unregistered connection ignored");
            return 0;
        };

        let mut rooms = self.rooms.write();
        let joined: Vec<String> = connection.rooms_mut().drain().collect();
        for room in &joined {
            if let Some(members) = rooms.get_mut(room) {
                members.remove(&id);
                if members.is_empty() {
                    rooms.remove(room);
                    debug!(room = %room, "Room emptied and removed");
                }
            }
        }

        if !joined.is_empty() {
            debug!(connection_id = %id, rooms = joined.len(), "Left all rooms");
        }
        joined.len()
    }

    /// Snapshot of the members of a room. Unknown rooms have no members.
    pub fn members_of(&self, room: &str) -> HashSet<ConnectionId> {
        self.rooms.read().get(room).cloned().unwrap_or_default()
    }

    /// Rooms a connection has joined
    pub fn rooms_of(&self, id: ConnectionId) -> HashSet<String> {
        self.connections
            .get(id)
            .map(|connection| connection.rooms())
            .unwrap_or_default()
    }

    /// Whether a room currently exists
    pub fn contains_room(&self, room: &str) -> bool {
        self.rooms.read().contains_key(room)
    }

    /// Number of live rooms
    pub fn room_count(&self) -> usize {
        self.rooms.read().len()
    }

    /// Number of members in a room
    pub fn member_count(&self, room: &str) -> usize {
        self.rooms.read().get(room).map_or(0, HashSet::len)
    }
}
