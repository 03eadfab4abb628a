//! Fan-out relay
//!
//! Delivers one message to every member of a room. The member set is copied
//! out of the directory before any delivery, so a slow connection never
//! holds the directory lock.

use std::sync::Arc;

use tracing::debug;

use crate::net::connection::{ConnectionId, ConnectionRegistry};
use crate::protocol::ServerEvent;
use crate::room::directory::RoomDirectory;

/// Outcome of a single relay call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayReport {
    /// Deliveries attempted (one per targeted member)
    pub attempted: usize,
    /// Deliveries queued on the member's connection
    pub delivered: usize,
}

impl RelayReport {
    /// Deliveries that were dropped (stale or saturated connections)
    pub fn dropped(&self) -> usize {
        self.attempted - self.delivered
    }
}

/// Room fan-out
pub struct FanoutRelay {
    directory: Arc<RoomDirectory>,
    connections: Arc<ConnectionRegistry>,
    include_sender: bool,
}

impl FanoutRelay {
    /// Create a relay. With `include_sender` the sender gets its own message echoed.
    pub fn new(
        directory: Arc<RoomDirectory>,
        connections: Arc<ConnectionRegistry>,
        include_sender: bool,
    ) -> Self {
        Self {
            directory,
            connections,
            include_sender,
        }
    }

    /// Relay `message` to every member of `room`.
    ///
    /// A room without members is a no-op: nothing is delivered and nothing
    /// is reported as an error.
    pub fn relay(&self, room: &str, message: &str, sender: ConnectionId) -> RelayReport {
        let members = self.directory.members_of(room);
        if members.is_empty() {
            debug!(room = %room, sender = %sender, "Relay to unknown room dropped");
            return RelayReport::default();
        }

        let mut report = RelayReport::default();
        for member in members {
            if member == sender && !self.include_sender {
                continue;
            }
            report.attempted += 1;
            if self
                .connections
                .send(member, ServerEvent::ReceiveMessage(message.to_string()))
            {
                report.delivered += 1;
            }
        }

        debug!(
            room = %room,
            sender = %sender,
            recipients = report.attempted,
            dropped = report.dropped(),
            "Relayed message"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use tokio::sync::mpsc;

    struct Fixture {
        registry: Arc<ConnectionRegistry>,
        directory: Arc<RoomDirectory>,
    }

    impl Fixture {
        fn new() -> Self {
            let registry = Arc::new(ConnectionRegistry::new());
            let directory = Arc::new(RoomDirectory::new(registry.clone()));
            Self {
                registry,
                directory,
            }
        }

        fn relay(&self, include_sender: bool) -> FanoutRelay {
            FanoutRelay::new(self.directory.clone(), self.registry.clone(), include_sender)
        }

        fn connect(&self) -> (ConnectionId, mpsc::UnboundedReceiver<ServerEvent>) {
            let addr: SocketAddr = "127.0.0.1:5000".parse().unwrap();
            let (tx, rx) = mpsc::unbounded_channel();
            (self.registry.register(addr, tx), rx)
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn received(text: &str) -> ServerEvent {
        ServerEvent::ReceiveMessage(text.to_string())
    }

    #[test]
    fn test_relay_reaches_every_member_once() {
        let f = Fixture::new();
        let (a, mut rx_a) = f.connect();
        let (b, mut rx_b) = f.connect();
        let (c, mut rx_c) = f.connect();
        let (_outsider, mut rx_out) = f.connect();
        for id in [a, b, c] {
            f.directory.join("lobby", id);
        }

        let report = f.relay(true).relay("lobby", "m", a);

        assert_eq!(report, RelayReport { attempted: 3, delivered: 3 });
        assert_eq!(drain(&mut rx_a), vec![received("m")]);
        assert_eq!(drain(&mut rx_b), vec![received("m")]);
        assert_eq!(drain(&mut rx_c), vec![received("m")]);
        assert!(drain(&mut rx_out).is_empty());
    }

    #[test]
    fn test_relay_can_exclude_sender() {
        let f = Fixture::new();
        let (a, mut rx_a) = f.connect();
        let (b, mut rx_b) = f.connect();
        f.directory.join("lobby", a);
        f.directory.join("lobby", b);

        let report = f.relay(false).relay("lobby", "m", a);

        assert_eq!(report.attempted, 1);
        assert!(drain(&mut rx_a).is_empty());
        assert_eq!(drain(&mut rx_b), vec![received("m")]);
    }

    #[test]
    fn test_relay_to_ghost_room_is_noop() {
        let f = Fixture::new();
        let (a, mut rx_a) = f.connect();

        let report = f.relay(true).relay("ghost", "boo", a);

        assert_eq!(report, RelayReport::default());
        assert!(drain(&mut rx_a).is_empty());
        assert!(!f.directory.contains_room("ghost"));
    }

    #[test]
    fn test_relay_from_non_member_reaches_members() {
        let f = Fixture::new();
        let (a, mut rx_a) = f.connect();
        let (b, mut rx_b) = f.connect();
        f.directory.join("lobby", b);

        let report = f.relay(true).relay("lobby", "knock", a);

        assert_eq!(report.delivered, 1);
        assert!(drain(&mut rx_a).is_empty());
        assert_eq!(drain(&mut rx_b), vec![received("knock")]);
    }

    #[test]
    fn test_relay_tolerates_vanished_member() {
        let f = Fixture::new();
        let (a, mut rx_a) = f.connect();
        let (b, _rx_b) = f.connect();
        f.directory.join("lobby", a);
        f.directory.join("lobby", b);

        // b disappears from the registry while still listed in the room
        f.registry.unregister(b);
        let report = f.relay(true).relay("lobby", "still here", a);

        assert_eq!(report, RelayReport { attempted: 2, delivered: 1 });
        assert_eq!(report.dropped(), 1);
        assert_eq!(drain(&mut rx_a), vec![received("still here")]);
    }

    #[test]
    fn test_relay_preserves_sender_order() {
        let f = Fixture::new();
        let (a, _rx_a) = f.connect();
        let (b, mut rx_b) = f.connect();
        f.directory.join("lobby", a);
        f.directory.join("lobby", b);

        // Nobody drains while the burst is relayed
        let relay = f.relay(true);
        for i in 0..500 {
            let report = relay.relay("lobby", &format!("msg_{i}"), a);
            assert_eq!(report.dropped(), 0);
        }

        let expected: Vec<ServerEvent> = (0..500).map(|i| received(&format!("msg_{i}"))).collect();
        assert_eq!(drain(&mut rx_b), expected);
    }
}
