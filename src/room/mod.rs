//! Room module
//!
//! Room-scoped membership and message fan-out:
//! - Room directory (room name to member set, implicit create/remove)
//! - Fan-out relay (deliver one message to every member)

pub mod directory;
pub mod relay;

pub use directory::RoomDirectory;
pub use relay::{FanoutRelay, RelayReport};
