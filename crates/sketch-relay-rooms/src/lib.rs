//! Room registry and broadcast relay.
//!
//! Clients join a named room, get the room's draw history replayed, and from
//! then on receive every draw and clear from the other members. All room state
//! is owned by a single relay task; connections talk to it via a [`RelayHandle`].

pub mod error;
pub mod protocol;
pub mod registry;
pub mod relay;
pub mod room;
pub mod sink;

pub use error::{ProtocolError, RelayClosed, SinkClosed};
pub use protocol::{ConnectionId, DrawPayload, InboundEvent, JoinRoom, OutboundEvent};
pub use registry::{RoomRegistry, RoomStatus};
pub use relay::{Relay, RelayHandle, RelaySettings, RelayStats};
pub use room::Room;
pub use sink::ClientSink;
