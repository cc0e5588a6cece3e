//! Outbound side of a client connection, as seen by the relay.

use tokio::sync::mpsc;

use crate::error::SinkClosed;

/// Where the relay pushes encoded frames for one connection.
///
/// Sends are fire-and-forget: implementations must not block.
pub trait ClientSink: Send + Sync {
    /// Whether the connection can still accept frames.
    fn is_open(&self) -> bool;

    fn send_frame(&self, frame: String) -> Result<(), SinkClosed>;
}

/// The gateway feeds each connection's writer task through an unbounded channel.
impl ClientSink for mpsc::UnboundedSender<String> {
    fn is_open(&self) -> bool {
        !self.is_closed()
    }

    fn send_frame(&self, frame: String) -> Result<(), SinkClosed> {
        self.send(frame).map_err(|_| SinkClosed)
    }
}
