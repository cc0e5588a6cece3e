//! HTTP and WebSocket gateway for Sketch Relay.
//!
//! Terminates one WebSocket per drawing client, decodes frames into relay
//! events, writes the relay's outbound frames back, and serves the read-only
//! status endpoints.

pub mod connection;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod server;
pub mod state;

pub use server::{router, serve, start_gateway};
pub use state::GatewayState;
