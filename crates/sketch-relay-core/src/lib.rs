//! Core config and error types for Sketch Relay.

pub mod config;
pub mod error;
