#![warn(missing_docs)]
//! Authoritative match host: accepts connections, owns the session, and
//! drives the tick loop.

pub mod multiplayer;

pub use multiplayer::{ConnectedClient, HostServer};
