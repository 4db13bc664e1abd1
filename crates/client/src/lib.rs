#![warn(missing_docs)]
//! Client process: connects to a host, mirrors the replicated world, and
//! forwards player input.

pub mod multiplayer;

pub use multiplayer::MultiplayerClient;
