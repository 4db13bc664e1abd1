#![warn(missing_docs)]
//! Session-wide primitives shared across the workspace.

use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed tick type (20 TPS => 50 ms per tick).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SimTick(pub u64);

impl SimTick {
    /// First tick of any session.
    pub const ZERO: Self = Self(0);

    /// Advance by `delta` ticks.
    pub fn advance(self, delta: u64) -> Self {
        Self(self.0 + delta)
    }
}

/// Default simulation rate in ticks per second.
pub const DEFAULT_TICK_RATE: u32 = 20;

/// Identifier of one connected peer within a session.
///
/// The host reserves [`ConnectionId::HOST`]; every accepted client gets the
/// next free id. Ids are never reassigned while the session is running.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ConnectionId(pub u32);

impl ConnectionId {
    /// The authoritative host process.
    pub const HOST: Self = Self(0);

    /// Whether this id refers to the host itself.
    pub fn is_host(self) -> bool {
        self == Self::HOST
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// Reproducible RNG seeded by session + connection + tick domains.
///
/// Used for host-side spawn point selection so reconnect tests stay stable.
pub fn scoped_rng(session_seed: u64, conn: ConnectionId, tick: SimTick) -> StdRng {
    let seed = session_seed ^ (u64::from(conn.0) << 32) ^ tick.0;
    StdRng::seed_from_u64(seed)
}
