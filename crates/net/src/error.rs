//! Error taxonomy for the replication layer.

use crate::identity::NetworkId;
use thiserror::Error;

/// Failures the replication layer distinguishes.
///
/// Only [`NetError::IdentityConflict`] is fatal by contract; the dispatcher
/// logs and drops everything else so a bad packet never stalls the tick.
#[derive(Debug, Error)]
pub enum NetError {
    /// Malformed or unrecognized packet payload. Logged, packet dropped.
    #[error("malformed packet: {0}")]
    Protocol(String),

    /// A lookup against an id nobody has bound yet. The dependent operation
    /// is skipped for this tick; the matching creation packet heals it.
    #[error("identity {0} is not bound")]
    IdentityNotFound(NetworkId),

    /// An attempt to bind an id that is already bound to a different
    /// replica. Should not occur given the protocol's invariants; treated
    /// as a fatal programming error rather than a recoverable condition.
    #[error("identity {0} is already bound to a different replica")]
    IdentityConflict(NetworkId),

    /// Underlying wire encode/decode failure.
    #[error("wire encoding failed: {0}")]
    Wire(#[from] postcard::Error),
}

impl NetError {
    /// Whether the session must abort rather than drop the offending packet.
    pub fn is_fatal(&self) -> bool {
        matches!(self, NetError::IdentityConflict(_))
    }
}
