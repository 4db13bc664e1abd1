//! Session-unique network identities and the registry that binds them.
//!
//! The host is the only allocator: ids are handed out monotonically and
//! never reused while the owning replica is alive. Clients record ids they
//! learn from creation packets. Uniqueness for the lifetime of a session is
//! the sole hard invariant here; reuse after [`IdentityRegistry::release`]
//! is permitted for a later object but never while another reference to the
//! id is outstanding.

use crate::error::NetError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Opaque, session-unique identity binding a local replica to its
/// cross-process replication channel.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct NetworkId(pub u32);

impl NetworkId {
    /// Sentinel carried by an entity constructed speculatively on a client
    /// before the host's creation packet arrives.
    pub const UNBOUND: Self = Self(0);

    /// Whether this id has been assigned by the host.
    pub fn is_bound(self) -> bool {
        self != Self::UNBOUND
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "net#{}", self.0)
    }
}

/// Maps network identities to process-local replica references and back.
///
/// Generic over the replica reference type so the registry stays a leaf.
/// BTreeMap keeps iteration deterministic, which matters anywhere bound ids
/// are walked to produce wire output.
pub struct IdentityRegistry<R> {
    next: u32,
    bound: BTreeMap<NetworkId, R>,
}

impl<R> IdentityRegistry<R> {
    /// Create an empty registry. Allocation starts past the unbound
    /// sentinel.
    pub fn new() -> Self {
        Self {
            next: NetworkId::UNBOUND.0 + 1,
            bound: BTreeMap::new(),
        }
    }

    /// Allocate the next unused id and bind `replica` to it.
    ///
    /// Host-only path: clients never allocate, they only record ids the
    /// host assigned (see [`IdentityRegistry::bind_known`]).
    pub fn bind(&mut self, replica: R) -> NetworkId {
        let id = NetworkId(self.next);
        self.next += 1;
        self.bound.insert(id, replica);
        id
    }

    /// Resolve an id to its replica reference.
    pub fn resolve(&self, id: NetworkId) -> Result<&R, NetError> {
        self.bound.get(&id).ok_or(NetError::IdentityNotFound(id))
    }

    /// Forget the binding for `id`, returning the replica if it was bound.
    ///
    /// Called on entity destruction and peer disconnect.
    pub fn release(&mut self, id: NetworkId) -> Option<R> {
        self.bound.remove(&id)
    }

    /// Number of currently bound identities.
    pub fn len(&self) -> usize {
        self.bound.len()
    }

    /// Whether no identity is currently bound.
    pub fn is_empty(&self) -> bool {
        self.bound.is_empty()
    }

    /// Bound ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = NetworkId> + '_ {
        self.bound.keys().copied()
    }

    /// Bound `(id, replica)` pairs in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (NetworkId, &R)> {
        self.bound.iter().map(|(id, r)| (*id, r))
    }

    /// Release every binding whose replica matches `predicate`, returning
    /// the released ids. Used on peer disconnect to tear down everything a
    /// connection owned.
    pub fn release_where(&mut self, mut predicate: impl FnMut(&R) -> bool) -> Vec<NetworkId> {
        let doomed: Vec<NetworkId> = self
            .bound
            .iter()
            .filter(|(_, r)| predicate(r))
            .map(|(id, _)| *id)
            .collect();
        for id in &doomed {
            self.bound.remove(id);
        }
        doomed
    }
}

impl<R: PartialEq> IdentityRegistry<R> {
    /// Record a known id for a locally constructed shadow replica.
    ///
    /// Client path: the id was allocated by the host and carried in a
    /// creation packet. Re-binding the same replica to the same id is a
    /// no-op; binding a different replica is an [`NetError::IdentityConflict`].
    pub fn bind_known(&mut self, id: NetworkId, replica: R) -> Result<(), NetError> {
        if !id.is_bound() {
            return Err(NetError::Protocol(format!(
                "refusing to bind the unbound sentinel {id}"
            )));
        }
        match self.bound.get(&id) {
            Some(existing) if *existing == replica => Ok(()),
            Some(_) => Err(NetError::IdentityConflict(id)),
            None => {
                // Keep host-side allocation ahead of any id learned from
                // the wire so a mixed host/client registry never collides.
                self.next = self.next.max(id.0 + 1);
                self.bound.insert(id, replica);
                Ok(())
            }
        }
    }
}

impl<R> Default for IdentityRegistry<R> {
    fn default() -> Self {
        Self::new()
    }
}
