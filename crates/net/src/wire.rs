//! The serializable capability every replicated entity implements.
//!
//! State crosses the network through [`StateWriter`] / [`StateReader`],
//! thin cursors over postcard-encoded bytes. Sequences are count-prefixed
//! by postcard's varint framing, so a "count-prefixed list of tuples" on
//! the wire is just a `Vec` written through the writer.

use crate::error::NetError;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::identity::NetworkId;

/// Accumulates one replica's encoded state for a sync packet entry.
pub struct StateWriter {
    buf: Vec<u8>,
}

impl StateWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Append one value in postcard encoding.
    pub fn write<T: Serialize>(&mut self, value: &T) -> Result<(), NetError> {
        let bytes = postcard::to_allocvec(value)?;
        self.buf.extend_from_slice(&bytes);
        Ok(())
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Consume the writer, yielding the encoded bytes.
    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

impl Default for StateWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Cursor over one replica's encoded state from a sync packet entry.
pub struct StateReader<'a> {
    rest: &'a [u8],
}

impl<'a> StateReader<'a> {
    /// Wrap the encoded bytes of one state entry.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { rest: bytes }
    }

    /// Decode the next value, advancing the cursor.
    pub fn read<T: DeserializeOwned>(&mut self) -> Result<T, NetError> {
        let (value, rest) = postcard::take_from_bytes(self.rest)?;
        self.rest = rest;
        Ok(value)
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.rest.len()
    }
}

/// Contract implemented by every replicated piece of entity state.
///
/// `write_state` is only meaningful on the host: it must be a pure function
/// of current authoritative state plus any one-shot queues, and it clears
/// those queues and the dirty flag as a side effect (at-most-once emission,
/// no retransmission if the packet is lost). `read_state` must be total
/// over any well-formed stream produced by the matching `write_state` and
/// leaves the replica in exactly the encoded state, overwriting local
/// values unconditionally.
///
/// Dirty gating: when [`Replicate::is_dirty`] is false the replica
/// contributes zero bytes to the tick's sync packet; full values are sent
/// only on change, not every tick.
pub trait Replicate {
    /// The session-unique identity this state is addressed by, or
    /// [`NetworkId::UNBOUND`] before the creation packet has been processed.
    fn net_id(&self) -> NetworkId;

    /// Whether authoritative state changed since the last successful
    /// `write_state`.
    fn is_dirty(&self) -> bool;

    /// Encode current authoritative state, clearing the dirty flag and any
    /// one-shot queues.
    fn write_state(&mut self, w: &mut StateWriter) -> Result<(), NetError>;

    /// Overwrite local state from an authoritative stream.
    fn read_state(&mut self, r: &mut StateReader<'_>) -> Result<(), NetError>;
}
