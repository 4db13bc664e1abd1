//! Packet dispatch table routing inbound frames to registered handlers.
//!
//! Handlers execute synchronously and completely before the next queued
//! packet for a connection is processed; the creation-before-sync ordering
//! the rest of the protocol relies on falls out of that. The table is
//! generic over an explicit context value (the session), so no global state
//! is reachable from a handler.

use crate::codec::decode_frame;
use crate::error::NetError;
use crate::protocol::PacketId;
use skirmish_core::ConnectionId;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Handler capability invoked with the routed frame's payload bytes.
pub type PacketHandler<Ctx> =
    Box<dyn FnMut(&mut Ctx, ConnectionId, &[u8]) -> Result<(), NetError> + Send>;

/// Maps numeric packet identifiers to handler capabilities.
pub struct PacketDispatcher<Ctx> {
    handlers: BTreeMap<u8, PacketHandler<Ctx>>,
}

impl<Ctx> PacketDispatcher<Ctx> {
    /// Create an empty dispatch table.
    pub fn new() -> Self {
        Self {
            handlers: BTreeMap::new(),
        }
    }

    /// Register a handler for `id`, replacing any previous registration.
    pub fn register<F>(&mut self, id: PacketId, handler: F)
    where
        F: FnMut(&mut Ctx, ConnectionId, &[u8]) -> Result<(), NetError> + Send + 'static,
    {
        self.handlers.insert(id as u8, Box::new(handler));
    }

    /// Route one framed packet from `from`.
    ///
    /// Unregistered identifiers and malformed frames are logged and
    /// ignored. Handler failures are logged and dropped too, except fatal
    /// ones ([`NetError::is_fatal`]), which propagate so the session can
    /// abort instead of limping on with corrupted identity state.
    pub fn dispatch(
        &mut self,
        ctx: &mut Ctx,
        from: ConnectionId,
        frame: &[u8],
    ) -> Result<(), NetError> {
        let (raw_id, payload) = match decode_frame(frame) {
            Ok(parts) => parts,
            Err(err) => {
                warn!(%from, "Dropping malformed frame: {err}");
                return Ok(());
            }
        };

        let Some(handler) = self.handlers.get_mut(&raw_id) else {
            debug!(%from, raw_id, "No handler registered for packet id, ignoring");
            return Ok(());
        };

        match handler(ctx, from, payload) {
            Ok(()) => Ok(()),
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                warn!(%from, raw_id, "Packet handler failed, dropping packet: {err}");
                Ok(())
            }
        }
    }
}

impl<Ctx> Default for PacketDispatcher<Ctx> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_frame;
    use crate::identity::NetworkId;

    #[derive(Default)]
    struct Counter {
        seen: Vec<(ConnectionId, u32)>,
    }

    #[test]
    fn routes_by_packet_id() {
        let mut dispatcher: PacketDispatcher<Counter> = PacketDispatcher::new();
        dispatcher.register(PacketId::PlayerCommand, |ctx, from, payload| {
            let value: u32 = crate::codec::decode_payload(payload)?;
            ctx.seen.push((from, value));
            Ok(())
        });

        let mut ctx = Counter::default();
        let frame = encode_frame(PacketId::PlayerCommand, &7u32).expect("encode");
        dispatcher
            .dispatch(&mut ctx, ConnectionId(2), &frame)
            .expect("dispatch");

        assert_eq!(ctx.seen, vec![(ConnectionId(2), 7)]);
    }

    #[test]
    fn unregistered_id_is_ignored_not_fatal() {
        let mut dispatcher: PacketDispatcher<Counter> = PacketDispatcher::new();
        let mut ctx = Counter::default();

        let frame = encode_frame(PacketId::StateSync, &1u32).expect("encode");
        dispatcher
            .dispatch(&mut ctx, ConnectionId(1), &frame)
            .expect("unknown ids are ignored");
        assert!(ctx.seen.is_empty());
    }

    #[test]
    fn malformed_frame_is_dropped() {
        let mut dispatcher: PacketDispatcher<Counter> = PacketDispatcher::new();
        let mut ctx = Counter::default();

        dispatcher
            .dispatch(&mut ctx, ConnectionId(1), &[1, 2])
            .expect("malformed frames are dropped");
    }

    #[test]
    fn handler_errors_are_dropped_unless_fatal() {
        let mut dispatcher: PacketDispatcher<Counter> = PacketDispatcher::new();
        dispatcher.register(PacketId::StateSync, |_, _, _| {
            Err(NetError::IdentityNotFound(NetworkId(9)))
        });
        dispatcher.register(PacketId::CreateObject, |_, _, _| {
            Err(NetError::IdentityConflict(NetworkId(9)))
        });

        let mut ctx = Counter::default();

        let sync = encode_frame(PacketId::StateSync, &()).expect("encode");
        dispatcher
            .dispatch(&mut ctx, ConnectionId(1), &sync)
            .expect("not-found is non-fatal");

        let create = encode_frame(PacketId::CreateObject, &()).expect("encode");
        let err = dispatcher
            .dispatch(&mut ctx, ConnectionId(1), &create)
            .expect_err("conflict is fatal");
        assert!(err.is_fatal());
    }

    #[test]
    fn handlers_run_in_submission_order() {
        let mut dispatcher: PacketDispatcher<Counter> = PacketDispatcher::new();
        dispatcher.register(PacketId::PlayerCommand, |ctx, from, payload| {
            let value: u32 = crate::codec::decode_payload(payload)?;
            ctx.seen.push((from, value));
            Ok(())
        });

        let mut ctx = Counter::default();
        for value in 0..5u32 {
            let frame = encode_frame(PacketId::PlayerCommand, &value).expect("encode");
            dispatcher
                .dispatch(&mut ctx, ConnectionId(3), &frame)
                .expect("dispatch");
        }

        let values: Vec<u32> = ctx.seen.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![0, 1, 2, 3, 4]);
    }
}
