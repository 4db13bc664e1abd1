//! The periodic state-sync pass: dirty-gated flush on the host, blind
//! last-write-wins application on clients.

use skirmish_net::{
    NetError, StateEntry, StateReader, StateSyncPacket, StateWriter, MAX_STATE_ENTRIES,
};
use tracing::warn;

use crate::entity::{EntityArena, Registry};

/// Walk every bound identity in ascending order and collect the encoded
/// state of the dirty ones into one sync packet.
///
/// Clean replicas contribute nothing; a tick where nothing changed returns
/// `None` and no packet goes out. Each write clears the replica's dirty
/// flag, so the same change is never flushed twice. `seq` stamps the
/// packet and must be strictly greater than any previously emitted stamp.
pub fn flush_dirty(
    arena: &mut EntityArena,
    registry: &Registry,
    seq: u64,
) -> Result<Option<StateSyncPacket>, NetError> {
    let mut entries = Vec::new();
    for (id, replica) in registry.iter() {
        let Some(state) = arena.replica_mut(*replica) else {
            // Binding outlived its entity; teardown will release it.
            continue;
        };
        if !state.is_dirty() {
            continue;
        }
        if entries.len() == MAX_STATE_ENTRIES {
            // Overflow spills to the next tick: the skipped replicas stay
            // dirty because their write_state never ran.
            warn!(
                seq,
                "State sync full at {MAX_STATE_ENTRIES} entries, deferring the rest"
            );
            break;
        }
        let mut w = StateWriter::new();
        state.write_state(&mut w)?;
        entries.push(StateEntry {
            id,
            bytes: w.finish(),
        });
    }
    if entries.is_empty() {
        return Ok(None);
    }
    Ok(Some(StateSyncPacket { seq, entries }))
}

/// Encode every bound replica regardless of dirtiness.
///
/// Used when a late joiner needs the current world, not just the changes
/// since the last tick. Writing clears dirty flags and drains one-shot
/// queues, so the result must be broadcast to every peer, never sent to a
/// single one.
pub(crate) fn snapshot_all(
    arena: &mut EntityArena,
    registry: &Registry,
    seq: u64,
) -> Result<Option<StateSyncPacket>, NetError> {
    let mut entries = Vec::new();
    for (id, replica) in registry.iter() {
        let Some(state) = arena.replica_mut(*replica) else {
            continue;
        };
        if entries.len() == MAX_STATE_ENTRIES {
            warn!(seq, "Snapshot full at {MAX_STATE_ENTRIES} entries, truncating");
            break;
        }
        let mut w = StateWriter::new();
        state.write_state(&mut w)?;
        entries.push(StateEntry {
            id,
            bytes: w.finish(),
        });
    }
    if entries.is_empty() {
        return Ok(None);
    }
    Ok(Some(StateSyncPacket { seq, entries }))
}

/// Apply a received sync packet, overwriting local state entry by entry.
///
/// Unresolvable identities are logged and skipped rather than failing the
/// packet: creation and sync travel on different channels, so a delta can
/// outrun the creation packet that would have bound its target.
pub fn apply_state_sync(
    arena: &mut EntityArena,
    registry: &Registry,
    packet: &StateSyncPacket,
) -> Result<(), NetError> {
    packet
        .verify()
        .map_err(|reason| NetError::Protocol(reason.into()))?;

    for entry in &packet.entries {
        let replica = match registry.resolve(entry.id) {
            Ok(replica) => *replica,
            Err(NetError::IdentityNotFound(id)) => {
                warn!(%id, seq = packet.seq, "State for an unknown identity, skipping entry");
                continue;
            }
            Err(other) => return Err(other),
        };
        let Some(state) = arena.replica_mut(replica) else {
            warn!(id = %entry.id, "Bound identity points at a dead entity, skipping entry");
            continue;
        };
        let mut r = StateReader::new(&entry.bytes);
        state.read_state(&mut r)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Entity, ReplicaPart, ReplicaRef};
    use crate::player::PlayerEntity;
    use glam::Vec3;
    use skirmish_core::ConnectionId;
    use skirmish_net::{NetworkId, Replicate};

    fn spawn_bound_player(
        arena: &mut EntityArena,
        registry: &mut Registry,
        conn: u32,
    ) -> crate::entity::EntityHandle {
        let handle = arena.insert(Entity::Player(PlayerEntity::new(
            ConnectionId(conn),
            format!("p{conn}"),
            Vec3::ZERO,
        )));
        let transform_id = registry.bind(ReplicaRef {
            entity: handle,
            part: ReplicaPart::Transform,
        });
        let health_id = registry.bind(ReplicaRef {
            entity: handle,
            part: ReplicaPart::Health,
        });
        let weapon_ids: Vec<NetworkId> = (0u8..4)
            .map(|slot| {
                registry.bind(ReplicaRef {
                    entity: handle,
                    part: ReplicaPart::Weapon(slot),
                })
            })
            .collect();
        if let Some(Entity::Player(player)) = arena.get_mut(handle) {
            player.transform.bind(transform_id);
            player.health.bind(health_id);
            for (slot, id) in weapon_ids.iter().enumerate() {
                player.weapons[slot].bind(*id);
            }
        }
        handle
    }

    fn drain_dirty(arena: &mut EntityArena, registry: &Registry) {
        flush_dirty(arena, registry, 0).expect("flush");
    }

    #[test]
    fn clean_tick_emits_no_packet() {
        let mut arena = EntityArena::new();
        let mut registry = Registry::new();
        spawn_bound_player(&mut arena, &mut registry, 1);

        // Everything starts dirty; the first flush drains it.
        drain_dirty(&mut arena, &registry);

        let packet = flush_dirty(&mut arena, &registry, 1).expect("flush");
        assert!(packet.is_none());
    }

    #[test]
    fn only_dirty_replicas_are_flushed() {
        let mut arena = EntityArena::new();
        let mut registry = Registry::new();
        let handle = spawn_bound_player(&mut arena, &mut registry, 1);
        drain_dirty(&mut arena, &registry);

        let moved_id = match arena.get_mut(handle) {
            Some(Entity::Player(player)) => {
                player.transform.set_position(Vec3::new(3.0, 0.0, 0.0));
                player.transform.net_id()
            }
            _ => unreachable!(),
        };

        let packet = flush_dirty(&mut arena, &registry, 2)
            .expect("flush")
            .expect("one dirty replica");
        assert_eq!(packet.entries.len(), 1);
        assert_eq!(packet.entries[0].id, moved_id);
        assert_eq!(packet.seq, 2);
    }

    #[test]
    fn entries_are_in_ascending_id_order() {
        let mut arena = EntityArena::new();
        let mut registry = Registry::new();
        spawn_bound_player(&mut arena, &mut registry, 1);
        spawn_bound_player(&mut arena, &mut registry, 2);

        let packet = flush_dirty(&mut arena, &registry, 1)
            .expect("flush")
            .expect("initial dirty state");
        assert!(packet.entries.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[test]
    fn applied_delta_overwrites_local_state() {
        let mut host_arena = EntityArena::new();
        let mut host_registry = Registry::new();
        let host_handle = spawn_bound_player(&mut host_arena, &mut host_registry, 1);

        let mut client_arena = EntityArena::new();
        let mut client_registry = Registry::new();
        let client_handle = spawn_bound_player(&mut client_arena, &mut client_registry, 1);

        if let Some(Entity::Player(player)) = host_arena.get_mut(host_handle) {
            player.health.apply_damage(40);
        }
        let packet = flush_dirty(&mut host_arena, &host_registry, 5)
            .expect("flush")
            .expect("dirty");
        apply_state_sync(&mut client_arena, &client_registry, &packet).expect("apply");

        match client_arena.get(client_handle) {
            Some(Entity::Player(player)) => {
                assert_eq!(player.health.shield, 60);
                assert_eq!(player.health.health, 100);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn unknown_identity_is_skipped_not_fatal() {
        let mut host_arena = EntityArena::new();
        let mut host_registry = Registry::new();
        spawn_bound_player(&mut host_arena, &mut host_registry, 1);
        let packet = flush_dirty(&mut host_arena, &host_registry, 1)
            .expect("flush")
            .expect("dirty");

        // Client never saw the creation packet; every entry targets an
        // unknown identity and is skipped.
        let mut arena = EntityArena::new();
        let registry = Registry::new();
        apply_state_sync(&mut arena, &registry, &packet).expect("skip, not fail");
        assert!(arena.is_empty());
    }

    #[test]
    fn flush_is_at_most_once_per_change() {
        let mut arena = EntityArena::new();
        let mut registry = Registry::new();
        let handle = spawn_bound_player(&mut arena, &mut registry, 1);
        drain_dirty(&mut arena, &registry);

        if let Some(Entity::Player(player)) = arena.get_mut(handle) {
            player.health.apply_damage(10);
        }
        let first = flush_dirty(&mut arena, &registry, 1).expect("flush");
        assert!(first.is_some());
        let second = flush_dirty(&mut arena, &registry, 2).expect("flush");
        assert!(second.is_none());
    }
}
