//! Object creation: host-side packet building and client-side application.
//!
//! The host is the only identity allocator. It constructs the entity, binds
//! every owned identity, and announces the result in a creation packet.
//! Clients never allocate: they either construct the remote entity from the
//! packet, or bind the identities onto a locally pre-constructed avatar
//! (the eagerly-spawned own player).

use glam::Vec3;
use skirmish_core::ConnectionId;
use skirmish_net::{
    CreateObjectPacket, CreationPacketHeader, CreationPayload, NetError, PlayerCreation, Replicate,
    ScoreTableCreation,
};
use tracing::debug;

use crate::entity::{Entity, EntityArena, EntityHandle, Registry, ReplicaPart, ReplicaRef};
use crate::player::PlayerEntity;
use crate::score::ScoreSystem;

/// Build the creation packet announcing an already-bound entity.
///
/// Fails with a protocol error if any owned identity is still unbound;
/// callers bind through the registry first.
pub fn build_creation_packet(entity: &Entity) -> Result<CreateObjectPacket, NetError> {
    if entity.owned_ids().iter().any(|id| !id.is_bound()) {
        return Err(NetError::Protocol(
            "cannot announce an entity with unbound identities".into(),
        ));
    }
    let header = CreationPacketHeader {
        owner: entity.owner(),
        tag: entity.tag(),
    };
    let payload = match entity {
        Entity::Player(player) => CreationPayload::Player(PlayerCreation {
            transform_id: player.transform.net_id(),
            health_id: player.health.net_id(),
            weapon_ids: [
                player.weapons[0].net_id(),
                player.weapons[1].net_id(),
                player.weapons[2].net_id(),
                player.weapons[3].net_id(),
            ],
            spawn_pos: player.transform.pos.to_array(),
            nickname: player.nickname.clone(),
        }),
        Entity::ScoreTable(table) => CreationPayload::ScoreTable(ScoreTableCreation {
            table_id: table.net_id(),
        }),
    };
    Ok(CreateObjectPacket { header, payload })
}

/// Bind every identity of a player at `handle` into the registry, slot by
/// slot, using `bind_known` so wire-learned ids never collide.
fn bind_player_parts(
    registry: &mut Registry,
    handle: EntityHandle,
    creation: &PlayerCreation,
) -> Result<(), NetError> {
    registry.bind_known(
        creation.transform_id,
        ReplicaRef {
            entity: handle,
            part: ReplicaPart::Transform,
        },
    )?;
    registry.bind_known(
        creation.health_id,
        ReplicaRef {
            entity: handle,
            part: ReplicaPart::Health,
        },
    )?;
    for (slot, id) in creation.weapon_ids.iter().enumerate() {
        registry.bind_known(
            *id,
            ReplicaRef {
                entity: handle,
                part: ReplicaPart::Weapon(slot as u8),
            },
        )?;
    }
    Ok(())
}

/// Apply a received creation packet on a client.
///
/// If the packet announces `local_conn`'s own player and a pre-constructed
/// avatar already sits in the arena, construction is skipped and the
/// host-assigned identities are bound onto the existing entity. An
/// [`NetError::IdentityConflict`] from binding is fatal and propagates.
pub fn apply_create_object(
    arena: &mut EntityArena,
    registry: &mut Registry,
    packet: &CreateObjectPacket,
    local_conn: ConnectionId,
) -> Result<EntityHandle, NetError> {
    packet
        .verify()
        .map_err(|reason| NetError::Protocol(reason.into()))?;

    match &packet.payload {
        CreationPayload::Player(creation) => {
            let owner = packet.header.owner;
            let handle = match arena.player_by_owner(owner) {
                Some(existing) if owner == local_conn => {
                    debug!(%owner, "Binding host identities onto the local avatar");
                    existing
                }
                Some(existing) => {
                    // Duplicate announcement for a peer we already know;
                    // rebinding below is idempotent for identical ids.
                    debug!(%owner, "Re-applying creation for a known peer");
                    existing
                }
                None => {
                    let player = PlayerEntity::new(
                        owner,
                        creation.nickname.clone(),
                        Vec3::from_array(creation.spawn_pos),
                    );
                    arena.insert(Entity::Player(player))
                }
            };
            bind_player_parts(registry, handle, creation)?;
            if let Some(Entity::Player(player)) = arena.get_mut(handle) {
                player.transform.bind(creation.transform_id);
                player.health.bind(creation.health_id);
                for (slot, id) in creation.weapon_ids.iter().enumerate() {
                    player.weapons[slot].bind(*id);
                }
            }
            Ok(handle)
        }
        CreationPayload::ScoreTable(creation) => {
            let existing = arena
                .iter()
                .find_map(|(h, e)| matches!(e, Entity::ScoreTable(_)).then_some(h));
            let handle = match existing {
                Some(handle) => handle,
                None => arena.insert(Entity::ScoreTable(ScoreSystem::new())),
            };
            registry.bind_known(
                creation.table_id,
                ReplicaRef {
                    entity: handle,
                    part: ReplicaPart::ScoreTable,
                },
            )?;
            if let Some(Entity::ScoreTable(table)) = arena.get_mut(handle) {
                table.bind(creation.table_id);
            }
            Ok(handle)
        }
    }
}
