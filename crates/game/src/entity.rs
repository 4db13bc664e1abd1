//! The entity arena and replica addressing.
//!
//! Entities live in a shared arena addressed by stable handles; cross
//! references (a weapon's owning player, a state entry's target) are
//! expressed as identity lookups rather than owning pointers, so
//! destruction order is decoupled from the reference.

use skirmish_core::ConnectionId;
use skirmish_net::{IdentityRegistry, NetworkId, ObjectTypeTag, Replicate};
use std::collections::BTreeMap;

use crate::player::PlayerEntity;
use crate::score::ScoreSystem;

/// Stable handle into the [`EntityArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityHandle(u32);

/// Which replicated component of an entity an identity addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicaPart {
    /// A player's transform.
    Transform,
    /// A player's health/shield.
    Health,
    /// A player's weapon by slot index.
    Weapon(u8),
    /// The score table itself.
    ScoreTable,
}

/// Resolution target of a bound [`NetworkId`]: an arena entity plus the
/// component within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplicaRef {
    /// Entity in the arena.
    pub entity: EntityHandle,
    /// Component within the entity.
    pub part: ReplicaPart,
}

/// The identity registry specialized to arena replica references.
pub type Registry = IdentityRegistry<ReplicaRef>;

/// Any object eligible for replication.
pub enum Entity {
    /// A player avatar.
    Player(PlayerEntity),
    /// The session score table.
    ScoreTable(ScoreSystem),
}

impl Entity {
    /// The creation-packet tag for this entity kind.
    pub fn tag(&self) -> ObjectTypeTag {
        match self {
            Entity::Player(_) => ObjectTypeTag::Player,
            Entity::ScoreTable(_) => ObjectTypeTag::ScoreTable,
        }
    }

    /// Connection owning this entity (the host for world objects).
    pub fn owner(&self) -> ConnectionId {
        match self {
            Entity::Player(player) => player.owner,
            Entity::ScoreTable(_) => ConnectionId::HOST,
        }
    }

    /// Every identity the entity owns.
    pub fn owned_ids(&self) -> Vec<NetworkId> {
        match self {
            Entity::Player(player) => player.owned_ids(),
            Entity::ScoreTable(table) => vec![table.net_id()],
        }
    }
}

/// Shared arena of replicated entities; iteration order is deterministic.
pub struct EntityArena {
    slots: BTreeMap<EntityHandle, Entity>,
    next: u32,
}

impl EntityArena {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self {
            slots: BTreeMap::new(),
            next: 0,
        }
    }

    /// Insert an entity, returning its stable handle.
    pub fn insert(&mut self, entity: Entity) -> EntityHandle {
        let handle = EntityHandle(self.next);
        self.next += 1;
        self.slots.insert(handle, entity);
        handle
    }

    /// Remove an entity, returning it if present.
    pub fn remove(&mut self, handle: EntityHandle) -> Option<Entity> {
        self.slots.remove(&handle)
    }

    /// Borrow an entity.
    pub fn get(&self, handle: EntityHandle) -> Option<&Entity> {
        self.slots.get(&handle)
    }

    /// Mutably borrow an entity.
    pub fn get_mut(&mut self, handle: EntityHandle) -> Option<&mut Entity> {
        self.slots.get_mut(&handle)
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the arena is empty.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// All live entities in handle order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityHandle, &Entity)> {
        self.slots.iter().map(|(h, e)| (*h, e))
    }

    /// Handle of the player entity owned by `conn`, if any.
    pub fn player_by_owner(&self, conn: ConnectionId) -> Option<EntityHandle> {
        self.slots.iter().find_map(|(handle, entity)| match entity {
            Entity::Player(player) if player.owner == conn => Some(*handle),
            _ => None,
        })
    }

    /// Mutably borrow the player entity owned by `conn`.
    pub fn player_by_owner_mut(&mut self, conn: ConnectionId) -> Option<&mut PlayerEntity> {
        self.slots.values_mut().find_map(|entity| match entity {
            Entity::Player(player) if player.owner == conn => Some(player),
            _ => None,
        })
    }

    /// Project a replica reference onto the component it addresses.
    ///
    /// Returns None for a stale handle or a part the entity does not have
    /// (both mean the reference outlived its target).
    pub fn replica_mut(&mut self, replica: ReplicaRef) -> Option<&mut dyn Replicate> {
        match self.slots.get_mut(&replica.entity)? {
            Entity::Player(player) => match replica.part {
                ReplicaPart::Transform => Some(&mut player.transform),
                ReplicaPart::Health => Some(&mut player.health),
                ReplicaPart::Weapon(slot) => player
                    .weapons
                    .get_mut(usize::from(slot))
                    .map(|w| w as &mut dyn Replicate),
                ReplicaPart::ScoreTable => None,
            },
            Entity::ScoreTable(table) => match replica.part {
                ReplicaPart::ScoreTable => Some(table),
                _ => None,
            },
        }
    }
}

impl Default for EntityArena {
    fn default() -> Self {
        Self::new()
    }
}
