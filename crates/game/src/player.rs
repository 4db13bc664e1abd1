//! The player entity and its replicated transform and health state.

use glam::Vec3;
use skirmish_core::ConnectionId;
use skirmish_net::{NetError, NetworkId, Replicate, StateReader, StateWriter, WEAPON_SLOTS};

use crate::weapon::{WeaponKind, WeaponState};

/// Health a player spawns with.
pub const MAX_HEALTH: i32 = 100;

/// Shield a player spawns with.
pub const MAX_SHIELD: i32 = 100;

/// Replicated world position of a player avatar.
pub struct TransformState {
    net_id: NetworkId,
    /// Current position. Host-authoritative for remote players; predicted
    /// locally for the own avatar until the next authoritative overwrite.
    pub pos: Vec3,
    dirty: bool,
}

impl TransformState {
    /// Create an unbound transform at `pos`.
    pub fn new(pos: Vec3) -> Self {
        Self {
            net_id: NetworkId::UNBOUND,
            pos,
            dirty: true,
        }
    }

    /// Record the identity assigned by the host.
    pub fn bind(&mut self, id: NetworkId) {
        self.net_id = id;
    }

    /// Move the avatar, marking the state for the next flush.
    pub fn set_position(&mut self, pos: Vec3) {
        if self.pos != pos {
            self.pos = pos;
            self.dirty = true;
        }
    }
}

impl Replicate for TransformState {
    fn net_id(&self) -> NetworkId {
        self.net_id
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn write_state(&mut self, w: &mut StateWriter) -> Result<(), NetError> {
        w.write(&self.pos.to_array())?;
        self.dirty = false;
        Ok(())
    }

    fn read_state(&mut self, r: &mut StateReader<'_>) -> Result<(), NetError> {
        let pos: [f32; 3] = r.read()?;
        self.pos = Vec3::from_array(pos);
        Ok(())
    }
}

/// Replicated health and shield, host-only-written.
///
/// Wire layout: two signed 32-bit integers in fixed order (health, shield).
pub struct HealthState {
    net_id: NetworkId,
    /// Current health.
    pub health: i32,
    /// Current shield; absorbs damage before health.
    pub shield: i32,
    dirty: bool,
}

impl HealthState {
    /// Create an unbound full-health state.
    pub fn new() -> Self {
        Self {
            net_id: NetworkId::UNBOUND,
            health: MAX_HEALTH,
            shield: MAX_SHIELD,
            dirty: true,
        }
    }

    /// Record the identity assigned by the host.
    pub fn bind(&mut self, id: NetworkId) {
        self.net_id = id;
    }

    /// Apply damage, shield first. Returns true if this killed the player.
    pub fn apply_damage(&mut self, amount: i32) -> bool {
        if amount <= 0 {
            return false;
        }
        let absorbed = self.shield.min(amount);
        self.shield -= absorbed;
        self.health -= amount - absorbed;
        self.dirty = true;
        self.health <= 0
    }

    /// Reset to spawn values.
    pub fn respawn(&mut self) {
        self.health = MAX_HEALTH;
        self.shield = MAX_SHIELD;
        self.dirty = true;
    }
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl Replicate for HealthState {
    fn net_id(&self) -> NetworkId {
        self.net_id
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn write_state(&mut self, w: &mut StateWriter) -> Result<(), NetError> {
        w.write(&self.health)?;
        w.write(&self.shield)?;
        self.dirty = false;
        Ok(())
    }

    fn read_state(&mut self, r: &mut StateReader<'_>) -> Result<(), NetError> {
        self.health = r.read()?;
        self.shield = r.read()?;
        Ok(())
    }
}

/// A player avatar: one owning connection, one replicated transform, one
/// replicated health state, and four replicated weapons.
pub struct PlayerEntity {
    /// Connection that owns this avatar.
    pub owner: ConnectionId,
    /// Display name from the handshake.
    pub nickname: String,
    /// Replicated position.
    pub transform: TransformState,
    /// Replicated health/shield.
    pub health: HealthState,
    /// Replicated weapons, slot order.
    pub weapons: [WeaponState; WEAPON_SLOTS],
}

impl PlayerEntity {
    /// Construct a player at `spawn_pos`. All identities start unbound;
    /// the host binds them in the same simulation step, clients bind them
    /// when the creation packet arrives.
    pub fn new(owner: ConnectionId, nickname: String, spawn_pos: Vec3) -> Self {
        Self {
            owner,
            nickname,
            transform: TransformState::new(spawn_pos),
            health: HealthState::new(),
            weapons: [
                WeaponState::new(WeaponKind::Rifle),
                WeaponState::new(WeaponKind::Shotgun),
                WeaponState::new(WeaponKind::Plasma),
                WeaponState::new(WeaponKind::Launcher),
            ],
        }
    }

    /// Every identity this entity owns, in creation-packet order.
    pub fn owned_ids(&self) -> Vec<NetworkId> {
        let mut ids = vec![self.transform.net_id(), self.health.net_id()];
        ids.extend(self.weapons.iter().map(|w| w.net_id()));
        ids
    }

    /// Whether all owned identities have been bound.
    pub fn is_bound(&self) -> bool {
        self.owned_ids().iter().all(|id| id.is_bound())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_wire_order_is_health_then_shield() {
        let mut state = HealthState::new();
        state.health = 73;
        state.shield = 20;

        let mut w = StateWriter::new();
        state.write_state(&mut w).expect("write");
        let bytes = w.finish();

        let mut r = StateReader::new(&bytes);
        let health: i32 = r.read().expect("health");
        let shield: i32 = r.read().expect("shield");
        assert_eq!((health, shield), (73, 20));
    }

    #[test]
    fn damage_drains_shield_before_health() {
        let mut state = HealthState::new();
        assert!(!state.apply_damage(120));
        assert_eq!(state.shield, 0);
        assert_eq!(state.health, 80);

        assert!(state.apply_damage(80));
        assert_eq!(state.health, 0);
    }

    #[test]
    fn write_clears_dirty_and_roundtrips() {
        let mut state = HealthState::new();
        state.apply_damage(30);
        assert!(state.is_dirty());

        let mut w = StateWriter::new();
        state.write_state(&mut w).expect("write");
        assert!(!state.is_dirty());

        let bytes = w.finish();
        let mut fresh = HealthState::new();
        fresh
            .read_state(&mut StateReader::new(&bytes))
            .expect("read");
        assert_eq!(fresh.health, state.health);
        assert_eq!(fresh.shield, state.shield);
    }

    #[test]
    fn transform_overwrites_unconditionally() {
        let mut host_side = TransformState::new(Vec3::new(4.0, 0.0, -2.0));
        let mut w = StateWriter::new();
        host_side.write_state(&mut w).expect("write");
        let bytes = w.finish();

        // Client predicted somewhere else; the authoritative read wins.
        let mut client_side = TransformState::new(Vec3::new(99.0, 99.0, 99.0));
        client_side
            .read_state(&mut StateReader::new(&bytes))
            .expect("read");
        assert_eq!(client_side.pos, Vec3::new(4.0, 0.0, -2.0));
    }

    #[test]
    fn new_player_is_unbound() {
        let player = PlayerEntity::new(ConnectionId(1), "ada".into(), Vec3::ZERO);
        assert!(!player.is_bound());
        assert_eq!(player.owned_ids().len(), 2 + WEAPON_SLOTS);
    }
}
