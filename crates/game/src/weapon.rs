//! Replicated weapon state and the static tuning table.
//!
//! Tuning values are data, not logic; only the replicated fields (ammo and
//! the one-shot impact queue) cross the network.

use glam::Vec3;
use skirmish_net::{NetError, NetworkId, Replicate, StateReader, StateWriter};

/// Cap on queued impact events between flushes; the oldest are dropped
/// first since they are cosmetic.
pub const MAX_IMPACT_EVENTS: usize = 64;

/// The four weapon kinds every player carries, slot order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeaponKind {
    /// Slot 0: hitscan rifle.
    Rifle,
    /// Slot 1: short-range spread.
    Shotgun,
    /// Slot 2: slow projectile, heavy hit.
    Plasma,
    /// Slot 3: rocket launcher with area damage.
    Launcher,
}

impl WeaponKind {
    /// Rounds in a full magazine.
    pub fn magazine(self) -> u32 {
        match self {
            WeaponKind::Rifle => 30,
            WeaponKind::Shotgun => 8,
            WeaponKind::Plasma => 12,
            WeaponKind::Launcher => 4,
        }
    }

    /// Direct-hit damage.
    pub fn damage(self) -> i32 {
        match self {
            WeaponKind::Rifle => 7,
            WeaponKind::Shotgun => 25,
            WeaponKind::Plasma => 35,
            WeaponKind::Launcher => 10,
        }
    }

    /// Area-damage radius, for kinds that explode.
    pub fn explosion_radius(self) -> Option<f32> {
        match self {
            WeaponKind::Launcher => Some(5.0),
            _ => None,
        }
    }
}

/// Replicated per-weapon state: ammo plus a one-shot impact queue.
///
/// Wire layout: ammo, then a count-prefixed sequence of 3D impact
/// positions. The queue is cleared by the `write_state` that emitted it —
/// at-most-once per event, never re-sent.
pub struct WeaponState {
    net_id: NetworkId,
    /// Which tuning row applies.
    pub kind: WeaponKind,
    /// Rounds remaining; host-authoritative.
    pub ammo: u32,
    impacts: Vec<Vec3>,
    dirty: bool,
}

impl WeaponState {
    /// Create an unbound weapon with a full magazine.
    pub fn new(kind: WeaponKind) -> Self {
        Self {
            net_id: NetworkId::UNBOUND,
            kind,
            ammo: kind.magazine(),
            impacts: Vec::new(),
            dirty: true,
        }
    }

    /// Record the identity assigned by the host.
    pub fn bind(&mut self, id: NetworkId) {
        self.net_id = id;
    }

    /// Host-side fire resolution: spend a round and queue the impact.
    ///
    /// Returns false (and changes nothing) on an empty magazine.
    pub fn fire(&mut self, hit_point: Vec3) -> bool {
        if self.ammo == 0 {
            return false;
        }
        self.ammo -= 1;
        if self.impacts.len() == MAX_IMPACT_EVENTS {
            self.impacts.remove(0);
        }
        self.impacts.push(hit_point);
        self.dirty = true;
        true
    }

    /// Refill the magazine.
    pub fn reload(&mut self) {
        if self.ammo != self.kind.magazine() {
            self.ammo = self.kind.magazine();
            self.dirty = true;
        }
    }

    /// Impact events queued since the last flush (host) or carried by the
    /// last applied delta (client). Draining consumes them.
    pub fn drain_impacts(&mut self) -> Vec<Vec3> {
        std::mem::take(&mut self.impacts)
    }

    /// Number of queued impact events.
    pub fn pending_impacts(&self) -> usize {
        self.impacts.len()
    }
}

impl Replicate for WeaponState {
    fn net_id(&self) -> NetworkId {
        self.net_id
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn write_state(&mut self, w: &mut StateWriter) -> Result<(), NetError> {
        w.write(&self.ammo)?;
        let impacts: Vec<[f32; 3]> = self.impacts.iter().map(|p| p.to_array()).collect();
        w.write(&impacts)?;
        // One-shot queue: emitted exactly once, even if the packet is lost.
        self.impacts.clear();
        self.dirty = false;
        Ok(())
    }

    fn read_state(&mut self, r: &mut StateReader<'_>) -> Result<(), NetError> {
        self.ammo = r.read()?;
        let impacts: Vec<[f32; 3]> = r.read()?;
        self.impacts = impacts.into_iter().map(Vec3::from_array).collect();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fire_spends_ammo_and_queues_impact() {
        let mut weapon = WeaponState::new(WeaponKind::Shotgun);
        assert!(weapon.fire(Vec3::new(1.0, 2.0, 3.0)));
        assert_eq!(weapon.ammo, WeaponKind::Shotgun.magazine() - 1);
        assert_eq!(weapon.pending_impacts(), 1);
    }

    #[test]
    fn empty_magazine_refuses_to_fire() {
        let mut weapon = WeaponState::new(WeaponKind::Launcher);
        for _ in 0..WeaponKind::Launcher.magazine() {
            assert!(weapon.fire(Vec3::ZERO));
        }
        assert!(!weapon.fire(Vec3::ZERO));
        assert_eq!(weapon.ammo, 0);
    }

    #[test]
    fn write_emits_impacts_exactly_once() {
        let mut weapon = WeaponState::new(WeaponKind::Rifle);
        weapon.fire(Vec3::new(5.0, 0.0, 0.0));
        weapon.fire(Vec3::new(6.0, 0.0, 0.0));

        let mut w = StateWriter::new();
        weapon.write_state(&mut w).expect("write");
        let first = w.finish();

        // Queue drained by the write; a second write carries no impacts.
        assert_eq!(weapon.pending_impacts(), 0);
        let mut w = StateWriter::new();
        weapon.write_state(&mut w).expect("write");
        let second = w.finish();

        let mut fresh = WeaponState::new(WeaponKind::Rifle);
        fresh
            .read_state(&mut StateReader::new(&first))
            .expect("read");
        assert_eq!(fresh.drain_impacts().len(), 2);

        let mut fresh = WeaponState::new(WeaponKind::Rifle);
        fresh
            .read_state(&mut StateReader::new(&second))
            .expect("read");
        assert_eq!(fresh.drain_impacts().len(), 0);
    }

    #[test]
    fn impact_queue_is_bounded() {
        let mut weapon = WeaponState::new(WeaponKind::Rifle);
        weapon.ammo = 10_000;
        for i in 0..(MAX_IMPACT_EVENTS + 8) {
            weapon.fire(Vec3::new(i as f32, 0.0, 0.0));
        }
        assert_eq!(weapon.pending_impacts(), MAX_IMPACT_EVENTS);
    }

    #[test]
    fn ammo_roundtrips() {
        let mut weapon = WeaponState::new(WeaponKind::Plasma);
        weapon.fire(Vec3::ZERO);
        weapon.fire(Vec3::ZERO);

        let mut w = StateWriter::new();
        weapon.write_state(&mut w).expect("write");
        let bytes = w.finish();

        let mut fresh = WeaponState::new(WeaponKind::Plasma);
        fresh
            .read_state(&mut StateReader::new(&bytes))
            .expect("read");
        assert_eq!(fresh.ammo, WeaponKind::Plasma.magazine() - 2);
    }
}
