#![warn(missing_docs)]
//! Replicated gameplay entities and the session that drives them.
//!
//! The host constructs entities, binds their identities and broadcasts
//! creation packets; clients hold local shadows and accept authoritative
//! state unconditionally. Everything runs on the single tick thread — the
//! inbound queue is drained at the start of a tick, fully, before any
//! gameplay update sees the frame.

mod authority;
mod combat;
mod creation;
mod entity;
mod player;
mod score;
mod session;
mod sync;
mod weapon;

pub use authority::{host_write_check, AuthorityPolicy};
pub use combat::explosion_damage;
pub use creation::{apply_create_object, build_creation_packet};
pub use entity::{Entity, EntityArena, EntityHandle, Registry, ReplicaPart, ReplicaRef};
pub use player::{HealthState, PlayerEntity, TransformState, MAX_HEALTH, MAX_SHIELD};
pub use score::{ScoreEntry, ScoreSystem};
pub use session::{register_handlers, GameSession, Outbound, Recipient};
pub use sync::{apply_state_sync, flush_dirty};
pub use weapon::{WeaponKind, WeaponState, MAX_IMPACT_EVENTS};
