//! Packet definitions for the replication protocol.
//!
//! All payloads use postcard serialization for compact binary encoding.
//! Packet identifiers are a small closed enumeration starting after a
//! reserved base value; values must stay stable for the lifetime of a
//! protocol version.

use serde::{Deserialize, Serialize};
use skirmish_core::ConnectionId;

use crate::identity::NetworkId;

/// Protocol version for compatibility checking.
pub const PROTOCOL_VERSION: u16 = 1;

/// Protocol magic bytes mixed into the schema hash.
pub const PROTOCOL_MAGIC: &[u8; 8] = b"SKRM\x00\x01\x00\x00";

/// First packet identifier; everything below is reserved for the transport.
pub const PACKET_ID_BASE: u8 = 0x40;

/// Maximum nickname length accepted in a handshake (bytes).
pub const MAX_NICKNAME_LEN: usize = 32;

/// Maximum `(id, bytes)` entries in one state-sync packet.
pub const MAX_STATE_ENTRIES: usize = 256;

/// Maximum encoded bytes for a single state entry.
pub const MAX_STATE_ENTRY_BYTES: usize = 4096;

/// Maximum identities a destroy packet may release at once.
pub const MAX_DESTROY_IDS: usize = 64;

/// Weapon slots every player entity owns.
pub const WEAPON_SLOTS: usize = 4;

/// Closed set of packet identifiers, the dispatch-table key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum PacketId {
    /// Client handshake request (reliable).
    Hello = PACKET_ID_BASE,
    /// Host handshake response (reliable).
    Welcome = PACKET_ID_BASE + 1,
    /// Announce a new replicated entity and its owned identities (reliable).
    CreateObject = PACKET_ID_BASE + 2,
    /// Announce entity teardown, releasing its identities (reliable).
    DestroyObject = PACKET_ID_BASE + 3,
    /// Periodic dirty-only delta of authoritative state (unreliable).
    StateSync = PACKET_ID_BASE + 4,
    /// Client input destined for host-side resolution (unreliable).
    PlayerCommand = PACKET_ID_BASE + 5,
}

impl PacketId {
    /// Parse a raw identifier. Unknown values are the caller's problem; the
    /// dispatcher logs and ignores them rather than failing the connection.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            v if v == PacketId::Hello as u8 => Some(PacketId::Hello),
            v if v == PacketId::Welcome as u8 => Some(PacketId::Welcome),
            v if v == PacketId::CreateObject as u8 => Some(PacketId::CreateObject),
            v if v == PacketId::DestroyObject as u8 => Some(PacketId::DestroyObject),
            v if v == PacketId::StateSync as u8 => Some(PacketId::StateSync),
            v if v == PacketId::PlayerCommand as u8 => Some(PacketId::PlayerCommand),
            _ => None,
        }
    }
}

/// Closed enumeration distinguishing entity kinds in creation packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectTypeTag {
    /// A player avatar with its owned transform/health/weapon identities.
    Player,
    /// The session-wide score table.
    ScoreTable,
}

/// Client handshake request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientHello {
    /// Protocol version.
    pub version: u16,
    /// Schema hash for compatibility.
    pub schema_hash: u64,
    /// Display name for the score table.
    pub nickname: String,
}

impl ClientHello {
    /// Verify message limits. Called on every received hello.
    pub fn verify(&self) -> Result<(), &'static str> {
        if self.nickname.len() > MAX_NICKNAME_LEN {
            return Err("Nickname too long");
        }
        Ok(())
    }
}

/// Host handshake response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HostWelcome {
    /// Whether the handshake was accepted.
    pub accepted: bool,
    /// Reason for rejection (if not accepted).
    pub reason: Option<String>,
    /// Connection id assigned to the client.
    pub connection_id: Option<ConnectionId>,
}

impl HostWelcome {
    /// Verify message limits.
    pub fn verify(&self) -> Result<(), &'static str> {
        if let Some(reason) = &self.reason {
            if reason.len() > 256 {
                return Err("Rejection reason too long");
            }
        }
        Ok(())
    }
}

/// Header preceding every type-specific creation payload.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CreationPacketHeader {
    /// Connection that owns the new entity (the host for world objects).
    pub owner: ConnectionId,
    /// Entity kind, selecting the constructor on the receiving side.
    pub tag: ObjectTypeTag,
}

/// Identity payload for a newly created player.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerCreation {
    /// Identity of the player's replicated transform.
    pub transform_id: NetworkId,
    /// Identity of the player's replicated health/shield state.
    pub health_id: NetworkId,
    /// Identities of the player's four weapons, slot order.
    pub weapon_ids: [NetworkId; WEAPON_SLOTS],
    /// Host-selected spawn position.
    pub spawn_pos: [f32; 3],
    /// Display name carried from the handshake.
    pub nickname: String,
}

/// Identity payload for the session score table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ScoreTableCreation {
    /// Identity of the replicated score table.
    pub table_id: NetworkId,
}

/// Announces a new replicated entity and every identity it owns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateObjectPacket {
    /// Owner and entity kind.
    pub header: CreationPacketHeader,
    /// Type-specific identity payload.
    pub payload: CreationPayload,
}

/// Type-specific creation payloads, one variant per [`ObjectTypeTag`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum CreationPayload {
    /// Payload for [`ObjectTypeTag::Player`].
    Player(PlayerCreation),
    /// Payload for [`ObjectTypeTag::ScoreTable`].
    ScoreTable(ScoreTableCreation),
}

impl CreateObjectPacket {
    /// Verify limits and that the header tag matches the payload variant.
    pub fn verify(&self) -> Result<(), &'static str> {
        match (&self.header.tag, &self.payload) {
            (ObjectTypeTag::Player, CreationPayload::Player(player)) => {
                if player.nickname.len() > MAX_NICKNAME_LEN {
                    return Err("Nickname too long");
                }
                let mut ids = vec![player.transform_id, player.health_id];
                ids.extend_from_slice(&player.weapon_ids);
                if ids.iter().any(|id| !id.is_bound()) {
                    return Err("Creation payload carries an unbound identity");
                }
                Ok(())
            }
            (ObjectTypeTag::ScoreTable, CreationPayload::ScoreTable(table)) => {
                if !table.table_id.is_bound() {
                    return Err("Creation payload carries an unbound identity");
                }
                Ok(())
            }
            _ => Err("Creation header tag does not match payload"),
        }
    }
}

/// Announces entity teardown; every listed identity is released.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DestroyObjectPacket {
    /// Connection that owned the entity.
    pub owner: ConnectionId,
    /// Kind of the destroyed entity.
    pub tag: ObjectTypeTag,
    /// Every identity the entity owned.
    pub ids: Vec<NetworkId>,
}

impl DestroyObjectPacket {
    /// Verify message limits.
    pub fn verify(&self) -> Result<(), &'static str> {
        if self.ids.len() > MAX_DESTROY_IDS {
            return Err("Too many identities in destroy packet");
        }
        Ok(())
    }
}

/// One replica's contribution to a state-sync packet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateEntry {
    /// Identity the bytes are addressed to.
    pub id: NetworkId,
    /// Entity-specific encoded state.
    pub bytes: Vec<u8>,
}

/// Periodic host-to-client delta carrying every dirty replica this tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateSyncPacket {
    /// Monotonic emission counter, strictly increasing per packet the host
    /// sends. Snapshots and deltas share the counter, so receivers can
    /// drop reordered packets by comparing against the last applied value.
    pub seq: u64,
    /// Concatenated `(id, bytes)` pairs, ascending id order.
    pub entries: Vec<StateEntry>,
}

impl StateSyncPacket {
    /// Verify message limits. Called on every received sync packet.
    pub fn verify(&self) -> Result<(), &'static str> {
        if self.entries.len() > MAX_STATE_ENTRIES {
            return Err("Too many state entries");
        }
        for entry in &self.entries {
            if entry.bytes.len() > MAX_STATE_ENTRY_BYTES {
                return Err("State entry too large");
            }
            if !entry.id.is_bound() {
                return Err("State entry addressed to the unbound sentinel");
            }
        }
        Ok(())
    }
}

/// Client input the host resolves in strict per-connection FIFO order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum PlayerCommand {
    /// Predicted movement; the host adopts it as the player's position.
    Move {
        /// New position of the player avatar.
        pos: [f32; 3],
    },
    /// Fire the weapon in `slot` at `hit_point`.
    Fire {
        /// Weapon slot index (0..[`WEAPON_SLOTS`]).
        slot: u8,
        /// World-space impact position.
        hit_point: [f32; 3],
        /// Peer whose avatar was hit, if any.
        target: Option<ConnectionId>,
    },
}

/// Envelope for a [`PlayerCommand`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerCommandPacket {
    /// Client tick the command was issued on.
    pub tick: u64,
    /// The command itself.
    pub command: PlayerCommand,
}

impl PlayerCommandPacket {
    /// Verify message limits and field ranges.
    pub fn verify(&self) -> Result<(), &'static str> {
        if let PlayerCommand::Fire { slot, .. } = self.command {
            if usize::from(slot) >= WEAPON_SLOTS {
                return Err("Weapon slot out of range");
            }
        }
        Ok(())
    }
}
