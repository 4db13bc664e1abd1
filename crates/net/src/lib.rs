#![warn(missing_docs)]
//! Replication plumbing shared by the host and client loops.
//!
//! Leaves first: [`identity`] (session-unique ids), [`wire`] (the
//! serializable capability every replicated entity implements), then the
//! [`protocol`] packet types, [`codec`] framing, and the [`dispatch`] table
//! that routes inbound frames. [`transport`], [`channel`] and [`connection`]
//! wrap the QUIC layer the rest of the crate treats as opaque.

mod channel;
mod codec;
mod connection;
mod dispatch;
mod error;
mod identity;
mod protocol;
mod transport;
mod wire;

pub use channel::{ChannelManager, ChannelType};
pub use codec::{compute_schema_hash, decode_frame, decode_payload, encode_frame};
pub use connection::{ClientConnection, HostConnection};
pub use dispatch::PacketDispatcher;
pub use error::NetError;
pub use identity::{IdentityRegistry, NetworkId};
pub use protocol::{
    ClientHello, CreateObjectPacket, CreationPacketHeader, CreationPayload, DestroyObjectPacket,
    HostWelcome, ObjectTypeTag, PacketId, PlayerCommand, PlayerCommandPacket, PlayerCreation,
    ScoreTableCreation, StateEntry, StateSyncPacket, MAX_DESTROY_IDS, MAX_NICKNAME_LEN,
    MAX_STATE_ENTRIES, MAX_STATE_ENTRY_BYTES, PACKET_ID_BASE, PROTOCOL_VERSION, WEAPON_SLOTS,
};
pub use transport::{ClientEndpoint, ServerEndpoint};
pub use wire::{Replicate, StateReader, StateWriter};
