//! Frame encoding and decoding with length prefixes.
//!
//! Frame format: `[length: u32][packet_id: u8][payload: postcard bytes]`.
//! The packet id rides outside the payload so the dispatch table can route
//! a frame without decoding it first.

use crate::error::NetError;
use crate::protocol::{PacketId, PROTOCOL_MAGIC, PROTOCOL_VERSION};
use blake3::Hash;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Compute the schema hash from the protocol definitions.
///
/// Exchanged during the handshake to reject incompatible builds before any
/// replication traffic flows.
pub fn compute_schema_hash() -> u64 {
    let mut hasher = blake3::Hasher::new();

    hasher.update(&PROTOCOL_VERSION.to_le_bytes());
    hasher.update(PROTOCOL_MAGIC);

    // Message type names, deterministic order.
    hasher.update(b"ClientHello");
    hasher.update(b"HostWelcome");
    hasher.update(b"CreateObjectPacket");
    hasher.update(b"DestroyObjectPacket");
    hasher.update(b"StateSyncPacket");
    hasher.update(b"PlayerCommandPacket");

    let hash: Hash = hasher.finalize();
    u64::from_le_bytes(
        hash.as_bytes()[0..8]
            .try_into()
            .expect("blake3 output is at least 8 bytes"),
    )
}

/// Encode a payload into a framed packet.
pub fn encode_frame<T: Serialize>(id: PacketId, payload: &T) -> Result<Vec<u8>, NetError> {
    let bytes = postcard::to_allocvec(payload)?;

    let mut frame = Vec::with_capacity(4 + 1 + bytes.len());

    // Length excludes the length field itself.
    let length = (1 + bytes.len()) as u32;
    frame.extend_from_slice(&length.to_le_bytes());
    frame.push(id as u8);
    frame.extend_from_slice(&bytes);

    Ok(frame)
}

/// Split a framed packet into its raw identifier and payload bytes.
///
/// The identifier is returned raw rather than parsed: an unregistered id is
/// the dispatcher's business (logged and ignored), not a decode failure.
pub fn decode_frame(data: &[u8]) -> Result<(u8, &[u8]), NetError> {
    if data.len() < 5 {
        return Err(NetError::Protocol(format!(
            "frame too short: {} bytes (minimum 5)",
            data.len()
        )));
    }

    let length = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;

    if data.len() < 4 + length || length == 0 {
        return Err(NetError::Protocol(format!(
            "incomplete frame: expected {} bytes, got {}",
            4 + length,
            data.len()
        )));
    }

    Ok((data[4], &data[5..4 + length]))
}

/// Decode the payload bytes of a routed frame.
pub fn decode_payload<T: DeserializeOwned>(payload: &[u8]) -> Result<T, NetError> {
    Ok(postcard::from_bytes(payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ClientHello, StateEntry, StateSyncPacket};
    use crate::NetworkId;

    #[test]
    fn schema_hash_is_deterministic_and_non_zero() {
        let a = compute_schema_hash();
        let b = compute_schema_hash();
        assert_eq!(a, b);
        assert_ne!(a, 0);
    }

    #[test]
    fn frame_roundtrips() {
        let hello = ClientHello {
            version: PROTOCOL_VERSION,
            schema_hash: compute_schema_hash(),
            nickname: "ada".to_string(),
        };

        let frame = encode_frame(PacketId::Hello, &hello).expect("encode");
        let (raw_id, payload) = decode_frame(&frame).expect("decode");

        assert_eq!(raw_id, PacketId::Hello as u8);
        let decoded: ClientHello = decode_payload(payload).expect("payload");
        assert_eq!(decoded, hello);
    }

    #[test]
    fn sync_frame_roundtrips() {
        let packet = StateSyncPacket {
            seq: 7,
            entries: vec![StateEntry {
                id: NetworkId(3),
                bytes: vec![1, 2, 3],
            }],
        };

        let frame = encode_frame(PacketId::StateSync, &packet).expect("encode");
        let (raw_id, payload) = decode_frame(&frame).expect("decode");

        assert_eq!(PacketId::from_u8(raw_id), Some(PacketId::StateSync));
        let decoded: StateSyncPacket = decode_payload(payload).expect("payload");
        assert_eq!(decoded, packet);
    }

    #[test]
    fn short_frames_are_rejected() {
        assert!(decode_frame(&[]).is_err());
        assert!(decode_frame(&[1, 2, 3]).is_err());
    }

    #[test]
    fn truncated_frames_are_rejected() {
        // Length field claims 10 bytes with none following.
        let data = [10u8, 0, 0, 0];
        assert!(decode_frame(&data).is_err());
    }
}
