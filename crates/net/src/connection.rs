//! High-level connection management integrating transport, channels, and
//! the handshake.
//!
//! Frames produced by the session are routed to the right channel by
//! peeking the packet id; the receive side hands raw frames back so the
//! dispatch table stays the single routing point.

use crate::channel::{ChannelManager, ChannelType};
use crate::codec::{compute_schema_hash, decode_frame, decode_payload, encode_frame};
use crate::protocol::{ClientHello, HostWelcome, PacketId, PROTOCOL_VERSION};
use anyhow::Result;
use skirmish_core::ConnectionId;
use std::net::SocketAddr;
use tracing::{debug, info, warn};

/// Pick the delivery channel for an already-encoded frame.
fn channel_for_frame(frame: &[u8]) -> ChannelType {
    match frame.get(4).copied().and_then(PacketId::from_u8) {
        Some(PacketId::StateSync) => ChannelType::StateSync,
        Some(PacketId::PlayerCommand) => ChannelType::Command,
        _ => ChannelType::Control,
    }
}

/// Client-side connection wrapping QUIC transport and protocol handling.
pub struct ClientConnection {
    channel_manager: ChannelManager,
    schema_hash: u64,
}

impl ClientConnection {
    /// Create a new client connection from a QUIC connection.
    pub fn new(connection: quinn::Connection) -> Self {
        Self {
            channel_manager: ChannelManager::new(connection),
            schema_hash: compute_schema_hash(),
        }
    }

    /// Perform the handshake with the host.
    ///
    /// Returns the connection id the host assigned on success.
    pub async fn handshake(&self, nickname: &str) -> Result<ConnectionId> {
        info!("Starting handshake with host");

        let hello = ClientHello {
            version: PROTOCOL_VERSION,
            schema_hash: self.schema_hash,
            nickname: nickname.to_string(),
        };
        let frame = encode_frame(PacketId::Hello, &hello)?;
        self.channel_manager
            .send_reliable(ChannelType::Control, &frame)
            .await?;

        let reply = self.recv_control().await?;
        let (raw_id, payload) = decode_frame(&reply)?;
        if PacketId::from_u8(raw_id) != Some(PacketId::Welcome) {
            anyhow::bail!("Expected Welcome frame, got packet id {raw_id:#x}");
        }

        let welcome: HostWelcome = decode_payload(payload)?;
        if !welcome.accepted {
            let reason = welcome
                .reason
                .unwrap_or_else(|| "Unknown reason".to_string());
            anyhow::bail!("Handshake rejected: {reason}");
        }
        let conn_id = welcome
            .connection_id
            .ok_or_else(|| anyhow::anyhow!("Host accepted but assigned no connection id"))?;

        info!("Handshake successful, assigned {}", conn_id);
        Ok(conn_id)
    }

    /// Send an encoded frame on its channel.
    pub async fn send_frame(&self, frame: &[u8]) -> Result<()> {
        let channel = channel_for_frame(frame);
        if channel.is_reliable() {
            self.channel_manager.send_reliable(channel, frame).await
        } else {
            self.channel_manager.send_unreliable(channel, frame).await
        }
    }

    /// Receive the next frame from the reliable control channel.
    pub async fn recv_control(&self) -> Result<Vec<u8>> {
        let (_channel, data) = self.channel_manager.recv_reliable().await?;
        Ok(data)
    }

    /// Receive the next frame from the unreliable channels.
    pub async fn recv_datagram(&self) -> Result<Vec<u8>> {
        let (_channel, data) = self.channel_manager.recv_unreliable().await?;
        Ok(data)
    }

    /// Get the remote host address.
    pub fn remote_address(&self) -> SocketAddr {
        self.channel_manager.remote_address()
    }

    /// Close the connection gracefully.
    pub fn close(&self, reason: &str) {
        info!("Closing connection: {}", reason);
        self.channel_manager.close(reason);
    }
}

/// Host-side connection wrapping QUIC transport and protocol handling.
pub struct HostConnection {
    channel_manager: ChannelManager,
    schema_hash: u64,
}

impl HostConnection {
    /// Create a new host-side connection from a QUIC connection.
    pub fn new(connection: quinn::Connection) -> Self {
        Self {
            channel_manager: ChannelManager::new(connection),
            schema_hash: compute_schema_hash(),
        }
    }

    /// Wait for and validate the client's hello.
    ///
    /// Returns the verified hello; a mismatch is rejected on the wire and
    /// surfaced as an error to the accept loop.
    pub async fn accept_handshake(&self) -> Result<ClientHello> {
        info!(
            "Waiting for hello from {}",
            self.channel_manager.remote_address()
        );

        let frame = self.recv_control().await?;
        let (raw_id, payload) = decode_frame(&frame)?;
        if PacketId::from_u8(raw_id) != Some(PacketId::Hello) {
            warn!("Expected Hello frame, got packet id {raw_id:#x}");
            self.reject("Expected hello").await?;
            anyhow::bail!("Expected Hello frame, got packet id {raw_id:#x}");
        }

        let hello: ClientHello = decode_payload(payload)?;
        debug!(
            "Received hello: version={}, schema_hash={:016x}, nickname={:?}",
            hello.version, hello.schema_hash, hello.nickname
        );

        if hello.version != PROTOCOL_VERSION {
            warn!(
                "Protocol version mismatch: client={}, host={}",
                hello.version, PROTOCOL_VERSION
            );
            self.reject(&format!(
                "Protocol version mismatch: host uses v{PROTOCOL_VERSION}"
            ))
            .await?;
            anyhow::bail!(
                "Protocol version mismatch: {} != {}",
                hello.version,
                PROTOCOL_VERSION
            );
        }

        if hello.schema_hash != self.schema_hash {
            warn!(
                "Schema hash mismatch: client={:016x}, host={:016x}",
                hello.schema_hash, self.schema_hash
            );
            self.reject("Schema mismatch: incompatible client version")
                .await?;
            anyhow::bail!(
                "Schema hash mismatch: {:016x} != {:016x}",
                hello.schema_hash,
                self.schema_hash
            );
        }

        if let Err(reason) = hello.verify() {
            self.reject(reason).await?;
            anyhow::bail!("Invalid hello: {reason}");
        }

        Ok(hello)
    }

    /// Accept the handshake, assigning `conn_id` to the client.
    pub async fn welcome(&self, conn_id: ConnectionId) -> Result<()> {
        let welcome = HostWelcome {
            accepted: true,
            reason: None,
            connection_id: Some(conn_id),
        };
        let frame = encode_frame(PacketId::Welcome, &welcome)?;
        self.channel_manager
            .send_reliable(ChannelType::Control, &frame)
            .await
    }

    /// Reject the handshake with a reason.
    async fn reject(&self, reason: &str) -> Result<()> {
        let welcome = HostWelcome {
            accepted: false,
            reason: Some(reason.to_string()),
            connection_id: None,
        };
        let frame = encode_frame(PacketId::Welcome, &welcome)?;
        self.channel_manager
            .send_reliable(ChannelType::Control, &frame)
            .await
    }

    /// Send an encoded frame on its channel.
    pub async fn send_frame(&self, frame: &[u8]) -> Result<()> {
        let channel = channel_for_frame(frame);
        if channel.is_reliable() {
            self.channel_manager.send_reliable(channel, frame).await
        } else {
            self.channel_manager.send_unreliable(channel, frame).await
        }
    }

    /// Receive the next frame from the reliable control channel.
    pub async fn recv_control(&self) -> Result<Vec<u8>> {
        let (_channel, data) = self.channel_manager.recv_reliable().await?;
        Ok(data)
    }

    /// Receive the next frame from the unreliable channels.
    pub async fn recv_datagram(&self) -> Result<Vec<u8>> {
        let (_channel, data) = self.channel_manager.recv_unreliable().await?;
        Ok(data)
    }

    /// Get the remote client address.
    pub fn remote_address(&self) -> SocketAddr {
        self.channel_manager.remote_address()
    }

    /// Close the connection gracefully.
    pub fn close(&self, reason: &str) {
        info!("Closing connection: {}", reason);
        self.channel_manager.close(reason);
    }
}
