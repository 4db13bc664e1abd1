//! Channel multiplexing for the replication traffic over QUIC.
//!
//! Creation and teardown ride reliable-ordered streams; the periodic state
//! sync and client commands ride datagrams, since a lost delta is healed by
//! the next dirty flush.

use anyhow::{Context, Result};
use quinn::Connection;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Channel type identifier for frame routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ChannelType {
    /// Handshake, creation and destroy packets (reliable, ordered).
    Control = 0,
    /// Dirty-only state deltas, host to client (unreliable).
    StateSync = 1,
    /// Player commands, client to host (unreliable).
    Command = 2,
}

impl ChannelType {
    /// Check if this channel type should use reliable delivery.
    pub fn is_reliable(&self) -> bool {
        matches!(self, ChannelType::Control)
    }
}

impl TryFrom<u8> for ChannelType {
    type Error = anyhow::Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(ChannelType::Control),
            1 => Ok(ChannelType::StateSync),
            2 => Ok(ChannelType::Command),
            _ => Err(anyhow::anyhow!("Invalid channel type: {}", value)),
        }
    }
}

/// Multiplexed channel manager for one QUIC connection.
pub struct ChannelManager {
    connection: Connection,
}

impl ChannelManager {
    /// Create a new channel manager for the given connection.
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    /// Send a frame on a reliable channel (QUIC stream).
    ///
    /// Opens a new unidirectional stream per frame.
    pub async fn send_reliable(&self, channel: ChannelType, data: &[u8]) -> Result<()> {
        debug_assert!(channel.is_reliable(), "Channel {:?} is not reliable", channel);

        trace!("Sending {} bytes on reliable {:?}", data.len(), channel);

        let mut send_stream = self
            .connection
            .open_uni()
            .await
            .context("Failed to open unidirectional stream")?;

        send_stream
            .write_all(&[channel as u8])
            .await
            .context("Failed to write channel type")?;

        let len = data.len() as u32;
        send_stream
            .write_all(&len.to_le_bytes())
            .await
            .context("Failed to write length prefix")?;

        send_stream
            .write_all(data)
            .await
            .context("Failed to write data")?;

        send_stream.finish().context("Failed to finish stream")?;

        Ok(())
    }

    /// Send a frame on an unreliable channel (QUIC datagram).
    pub async fn send_unreliable(&self, channel: ChannelType, data: &[u8]) -> Result<()> {
        debug_assert!(!channel.is_reliable(), "Channel {:?} is reliable", channel);

        trace!("Sending {} bytes on unreliable {:?}", data.len(), channel);

        // Datagram layout: [channel_type: u8][data: bytes]
        let mut datagram = Vec::with_capacity(1 + data.len());
        datagram.push(channel as u8);
        datagram.extend_from_slice(data);

        self.connection
            .send_datagram(datagram.into())
            .context("Failed to send datagram")?;

        Ok(())
    }

    /// Receive the next frame on a reliable channel (QUIC stream).
    pub async fn recv_reliable(&self) -> Result<(ChannelType, Vec<u8>)> {
        let mut recv_stream = self
            .connection
            .accept_uni()
            .await
            .context("Failed to accept unidirectional stream")?;

        let mut channel_byte = [0u8; 1];
        recv_stream
            .read_exact(&mut channel_byte)
            .await
            .context("Failed to read channel type")?;
        let channel = ChannelType::try_from(channel_byte[0])?;

        let mut len_bytes = [0u8; 4];
        recv_stream
            .read_exact(&mut len_bytes)
            .await
            .context("Failed to read length prefix")?;
        let len = u32::from_le_bytes(len_bytes) as usize;

        let mut data = vec![0u8; len];
        recv_stream
            .read_exact(&mut data)
            .await
            .context("Failed to read data")?;

        trace!("Received {} bytes on reliable {:?}", data.len(), channel);

        Ok((channel, data))
    }

    /// Receive the next frame on an unreliable channel (QUIC datagram).
    pub async fn recv_unreliable(&self) -> Result<(ChannelType, Vec<u8>)> {
        let datagram = self
            .connection
            .read_datagram()
            .await
            .context("Failed to read datagram")?;

        if datagram.is_empty() {
            return Err(anyhow::anyhow!("Received empty datagram"));
        }

        let channel = ChannelType::try_from(datagram[0])?;
        let data = datagram[1..].to_vec();

        trace!("Received {} bytes on unreliable {:?}", data.len(), channel);

        Ok((channel, data))
    }

    /// Get the remote address of this connection.
    pub fn remote_address(&self) -> std::net::SocketAddr {
        self.connection.remote_address()
    }

    /// Close the connection gracefully.
    pub fn close(&self, reason: &str) {
        self.connection.close(0u32.into(), reason.as_bytes());
    }
}
