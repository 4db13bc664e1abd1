//! The client loop: handshake, shadow-world maintenance, input forwarding.
//!
//! Reader tasks pump received frames into a queue the tick drains; the
//! session applies them through the same dispatch table the host uses.
//! Outbound traffic is only ever commands addressed to the host.

use anyhow::{Context, Result};
use glam::Vec3;
use skirmish_core::{ConnectionId, SimTick};
use skirmish_game::{register_handlers, GameSession, Recipient};
use skirmish_net::{ClientConnection, ClientEndpoint, PacketDispatcher, PlayerCommand};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

/// A connected client: transport, shadow session, and dispatch table.
pub struct MultiplayerClient {
    // The endpoint owns the UDP socket; dropping it kills the connection.
    _endpoint: ClientEndpoint,
    connection: Arc<ClientConnection>,
    session: GameSession,
    dispatcher: PacketDispatcher<GameSession>,
    frames_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    connected: bool,
}

impl MultiplayerClient {
    /// Connect to a host, complete the handshake, and start mirroring.
    #[instrument(skip(nickname))]
    pub async fn connect(server_addr: SocketAddr, nickname: &str) -> Result<Self> {
        let endpoint = ClientEndpoint::new()?;
        let connection = endpoint
            .connect(server_addr)
            .await
            .context("Failed to reach host")?;
        let connection = Arc::new(ClientConnection::new(connection));

        let conn_id = connection.handshake(nickname).await?;
        info!(%conn_id, "Joined match");

        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        spawn_readers(connection.clone(), frames_tx);

        let mut dispatcher = PacketDispatcher::new();
        register_handlers(&mut dispatcher);

        Ok(Self {
            _endpoint: endpoint,
            connection,
            session: GameSession::client(conn_id, nickname),
            dispatcher,
            frames_rx,
            connected: true,
        })
    }

    /// The local shadow session.
    pub fn session(&self) -> &GameSession {
        &self.session
    }

    /// Mutable access to the local shadow session.
    pub fn session_mut(&mut self) -> &mut GameSession {
        &mut self.session
    }

    /// This client's connection id.
    pub fn conn_id(&self) -> ConnectionId {
        self.session.local_conn()
    }

    /// Whether the connection to the host is still up.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Current local tick.
    pub fn current_tick(&self) -> SimTick {
        self.session.tick_count()
    }

    /// Move the local avatar; applied immediately as prediction and sent
    /// to the host for adoption.
    pub fn move_to(&mut self, pos: Vec3) -> Result<()> {
        self.session
            .send_command(PlayerCommand::Move {
                pos: pos.to_array(),
            })
            .map_err(Into::into)
    }

    /// Fire the weapon in `slot` at `hit_point`, optionally claiming a hit
    /// on `target`'s avatar. Resolution happens on the host.
    pub fn fire(
        &mut self,
        slot: u8,
        hit_point: Vec3,
        target: Option<ConnectionId>,
    ) -> Result<()> {
        self.session
            .send_command(PlayerCommand::Fire {
                slot,
                hit_point: hit_point.to_array(),
                target,
            })
            .map_err(Into::into)
    }

    /// Run one client step: drain received frames, tick the session, send
    /// queued commands.
    pub async fn tick(&mut self) -> Result<()> {
        loop {
            match self.frames_rx.try_recv() {
                Ok(frame) => self.session.enqueue_inbound(ConnectionId::HOST, frame),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    if self.connected {
                        warn!("Connection to host lost");
                        self.connected = false;
                    }
                    break;
                }
            }
        }

        self.session.tick(&mut self.dispatcher)?;

        for outbound in self.session.take_outbound() {
            // A client's mail is always for the host.
            debug_assert!(matches!(
                outbound.recipient,
                Recipient::Peer(ConnectionId::HOST)
            ));
            if let Err(e) = self.connection.send_frame(&outbound.frame).await {
                debug!("Send to host failed: {e:#}");
            }
        }
        Ok(())
    }

    /// Drive the client until the connection drops.
    pub async fn run(&mut self, tick_rate: u32) -> Result<()> {
        let mut interval =
            tokio::time::interval(Duration::from_millis(1000 / u64::from(tick_rate.max(1))));
        while self.connected {
            interval.tick().await;
            self.tick().await?;
        }
        Ok(())
    }

    /// Leave the match.
    pub fn disconnect(&mut self, reason: &str) {
        self.connection.close(reason);
        self.connected = false;
    }
}

/// Reader tasks for both receive paths; the queue closing signals loss of
/// the connection to the tick loop.
fn spawn_readers(connection: Arc<ClientConnection>, frames: mpsc::UnboundedSender<Vec<u8>>) {
    let control = connection.clone();
    let control_frames = frames.clone();
    tokio::spawn(async move {
        loop {
            match control.recv_control().await {
                Ok(frame) => {
                    if control_frames.send(frame).is_err() {
                        return;
                    }
                }
                Err(e) => {
                    debug!("Control stream closed: {e:#}");
                    return;
                }
            }
        }
    });

    tokio::spawn(async move {
        loop {
            match connection.recv_datagram().await {
                Ok(frame) => {
                    if frames.send(frame).is_err() {
                        return;
                    }
                }
                Err(e) => {
                    debug!("Datagram path closed: {e:#}");
                    return;
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use skirmish_server::HostServer;

    /// Full join against a live host: handshake, catch-up, first delta.
    #[tokio::test]
    async fn client_mirrors_the_host_world() {
        let mut server =
            HostServer::bind("127.0.0.1:0".parse().unwrap(), 7, "host").expect("bind");
        let server_addr = server.local_addr();

        let connect = tokio::spawn(async move {
            MultiplayerClient::connect(server_addr, "ada")
                .await
                .expect("connect")
        });
        server.accept_one().await.expect("admit");
        let mut client = connect.await.expect("join");
        assert_eq!(client.conn_id(), ConnectionId(1));

        // Let the snapshot datagram land, then apply everything.
        for _ in 0..20 {
            server.tick().await.expect("server tick");
            client.tick().await.expect("client tick");
            if client.session().arena().len() == 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        // Score table plus two avatars, own avatar bound in place.
        assert_eq!(client.session().arena().len(), 3);
        let own = client
            .session()
            .arena()
            .player_by_owner(ConnectionId(1))
            .expect("own avatar");
        match client.session().arena().get(own) {
            Some(skirmish_game::Entity::Player(player)) => assert!(player.is_bound()),
            _ => panic!("expected own player"),
        }
        assert!(client.session().scores().is_some());

        client.disconnect("Test complete");
    }

    #[tokio::test]
    async fn move_command_reaches_the_host() {
        let mut server =
            HostServer::bind("127.0.0.1:0".parse().unwrap(), 7, "host").expect("bind");
        let server_addr = server.local_addr();

        let connect = tokio::spawn(async move {
            MultiplayerClient::connect(server_addr, "ada")
                .await
                .expect("connect")
        });
        server.accept_one().await.expect("admit");
        let mut client = connect.await.expect("join");

        client.move_to(Vec3::new(3.0, 0.0, -2.0)).expect("command");
        client.tick().await.expect("send");

        let target = Vec3::new(3.0, 0.0, -2.0);
        let mut adopted = Vec3::ZERO;
        for _ in 0..20 {
            server.tick().await.expect("server tick");
            adopted = server
                .session_mut()
                .arena_mut()
                .player_by_owner_mut(ConnectionId(1))
                .expect("player")
                .transform
                .pos;
            if adopted == target {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(adopted, target);

        client.disconnect("Test complete");
    }
}
