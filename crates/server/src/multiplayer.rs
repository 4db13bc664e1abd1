//! The host process: connection admission, the authoritative tick loop,
//! and outbound frame delivery.
//!
//! Networking is split across tasks: one task feeds accepted QUIC
//! connections into the admission queue, and every admitted client gets a
//! pair of reader tasks pumping its frames into the event queue. The tick
//! loop itself stays single-threaded; the session never sees a socket.

use anyhow::{Context, Result};
use skirmish_core::{ConnectionId, SimTick, DEFAULT_TICK_RATE};
use skirmish_game::{register_handlers, GameSession, Recipient};
use skirmish_net::{HostConnection, PacketDispatcher, ServerEndpoint};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

/// Frames and lifecycle notifications flowing from reader tasks to the
/// tick loop.
enum NetEvent {
    /// A complete frame received from a client.
    Frame(ConnectionId, Vec<u8>),
    /// The client's connection died (either receive path).
    Disconnected(ConnectionId),
}

/// Client state tracked by the host.
pub struct ConnectedClient {
    connection: Arc<HostConnection>,
    addr: SocketAddr,
    nickname: String,
}

impl ConnectedClient {
    /// Remote address of the client.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Nickname carried in the handshake.
    pub fn nickname(&self) -> &str {
        &self.nickname
    }
}

/// Authoritative host: endpoint, session, and connected clients.
pub struct HostServer {
    session: GameSession,
    dispatcher: PacketDispatcher<GameSession>,
    clients: HashMap<ConnectionId, ConnectedClient>,
    next_conn: u32,
    tick_rate: u32,
    local_addr: SocketAddr,
    conn_rx: Option<mpsc::UnboundedReceiver<quinn::Connection>>,
    events_tx: mpsc::UnboundedSender<NetEvent>,
    events_rx: mpsc::UnboundedReceiver<NetEvent>,
}

impl HostServer {
    /// Bind the endpoint and spawn the host's own avatar.
    ///
    /// The accept task starts immediately; admitted connections queue up
    /// until [`HostServer::run`] (or [`HostServer::accept_one`]) drains
    /// them.
    pub fn bind(addr: SocketAddr, seed: u64, nickname: &str) -> Result<Self> {
        let endpoint = Arc::new(ServerEndpoint::bind(addr)?);
        let local_addr = endpoint.local_addr();

        let (conn_tx, conn_rx) = mpsc::unbounded_channel();
        tokio::spawn(accept_loop(endpoint, conn_tx));

        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let mut dispatcher = PacketDispatcher::new();
        register_handlers(&mut dispatcher);

        let mut session = GameSession::host(seed);
        session.host_spawn_score_table()?;
        session.host_spawn_player(ConnectionId::HOST, nickname)?;

        info!(%local_addr, "Host ready");
        Ok(Self {
            session,
            dispatcher,
            clients: HashMap::new(),
            next_conn: ConnectionId::HOST.0 + 1,
            tick_rate: DEFAULT_TICK_RATE,
            local_addr,
            conn_rx: Some(conn_rx),
            events_tx,
            events_rx,
        })
    }

    /// Address the endpoint is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The authoritative session.
    pub fn session(&self) -> &GameSession {
        &self.session
    }

    /// Mutable access to the authoritative session.
    pub fn session_mut(&mut self) -> &mut GameSession {
        &mut self.session
    }

    /// Number of admitted clients.
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Override the simulation rate before [`HostServer::run`].
    pub fn set_tick_rate(&mut self, tick_rate: u32) {
        self.tick_rate = tick_rate.max(1);
    }

    /// Drive the match until the endpoint closes.
    pub async fn run(&mut self) -> Result<()> {
        let mut conn_rx = self
            .conn_rx
            .take()
            .context("Host loop already running")?;
        let mut interval =
            tokio::time::interval(Duration::from_millis(1000 / u64::from(self.tick_rate)));
        loop {
            tokio::select! {
                maybe_conn = conn_rx.recv() => {
                    let Some(connection) = maybe_conn else {
                        info!("Endpoint closed, shutting down");
                        return Ok(());
                    };
                    if let Err(e) = self.admit(connection).await {
                        warn!("Admission failed: {e:#}");
                    }
                }
                _ = interval.tick() => {
                    self.tick().await?;
                }
            }
        }
    }

    /// Await and admit exactly one queued connection.
    pub async fn accept_one(&mut self) -> Result<ConnectionId> {
        let connection = self
            .conn_rx
            .as_mut()
            .context("Admission queue moved into the run loop")?
            .recv()
            .await
            .context("Endpoint closed")?;
        self.admit(connection).await
    }

    /// Run one simulation step: drain the network events, tick the
    /// session, deliver its outbound mail.
    #[instrument(skip(self), fields(tick = self.session.tick_count().0, clients = self.clients.len()))]
    pub async fn tick(&mut self) -> Result<()> {
        while let Ok(event) = self.events_rx.try_recv() {
            match event {
                NetEvent::Frame(from, frame) => self.session.enqueue_inbound(from, frame),
                NetEvent::Disconnected(conn) => self.drop_client(conn)?,
            }
        }

        self.session.tick(&mut self.dispatcher)?;
        self.flush_outbound().await;
        Ok(())
    }

    /// Handshake a fresh connection and fold it into the match.
    #[instrument(skip(self, connection), fields(addr = %connection.remote_address()))]
    async fn admit(&mut self, connection: quinn::Connection) -> Result<ConnectionId> {
        let addr = connection.remote_address();
        let host_conn = HostConnection::new(connection);
        let hello = host_conn.accept_handshake().await?;

        let conn_id = ConnectionId(self.next_conn);
        self.next_conn += 1;
        host_conn.welcome(conn_id).await?;
        info!(%conn_id, nickname = %hello.nickname, "Client admitted");

        let connection = Arc::new(host_conn);
        spawn_readers(conn_id, connection.clone(), self.events_tx.clone());
        self.clients.insert(
            conn_id,
            ConnectedClient {
                connection,
                addr,
                nickname: hello.nickname.clone(),
            },
        );

        // Replay the existing world first; the new avatar's own creation
        // then arrives as a regular broadcast like everyone else's.
        self.session.host_catch_up(conn_id)?;
        self.session.host_spawn_player(conn_id, &hello.nickname)?;
        self.flush_outbound().await;
        Ok(conn_id)
    }

    /// Tear down a dead client on both the session and the socket side.
    fn drop_client(&mut self, conn: ConnectionId) -> Result<()> {
        let Some(client) = self.clients.remove(&conn) else {
            return Ok(());
        };
        info!(%conn, nickname = %client.nickname, "Client disconnected");
        client.connection.close("Disconnected");
        self.session.host_despawn_connection(conn)?;
        Ok(())
    }

    /// Deliver everything the session queued since the last flush.
    async fn flush_outbound(&mut self) {
        for outbound in self.session.take_outbound() {
            match outbound.recipient {
                Recipient::Broadcast => {
                    for (conn, client) in &self.clients {
                        if let Err(e) = client.connection.send_frame(&outbound.frame).await {
                            debug!(%conn, "Broadcast send failed: {e:#}");
                        }
                    }
                }
                Recipient::Peer(conn) => {
                    let Some(client) = self.clients.get(&conn) else {
                        debug!(%conn, "Frame addressed to a departed client, dropping");
                        continue;
                    };
                    if let Err(e) = client.connection.send_frame(&outbound.frame).await {
                        debug!(%conn, "Send failed: {e:#}");
                    }
                }
            }
        }
    }

    /// Current simulation tick.
    pub fn current_tick(&self) -> SimTick {
        self.session.tick_count()
    }
}

/// Forward accepted QUIC connections into the admission queue.
async fn accept_loop(
    endpoint: Arc<ServerEndpoint>,
    conn_tx: mpsc::UnboundedSender<quinn::Connection>,
) {
    while let Some(incoming) = endpoint.accept().await {
        let addr = incoming.remote_address();
        match incoming.await {
            Ok(connection) => {
                if conn_tx.send(connection).is_err() {
                    return;
                }
            }
            Err(e) => warn!(%addr, "Connection failed during setup: {e}"),
        }
    }
}

/// One reader task per receive path; both feed the same event queue and
/// both report the death of the connection.
fn spawn_readers(
    conn: ConnectionId,
    connection: Arc<HostConnection>,
    events: mpsc::UnboundedSender<NetEvent>,
) {
    let control = connection.clone();
    let control_events = events.clone();
    tokio::spawn(async move {
        loop {
            match control.recv_control().await {
                Ok(frame) => {
                    if control_events.send(NetEvent::Frame(conn, frame)).is_err() {
                        return;
                    }
                }
                Err(e) => {
                    debug!(%conn, "Control stream closed: {e:#}");
                    let _ = control_events.send(NetEvent::Disconnected(conn));
                    return;
                }
            }
        }
    });

    tokio::spawn(async move {
        loop {
            match connection.recv_datagram().await {
                Ok(frame) => {
                    if events.send(NetEvent::Frame(conn, frame)).is_err() {
                        return;
                    }
                }
                Err(e) => {
                    debug!(%conn, "Datagram path closed: {e:#}");
                    let _ = events.send(NetEvent::Disconnected(conn));
                    return;
                }
            }
        }
    });
}
