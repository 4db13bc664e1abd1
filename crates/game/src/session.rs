//! The per-process game session: host-side spawning and command
//! resolution, client-side shadow maintenance, and the tick loop gluing
//! the two to the packet queues.
//!
//! The session never touches sockets. Inbound frames are queued by the
//! transport layer and drained in strict per-connection FIFO order at the
//! start of each tick; outbound frames accumulate in a mailbox the
//! transport layer flushes after the tick. Handlers receive the session as
//! an explicit context through the dispatch table.

use glam::Vec3;
use rand::Rng;
use skirmish_core::{scoped_rng, ConnectionId, SimTick};
use skirmish_net::{
    decode_payload, encode_frame, CreateObjectPacket, DestroyObjectPacket, NetError,
    PacketDispatcher, PacketId, PlayerCommand, PlayerCommandPacket, StateSyncPacket,
};
use std::collections::VecDeque;
use tracing::{debug, info, warn};

use crate::authority::{host_write_check, AuthorityPolicy};
use crate::combat::explosion_damage;
use crate::creation::{apply_create_object, build_creation_packet};
use crate::entity::{Entity, EntityArena, EntityHandle, Registry, ReplicaPart, ReplicaRef};
use crate::player::PlayerEntity;
use crate::score::ScoreSystem;
use crate::sync::{apply_state_sync, flush_dirty, snapshot_all};

/// Fixed spawn points of the arena map; the host picks one per spawn.
const SPAWN_POINTS: [[f32; 3]; 8] = [
    [12.0, 0.0, 12.0],
    [-12.0, 0.0, 12.0],
    [12.0, 0.0, -12.0],
    [-12.0, 0.0, -12.0],
    [18.0, 4.0, 0.0],
    [-18.0, 4.0, 0.0],
    [0.0, 4.0, 18.0],
    [0.0, 4.0, -18.0],
];

/// Who an outbound frame is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    /// Every connected peer.
    Broadcast,
    /// One specific peer.
    Peer(ConnectionId),
}

/// One frame waiting in the outbound mailbox.
pub struct Outbound {
    /// Delivery target.
    pub recipient: Recipient,
    /// Complete framed packet, ready for the transport.
    pub frame: Vec<u8>,
}

/// State of one process's view of the match.
pub struct GameSession {
    is_host: bool,
    local_conn: ConnectionId,
    seed: u64,
    tick: SimTick,
    policy: AuthorityPolicy,
    arena: EntityArena,
    registry: Registry,
    score_table: Option<EntityHandle>,
    // Host: stamp of the next sync packet. Client: last applied stamp.
    // Snapshots and deltas share the counter so neither can shadow the
    // other on the receiving side.
    sync_seq: u64,
    last_sync_seq: Option<u64>,
    inbound: VecDeque<(ConnectionId, Vec<u8>)>,
    outbound: Vec<Outbound>,
}

impl GameSession {
    /// Create the authoritative host session.
    pub fn host(seed: u64) -> Self {
        Self::new(true, ConnectionId::HOST, seed)
    }

    /// Create a client session for an accepted connection.
    ///
    /// The local avatar is constructed eagerly so the player can move the
    /// moment the match is visible; its identities stay unbound until the
    /// host's creation packet arrives and is folded onto it.
    pub fn client(local_conn: ConnectionId, nickname: &str) -> Self {
        let mut session = Self::new(false, local_conn, 0);
        session.arena.insert(Entity::Player(PlayerEntity::new(
            local_conn,
            nickname.to_string(),
            Vec3::ZERO,
        )));
        session
    }

    fn new(is_host: bool, local_conn: ConnectionId, seed: u64) -> Self {
        Self {
            is_host,
            local_conn,
            seed,
            tick: SimTick::ZERO,
            policy: AuthorityPolicy::default(),
            arena: EntityArena::new(),
            registry: Registry::new(),
            score_table: None,
            sync_seq: 0,
            last_sync_seq: None,
            inbound: VecDeque::new(),
            outbound: Vec::new(),
        }
    }

    /// Whether this session is the authoritative host.
    pub fn is_host(&self) -> bool {
        self.is_host
    }

    /// This process's connection id.
    pub fn local_conn(&self) -> ConnectionId {
        self.local_conn
    }

    /// Current simulation tick.
    pub fn tick_count(&self) -> SimTick {
        self.tick
    }

    /// The entity arena.
    pub fn arena(&self) -> &EntityArena {
        &self.arena
    }

    /// Mutable access to the entity arena.
    pub fn arena_mut(&mut self) -> &mut EntityArena {
        &mut self.arena
    }

    /// The identity registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The replicated score table, once it exists.
    pub fn scores(&self) -> Option<&ScoreSystem> {
        match self.arena.get(self.score_table?) {
            Some(Entity::ScoreTable(table)) => Some(table),
            _ => None,
        }
    }

    /// Queue one received frame for the next tick.
    pub fn enqueue_inbound(&mut self, from: ConnectionId, frame: Vec<u8>) {
        self.inbound.push_back((from, frame));
    }

    /// Drain the outbound mailbox for the transport layer.
    pub fn take_outbound(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.outbound)
    }

    fn queue_frame(&mut self, recipient: Recipient, id: PacketId, payload: &impl serde::Serialize) -> Result<(), NetError> {
        let frame = encode_frame(id, payload)?;
        self.outbound.push(Outbound { recipient, frame });
        Ok(())
    }

    /// Run one simulation step.
    ///
    /// Drains the inbound queue completely through the dispatch table, then
    /// (host only) flushes dirty state as a broadcast delta, then advances
    /// the tick. Fatal handler errors abort the step and leave the
    /// remaining queue untouched.
    pub fn tick(&mut self, dispatcher: &mut PacketDispatcher<GameSession>) -> Result<(), NetError> {
        let queued = std::mem::take(&mut self.inbound);
        for (from, frame) in queued {
            dispatcher.dispatch(self, from, &frame)?;
        }

        if self.is_host {
            let seq = self.next_sync_seq();
            if let Some(packet) = flush_dirty(&mut self.arena, &self.registry, seq)? {
                self.queue_frame(Recipient::Broadcast, PacketId::StateSync, &packet)?;
            }
        }

        self.tick = self.tick.advance(1);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Host-side lifecycle
    // ------------------------------------------------------------------

    /// Spawn the replicated score table. Host-only, once per session.
    pub fn host_spawn_score_table(&mut self) -> Result<(), NetError> {
        host_write_check(self.policy, self.is_host, "score table spawn");
        if self.score_table.is_some() {
            return Err(NetError::Protocol("score table already exists".into()));
        }
        let handle = self.arena.insert(Entity::ScoreTable(ScoreSystem::new()));
        let id = self.registry.bind(ReplicaRef {
            entity: handle,
            part: ReplicaPart::ScoreTable,
        });
        if let Some(Entity::ScoreTable(table)) = self.arena.get_mut(handle) {
            table.bind(id);
        }
        self.score_table = Some(handle);

        let packet = build_creation_packet(self.arena.get(handle).ok_or_else(missing_entity)?)?;
        self.queue_frame(Recipient::Broadcast, PacketId::CreateObject, &packet)?;
        info!(%id, "Score table spawned");
        Ok(())
    }

    /// Spawn a player avatar for `conn` and announce it to everyone.
    /// Host-only; identities are allocated here and nowhere else.
    pub fn host_spawn_player(
        &mut self,
        conn: ConnectionId,
        nickname: &str,
    ) -> Result<EntityHandle, NetError> {
        host_write_check(self.policy, self.is_host, "player spawn");
        if self.arena.player_by_owner(conn).is_some() {
            return Err(NetError::Protocol(format!(
                "{conn} already owns a player entity"
            )));
        }

        let spawn_pos = self.pick_spawn(conn);
        let handle = self.arena.insert(Entity::Player(PlayerEntity::new(
            conn,
            nickname.to_string(),
            spawn_pos,
        )));
        let transform_id = self.registry.bind(ReplicaRef {
            entity: handle,
            part: ReplicaPart::Transform,
        });
        let health_id = self.registry.bind(ReplicaRef {
            entity: handle,
            part: ReplicaPart::Health,
        });
        let mut weapon_ids = Vec::with_capacity(4);
        for slot in 0u8..4 {
            weapon_ids.push(self.registry.bind(ReplicaRef {
                entity: handle,
                part: ReplicaPart::Weapon(slot),
            }));
        }
        if let Some(Entity::Player(player)) = self.arena.get_mut(handle) {
            player.transform.bind(transform_id);
            player.health.bind(health_id);
            for (slot, id) in weapon_ids.iter().enumerate() {
                player.weapons[slot].bind(*id);
            }
        }

        if let Some(table) = self.score_table_mut() {
            table.track(conn);
        }

        let packet = build_creation_packet(self.arena.get(handle).ok_or_else(missing_entity)?)?;
        self.queue_frame(Recipient::Broadcast, PacketId::CreateObject, &packet)?;
        info!(%conn, nickname, "Player spawned at {spawn_pos}");
        Ok(handle)
    }

    /// Tear down everything `conn` owned and announce the release.
    /// Host-only, on disconnect.
    pub fn host_despawn_connection(&mut self, conn: ConnectionId) -> Result<(), NetError> {
        host_write_check(self.policy, self.is_host, "player despawn");
        let Some(handle) = self.arena.player_by_owner(conn) else {
            debug!(%conn, "Disconnect for a connection with no player entity");
            return Ok(());
        };
        let entity = self.arena.remove(handle).ok_or_else(missing_entity)?;
        let ids = self.registry.release_where(|r| r.entity == handle);
        if let Some(table) = self.score_table_mut() {
            table.forget(conn);
        }

        let packet = DestroyObjectPacket {
            owner: conn,
            tag: entity.tag(),
            ids,
        };
        self.queue_frame(Recipient::Broadcast, PacketId::DestroyObject, &packet)?;
        info!(%conn, "Player despawned");
        Ok(())
    }

    /// Bring a late joiner up to date: replay one creation packet per live
    /// entity to the new peer, then broadcast a full state snapshot.
    ///
    /// The snapshot is broadcast rather than unicast because encoding
    /// drains the one-shot queues; a unicast snapshot would steal pending
    /// events from everyone else.
    pub fn host_catch_up(&mut self, conn: ConnectionId) -> Result<(), NetError> {
        host_write_check(self.policy, self.is_host, "catch-up replay");
        let packets: Vec<CreateObjectPacket> = self
            .arena
            .iter()
            .map(|(_, entity)| build_creation_packet(entity))
            .collect::<Result<_, _>>()?;
        for packet in &packets {
            self.queue_frame(Recipient::Peer(conn), PacketId::CreateObject, packet)?;
        }
        let seq = self.next_sync_seq();
        if let Some(snapshot) = snapshot_all(&mut self.arena, &self.registry, seq)? {
            self.queue_frame(Recipient::Broadcast, PacketId::StateSync, &snapshot)?;
        }
        debug!(%conn, replayed = packets.len(), "Catch-up replay queued");
        Ok(())
    }

    /// Host-only. Every emitted sync packet gets a fresh stamp; receivers
    /// use it to order snapshots and deltas across channels.
    fn next_sync_seq(&mut self) -> u64 {
        self.sync_seq += 1;
        self.sync_seq
    }

    fn pick_spawn(&self, conn: ConnectionId) -> Vec3 {
        let mut rng = scoped_rng(self.seed, conn, self.tick);
        let index = rng.gen_range(0..SPAWN_POINTS.len());
        Vec3::from_array(SPAWN_POINTS[index])
    }

    fn score_table_mut(&mut self) -> Option<&mut ScoreSystem> {
        match self.arena.get_mut(self.score_table?) {
            Some(Entity::ScoreTable(table)) => Some(table),
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Client-side input
    // ------------------------------------------------------------------

    /// Issue a command toward the host for resolution.
    ///
    /// Movement is applied locally in the same call (prediction); the
    /// host's next delta confirms or overwrites it. Everything else waits
    /// for authoritative resolution.
    pub fn send_command(&mut self, command: PlayerCommand) -> Result<(), NetError> {
        if let PlayerCommand::Move { pos } = &command {
            let pos = Vec3::from_array(*pos);
            if let Some(player) = self.arena.player_by_owner_mut(self.local_conn) {
                player.transform.set_position(pos);
            }
        }
        let packet = PlayerCommandPacket {
            tick: self.tick.0,
            command,
        };
        self.queue_frame(
            Recipient::Peer(ConnectionId::HOST),
            PacketId::PlayerCommand,
            &packet,
        )
    }

    // ------------------------------------------------------------------
    // Packet handlers
    // ------------------------------------------------------------------

    fn handle_create_object(
        &mut self,
        from: ConnectionId,
        packet: CreateObjectPacket,
    ) -> Result<(), NetError> {
        if self.is_host {
            warn!(%from, "Host received a creation packet, ignoring");
            return Ok(());
        }
        if !from.is_host() {
            warn!(%from, "Creation packet from a non-host peer, ignoring");
            return Ok(());
        }
        let handle = apply_create_object(&mut self.arena, &mut self.registry, &packet, self.local_conn)?;
        if let Some(Entity::ScoreTable(_)) = self.arena.get(handle) {
            self.score_table = Some(handle);
        }
        Ok(())
    }

    fn handle_destroy_object(
        &mut self,
        from: ConnectionId,
        packet: DestroyObjectPacket,
    ) -> Result<(), NetError> {
        if self.is_host || !from.is_host() {
            warn!(%from, "Unexpected destroy packet, ignoring");
            return Ok(());
        }
        packet
            .verify()
            .map_err(|reason| NetError::Protocol(reason.into()))?;
        for id in &packet.ids {
            self.registry.release(*id);
        }
        if let Some(handle) = self.arena.player_by_owner(packet.owner) {
            self.arena.remove(handle);
        }
        debug!(owner = %packet.owner, released = packet.ids.len(), "Entity destroyed");
        Ok(())
    }

    fn handle_state_sync(
        &mut self,
        from: ConnectionId,
        packet: StateSyncPacket,
    ) -> Result<(), NetError> {
        if self.is_host || !from.is_host() {
            warn!(%from, "Unexpected state sync, ignoring");
            return Ok(());
        }
        // Unreliable channel: a delta overtaken by a newer one is stale and
        // must not rewind authoritative state.
        if let Some(last) = self.last_sync_seq {
            if packet.seq <= last {
                debug!(seq = packet.seq, last, "Stale state sync, dropping");
                return Ok(());
            }
        }
        apply_state_sync(&mut self.arena, &self.registry, &packet)?;
        self.last_sync_seq = Some(packet.seq);
        Ok(())
    }

    fn handle_player_command(
        &mut self,
        from: ConnectionId,
        packet: PlayerCommandPacket,
    ) -> Result<(), NetError> {
        if !self.is_host {
            warn!(%from, "Client received a player command, ignoring");
            return Ok(());
        }
        packet
            .verify()
            .map_err(|reason| NetError::Protocol(reason.into()))?;
        match packet.command {
            PlayerCommand::Move { pos } => {
                let pos = Vec3::from_array(pos);
                if let Some(player) = self.arena.player_by_owner_mut(from) {
                    player.transform.set_position(pos);
                } else {
                    warn!(%from, "Move command for a connection with no player");
                }
                Ok(())
            }
            PlayerCommand::Fire {
                slot,
                hit_point,
                target,
            } => self.resolve_fire(from, slot, Vec3::from_array(hit_point), target),
        }
    }

    /// Host-side fire resolution: spend ammo, queue the impact event, and
    /// apply direct plus area damage.
    fn resolve_fire(
        &mut self,
        from: ConnectionId,
        slot: u8,
        hit_point: Vec3,
        target: Option<ConnectionId>,
    ) -> Result<(), NetError> {
        let kind = {
            let Some(shooter) = self.arena.player_by_owner_mut(from) else {
                warn!(%from, "Fire command for a connection with no player");
                return Ok(());
            };
            let weapon = &mut shooter.weapons[usize::from(slot)];
            if !weapon.fire(hit_point) {
                debug!(%from, slot, "Dry fire on an empty magazine");
                return Ok(());
            }
            weapon.kind
        };
        host_write_check(self.policy, self.is_host, "weapon state");

        let mut hits: Vec<(ConnectionId, i32)> = Vec::new();
        if let Some(victim) = target {
            hits.push((victim, kind.damage()));
        }
        if let Some(radius) = kind.explosion_radius() {
            let positions: Vec<(ConnectionId, Vec3)> = self
                .arena
                .iter()
                .filter_map(|(_, entity)| match entity {
                    Entity::Player(player) => Some((player.owner, player.transform.pos)),
                    _ => None,
                })
                .collect();
            for (conn, pos) in positions {
                let distance = pos.distance(hit_point);
                if distance <= radius {
                    let amount = explosion_damage(distance, radius, kind.damage() as f32);
                    hits.push((conn, amount.round() as i32));
                }
            }
        }

        for (victim, amount) in hits {
            self.apply_hit(from, victim, amount)?;
        }
        Ok(())
    }

    fn apply_hit(
        &mut self,
        shooter: ConnectionId,
        victim: ConnectionId,
        amount: i32,
    ) -> Result<(), NetError> {
        host_write_check(self.policy, self.is_host, "health");
        let killed = {
            let Some(player) = self.arena.player_by_owner_mut(victim) else {
                debug!(%victim, "Hit on a connection with no player, dropping");
                return Ok(());
            };
            player.health.apply_damage(amount)
        };
        if !killed {
            return Ok(());
        }

        info!(%shooter, %victim, "Kill");
        host_write_check(self.policy, self.is_host, "score");
        if let Some(table) = self.score_table_mut() {
            table.add_death(victim);
            if shooter != victim {
                table.add_kill(shooter);
            }
        }
        let spawn_pos = self.pick_spawn(victim);
        if let Some(player) = self.arena.player_by_owner_mut(victim) {
            player.health.respawn();
            for weapon in &mut player.weapons {
                weapon.reload();
            }
            player.transform.set_position(spawn_pos);
        }
        Ok(())
    }
}

fn missing_entity() -> NetError {
    NetError::Protocol("entity vanished from the arena mid-operation".into())
}

/// Wire the session's handlers into a dispatch table.
///
/// The table is owned by the caller and passed back in on every
/// [`GameSession::tick`]; the session itself holds no handler state.
pub fn register_handlers(dispatcher: &mut PacketDispatcher<GameSession>) {
    dispatcher.register(PacketId::CreateObject, |session, from, payload| {
        let packet = decode_payload(payload)?;
        session.handle_create_object(from, packet)
    });
    dispatcher.register(PacketId::DestroyObject, |session, from, payload| {
        let packet = decode_payload(payload)?;
        session.handle_destroy_object(from, packet)
    });
    dispatcher.register(PacketId::StateSync, |session, from, payload| {
        let packet = decode_payload(payload)?;
        session.handle_state_sync(from, packet)
    });
    dispatcher.register(PacketId::PlayerCommand, |session, from, payload| {
        let packet = decode_payload(payload)?;
        session.handle_player_command(from, packet)
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pump(from: &mut GameSession, to: &mut GameSession) {
        for outbound in from.take_outbound() {
            let deliver = match outbound.recipient {
                Recipient::Broadcast => true,
                Recipient::Peer(conn) => conn == to.local_conn(),
            };
            if deliver {
                to.enqueue_inbound(from.local_conn(), outbound.frame);
            }
        }
    }

    #[test]
    fn host_spawn_announces_and_binds() {
        let mut host = GameSession::host(7);
        host.host_spawn_score_table().expect("table");
        let handle = host.host_spawn_player(ConnectionId(1), "ada").expect("spawn");

        match host.arena().get(handle) {
            Some(Entity::Player(player)) => assert!(player.is_bound()),
            _ => panic!("expected a player"),
        }
        // One creation frame per entity.
        assert_eq!(host.take_outbound().len(), 2);
    }

    #[test]
    fn duplicate_spawn_is_rejected() {
        let mut host = GameSession::host(7);
        host.host_spawn_player(ConnectionId(1), "ada").expect("spawn");
        assert!(host.host_spawn_player(ConnectionId(1), "ada").is_err());
    }

    #[test]
    fn despawn_releases_every_owned_identity() {
        let mut host = GameSession::host(7);
        host.host_spawn_score_table().expect("table");
        host.host_spawn_player(ConnectionId(1), "ada").expect("spawn");
        let bound_before = host.registry().len();

        host.host_despawn_connection(ConnectionId(1)).expect("despawn");
        assert_eq!(host.registry().len(), bound_before - 6);
        assert!(host.scores().expect("table").entry(ConnectionId(1)).is_none());
    }

    #[test]
    fn spawn_points_are_reproducible() {
        let host_a = GameSession::host(42);
        let host_b = GameSession::host(42);
        assert_eq!(
            host_a.pick_spawn(ConnectionId(3)),
            host_b.pick_spawn(ConnectionId(3))
        );
    }

    #[test]
    fn client_session_starts_with_an_eager_avatar() {
        let session = GameSession::client(ConnectionId(2), "bo");
        let handle = session.arena().player_by_owner(ConnectionId(2)).expect("avatar");
        match session.arena().get(handle) {
            Some(Entity::Player(player)) => assert!(!player.is_bound()),
            _ => panic!("expected a player"),
        }
    }

    #[test]
    fn stale_sync_packets_are_dropped() {
        let mut dispatcher = PacketDispatcher::new();
        register_handlers(&mut dispatcher);

        let mut host = GameSession::host(7);
        host.host_spawn_player(ConnectionId(2), "bo").expect("spawn");

        let mut client = GameSession::client(ConnectionId(2), "bo");
        pump(&mut host, &mut client);
        client.tick(&mut dispatcher).expect("apply creation");

        // Two deltas; deliver the newer first, then the older.
        host.arena_mut()
            .player_by_owner_mut(ConnectionId(2))
            .expect("player")
            .transform
            .set_position(Vec3::new(1.0, 0.0, 0.0));
        host.tick(&mut dispatcher).expect("tick 0");
        let first = host.take_outbound().pop().expect("delta").frame;

        host.arena_mut()
            .player_by_owner_mut(ConnectionId(2))
            .expect("player")
            .transform
            .set_position(Vec3::new(2.0, 0.0, 0.0));
        host.tick(&mut dispatcher).expect("tick 1");
        let second = host.take_outbound().pop().expect("delta").frame;

        client.enqueue_inbound(ConnectionId::HOST, second);
        client.enqueue_inbound(ConnectionId::HOST, first);
        client.tick(&mut dispatcher).expect("apply");

        let pos = client
            .arena_mut()
            .player_by_owner_mut(ConnectionId(2))
            .expect("player")
            .transform
            .pos;
        assert_eq!(pos, Vec3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn delta_flushed_on_the_catch_up_tick_still_applies() {
        let mut dispatcher = PacketDispatcher::new();
        register_handlers(&mut dispatcher);

        let mut host = GameSession::host(7);
        host.host_spawn_player(ConnectionId(2), "bo").expect("spawn");

        let mut client = GameSession::client(ConnectionId(2), "bo");
        pump(&mut host, &mut client);
        client.tick(&mut dispatcher).expect("apply creation");

        // Catch-up snapshot and the next dirty flush go out back to back;
        // the later one must not read as stale to the client.
        host.host_catch_up(ConnectionId(2)).expect("catch up");
        host.arena_mut()
            .player_by_owner_mut(ConnectionId(2))
            .expect("player")
            .transform
            .set_position(Vec3::new(7.0, 0.0, 0.0));
        host.tick(&mut dispatcher).expect("flush");
        pump(&mut host, &mut client);
        client.tick(&mut dispatcher).expect("apply");

        let pos = client
            .arena_mut()
            .player_by_owner_mut(ConnectionId(2))
            .expect("player")
            .transform
            .pos;
        assert_eq!(pos, Vec3::new(7.0, 0.0, 0.0));
    }

    #[test]
    fn fire_resolves_damage_on_the_host() {
        let mut dispatcher = PacketDispatcher::new();
        register_handlers(&mut dispatcher);

        let mut host = GameSession::host(7);
        host.host_spawn_score_table().expect("table");
        host.host_spawn_player(ConnectionId::HOST, "host").expect("spawn");
        host.host_spawn_player(ConnectionId(1), "ada").expect("spawn");
        host.take_outbound();

        // Shotgun (slot 1) hit on the host's avatar.
        let packet = PlayerCommandPacket {
            tick: 0,
            command: PlayerCommand::Fire {
                slot: 1,
                hit_point: [0.0; 3],
                target: Some(ConnectionId::HOST),
            },
        };
        let frame = encode_frame(PacketId::PlayerCommand, &packet).expect("encode");
        host.enqueue_inbound(ConnectionId(1), frame);
        host.tick(&mut dispatcher).expect("tick");

        let victim = host
            .arena_mut()
            .player_by_owner_mut(ConnectionId::HOST)
            .expect("victim");
        assert_eq!(victim.health.shield, crate::player::MAX_SHIELD - 25);
        let shooter = host
            .arena_mut()
            .player_by_owner_mut(ConnectionId(1))
            .expect("shooter");
        assert_eq!(shooter.weapons[1].ammo, shooter.weapons[1].kind.magazine() - 1);
    }

    #[test]
    fn kill_updates_score_and_respawns_the_victim() {
        let mut host = GameSession::host(7);
        host.host_spawn_score_table().expect("table");
        host.host_spawn_player(ConnectionId(1), "ada").expect("spawn");
        host.host_spawn_player(ConnectionId(2), "bo").expect("spawn");

        // The victim fired back once, so the respawn has a magazine to
        // refill.
        host.arena_mut()
            .player_by_owner_mut(ConnectionId(2))
            .expect("victim")
            .weapons[0]
            .fire(Vec3::ZERO);

        // Enough direct hits to burn shield and health.
        for _ in 0..8 {
            host.apply_hit(ConnectionId(1), ConnectionId(2), 30).expect("hit");
        }

        let scores = host.scores().expect("table");
        assert_eq!(scores.entry(ConnectionId(1)).expect("shooter").kills, 1);
        assert_eq!(scores.entry(ConnectionId(2)).expect("victim").deaths, 1);

        let victim = host
            .arena_mut()
            .player_by_owner_mut(ConnectionId(2))
            .expect("victim");
        assert_eq!(victim.health.health, crate::player::MAX_HEALTH);
        assert_eq!(victim.weapons[0].ammo, victim.weapons[0].kind.magazine());
    }
}
