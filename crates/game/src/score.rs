//! The session-wide score table, one replicated entry per connection.

use serde::{Deserialize, Serialize};
use skirmish_core::ConnectionId;
use skirmish_net::{NetError, NetworkId, Replicate, StateReader, StateWriter};
use std::collections::BTreeMap;

/// One connection's standing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEntry {
    /// Kills credited.
    pub kills: u32,
    /// Deaths suffered.
    pub deaths: u32,
    /// Accumulated score. Kills and deaths do not move it; objective
    /// scoring writes it directly.
    pub score: u32,
}

/// Mapping of connection to score entry; keys unique, order irrelevant.
///
/// Wire layout: count-prefixed sequence of
/// `(connection_id, kills, deaths, score)` tuples.
pub struct ScoreSystem {
    net_id: NetworkId,
    entries: BTreeMap<ConnectionId, ScoreEntry>,
    dirty: bool,
}

impl ScoreSystem {
    /// Create an unbound, empty score table.
    pub fn new() -> Self {
        Self {
            net_id: NetworkId::UNBOUND,
            entries: BTreeMap::new(),
            dirty: true,
        }
    }

    /// Record the identity assigned by the host.
    pub fn bind(&mut self, id: NetworkId) {
        self.net_id = id;
    }

    /// Ensure a zeroed entry exists for `conn`. Host-side, on join.
    pub fn track(&mut self, conn: ConnectionId) {
        self.entries.entry(conn).or_default();
        self.dirty = true;
    }

    /// Drop the entry for `conn`. Host-side, on disconnect.
    pub fn forget(&mut self, conn: ConnectionId) {
        if self.entries.remove(&conn).is_some() {
            self.dirty = true;
        }
    }

    /// Credit a kill to `conn`.
    pub fn add_kill(&mut self, conn: ConnectionId) {
        self.entries.entry(conn).or_default().kills += 1;
        self.dirty = true;
    }

    /// Record a death for `conn`.
    pub fn add_death(&mut self, conn: ConnectionId) {
        self.entries.entry(conn).or_default().deaths += 1;
        self.dirty = true;
    }

    /// Current entry for `conn`, if tracked.
    pub fn entry(&self, conn: ConnectionId) -> Option<ScoreEntry> {
        self.entries.get(&conn).copied()
    }

    /// All entries, ascending connection order.
    pub fn entries(&self) -> impl Iterator<Item = (ConnectionId, ScoreEntry)> + '_ {
        self.entries.iter().map(|(c, e)| (*c, *e))
    }

    /// Number of tracked connections.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no connection is tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ScoreSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl Replicate for ScoreSystem {
    fn net_id(&self) -> NetworkId {
        self.net_id
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn write_state(&mut self, w: &mut StateWriter) -> Result<(), NetError> {
        let rows: Vec<(ConnectionId, ScoreEntry)> =
            self.entries.iter().map(|(c, e)| (*c, *e)).collect();
        w.write(&rows)?;
        self.dirty = false;
        Ok(())
    }

    fn read_state(&mut self, r: &mut StateReader<'_>) -> Result<(), NetError> {
        let rows: Vec<(ConnectionId, ScoreEntry)> = r.read()?;
        self.entries = rows.into_iter().collect();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_kills_roundtrip_to_a_fresh_table() {
        let peer = ConnectionId(2);
        let mut table = ScoreSystem::new();
        table.track(peer);
        let before = table.entry(peer).expect("tracked");

        table.add_kill(peer);
        table.add_kill(peer);

        let mut w = StateWriter::new();
        table.write_state(&mut w).expect("write");
        let bytes = w.finish();

        let mut fresh = ScoreSystem::new();
        fresh
            .read_state(&mut StateReader::new(&bytes))
            .expect("read");

        let entry = fresh.entry(peer).expect("entry replicated");
        assert_eq!(entry.kills, 2);
        assert_eq!(entry.deaths, 0);
        assert_eq!(entry.score, before.score, "kills leave the score alone");
    }

    #[test]
    fn forget_removes_the_entry() {
        let mut table = ScoreSystem::new();
        table.track(ConnectionId(1));
        table.track(ConnectionId(2));
        table.forget(ConnectionId(1));

        assert!(table.entry(ConnectionId(1)).is_none());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn read_replaces_the_whole_table() {
        let mut source = ScoreSystem::new();
        source.add_kill(ConnectionId(5));

        let mut w = StateWriter::new();
        source.write_state(&mut w).expect("write");
        let bytes = w.finish();

        // Stale local rows are discarded wholesale.
        let mut target = ScoreSystem::new();
        target.add_death(ConnectionId(9));
        target
            .read_state(&mut StateReader::new(&bytes))
            .expect("read");

        assert!(target.entry(ConnectionId(9)).is_none());
        assert_eq!(target.entry(ConnectionId(5)).expect("row").kills, 1);
    }

    #[test]
    fn write_clears_dirty() {
        let mut table = ScoreSystem::new();
        table.add_kill(ConnectionId(1));
        assert!(table.is_dirty());

        let mut w = StateWriter::new();
        table.write_state(&mut w).expect("write");
        assert!(!table.is_dirty());
    }
}
