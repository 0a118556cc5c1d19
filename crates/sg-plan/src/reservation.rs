//! The bi-indexed reservation table.
//!
//! Two access patterns matter: keyed lookup by `(x, y, t)` during the A*
//! inner loop, and bulk erase by agent when a plan is abandoned.  A hash map
//! on the key plus a secondary `agent → set<key>` index serves both; the two
//! structures are kept in sync by every mutator.
//!
//! Ownership is soft: a claim can only disappear through an explicit erase
//! by its owner (or a whole-table clear); inserting over a live claim fails
//! and leaves the prior entry in place.

use std::collections::{BTreeSet, HashMap};

use sg_core::{AgentId, Cell, Tick};

/// How many ticks beyond arrival the final path cell stays claimed.  Long
/// enough that peers replanning within any realistic horizon route around a
/// parked agent instead of through it.
pub const GOAL_HOLD_TICKS: u64 = 100;

/// `(x, y, t)` — one cell at one tick.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ReservationKey {
    pub x: i32,
    pub y: i32,
    pub t: Tick,
}

impl ReservationKey {
    #[inline]
    pub fn new(cell: Cell, t: Tick) -> Self {
        ReservationKey { x: cell.x, y: cell.y, t }
    }

    #[inline]
    pub fn cell(&self) -> Cell {
        Cell::new(self.x, self.y)
    }
}

/// One claim: a key and the agent holding it.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct ReservationEntry {
    pub key: ReservationKey,
    pub agent_id: AgentId,
}

/// All claims known to one observer, uniquely keyed by `(x, y, t)`.
#[derive(Clone, Debug, Default)]
pub struct ReservationTable {
    by_key: HashMap<ReservationKey, AgentId>,
    by_agent: HashMap<AgentId, BTreeSet<ReservationKey>>,
}

impl ReservationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a claim.  Fails (returning `false`) if the key is already
    /// held — by anyone, the owner included.
    pub fn insert(&mut self, key: ReservationKey, agent: AgentId) -> bool {
        if self.by_key.contains_key(&key) {
            return false;
        }
        self.by_key.insert(key, agent);
        self.by_agent.entry(agent).or_default().insert(key);
        true
    }

    /// The holder of `key`, if any.
    #[inline]
    pub fn get(&self, key: &ReservationKey) -> Option<AgentId> {
        self.by_key.get(key).copied()
    }

    /// The holder of `cell` at `tick`, if any.
    #[inline]
    pub fn owner(&self, cell: Cell, tick: Tick) -> Option<AgentId> {
        self.get(&ReservationKey::new(cell, tick))
    }

    /// `true` if some agent other than `agent` holds `cell` at `tick`.
    #[inline]
    pub fn is_reserved_by_other(&self, cell: Cell, tick: Tick, agent: AgentId) -> bool {
        matches!(self.owner(cell, tick), Some(holder) if holder != agent)
    }

    /// Remove a single claim, fixing the secondary index.
    pub fn remove(&mut self, key: &ReservationKey) -> Option<AgentId> {
        let agent = self.by_key.remove(key)?;
        if let Some(keys) = self.by_agent.get_mut(&agent) {
            keys.remove(key);
            if keys.is_empty() {
                self.by_agent.remove(&agent);
            }
        }
        Some(agent)
    }

    /// Erase every claim held by `agent`.  Cost is proportional to that
    /// agent's entries.  Returns how many were removed.
    pub fn erase_agent(&mut self, agent: AgentId) -> usize {
        let Some(keys) = self.by_agent.remove(&agent) else {
            return 0;
        };
        let n = keys.len();
        for key in keys {
            self.by_key.remove(&key);
        }
        n
    }

    /// Claim an entire path for `agent`: first erase the agent's previous
    /// claims, then insert `path[i]` at `start_tick + i`, then hold the
    /// final cell for [`GOAL_HOLD_TICKS`] further ticks so peers do not
    /// route through a parked agent.
    ///
    /// Inserts that lose to a live claim of another agent are skipped; the
    /// planner's own conflict checks keep those rare, and soft ownership
    /// means the earlier claim wins.
    pub fn commit(&mut self, path: &[Cell], agent: AgentId, start_tick: Tick) {
        self.erase_agent(agent);
        for (i, &cell) in path.iter().enumerate() {
            self.insert(ReservationKey::new(cell, start_tick + i as u64), agent);
        }
        if let Some(&last) = path.last() {
            let arrival = start_tick + (path.len() - 1) as u64;
            for w in 1..=GOAL_HOLD_TICKS {
                self.insert(ReservationKey::new(last, arrival + w), agent);
            }
        }
    }

    /// Number of claims currently held by `agent`.
    pub fn agent_entry_count(&self, agent: AgentId) -> usize {
        self.by_agent.get(&agent).map_or(0, BTreeSet::len)
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_key.clear();
        self.by_agent.clear();
    }

    /// Iterate all claims.  Order is unspecified; every per-key decision a
    /// consumer makes must be order-independent.
    pub fn iter(&self) -> impl Iterator<Item = ReservationEntry> + '_ {
        self.by_key
            .iter()
            .map(|(&key, &agent_id)| ReservationEntry { key, agent_id })
    }
}
