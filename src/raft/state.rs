//! The state every driver mutates under the single peer mutex (spec §3,
//! §5 "Single mutex").

use std::time::Instant;
use std::collections::VecDeque;

use crate::apply::ApplyMsg;
use crate::log::Log;

/// Tagged role variant (spec §9 design notes). Leader-only bookkeeping is
/// nested inside the `Leader` variant so it is only ever reachable while
/// actually leading — the design notes' preferred option, since it makes
/// I4/I6 locally enforceable instead of relying on callers to remember to
/// ignore stale `next_index`/`match_index` after stepping down.
#[derive(Debug)]
pub enum Role {
    Follower,
    Candidate { votes: usize },
    Leader(LeaderState),
}

impl Role {
    pub fn is_leader(&self) -> bool {
        matches!(self, Role::Leader(_))
    }
}

/// Volatile leader-only state (spec §3 `next_index`, `match_index`), plus
/// the per-peer heartbeat/append deadlines, which are only ever consulted
/// by the replication driver while this peer is leading.
#[derive(Debug)]
pub struct LeaderState {
    pub next_index: Vec<u64>,
    pub match_index: Vec<u64>,
    pub append_deadline: Vec<Instant>,
}

impl LeaderState {
    pub fn new(peer_count: usize, last_log_index: u64, now: Instant) -> Self {
        LeaderState {
            next_index: vec![last_log_index + 1; peer_count],
            match_index: vec![0; peer_count],
            append_deadline: vec![now; peer_count],
        }
    }
}

/// The full mutable peer state, guarded by one mutex per `Raft<C>`.
pub struct State<C> {
    pub current_term: u64,
    pub voted_for: Option<u64>,
    pub log: Log<C>,
    pub role: Role,
    pub commit_index: u64,
    pub last_applied: u64,
    pub election_deadline: Instant,
    pub apply_queue: VecDeque<ApplyMsg<C>>,
}

impl<C: Clone> State<C> {
    pub fn new(current_term: u64, voted_for: Option<u64>, log: Log<C>, now: Instant) -> Self {
        State {
            current_term,
            voted_for,
            log,
            role: Role::Follower,
            commit_index: 0,
            last_applied: 0,
            election_deadline: now,
            apply_queue: VecDeque::new(),
        }
    }

    /// Steps down to follower at `term` (I1: term never decreases, so this
    /// is only ever called with `term >= current_term`). Clears
    /// `voted_for` whenever the term actually advances (I2).
    pub fn step_down(&mut self, term: u64) {
        debug_assert!(term >= self.current_term);
        if term > self.current_term {
            self.current_term = term;
            self.voted_for = None;
        }
        self.role = Role::Follower;
    }
}
