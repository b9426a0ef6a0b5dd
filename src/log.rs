//! The replicated log: a dense, 1-indexed sequence of entries behind a
//! dummy sentinel at index 0.
//!
//! Mirrors `getFirstIndex`/`getLastIndex`/`getTermByIndex` from
//! `original_source/src/raft/raft.go`: the sentinel at index 0 means
//! `prev_log_index = 0` is always a legal query, so the AppendEntries
//! handler never special-cases an empty log.

use serde::{Deserialize, Serialize};

/// A single log entry. The sentinel at index 0 carries `command: None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry<C> {
    pub index: u64,
    pub term: u64,
    pub command: Option<C>,
}

/// The in-memory log. No compaction/snapshotting is implemented, so
/// `first_index()` is always 0 — the hook for a future snapshot path is
/// the `first_index`-bearing arithmetic below, isolated so that adding
/// real compaction later only means ratcheting `first_index` forward.
#[derive(Debug, Clone)]
pub struct Log<C> {
    entries: Vec<LogEntry<C>>,
}

impl<C: Clone> Log<C> {
    pub fn new() -> Self {
        Log {
            entries: vec![LogEntry {
                index: 0,
                term: 0,
                command: None,
            }],
        }
    }

    pub fn from_entries(entries: Vec<LogEntry<C>>) -> Self {
        debug_assert!(!entries.is_empty(), "log must always carry its sentinel");
        Log { entries }
    }

    pub fn entries(&self) -> &[LogEntry<C>] {
        &self.entries
    }

    pub fn first_index(&self) -> u64 {
        self.entries[0].index
    }

    pub fn last_index(&self) -> u64 {
        self.entries.last().expect("log always has a sentinel").index
    }

    pub fn last_term(&self) -> u64 {
        self.entries.last().expect("log always has a sentinel").term
    }

    fn offset(&self, index: u64) -> Option<usize> {
        let first = self.first_index();
        if index < first {
            return None;
        }
        let offset = (index - first) as usize;
        if offset >= self.entries.len() {
            return None;
        }
        Some(offset)
    }

    pub fn term_at(&self, index: u64) -> Option<u64> {
        self.offset(index).map(|o| self.entries[o].term)
    }

    pub fn entry_at(&self, index: u64) -> Option<&LogEntry<C>> {
        self.offset(index).map(|o| &self.entries[o])
    }

    /// Appends a new entry at `last_index() + 1` in `term`, returning its index.
    /// Only ever called by a leader (I4: leaders only append their own log).
    pub fn append(&mut self, term: u64, command: C) -> u64 {
        let index = self.last_index() + 1;
        self.entries.push(LogEntry {
            index,
            term,
            command: Some(command),
        });
        index
    }

    /// Entries at or after `index`, inclusive.
    pub fn entries_from(&self, index: u64) -> &[LogEntry<C>] {
        match self.offset(index) {
            Some(o) => &self.entries[o..],
            None if index > self.last_index() => &[],
            None => &self.entries[..0],
        }
    }

    /// Drops every entry from `index` onward (I4: a leader never truncates
    /// its own term's entries; this is only called by followers merging a
    /// conflicting AppendEntries).
    pub fn truncate_from(&mut self, index: u64) {
        if let Some(o) = self.offset(index) {
            self.entries.truncate(o);
        }
    }

    /// Appends `new_entries` wholesale (used after truncation during merge).
    pub fn extend(&mut self, new_entries: impl IntoIterator<Item = LogEntry<C>>) {
        self.entries.extend(new_entries);
    }

    /// Smallest index whose term equals `term`, scanning forward from the
    /// start of the log. Used by the AppendEntries handler to compute
    /// `conflict_index` when `log[prev_log_index].term != prev_log_term`.
    pub fn first_index_with_term(&self, term: u64) -> Option<u64> {
        self.entries.iter().find(|e| e.term == term).map(|e| e.index)
    }

    /// Largest index whose term equals `term`, scanning backward from the
    /// end of the log. Used by the leader's conflict-backoff search
    /// (spec §4.3 / `raft_heartbeat_timeout.go`'s `findIdx` loop).
    pub fn last_index_with_term(&self, term: u64) -> Option<u64> {
        self.entries.iter().rev().find(|e| e.term == term).map(|e| e.index)
    }
}

impl<C: Clone> Default for Log<C> {
    fn default() -> Self {
        Self::new()
    }
}
