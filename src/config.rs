//! Timing configuration for the election and replication drivers.
//!
//! The teacher's own `Config` (`src/server/mod.rs` in the original
//! `rusty_raft` tree) hardcoded every one of these as a module constant
//! and left a `TODO: Many of these should be overwritable by Config`.
//! This is that TODO, finished: every timing constant from spec section 5
//! lives here instead, with a `Default` that reproduces the original
//! values exactly.

use std::time::Duration;

use crate::error::RaftError;

/// Tunable timing parameters for a single Raft peer.
///
/// All durations are independent per peer; nothing here is shared state,
/// so differing configs across a cluster are legal (though matching
/// `heartbeat_interval`/election ranges across peers is what the protocol
/// assumes in practice).
#[derive(Debug, Clone)]
pub struct RaftConfig {
    /// Lower bound (inclusive) of the randomized election timeout range.
    pub election_timeout_min: Duration,
    /// Upper bound (exclusive) of the randomized election timeout range.
    pub election_timeout_max: Duration,
    /// How often a leader re-sends `AppendEntries` to an idle peer.
    pub heartbeat_interval: Duration,
    /// Poll resolution of the election driver.
    pub election_tick: Duration,
    /// Poll resolution of the replication driver.
    pub replication_tick: Duration,
}

impl Default for RaftConfig {
    fn default() -> Self {
        RaftConfig {
            election_timeout_min: Duration::from_millis(200),
            election_timeout_max: Duration::from_millis(400),
            heartbeat_interval: Duration::from_millis(100),
            election_tick: Duration::from_millis(5),
            replication_tick: Duration::from_millis(2),
        }
    }
}

impl RaftConfig {
    /// Checks the invariants the drivers assume hold.
    pub fn validate(&self) -> Result<(), RaftError> {
        if self.election_timeout_min >= self.election_timeout_max {
            return Err(RaftError::InvalidConfig(
                "election_timeout_min must be strictly less than election_timeout_max".into(),
            ));
        }
        if self.election_timeout_min.is_zero() {
            return Err(RaftError::InvalidConfig(
                "election_timeout_min must be non-zero".into(),
            ));
        }
        if self.heartbeat_interval.is_zero() {
            return Err(RaftError::InvalidConfig(
                "heartbeat_interval must be non-zero".into(),
            ));
        }
        if self.election_tick.is_zero() || self.replication_tick.is_zero() {
            return Err(RaftError::InvalidConfig(
                "driver tick resolutions must be non-zero".into(),
            ));
        }
        Ok(())
    }
}
