//! A single-decree Raft replication peer: a leader-elected, log-replicated
//! state machine module a host service embeds to replicate a sequence of
//! opaque commands across a fixed cluster of peers.
//!
//! The transport, stable storage, and host state machine are all injected
//! collaborators (see [`rpc::RaftClient`], [`persist::Persister`],
//! [`apply::ApplySink`]); this crate owns only the consensus protocol
//! itself — election safety, log matching, the commit rule, and the
//! concurrency between election timers, heartbeat timers, inbound RPCs,
//! and the applier.

pub mod apply;
pub mod config;
pub mod error;
pub mod log;
pub mod persist;
mod raft;
pub mod rpc;

pub use apply::{ApplyMsg, ApplySink};
pub use config::RaftConfig;
pub use error::{RaftError, RpcError};
pub use log::{Log, LogEntry};
pub use persist::Persister;
pub use raft::Raft;
pub use rpc::{AppendEntriesArgs, AppendEntriesReply, RaftClient, RequestVoteArgs, RequestVoteReply};
