//! The peer-endpoint abstraction: wire argument/reply types and the
//! `RaftClient` trait a host's transport implements.
//!
//! The transport itself — delivery with arbitrary delay, loss,
//! duplication, but no corruption — is an injected external collaborator
//! (spec §1(a)); this module only pins down the shapes that cross that
//! boundary, the same way `original_source/src/raft/raft.go` pins down
//! `RequestVoteArgs`/`AppendEntriesArgs` ahead of the `labrpc` package
//! that actually moves bytes.

use crate::error::RpcError;
use crate::log::LogEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestVoteArgs {
    pub term: u64,
    pub candidate_id: u64,
    pub last_log_index: u64,
    pub last_log_term: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestVoteReply {
    pub term: u64,
    pub vote_granted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendEntriesArgs<C> {
    pub term: u64,
    pub leader_id: u64,
    pub prev_log_index: u64,
    pub prev_log_term: u64,
    pub entries: Vec<LogEntry<C>>,
    pub leader_commit: u64,
}

/// `conflict_term == -1` means the follower's log is shorter than
/// `prev_log_index` (spec §4.3/§4.5); any other value names the term the
/// leader should search its own log for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendEntriesReply {
    pub term: u64,
    pub success: bool,
    pub conflict_term: i64,
    pub conflict_index: u64,
}

/// A handle to one remote peer. The host supplies one implementation per
/// peer at construction time; calls may block the calling (transient,
/// per-RPC) thread but must never block indefinitely — a `RpcError`
/// (or host-side timeout folded into one) stands in for "send returned
/// false" from spec §7 regime 1.
pub trait RaftClient<C>: Send + Sync {
    fn request_vote(&self, args: RequestVoteArgs) -> Result<RequestVoteReply, RpcError>;
    fn append_entries(&self, args: AppendEntriesArgs<C>) -> Result<AppendEntriesReply, RpcError>;
}
