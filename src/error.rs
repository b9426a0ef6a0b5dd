//! Error types that cross an API boundary.
//!
//! Per the error-handling design, only two regimes ever produce a visible
//! `Result::Err`: a malformed persisted blob on startup, and a config that
//! fails its own invariants. Transport failures and stale RPC replies are
//! modeled as absence (`Option::None` / timeout) and are dropped silently
//! deep inside the protocol drivers; they never surface as `RaftError`.

use thiserror::Error;

/// Errors surfaced by the core peer itself.
#[derive(Debug, Error)]
pub enum RaftError {
    #[error("failed to decode persisted raft state: {0}")]
    PersistDecode(String),

    #[error("invalid raft config: {0}")]
    InvalidConfig(String),
}

/// Errors a `RaftClient` transport may return from an RPC call.
///
/// These never reach a peer's public API: every call site treats any
/// `RpcError` exactly like a dropped reply.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RpcError {
    #[error("rpc timed out")]
    Timeout,
    #[error("peer unreachable")]
    Disconnected,
}
