//! The stable-storage abstraction and the deterministic codec for
//! `(current_term, voted_for, log)` (spec §4.7, §6).
//!
//! The teacher serialized peer state with `capnp` framing over a `mio`
//! socket; since the transport here is injected rather than owned by the
//! core (see DESIGN.md), the wire format that actually needs picking is
//! just this blob codec. `bincode` over `serde`-derived types is the
//! crate used for exactly this purpose elsewhere in the retrieved pack
//! (`pallabcodes-c-or-c-plus-plus/build-database`'s `Cargo.toml` carries
//! `bincode = "1.3"` alongside `serde`), and it gives the deterministic,
//! whole-blob encoding spec §6 calls for.

use serde::{Deserialize, Serialize};

use crate::error::RaftError;
use crate::log::{Log, LogEntry};

/// A stable-storage blob with atomic whole-blob replacement semantics.
/// Implementations are free to be anything from an in-memory `Vec<u8>`
/// (tests) to an fsync'd file (a real host); the core only ever calls
/// `save`/`read` as a pair and never partially.
pub trait Persister: Send + Sync {
    fn save(&self, blob: Vec<u8>);
    fn read(&self) -> Vec<u8>;
}

#[derive(Serialize, Deserialize)]
struct Wire<C> {
    current_term: u64,
    voted_for: Option<u64>,
    log: Vec<LogEntry<C>>,
}

/// Encodes `(current_term, voted_for, log)` into the canonical framed
/// blob. Never fails for valid in-memory state; per spec §7 regime 3, an
/// encode failure here would be a programming error, not a runtime one.
pub fn encode<C: Serialize>(current_term: u64, voted_for: Option<u64>, log: &Log<C>) -> Vec<u8> {
    let wire = Wire {
        current_term,
        voted_for,
        log: log.entries().to_vec(),
    };
    bincode::serialize(&wire).expect("encoding valid raft state must not fail")
}

/// Decodes a persisted blob. An empty/absent blob is not an error: it
/// means "no prior state", and the caller should fall back to a fresh
/// `Log::new()` (spec §4.7, §7 regime 3).
pub fn decode<C>(blob: &[u8]) -> Result<(u64, Option<u64>, Log<C>), RaftError>
where
    C: for<'de> Deserialize<'de> + Clone,
{
    if blob.is_empty() {
        return Ok((0, None, Log::new()));
    }
    let wire: Wire<C> =
        bincode::deserialize(blob).map_err(|e| RaftError::PersistDecode(e.to_string()))?;
    Ok((wire.current_term, wire.voted_for, Log::from_entries(wire.log)))
}
