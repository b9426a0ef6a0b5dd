//! The public peer contract (spec §4.1): `Raft::new`/`start`/`get_state`/
//! `kill`/`snapshot`/`cond_install_snapshot`.

mod applier;
mod election;
mod replication;
mod state;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Instant;

use log::info;
use serde::{de::DeserializeOwned, Serialize};

use crate::apply::ApplySink;
use crate::config::RaftConfig;
use crate::persist::{self, Persister};
use crate::rpc::RaftClient;

pub use state::{LeaderState, Role, State};

/// Shared state behind every clone of a `Raft<C>` handle.
struct Inner<C> {
    id: u64,
    peers: Vec<Arc<dyn RaftClient<C>>>,
    persister: Arc<dyn Persister>,
    apply_sink: Box<dyn ApplySink<C>>,
    config: RaftConfig,
    state: Mutex<State<C>>,
    apply_cv: Condvar,
    dead: AtomicBool,
}

/// A single Raft peer. Cheap to clone: every clone shares the same
/// mutex-guarded state, mirroring the Go original's shared `*Raft`
/// pointer (every goroutine there calls methods through the same pointer;
/// here every driver thread and every host caller holds a clone of the
/// same `Arc`).
pub struct Raft<C> {
    inner: Arc<Inner<C>>,
}

impl<C> Clone for Raft<C> {
    fn clone(&self) -> Self {
        Raft {
            inner: self.inner.clone(),
        }
    }
}

impl<C> Raft<C>
where
    C: Clone + Send + Sync + Serialize + DeserializeOwned + 'static,
{
    /// Constructs a peer, restores persisted state if present, starts the
    /// three long-lived drivers, and returns promptly (spec §4.1).
    ///
    /// # Panics
    /// Panics if `config.validate()` fails — a misconfigured peer is a
    /// construction-time programming error, not a runtime condition a
    /// host is expected to recover from.
    pub fn new(
        id: u64,
        peers: Vec<Arc<dyn RaftClient<C>>>,
        persister: Arc<dyn Persister>,
        apply_sink: Box<dyn ApplySink<C>>,
        config: RaftConfig,
    ) -> Raft<C> {
        config.validate().expect("invalid raft config");

        let now = Instant::now();
        let (current_term, voted_for, log) = match persist::decode::<C>(&persister.read()) {
            Ok(restored) => restored,
            Err(e) => {
                log::warn!("S{id} failed to decode persisted state, starting fresh: {e}");
                (0, None, crate::log::Log::new())
            }
        };
        info!("S{id} starting at term {current_term}");

        let state = State::new(current_term, voted_for, log, now);
        let inner = Arc::new(Inner {
            id,
            peers,
            persister,
            apply_sink,
            config,
            state: Mutex::new(state),
            apply_cv: Condvar::new(),
            dead: AtomicBool::new(false),
        });

        let raft = Raft { inner };
        raft.spawn_drivers();
        raft
    }

    fn spawn_drivers(&self) {
        let election = self.clone();
        thread::spawn(move || election::election_driver(election));

        let replication = self.clone();
        thread::spawn(move || replication::replication_driver(replication));

        let applier = self.clone();
        thread::spawn(move || applier::applier_loop(applier));
    }

    /// Appends `command` to the log if this peer is the live leader.
    /// Returns `(-1, -1, false)` otherwise (spec §4.1). Does not wait for
    /// commit.
    pub fn start(&self, command: C) -> (i64, i64, bool) {
        if self.is_dead() {
            return (-1, -1, false);
        }
        let mut state = self.inner.state.lock().unwrap();
        if !state.role.is_leader() {
            return (-1, -1, false);
        }
        let term = state.current_term;
        let index = state.log.append(term, command);
        self.persist_locked(&state);
        log::debug!("S{} appended entry {} at term {}", self.inner.id, index, term);
        // A single-node cluster has no peer to reply and trigger this from;
        // every other cluster size rechecks harmlessly (match_index hasn't
        // moved since the last reply).
        replication::try_advance_commit(self, &mut state);
        (index as i64, term as i64, true)
    }

    /// A consistent snapshot of `(current_term, is_leader)` (spec §4.1).
    /// Still returns the last observed term after `kill()` (spec §7
    /// regime 4): only `start` changes shape once dead.
    pub fn get_state(&self) -> (u64, bool) {
        let state = self.inner.state.lock().unwrap();
        (state.current_term, state.role.is_leader())
    }

    /// Sets the `dead` flag; every driver observes it and exits promptly.
    /// Subsequent `start` calls return the "not leader" shape.
    pub fn kill(&self) {
        self.inner.dead.store(true, Ordering::SeqCst);
        self.inner.apply_cv.notify_all();
        info!("S{} killed", self.inner.id);
    }

    pub fn is_dead(&self) -> bool {
        self.inner.dead.load(Ordering::SeqCst)
    }

    /// Declared hook (spec §1(e), §9): snapshot installation is not
    /// implemented in this core. Extend `replication::replication_driver`'s
    /// `next_index[i] <= first_index` branch to wire in a real
    /// `InstallSnapshot` RPC.
    pub fn cond_install_snapshot(&self, _last_included_term: u64, _last_included_index: u64, _snapshot: &[u8]) -> bool {
        true
    }

    /// Declared hook (spec §1(e), §9): log compaction is not implemented.
    pub fn snapshot(&self, _index: u64, _snapshot: &[u8]) {}

    fn persist_locked(&self, state: &State<C>) {
        let blob = persist::encode(state.current_term, state.voted_for, &state.log);
        self.inner.persister.save(blob);
    }
}
