//! The replication driver (spec §4.3) and the inbound `AppendEntries`
//! handler (spec §4.5).

use std::cmp;
use std::thread;
use std::time::Instant;

use log::{debug, info, trace, warn};
use serde::{de::DeserializeOwned, Serialize};

use super::state::Role;
use super::Raft;
use crate::rpc::{AppendEntriesArgs, AppendEntriesReply};

/// Polls at `replication_tick` resolution; while leading, sends
/// `AppendEntries` to every peer whose `append_deadline` has expired
/// (spec §4.3). The snapshot-install branch (`next_index[i] <=
/// first_index`) is the documented, unimplemented extension point
/// (spec §9) — since this core never compacts its log, `first_index` is
/// always 0 and that branch is unreachable today.
pub(super) fn replication_driver<C>(raft: Raft<C>)
where
    C: Clone + Send + Sync + Serialize + DeserializeOwned + 'static,
{
    let tick = raft.inner.config.replication_tick;
    loop {
        if raft.is_dead() {
            return;
        }
        thread::sleep(tick);
        if raft.is_dead() {
            return;
        }

        let due = {
            let mut state = raft.inner.state.lock().unwrap();
            let now = Instant::now();
            let term = state.current_term;
            let commit_index = state.commit_index;
            let first_index = state.log.first_index();

            let leader = match &mut state.role {
                Role::Leader(leader) => leader,
                _ => continue,
            };

            let mut due = Vec::new();
            for peer_id in 0..leader.next_index.len() {
                if peer_id as u64 == raft.inner.id {
                    continue;
                }
                if now < leader.append_deadline[peer_id] {
                    continue;
                }
                leader.append_deadline[peer_id] = now + raft.inner.config.heartbeat_interval;
                if leader.next_index[peer_id] <= first_index {
                    // Snapshot install path: declared hook, not implemented.
                    trace!(
                        "S{} peer {peer_id} needs a snapshot (next_index {} <= first_index {first_index}); skipping",
                        raft.inner.id, leader.next_index[peer_id]
                    );
                    continue;
                }
                let prev_log_index = leader.next_index[peer_id] - 1;
                let prev_log_term = state.log.term_at(prev_log_index).unwrap_or(0);
                let entries = state.log.entries_from(leader.next_index[peer_id]).to_vec();
                due.push((
                    peer_id,
                    AppendEntriesArgs {
                        term,
                        leader_id: raft.inner.id,
                        prev_log_index,
                        prev_log_term,
                        entries,
                        leader_commit: commit_index,
                    },
                ));
            }
            due
        };

        for (peer_id, args) in due {
            let peer = raft.inner.peers[peer_id].clone();
            let raft = raft.clone();
            let dispatched_prev_log_index = args.prev_log_index;
            let entries_len = args.entries.len();
            let dispatched_term = args.term;
            thread::spawn(move || {
                trace!("S{} -> S{peer_id} AppendEntries T{dispatched_term}", raft.inner.id);
                if let Ok(reply) = peer.append_entries(args) {
                    handle_append_entries_reply(
                        &raft,
                        peer_id,
                        dispatched_term,
                        dispatched_prev_log_index,
                        entries_len,
                        reply,
                    );
                }
            });
        }
    }
}

fn handle_append_entries_reply<C>(
    raft: &Raft<C>,
    peer_id: usize,
    dispatched_term: u64,
    dispatched_prev_log_index: u64,
    entries_len: usize,
    reply: AppendEntriesReply,
) where
    C: Clone,
{
    let mut state = raft.inner.state.lock().unwrap();

    if reply.term > state.current_term {
        state.step_down(reply.term);
        state.election_deadline = Instant::now();
        raft.persist_locked(&state);
        return;
    }

    if state.current_term != dispatched_term {
        return;
    }

    let next_matches_dispatch = {
        let leader = match &state.role {
            Role::Leader(leader) => leader,
            _ => return,
        };
        leader.next_index[peer_id] == dispatched_prev_log_index + 1
    };
    if !next_matches_dispatch {
        return; // a concurrent path already moved next_index[peer_id]
    }

    if reply.success {
        {
            let leader = match &mut state.role {
                Role::Leader(leader) => leader,
                _ => return,
            };
            leader.next_index[peer_id] += entries_len as u64;
            leader.match_index[peer_id] = leader.next_index[peer_id] - 1;
        }

        try_advance_commit(raft, &mut state);

        let rearm = {
            let leader = match &state.role {
                Role::Leader(leader) => leader,
                _ => return,
            };
            leader.next_index[peer_id] != state.log.last_index() + 1
        };
        if rearm {
            if let Role::Leader(leader) = &mut state.role {
                leader.append_deadline[peer_id] = Instant::now();
            }
        }
    } else {
        let leader = match &mut state.role {
            Role::Leader(leader) => leader,
            _ => return,
        };
        if reply.conflict_term == -1 {
            leader.next_index[peer_id] = reply.conflict_index;
        } else {
            match state.log.last_index_with_term(reply.conflict_term as u64) {
                Some(found) => leader.next_index[peer_id] = found + 1,
                None => leader.next_index[peer_id] = reply.conflict_index,
            }
        }
        leader.append_deadline[peer_id] = Instant::now();
        warn!(
            "S{} backing off next_index[{peer_id}] to {} after conflict",
            raft.inner.id, leader.next_index[peer_id]
        );
    }
}

/// Recomputes `commit_index` from `match_index` and, if it advanced,
/// enqueues the newly committed entries for the applier (spec §4.3's
/// commit rule, gated by the commit-in-term check so a leader never
/// commits a predecessor's entry by counting alone — only its own
/// term's entries advance `commit_index`).
///
/// Called both after a successful `AppendEntries` reply and directly from
/// `Raft::start`: a single-node cluster has no peer replies to trigger
/// this from, but the leader's own log entry is already a strict
/// majority of one, so `start` must recheck immediately rather than wait
/// for a reply that will never arrive.
pub(super) fn try_advance_commit<C: Clone>(raft: &Raft<C>, state: &mut super::State<C>) {
    let me = raft.inner.id;
    let n = raft.inner.peers.len();
    let current_term = state.current_term;

    let k = match majority_match_index(state, me, n) {
        Some(k) => k,
        None => return,
    };
    if k <= state.commit_index || state.log.term_at(k) != Some(current_term) {
        return;
    }

    debug!("S{me} advancing commit_index {} -> {k}", state.commit_index);
    for i in (state.commit_index + 1)..=k {
        let command = state
            .log
            .entry_at(i)
            .and_then(|e| e.command.clone())
            .expect("committed index must have a command");
        state
            .apply_queue
            .push_back(crate::apply::ApplyMsg::command(i, command));
    }
    state.commit_index = k;
    raft.inner.apply_cv.notify_all();
}

/// Difference-array majority recomputation (spec §4.3): for each peer
/// other than `me`, bump `diff[0]` and drop `diff[match_index + 1]`, then
/// prefix-sum to find the largest index with strict-majority replication
/// (the `+ 1` below counts the leader itself, which always matches its
/// own log). Sized to `last_index + 2` rather than the `+5` slack used by
/// `raft_heartbeat_timeout.go`'s Go `diff` slice — here the slice is
/// exactly bounds-checked instead of over-allocated.
///
/// The running sum is only consulted for `i` in `0..=last`: the extra
/// `last + 1` slot exists purely so every peer's `-1` cancellation has
/// somewhere to land, not as a candidate commit index (a leader with a
/// single peer — itself — has no entries to cancel, so without this
/// bound the loop would report `last + 1`, one past the end of the log).
fn majority_match_index<C: Clone>(state: &super::State<C>, me: u64, n: usize) -> Option<u64> {
    let last = state.log.last_index() as usize;
    let mut diff = vec![0i64; last + 2];
    let leader = match &state.role {
        Role::Leader(leader) => leader,
        _ => return None,
    };
    for (peer_id, &match_index) in leader.match_index.iter().enumerate() {
        if peer_id as u64 == me {
            continue;
        }
        diff[0] += 1;
        diff[(match_index + 1) as usize] -= 1;
    }

    let mut running = 0i64;
    let mut best = None;
    for (i, d) in diff.iter().enumerate().take(last + 1) {
        running += d;
        if running + 1 > (n / 2) as i64 {
            best = Some(i as u64);
        }
    }
    best
}

/// Inbound `AppendEntries` RPC logic (spec §4.5).
pub(super) fn handle_append_entries<C>(
    raft: &Raft<C>,
    args: AppendEntriesArgs<C>,
) -> AppendEntriesReply
where
    C: Clone,
{
    let mut state = raft.inner.state.lock().unwrap();

    if args.term < state.current_term {
        return AppendEntriesReply {
            term: state.current_term,
            success: false,
            conflict_term: 0,
            conflict_index: 0,
        };
    }

    if args.term >= state.current_term {
        state.step_down(args.term);
        state.election_deadline = Instant::now();
    }

    let last_index = state.log.last_index();
    if args.prev_log_index > last_index {
        raft.persist_locked(&state);
        return AppendEntriesReply {
            term: state.current_term,
            success: false,
            conflict_term: -1,
            conflict_index: last_index + 1,
        };
    }

    if state.log.term_at(args.prev_log_index) != Some(args.prev_log_term) {
        let conflicting_term = state.log.term_at(args.prev_log_index).unwrap_or(0);
        let conflict_index = state
            .log
            .first_index_with_term(conflicting_term)
            .unwrap_or(args.prev_log_index);
        raft.persist_locked(&state);
        return AppendEntriesReply {
            term: state.current_term,
            success: false,
            conflict_term: conflicting_term as i64,
            conflict_index,
        };
    }

    // Merge: find the first incoming entry that conflicts with the
    // existing log, truncate from there, then append whatever remains.
    let mut merge_from = None;
    for (offset, entry) in args.entries.iter().enumerate() {
        let index = args.prev_log_index + 1 + offset as u64;
        match state.log.term_at(index) {
            Some(existing_term) if existing_term == entry.term => continue,
            Some(_) => {
                merge_from = Some((index, offset));
                break;
            }
            None => {
                merge_from = Some((index, offset));
                break;
            }
        }
    }
    if let Some((index, offset)) = merge_from {
        state.log.truncate_from(index);
        state.log.extend(args.entries[offset..].iter().cloned());
    }
    let last_new_entry_index = args.prev_log_index + args.entries.len() as u64;
    raft.persist_locked(&state);

    if args.leader_commit > state.commit_index {
        let new_commit_index = cmp::min(args.leader_commit, last_new_entry_index);
        for i in (state.commit_index + 1)..=new_commit_index {
            if let Some(command) = state.log.entry_at(i).and_then(|e| e.command.clone()) {
                state
                    .apply_queue
                    .push_back(crate::apply::ApplyMsg::command(i, command));
            }
        }
        state.commit_index = new_commit_index;
        raft.inner.apply_cv.notify_all();
        info!("S{} commit_index advanced to {new_commit_index}", raft.inner.id);
    }

    AppendEntriesReply {
        term: state.current_term,
        success: true,
        conflict_term: -1,
        conflict_index: 0,
    }
}

impl<C> Raft<C>
where
    C: Clone + Send + Sync + Serialize + DeserializeOwned + 'static,
{
    /// Entry point for a transport delivering an inbound `AppendEntries` RPC.
    pub fn append_entries(&self, args: AppendEntriesArgs<C>) -> AppendEntriesReply {
        handle_append_entries(self, args)
    }
}
