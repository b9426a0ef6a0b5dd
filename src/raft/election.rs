//! The election driver (spec §4.2) and the inbound `RequestVote` handler
//! (spec §4.4).

use std::thread;
use std::time::Instant;

use log::{debug, info, trace};
use rand::Rng;
use serde::{de::DeserializeOwned, Serialize};

use super::state::Role;
use super::{Inner, Raft};
use crate::rpc::{RequestVoteArgs, RequestVoteReply};

fn random_election_deadline<C>(inner: &Inner<C>, now: Instant) -> Instant {
    let min = inner.config.election_timeout_min.as_millis() as u64;
    let max = inner.config.election_timeout_max.as_millis() as u64;
    let millis = rand::thread_rng().gen_range(min..max);
    now + std::time::Duration::from_millis(millis)
}

/// Polls at `election_tick` resolution; when a follower or candidate's
/// deadline has passed, begins a new election (spec §4.2).
pub(super) fn election_driver<C>(raft: Raft<C>)
where
    C: Clone + Send + Sync + Serialize + DeserializeOwned + 'static,
{
    let tick = raft.inner.config.election_tick;
    loop {
        if raft.is_dead() {
            return;
        }
        thread::sleep(tick);
        if raft.is_dead() {
            return;
        }

        let dispatch = {
            let mut state = raft.inner.state.lock().unwrap();
            let now = Instant::now();
            if state.role.is_leader() || now < state.election_deadline {
                continue;
            }

            state.current_term += 1;
            state.role = Role::Candidate { votes: 1 };
            state.voted_for = Some(raft.inner.id);
            state.election_deadline = random_election_deadline(&raft.inner, now);
            raft.persist_locked(&state);

            let term = state.current_term;
            debug!("S{} starting election for term {term}", raft.inner.id);
            (term, state.log.last_index(), state.log.last_term())
        };
        let (term, last_log_index, last_log_term) = dispatch;

        for (peer_id, peer) in raft.inner.peers.iter().enumerate() {
            if peer_id as u64 == raft.inner.id {
                continue;
            }
            let peer = peer.clone();
            let raft = raft.clone();
            let args = RequestVoteArgs {
                term,
                candidate_id: raft.inner.id,
                last_log_index,
                last_log_term,
            };
            thread::spawn(move || {
                trace!("S{} -> S{peer_id} RequestVote T{term}", raft.inner.id);
                if let Ok(reply) = peer.request_vote(args) {
                    handle_request_vote_reply(&raft, term, reply);
                }
            });
        }
    }
}

fn handle_request_vote_reply<C>(raft: &Raft<C>, dispatched_term: u64, reply: RequestVoteReply)
where
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
        return; // stale reply from an earlier term
    }
    let current_votes = match &mut state.role {
        Role::Candidate { votes } => {
            if reply.vote_granted {
                *votes += 1;
            }
            *votes
        }
        _ => return, // no longer a candidate for this term
    };

    let n = raft.inner.peers.len();
    if reply.vote_granted && current_votes * 2 > n {
        let now = Instant::now();
        let last_index = state.log.last_index();
        info!("S{} elected leader for term {dispatched_term}", raft.inner.id);
        state.role = Role::Leader(super::state::LeaderState::new(n, last_index, now));
    }
}

/// Inbound `RequestVote` RPC logic (spec §4.4).
pub(super) fn handle_request_vote<C>(raft: &Raft<C>, args: RequestVoteArgs) -> RequestVoteReply
where
    C: Clone,
{
    let mut state = raft.inner.state.lock().unwrap();

    if args.term < state.current_term {
        return RequestVoteReply {
            term: state.current_term,
            vote_granted: false,
        };
    }

    if args.term > state.current_term {
        state.step_down(args.term);
        raft.persist_locked(&state);
    }

    let log_ok = args.last_log_term > state.log.last_term()
        || (args.last_log_term == state.log.last_term() && args.last_log_index >= state.log.last_index());

    let mut vote_granted = false;
    if (state.voted_for.is_none() || state.voted_for == Some(args.candidate_id)) && log_ok {
        vote_granted = true;
        state.voted_for = Some(args.candidate_id);
        state.election_deadline = random_election_deadline(&raft.inner, Instant::now());
        raft.persist_locked(&state);
        debug!(
            "S{} granted vote to S{} for term {}",
            raft.inner.id, args.candidate_id, args.term
        );
    }

    RequestVoteReply {
        term: state.current_term,
        vote_granted,
    }
}

impl<C> Raft<C>
where
    C: Clone + Send + Sync + Serialize + DeserializeOwned + 'static,
{
    /// Entry point for a transport delivering an inbound `RequestVote` RPC.
    pub fn request_vote(&self, args: RequestVoteArgs) -> RequestVoteReply {
        handle_request_vote(self, args)
    }
}
