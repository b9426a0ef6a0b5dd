//! The applier: drains `apply_queue` and delivers committed entries to
//! the host in strict index order, without holding the protocol mutex
//! during delivery (spec §4.6, §5).

use log::trace;
use serde::{de::DeserializeOwned, Serialize};

use super::Raft;

pub(super) fn applier_loop<C>(raft: Raft<C>)
where
    C: Clone + Send + Sync + Serialize + DeserializeOwned + 'static,
{
    loop {
        let msg = {
            let mut state = raft.inner.state.lock().unwrap();
            loop {
                if raft.is_dead() {
                    return;
                }
                if let Some(msg) = state.apply_queue.pop_front() {
                    break msg;
                }
                state = raft.inner.apply_cv.wait(state).unwrap();
            }
        };

        let index = msg.command_index;
        // Delivered to the host without the protocol mutex held, so a
        // slow/blocking host never stalls election or replication.
        if !raft.inner.apply_sink.deliver(msg) {
            return;
        }
        let mut state = raft.inner.state.lock().unwrap();
        state.last_applied = index;
        trace!("S{} applied index {index}", raft.inner.id);
    }
}
