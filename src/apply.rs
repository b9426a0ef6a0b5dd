//! The message delivered to the host state machine for each committed
//! entry (spec §6 "Apply channel").

/// The core only ever emits `command_valid = true` messages; the
/// `snapshot_*` fields exist because the apply channel's shape is shared
/// with the (unimplemented) snapshot-install path, per spec §1(e)/§9.
#[derive(Debug, Clone)]
pub struct ApplyMsg<C> {
    pub command_valid: bool,
    pub command: Option<C>,
    pub command_index: u64,

    pub snapshot_valid: bool,
    pub snapshot: Option<Vec<u8>>,
    pub snapshot_term: u64,
    pub snapshot_index: u64,
}

impl<C> ApplyMsg<C> {
    pub fn command(index: u64, command: C) -> Self {
        ApplyMsg {
            command_valid: true,
            command: Some(command),
            command_index: index,
            snapshot_valid: false,
            snapshot: None,
            snapshot_term: 0,
            snapshot_index: 0,
        }
    }
}

/// Unidirectional ordered delivery sink the host hands to `Raft::new`.
/// A plain `std::sync::mpsc::Sender<ApplyMsg<C>>` satisfies this; it is a
/// trait (rather than a concrete channel type) so hosts that prefer a
/// different channel implementation aren't forced onto `std::sync::mpsc`.
pub trait ApplySink<C>: Send {
    fn deliver(&self, msg: ApplyMsg<C>) -> bool;
}

impl<C> ApplySink<C> for std::sync::mpsc::Sender<ApplyMsg<C>> {
    fn deliver(&self, msg: ApplyMsg<C>) -> bool {
        self.send(msg).is_ok()
    }
}
