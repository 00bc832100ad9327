use thiserror::Error;

use super::common::{Command, Phase};
use super::fsm::{FsmState, HandleId, SlotKind, TimePoint};

/// Fatal conditions of the bridge. None of them is recoverable: the first one
/// raised is latched and halts every channel driver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("illegal phase {phase} received for {txn}")]
    IllegalPhase { phase: Phase, txn: String },

    #[error("time point {tp:?} not allowed after {state:?} for {txn}")]
    IllegalTransition {
        tp: TimePoint,
        state: FsmState,
        txn: String,
    },

    #[error("{kind:?} slot of {cmd} is still held by {held}")]
    SlotBusy {
        kind: SlotKind,
        cmd: Command,
        held: HandleId,
    },

    #[error("fsm handle {0} is no longer alive")]
    StaleHandle(HandleId),

    #[error("transaction not tracked by the bridge: {0}")]
    UnknownTransaction(String),

    #[error("beat {beat} exceeds the {beats} beats of {txn}")]
    BeatOverrun { beat: u32, beats: u32, txn: String },

    #[error("no transaction-level target bound to the forward port")]
    Unbound,

    #[error("invalid {field} encoding {value:#x}")]
    InvalidEncoding { field: &'static str, value: u64 },

    #[error("could not schedule {tp:?}: {reason}")]
    Scheduling { tp: TimePoint, reason: String },

    #[error("simulation did not settle within {0} cycles")]
    Timeout(u64),

    #[error("simulation query failed: {0}")]
    Query(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("could not read configuration {path}: {reason}")]
    ConfigLoad { path: String, reason: String },
}
