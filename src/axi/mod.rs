mod common;
mod error;
mod target;

pub mod beat;
pub mod fsm;
pub mod pending;
pub mod signals;
pub mod txn;

pub use common::*;
pub use error::BridgeError;
pub use target::{AceLiteTarget, BeatRecord, BridgeStats, ResponseBeat};
pub use txn::{AxiAttributes, SharedTxn, Transaction};
