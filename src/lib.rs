//! Pin-level to transaction-level bridge for the ACE-Lite protocol, built on
//! the asynchronix discrete-event simulator.
//!
//! [`axi::AceLiteTarget`] watches the five AXI channels of a bus and converts
//! every burst into a sequence of transaction-level phases sent to a
//! collaborator; [`bench::Testbench`] wires it between a pin-level master and
//! a memory model.

pub mod axi;
pub mod bench;
pub mod config;

pub use axi::{AceLiteTarget, BridgeError};
pub use bench::Testbench;
pub use config::{load_config_file, BenchConfig, BridgeConfig, ReadyPattern};
