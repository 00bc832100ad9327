//! Pin-level signal bundles. A bundle is resent as a whole whenever any of
//! its wires changes; receivers latch the last value like a signal.

use asynchronix::model::Output;

/// Updates a driven signal, notifying the peer only on change.
pub(crate) async fn drive<T: Clone + PartialEq + Send + 'static>(port: &mut Output<T>, latch: &mut T, value: T) {
    if *latch != value {
        *latch = value.clone();
        port.send(value).await;
    }
}

/// Address-read channel, driven by the initiator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArSignals {
    pub valid: bool,
    pub id: u32,
    pub addr: u64,
    pub len: u8,
    pub size: u8,
    pub burst: u8,
    pub cache: u8,
    pub prot: u8,
    pub qos: u8,
    pub region: u8,
    pub domain: u8,
    pub snoop: u8,
    pub bar: u8,
    pub lock: bool,
}

/// Address-write channel, driven by the initiator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AwSignals {
    pub valid: bool,
    pub id: u32,
    pub addr: u64,
    pub len: u8,
    pub size: u8,
    pub burst: u8,
    pub cache: u8,
    pub prot: u8,
    pub qos: u8,
    pub region: u8,
    pub domain: u8,
    pub snoop: u8,
    pub bar: u8,
    pub lock: bool,
    pub unique: bool,
    pub stash_nid: u16,
    pub stash_nid_en: bool,
    pub stash_lpid: u8,
    pub stash_lpid_en: bool,
    pub user: u64,
}

/// Write-data channel, driven by the initiator. `data` holds one byte per
/// bus lane, bit `i` of `strb` enables lane `i`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WSignals {
    pub valid: bool,
    pub data: Vec<u8>,
    pub strb: u128,
    pub last: bool,
}

/// Read-data channel, driven by the bridge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RSignals {
    pub valid: bool,
    pub id: u32,
    pub data: Vec<u8>,
    pub resp: u8,
    pub last: bool,
}

/// Write-response channel, driven by the bridge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BSignals {
    pub valid: bool,
    pub id: u32,
    pub resp: u8,
}
