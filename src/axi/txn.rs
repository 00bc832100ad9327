use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::common::*;

pub const BYTE_ENABLED: u8 = 0xff;
pub const BYTE_DISABLED: u8 = 0x00;

/// Burst attributes carried alongside a transaction. Everything except
/// `len`, `size` and `burst` is passed through untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AxiAttributes {
    pub id: u32,
    /// beats - 1
    pub len: u8,
    /// log2 of the beat size in bytes
    pub size: u8,
    pub burst: BurstType,
    pub cache: u8,
    pub prot: u8,
    pub qos: u8,
    pub region: u8,
    pub domain: Domain,
    pub snoop: u8,
    pub barrier: Barrier,
    pub exclusive: bool,
    pub stash_nid: Option<u16>,
    pub stash_lpid: Option<u8>,
    pub user: u64,
}

impl AxiAttributes {
    pub fn beats(&self) -> u32 {
        u32::from(self.len) + 1
    }
    pub fn beat_size(&self) -> u32 {
        1 << self.size
    }
}

/// One memory access as seen by the transaction-level side.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub address: u64,
    pub command: Command,
    pub attrs: AxiAttributes,
    pub resp: Resp,
    data: Vec<u8>,
    byte_enable: Vec<u8>,
}

impl Transaction {
    /// Buffers are sized to the whole burst. Only writes carry a byte-enable
    /// buffer; it starts out all disabled.
    pub fn new(command: Command, address: u64, attrs: AxiAttributes) -> Self {
        let len = (attrs.beats() * attrs.beat_size()) as usize;
        let byte_enable = match command {
            Command::Write => vec![BYTE_DISABLED; len],
            Command::Read => Vec::new(),
        };
        Transaction {
            address,
            command,
            attrs,
            resp: Resp::Okay,
            data: vec![0; len],
            byte_enable,
        }
    }

    pub fn is_read(&self) -> bool {
        self.command == Command::Read
    }
    pub fn is_write(&self) -> bool {
        self.command == Command::Write
    }
    pub fn length_beats(&self) -> u32 {
        self.attrs.beats()
    }
    pub fn beat_size_bytes(&self) -> u32 {
        self.attrs.beat_size()
    }
    pub fn data(&self) -> &[u8] {
        &self.data
    }
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
    pub fn byte_enable(&self) -> &[u8] {
        &self.byte_enable
    }
    pub fn data_and_byte_enable_mut(&mut self) -> (&mut [u8], &mut [u8]) {
        (&mut self.data, &mut self.byte_enable)
    }

    /// Cuts data and byte-enable down to the active length of a write.
    pub fn truncate(&mut self, len: usize) {
        self.data.truncate(len);
        self.byte_enable.truncate(len);
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} id={} addr={:#x} len={} size={}",
            self.command,
            self.attrs.id,
            self.address,
            self.attrs.len,
            self.attrs.beat_size()
        )
    }
}

/// Transaction shared by reference between the bridge and its collaborator.
#[derive(Debug, Clone)]
pub struct SharedTxn(Arc<Mutex<Transaction>>);

impl SharedTxn {
    pub fn new(txn: Transaction) -> Self {
        SharedTxn(Arc::new(Mutex::new(txn)))
    }

    pub fn lock(&self) -> MutexGuard<'_, Transaction> {
        // a poisoned lock only means a panicking model, the record itself is intact
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn same(&self, other: &SharedTxn) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn describe(&self) -> String {
        self.lock().to_string()
    }
}
