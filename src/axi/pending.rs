use std::collections::VecDeque;

use super::common::*;
use super::error::BridgeError;
use super::signals::AwSignals;
use super::txn::AxiAttributes;

/// Write address beat accepted on the pins, waiting for its data burst.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAddress {
    pub id: u32,
    pub addr: u64,
    pub prot: u8,
    pub size: u8,
    pub cache: u8,
    pub burst: u8,
    pub qos: u8,
    pub region: u8,
    pub len: u8,
    pub domain: u8,
    pub snoop: u8,
    pub bar: u8,
    pub unique: bool,
    pub stash_nid: Option<u16>,
    pub stash_lpid: Option<u8>,
    pub exclusive: bool,
    pub user: u64,
}

impl PendingAddress {
    /// Latches the address-write wires. The user sideband is only sampled
    /// when the bus has one.
    pub fn sample(aw: &AwSignals, user_width: u32) -> Self {
        let user = if user_width == 0 {
            0
        } else if user_width >= 64 {
            aw.user
        } else {
            aw.user & ((1u64 << user_width) - 1)
        };
        PendingAddress {
            id: aw.id,
            addr: aw.addr,
            prot: aw.prot,
            size: aw.size,
            cache: aw.cache,
            burst: aw.burst,
            qos: aw.qos,
            region: aw.region,
            len: aw.len,
            domain: aw.domain,
            snoop: aw.snoop,
            bar: aw.bar,
            unique: aw.unique,
            stash_nid: aw.stash_nid_en.then_some(aw.stash_nid),
            stash_lpid: aw.stash_lpid_en.then_some(aw.stash_lpid),
            exclusive: aw.lock,
            user,
        }
    }

    // ACE-Lite has no unique flag on the transaction, it stays on the pins
    pub fn attributes(&self) -> Result<AxiAttributes, BridgeError> {
        Ok(AxiAttributes {
            id: self.id,
            len: self.len,
            size: self.size,
            burst: BurstType::try_from(self.burst)?,
            cache: self.cache,
            prot: self.prot,
            qos: self.qos,
            region: self.region,
            domain: Domain::from(self.domain),
            snoop: self.snoop,
            barrier: Barrier::from(self.bar),
            exclusive: self.exclusive,
            stash_nid: self.stash_nid,
            stash_lpid: self.stash_lpid,
            user: self.user,
        })
    }
}

/// Strict FIFO between the address-write and write-data drivers.
#[derive(Debug)]
pub struct PendingQueue {
    entries: VecDeque<PendingAddress>,
    capacity: usize,
}

impl PendingQueue {
    pub fn new(capacity: usize) -> Self {
        PendingQueue {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Hands the entry back when the queue is full.
    pub fn push(&mut self, entry: PendingAddress) -> Result<(), PendingAddress> {
        if self.is_full() {
            return Err(entry);
        }
        self.entries.push_back(entry);
        Ok(())
    }

    pub fn pop(&mut self) -> Option<PendingAddress> {
        self.entries.pop_front()
    }
}
