use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use asynchronix::model::{Model, Output};
use asynchronix::time::Scheduler;
use log::{debug, trace, warn};

use crate::axi::beat::burst_address;
use crate::axi::txn::BYTE_ENABLED;
use crate::axi::*;

/// A forward call as seen by the memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseRecord {
    pub phase: Phase,
    pub command: Command,
    pub id: u32,
    /// data length of the transaction when the call arrived
    pub data_len: usize,
    pub delay: Duration,
}

struct Active {
    txn: SharedTxn,
    beat: u32,
}

/// Request and response latencies of a [`MemoryTarget`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryTiming {
    /// non-zero answers requests with `Accepted` and ends them later
    pub accept: Duration,
    /// delay returned with `Updated` when `accept` is zero
    pub update: Duration,
    pub response: Duration,
}

/// Transaction-level memory behind the bridge. Requests are served one at a
/// time in arrival order; read data goes back beat by beat.
pub struct MemoryTarget {
    timing: MemoryTiming,
    memory: HashMap<u64, u8>,
    queue: VecDeque<SharedTxn>,
    active: Option<Active>,
    log: VecDeque<PhaseRecord>,
    log_depth: usize,
    requests: Vec<SharedTxn>,
    pub o_bw: Output<BwCall>,
}

impl MemoryTarget {
    pub fn new(timing: MemoryTiming, log_depth: usize) -> Self {
        MemoryTarget {
            timing,
            memory: HashMap::new(),
            queue: VecDeque::new(),
            active: None,
            log: VecDeque::new(),
            log_depth,
            requests: Vec::new(),
            o_bw: Output::new(),
        }
    }

    // helper functions

    fn byte_address(t: &Transaction, index: usize) -> u64 {
        let size = t.beat_size_bytes() as usize;
        match t.attrs.burst {
            BurstType::Incr => t.address + index as u64,
            burst => {
                let beat = (index / size) as u32;
                burst_address(t.address, beat, size as u32, t.length_beats(), burst) + (index % size) as u64
            }
        }
    }

    fn perform(&mut self, txn: &SharedTxn) {
        let mut t = txn.lock();
        match t.command {
            Command::Write => {
                for i in 0..t.data().len() {
                    if t.byte_enable()[i] == BYTE_ENABLED {
                        self.memory.insert(Self::byte_address(&t, i), t.data()[i]);
                    }
                }
            }
            Command::Read => {
                for i in 0..t.data().len() {
                    let addr = Self::byte_address(&t, i);
                    t.data_mut()[i] = self.memory.get(&addr).copied().unwrap_or_default();
                }
            }
        }
        t.resp = if t.attrs.exclusive { Resp::ExOkay } else { Resp::Okay };
        debug!("served {}", *t);
    }

    fn log_call(&mut self, record: PhaseRecord) {
        if self.log_depth == 0 {
            return;
        }
        if self.log.len() == self.log_depth {
            self.log.pop_front();
        }
        self.log.push_back(record);
    }

    async fn accept(&mut self, txn: SharedTxn, end: Phase, scheduler: &Scheduler<Self>) -> SyncStatus {
        if self.timing.accept.is_zero() {
            if end == Phase::EndReq {
                // the request only ends once the returned delay has passed
                if self.timing.update.is_zero() {
                    self.enqueue(txn, scheduler);
                } else if let Err(e) =
                    scheduler.schedule_event(scheduler.time() + self.timing.update, Self::_on_enqueue, txn)
                {
                    warn!("could not schedule request: {:?}", e);
                }
            }
            return SyncStatus::Updated(self.timing.update);
        }
        let deadline = scheduler.time() + self.timing.accept;
        if let Err(e) = scheduler.schedule_event(deadline, Self::_on_end_request, (txn, end)) {
            warn!("could not schedule {}: {:?}", end, e);
        }
        SyncStatus::Accepted
    }

    fn enqueue(&mut self, txn: SharedTxn, scheduler: &Scheduler<Self>) {
        self.queue.push_back(txn);
        self.serve_next(scheduler);
    }

    fn serve_next(&mut self, scheduler: &Scheduler<Self>) {
        if self.active.is_some() {
            return;
        }
        if let Some(txn) = self.queue.pop_front() {
            self.active = Some(Active { txn, beat: 0 });
            let deadline = scheduler.time() + self.timing.response;
            if let Err(e) = scheduler.schedule_event(deadline, Self::_on_respond, ()) {
                warn!("could not schedule response: {:?}", e);
            }
        }
    }

    async fn send_beat(&mut self) {
        let Some(active) = &self.active else {
            return;
        };
        let beats = active.txn.lock().length_beats();
        let is_read = active.txn.lock().is_read();
        let phase = if is_read && active.beat + 1 < beats {
            Phase::BeginPartialResp
        } else {
            Phase::BeginResp
        };
        let call = BwCall {
            txn: active.txn.clone(),
            phase,
            delay: Duration::ZERO,
        };
        self.o_bw.send(call).await;
    }

    //  inputs (internal inputs are prefixed with _)

    async fn _on_end_request(&mut self, (txn, end): (SharedTxn, Phase), scheduler: &Scheduler<Self>) {
        let call = BwCall {
            txn: txn.clone(),
            phase: end,
            delay: Duration::ZERO,
        };
        self.o_bw.send(call).await;
        if end == Phase::EndReq {
            self.enqueue(txn, scheduler);
        }
    }

    async fn _on_enqueue(&mut self, txn: SharedTxn, scheduler: &Scheduler<Self>) {
        self.enqueue(txn, scheduler);
    }

    async fn _on_respond(&mut self, _: ()) {
        let Some(txn) = self.active.as_ref().map(|a| a.txn.clone()) else {
            return;
        };
        self.perform(&txn);
        self.send_beat().await;
    }

    async fn _on_next_beat(&mut self, _: ()) {
        self.send_beat().await;
    }

    /// Forward transport from the bridge.
    pub async fn nb_transport_fw(&mut self, call: FwCall, scheduler: &Scheduler<Self>) -> SyncStatus {
        let (command, id, data_len) = {
            let t = call.txn.lock();
            (t.command, t.attrs.id, t.data().len())
        };
        trace!("nb_transport_fw with {} for {} id {}", call.phase, command, id);
        self.log_call(PhaseRecord {
            phase: call.phase,
            command,
            id,
            data_len,
            delay: call.delay,
        });
        if call.phase == Phase::BeginReq {
            self.requests.push(call.txn.clone());
        }
        match call.phase {
            Phase::BeginPartialReq => self.accept(call.txn, Phase::EndPartialReq, scheduler).await,
            Phase::BeginReq => self.accept(call.txn, Phase::EndReq, scheduler).await,
            Phase::EndPartialResp => {
                if let Some(active) = self.active.as_mut() {
                    active.beat += 1;
                }
                let delay = call.delay.max(Duration::from_nanos(1));
                if let Err(e) = scheduler.schedule_event(scheduler.time() + delay, Self::_on_next_beat, ()) {
                    warn!("could not schedule next beat: {:?}", e);
                }
                SyncStatus::Accepted
            }
            Phase::EndResp => {
                self.requests.retain(|t| !t.same(&call.txn));
                self.active = None;
                self.serve_next(scheduler);
                SyncStatus::Accepted
            }
            phase => {
                warn!("memory ignores {}", phase);
                SyncStatus::Accepted
            }
        }
    }

    /// Backdoor write.
    pub async fn poke(&mut self, (addr, bytes): (u64, Vec<u8>)) {
        for (i, b) in bytes.into_iter().enumerate() {
            self.memory.insert(addr + i as u64, b);
        }
    }

    // queries

    pub async fn peek(&mut self, (addr, len): (u64, usize)) -> Vec<u8> {
        (0..len)
            .map(|i| self.memory.get(&(addr + i as u64)).copied().unwrap_or_default())
            .collect()
    }

    pub async fn phase_log(&mut self, _: ()) -> Vec<PhaseRecord> {
        self.log.iter().cloned().collect()
    }

    pub async fn take_phase_log(&mut self, _: ()) -> Vec<PhaseRecord> {
        self.log.drain(..).collect()
    }

    /// Transactions that reached BEGIN_REQ and are still being served.
    pub async fn requests(&mut self, _: ()) -> Vec<SharedTxn> {
        self.requests.clone()
    }
}

impl Model for MemoryTarget {}
