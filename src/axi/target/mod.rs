//! Pin-level ACE-Lite target: samples the five AXI channels and turns them
//! into transaction-level calls on `isckt`, one fsm handle per transaction.

use std::collections::VecDeque;
use std::time::Duration;

use asynchronix::model::{Model, Output, Requestor};
use asynchronix::time::{MonotonicTime, Scheduler};
use log::{error, info, trace};

use super::common::*;
use super::error::BridgeError;
use super::fsm::*;
use super::pending::PendingQueue;
use super::signals::*;
use super::txn::SharedTxn;
use crate::config::BridgeConfig;

mod channels;

/// Response beat handed from the dispatcher to the r/b drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseBeat {
    pub handle: HandleId,
    pub last: bool,
}

/// One beat moved across the pins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeatRecord {
    pub command: Command,
    pub id: u32,
    pub beat: u32,
    pub last: bool,
    pub bytes: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    pub read_bursts: u64,
    pub write_bursts: u64,
    pub read_beats: u64,
    pub write_beats: u64,
    pub completed: u64,
}

// address channels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AddrState {
    Idle,
    WaitEndReq,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WDataState {
    Idle,
    WaitAddress,
    WaitEndReq { last: bool },
    Ready { last: bool },
}

// r and b channels, valid only changes on the rising edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RespState {
    Idle,
    Driving(ResponseBeat),
    Handshaken,
}

pub struct AceLiteTarget {
    config: BridgeConfig,
    bus_bytes: usize,
    period: Duration,
    last_edge_ns: i128,

    // latched inputs
    ar: ArSignals,
    aw: AwSignals,
    w: WSignals,
    r_ready: bool,
    b_ready: bool,

    // driven outputs
    ar_ready: bool,
    aw_ready: bool,
    w_ready: bool,
    r: RSignals,
    b: BSignals,
    pub o_ar_ready: Output<bool>,
    pub o_aw_ready: Output<bool>,
    pub o_w_ready: Output<bool>,
    pub o_r: Output<RSignals>,
    pub o_b: Output<BSignals>,

    /// forward transport towards the transaction-level side
    pub isckt: Requestor<FwCall, SyncStatus>,

    handles: HandleArena,
    slots: Slots,
    pending: PendingQueue,
    rresp_queue: VecDeque<ResponseBeat>,
    wresp_queue: VecDeque<ResponseBeat>,

    ar_state: AddrState,
    aw_state: AddrState,
    w_state: WDataState,
    r_state: RespState,
    b_state: RespState,

    fault: Option<BridgeError>,
    /// most recent beats, at most `config.trace_depth`
    trace: VecDeque<BeatRecord>,
    stats: BridgeStats,
}

fn nanos(t: MonotonicTime) -> i128 {
    i128::from(t.as_secs()) * 1_000_000_000 + i128::from(t.subsec_nanos())
}

impl AceLiteTarget {
    pub fn new(config: BridgeConfig, period: Duration) -> Result<Self, BridgeError> {
        config.validate()?;
        Ok(AceLiteTarget {
            bus_bytes: config.bus_bytes(),
            pending: PendingQueue::new(config.pending_depth),
            config,
            period,
            last_edge_ns: 0,
            ar: ArSignals::default(),
            aw: AwSignals::default(),
            w: WSignals::default(),
            r_ready: false,
            b_ready: false,
            ar_ready: false,
            aw_ready: false,
            w_ready: false,
            r: RSignals::default(),
            b: BSignals::default(),
            o_ar_ready: Output::new(),
            o_aw_ready: Output::new(),
            o_w_ready: Output::new(),
            o_r: Output::new(),
            o_b: Output::new(),
            isckt: Requestor::new(),
            handles: HandleArena::new(),
            slots: Slots::default(),
            rresp_queue: VecDeque::new(),
            wresp_queue: VecDeque::new(),
            ar_state: AddrState::Idle,
            aw_state: AddrState::Idle,
            w_state: WDataState::Idle,
            r_state: RespState::Idle,
            b_state: RespState::Idle,
            fault: None,
            trace: VecDeque::new(),
            stats: BridgeStats::default(),
        })
    }

    // helper functions

    fn until_next_edge(&self, now: MonotonicTime) -> Duration {
        let next = self.last_edge_ns + self.period.as_nanos() as i128;
        let now = nanos(now);
        if next > now {
            Duration::from_nanos((next - now) as u64)
        } else {
            self.period
        }
    }

    fn record(&mut self, record: BeatRecord) {
        if self.config.trace_depth == 0 {
            return;
        }
        if self.trace.len() == self.config.trace_depth {
            self.trace.pop_front();
        }
        self.trace.push_back(record);
    }

    /// Latches the first fatal error and stops every channel.
    async fn raise(&mut self, err: BridgeError) {
        if self.fault.is_some() {
            return;
        }
        error!("fatal protocol error, bridge halted: {}", err);
        self.fault = Some(err);
        drive(&mut self.o_ar_ready, &mut self.ar_ready, false).await;
        drive(&mut self.o_aw_ready, &mut self.aw_ready, false).await;
        drive(&mut self.o_w_ready, &mut self.w_ready, false).await;
        drive(&mut self.o_r, &mut self.r, RSignals::default()).await;
        drive(&mut self.o_b, &mut self.b, BSignals::default()).await;
    }

    async fn forward(&mut self, txn: SharedTxn, phase: Phase, delay: Duration) -> Result<SyncStatus, BridgeError> {
        self.isckt
            .send(FwCall { txn, phase, delay })
            .await
            .next()
            .ok_or(BridgeError::Unbound)
    }

    async fn forward_request(
        &mut self,
        txn: SharedTxn,
        phase: Phase,
        end: TimePoint,
    ) -> Result<Option<(TimePoint, Duration)>, BridgeError> {
        match self.forward(txn, phase, Duration::ZERO).await? {
            SyncStatus::Updated(delay) => Ok(Some((end, delay))),
            SyncStatus::Accepted => Ok(None),
        }
    }

    /// Queues `tp` for handle `id` on the scheduler, `delay` from now.
    fn defer(tp: TimePoint, id: HandleId, delay: Duration, scheduler: &Scheduler<Self>) -> Result<(), String> {
        scheduler
            .schedule_event(scheduler.time() + delay, Self::on_time_point, (id, tp))
            .map_err(|e| format!("{:?}", e))
    }

    /// Runs `tp` for handle `id` now, or schedules it after `delay`.
    async fn schedule(&mut self, tp: TimePoint, id: HandleId, delay: Duration, scheduler: &Scheduler<Self>) {
        if delay.is_zero() {
            self.react(tp, id, scheduler).await;
        } else if let Err(reason) = Self::defer(tp, id, delay, scheduler) {
            self.raise(BridgeError::Scheduling { tp, reason }).await;
        }
    }

    /// Dispatches a time point and every zero-delay time point it triggers.
    async fn react(&mut self, tp: TimePoint, id: HandleId, scheduler: &Scheduler<Self>) {
        let mut queue = VecDeque::from([(tp, id)]);
        while let Some((tp, id)) = queue.pop_front() {
            if self.fault.is_some() {
                return;
            }
            match self.process(tp, id, scheduler).await {
                Ok(Some((next, delay))) if delay.is_zero() => queue.push_back((next, id)),
                Ok(Some((next, delay))) => {
                    if let Err(reason) = Self::defer(next, id, delay, scheduler) {
                        self.raise(BridgeError::Scheduling { tp: next, reason }).await;
                    }
                }
                Ok(None) => {}
                Err(e) => self.raise(e).await,
            }
        }
    }

    /// Applies one time point to its handle. Returns the follow-up time point
    /// when the collaborator completed a request phase synchronously.
    async fn process(
        &mut self,
        tp: TimePoint,
        id: HandleId,
        scheduler: &Scheduler<Self>,
    ) -> Result<Option<(TimePoint, Duration)>, BridgeError> {
        let (txn, cmd, state) = {
            let h = self.handles.get(id)?;
            (h.txn.clone(), h.command, h.state)
        };
        // a response implies the end of its request
        if matches!(tp, TimePoint::BegResp | TimePoint::BegPartResp) && state == FsmState::Request {
            trace!("implicit EndReq for {}", txn.describe());
            self.end_request(id, cmd, FsmState::RequestDone).await?;
        }
        let state = self.handles.get(id)?.state;
        let next = state.advance(tp, cmd).ok_or_else(|| BridgeError::IllegalTransition {
            tp,
            state,
            txn: txn.describe(),
        })?;
        trace!("{:?} for {} ({})", tp, txn.describe(), id);

        match tp {
            TimePoint::RequestPhaseBeg => {
                let h = self.handles.get_mut(id)?;
                h.state = next;
                h.beat_count = 0;
                Ok(None)
            }
            TimePoint::BegPartReq => {
                self.handles.get_mut(id)?.state = next;
                self.forward_request(txn, Phase::BeginPartialReq, TimePoint::EndPartReq).await
            }
            TimePoint::BegReq => {
                self.handles.get_mut(id)?.state = next;
                self.forward_request(txn, Phase::BeginReq, TimePoint::EndReq).await
            }
            TimePoint::EndPartReq | TimePoint::EndReq => {
                self.end_request(id, cmd, next).await?;
                Ok(None)
            }
            TimePoint::BegPartResp | TimePoint::BegResp => {
                let last = tp == TimePoint::BegResp;
                let h = self.handles.get_mut(id)?;
                // write beats were counted on the request side
                if cmd == Command::Read {
                    let beats = h.txn.lock().length_beats();
                    if h.beat_count >= beats || (!last && h.beat_count + 1 >= beats) {
                        return Err(BridgeError::BeatOverrun {
                            beat: h.beat_count,
                            beats,
                            txn: txn.describe(),
                        });
                    }
                }
                h.state = next;
                self.slots.occupy(SlotKind::RespBeat, cmd, id)?;
                let beat = ResponseBeat { handle: id, last };
                match cmd {
                    Command::Read => self.rresp_queue.push_back(beat),
                    Command::Write => self.wresp_queue.push_back(beat),
                }
                Ok(None)
            }
            TimePoint::EndPartResp => {
                self.handles.get_mut(id)?.state = next;
                let delay = self.until_next_edge(scheduler.time());
                self.forward(txn, Phase::EndPartialResp, delay).await?;
                self.slots.release(SlotKind::RespBeat, Command::Read);
                self.handles.get_mut(id)?.beat_count += 1;
                Ok(None)
            }
            TimePoint::EndResp => {
                self.handles.get_mut(id)?.state = next;
                let delay = self.until_next_edge(scheduler.time());
                self.forward(txn.clone(), Phase::EndResp, delay).await?;
                self.slots.release(SlotKind::RespBeat, cmd);
                self.handles.remove(id)?;
                self.stats.completed += 1;
                info!("completed {}", txn.describe());
                Ok(None)
            }
        }
    }

    /// End of a request beat: frees the request-beat slot and lets the
    /// waiting address-read or write-data driver raise its ready.
    async fn end_request(&mut self, id: HandleId, cmd: Command, next: FsmState) -> Result<(), BridgeError> {
        let h = self.handles.get_mut(id)?;
        h.state = next;
        if cmd == Command::Write {
            h.beat_count += 1;
        }
        self.slots.release(SlotKind::ReqBeat, cmd);
        match cmd {
            Command::Read => self.ar_end_req().await,
            Command::Write => self.w_end_req().await,
        }
        Ok(())
    }

    //  inputs

    pub async fn on_ar(&mut self, ar: ArSignals) {
        self.ar = ar;
    }
    pub async fn on_aw(&mut self, aw: AwSignals) {
        self.aw = aw;
    }
    pub async fn on_w(&mut self, w: WSignals) {
        self.w = w;
    }
    pub async fn on_r_ready(&mut self, ready: bool) {
        self.r_ready = ready;
    }
    pub async fn on_b_ready(&mut self, ready: bool) {
        self.b_ready = ready;
    }

    /// Rising clock edge: one-cycle pulses end here.
    pub async fn on_clock_edge(&mut self, _: (), scheduler: &Scheduler<Self>) {
        self.last_edge_ns = nanos(scheduler.time());
        if self.fault.is_some() {
            return;
        }
        self.ar_edge().await;
        self.aw_edge().await;
        self.w_edge().await;
        if let Err(e) = self.r_edge().await {
            self.raise(e).await;
        }
        if let Err(e) = self.b_edge().await {
            self.raise(e).await;
        }
    }

    /// Sampling point shortly after the rising edge.
    pub async fn on_sample(&mut self, _: (), scheduler: &Scheduler<Self>) {
        if self.fault.is_some() {
            return;
        }
        self.ar_sample(scheduler).await;
        self.aw_sample().await;
        self.w_sample(scheduler).await;
        self.r_sample(scheduler).await;
        self.b_sample(scheduler).await;
    }

    /// Backward transport from the transaction-level side.
    pub async fn nb_transport_bw(&mut self, call: BwCall, scheduler: &Scheduler<Self>) {
        if self.fault.is_some() {
            return;
        }
        trace!("nb_transport_bw with {} delay={:?} of {}", call.phase, call.delay, call.txn.describe());
        let tp = match call.phase {
            Phase::EndPartialReq => TimePoint::EndPartReq,
            Phase::EndReq => TimePoint::EndReq,
            Phase::BeginPartialResp => TimePoint::BegPartResp,
            Phase::BeginResp => TimePoint::BegResp,
            phase => {
                let txn = call.txn.describe();
                self.raise(BridgeError::IllegalPhase { phase, txn }).await;
                return;
            }
        };
        match self.handles.find(&call.txn) {
            Some(id) => self.schedule(tp, id, call.delay, scheduler).await,
            None => self.raise(BridgeError::UnknownTransaction(call.txn.describe())).await,
        }
    }

    async fn on_time_point(&mut self, (id, tp): (HandleId, TimePoint), scheduler: &Scheduler<Self>) {
        self.react(tp, id, scheduler).await;
    }

    // queries

    pub async fn fault(&mut self, _: ()) -> Option<BridgeError> {
        self.fault.clone()
    }
    pub async fn beat_trace(&mut self, _: ()) -> Vec<BeatRecord> {
        self.trace.iter().cloned().collect()
    }
    /// Hands out the recorded beats and clears the trace.
    pub async fn take_beat_trace(&mut self, _: ()) -> Vec<BeatRecord> {
        self.trace.drain(..).collect()
    }
    pub async fn stats(&mut self, _: ()) -> BridgeStats {
        self.stats
    }
    /// True when no transaction is in flight and no address is pending.
    pub async fn is_idle(&mut self, _: ()) -> bool {
        trace!("{} live handles, {} pending addresses", self.handles.len(), self.pending.len());
        self.handles.is_empty() && self.pending.is_empty()
    }
}

impl Model for AceLiteTarget {}
