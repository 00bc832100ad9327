//! The five channel drivers. Handshakes are decided at the sampling point.
//! Ready pulses last until the next rising edge, which is also the only
//! moment a response beat is presented or withdrawn.

use asynchronix::time::Scheduler;
use log::{debug, trace, warn};

use super::*;
use crate::axi::beat;
use crate::axi::pending::PendingAddress;
use crate::axi::txn::{AxiAttributes, Transaction};

impl AceLiteTarget {
    fn check_size(&self, attrs: &AxiAttributes) -> Result<(), BridgeError> {
        // AxSIZE is a 3-bit field
        if attrs.size > 7 || attrs.beat_size() as usize > self.bus_bytes {
            return Err(BridgeError::InvalidEncoding {
                field: "size",
                value: attrs.size.into(),
            });
        }
        Ok(())
    }

    fn read_attributes(&self) -> Result<AxiAttributes, BridgeError> {
        let ar = &self.ar;
        let attrs = AxiAttributes {
            id: ar.id,
            len: ar.len,
            size: ar.size,
            burst: BurstType::try_from(ar.burst)?,
            cache: ar.cache,
            prot: ar.prot,
            qos: ar.qos,
            region: ar.region,
            domain: Domain::from(ar.domain),
            snoop: ar.snoop,
            barrier: Barrier::from(ar.bar),
            exclusive: ar.lock,
            ..AxiAttributes::default()
        };
        self.check_size(&attrs)?;
        Ok(attrs)
    }

    // address read

    pub(super) async fn ar_sample(&mut self, scheduler: &Scheduler<Self>) {
        if self.ar_state != AddrState::Idle || !self.ar.valid {
            return;
        }
        debug!("ARVALID detected for {:#x}", self.ar.addr);
        let attrs = match self.read_attributes() {
            Ok(attrs) => attrs,
            Err(e) => return self.raise(e).await,
        };
        let txn = SharedTxn::new(Transaction::new(Command::Read, self.ar.addr, attrs));
        let id = self.handles.insert(FsmHandle::new(txn, Command::Read));
        if let Err(e) = self.slots.occupy(SlotKind::ReqBeat, Command::Read, id) {
            return self.raise(e).await;
        }
        self.stats.read_bursts += 1;
        self.ar_state = AddrState::WaitEndReq;
        self.react(TimePoint::RequestPhaseBeg, id, scheduler).await;
        self.react(TimePoint::BegReq, id, scheduler).await;
    }

    pub(super) async fn ar_end_req(&mut self) {
        if self.ar_state != AddrState::WaitEndReq {
            warn!("read request ended while the address channel is {:?}", self.ar_state);
            return;
        }
        self.ar_state = AddrState::Ready;
        drive(&mut self.o_ar_ready, &mut self.ar_ready, true).await;
    }

    pub(super) async fn ar_edge(&mut self) {
        if self.ar_state == AddrState::Ready {
            self.ar_state = AddrState::Idle;
            drive(&mut self.o_ar_ready, &mut self.ar_ready, false).await;
        }
    }

    // address write

    pub(super) async fn aw_sample(&mut self) {
        if self.aw_state != AddrState::Idle || !self.aw.valid {
            return;
        }
        let entry = PendingAddress::sample(&self.aw, self.config.user_width);
        match self.pending.push(entry) {
            Ok(()) => {
                debug!("AWVALID detected for {:#x}", self.aw.addr);
                self.aw_state = AddrState::Ready;
                drive(&mut self.o_aw_ready, &mut self.aw_ready, true).await;
            }
            Err(entry) => trace!("pending address queue full, {:#x} waits", entry.addr),
        }
    }

    pub(super) async fn aw_edge(&mut self) {
        if self.aw_state == AddrState::Ready {
            self.aw_state = AddrState::Idle;
            drive(&mut self.o_aw_ready, &mut self.aw_ready, false).await;
        }
    }

    // write data

    pub(super) async fn w_sample(&mut self, scheduler: &Scheduler<Self>) {
        if !matches!(self.w_state, WDataState::Idle | WDataState::WaitAddress) || !self.w.valid {
            return;
        }
        let id = match self.slots.get(SlotKind::Req, Command::Write) {
            Some(id) => id,
            None => match self.pending.pop() {
                Some(entry) => match self.open_write(entry, scheduler).await {
                    Ok(id) => id,
                    Err(e) => return self.raise(e).await,
                },
                None => {
                    if self.w_state == WDataState::Idle {
                        debug!("write data ahead of its address, waiting");
                    }
                    self.w_state = WDataState::WaitAddress;
                    return;
                }
            },
        };
        if let Err(e) = self.w_beat(id, scheduler).await {
            self.raise(e).await;
        }
    }

    async fn open_write(&mut self, entry: PendingAddress, scheduler: &Scheduler<Self>) -> Result<HandleId, BridgeError> {
        let attrs = entry.attributes()?;
        self.check_size(&attrs)?;
        let txn = SharedTxn::new(Transaction::new(Command::Write, entry.addr, attrs));
        debug!("opening {}", txn.describe());
        let id = self.handles.insert(FsmHandle::new(txn, Command::Write));
        self.slots.occupy(SlotKind::Req, Command::Write, id)?;
        self.stats.write_bursts += 1;
        self.react(TimePoint::RequestPhaseBeg, id, scheduler).await;
        Ok(id)
    }

    /// Unpacks the sampled beat into the open burst and starts its request.
    async fn w_beat(&mut self, id: HandleId, scheduler: &Scheduler<Self>) -> Result<(), BridgeError> {
        let (txn, index) = {
            let h = self.handles.get(id)?;
            (h.txn.clone(), h.beat_count)
        };
        let last = self.w.last;
        let (written, axi_id) = {
            let mut t = txn.lock();
            let beats = t.length_beats();
            if index >= beats {
                return Err(BridgeError::BeatOverrun { beat: index, beats, txn: t.to_string() });
            }
            if last && index + 1 != beats {
                warn!("WLAST on beat {} of {} for {}", index, beats, t);
            }
            (beat::write_beat(&mut t, index, self.bus_bytes, &self.w.data, self.w.strb), t.attrs.id)
        };
        let h = self.handles.get_mut(id)?;
        h.write_bytes += written;
        let total = h.write_bytes;
        if last {
            // strobes are assumed contiguous: the active length is the byte count
            txn.lock().truncate(total as usize);
            debug!("write burst of {} complete with {} bytes", txn.describe(), total);
        }
        self.record(BeatRecord {
            command: Command::Write,
            id: axi_id,
            beat: index,
            last,
            bytes: written,
        });
        self.stats.write_beats += 1;
        self.slots.occupy(SlotKind::ReqBeat, Command::Write, id)?;
        self.w_state = WDataState::WaitEndReq { last };
        let tp = if last { TimePoint::BegReq } else { TimePoint::BegPartReq };
        self.react(tp, id, scheduler).await;
        Ok(())
    }

    pub(super) async fn w_end_req(&mut self) {
        match self.w_state {
            WDataState::WaitEndReq { last } => {
                self.w_state = WDataState::Ready { last };
                drive(&mut self.o_w_ready, &mut self.w_ready, true).await;
            }
            state => warn!("write request ended while the data channel is {:?}", state),
        }
    }

    pub(super) async fn w_edge(&mut self) {
        if let WDataState::Ready { last } = self.w_state {
            self.w_state = WDataState::Idle;
            drive(&mut self.o_w_ready, &mut self.w_ready, false).await;
            if last {
                self.slots.release(SlotKind::Req, Command::Write);
            }
        }
    }

    // read response

    /// Presents the next queued read beat, if any.
    async fn r_present(&mut self) -> Result<bool, BridgeError> {
        let Some(next) = self.rresp_queue.pop_front() else {
            return Ok(false);
        };
        let (signals, record) = {
            let h = self.handles.get(next.handle)?;
            let t = h.txn.lock();
            let win = beat::txn_window(&t, h.beat_count, self.bus_bytes);
            let signals = RSignals {
                valid: true,
                id: t.attrs.id,
                data: beat::read_beat(&t, h.beat_count, self.bus_bytes),
                resp: t.resp.bits(),
                last: next.last,
            };
            let record = BeatRecord {
                command: Command::Read,
                id: t.attrs.id,
                beat: h.beat_count,
                last: next.last,
                bytes: win.len as u32,
            };
            (signals, record)
        };
        trace!("read response beat {} of id {}", record.beat, record.id);
        self.record(record);
        self.stats.read_beats += 1;
        self.r_state = RespState::Driving(next);
        drive(&mut self.o_r, &mut self.r, signals).await;
        Ok(true)
    }

    pub(super) async fn r_sample(&mut self, scheduler: &Scheduler<Self>) {
        if let RespState::Driving(beat) = self.r_state {
            if self.r_ready {
                self.r_state = RespState::Handshaken;
                let tp = if beat.last { TimePoint::EndResp } else { TimePoint::EndPartResp };
                self.react(tp, beat.handle, scheduler).await;
            }
        }
    }

    pub(super) async fn r_edge(&mut self) -> Result<(), BridgeError> {
        if matches!(self.r_state, RespState::Driving(_)) || self.r_present().await? {
            return Ok(());
        }
        if self.r_state == RespState::Handshaken {
            self.r_state = RespState::Idle;
            let idle = RSignals {
                valid: false,
                last: false,
                ..self.r.clone()
            };
            drive(&mut self.o_r, &mut self.r, idle).await;
        }
        Ok(())
    }

    // write response

    async fn b_present(&mut self) -> Result<bool, BridgeError> {
        let Some(next) = self.wresp_queue.pop_front() else {
            return Ok(false);
        };
        let signals = {
            let h = self.handles.get(next.handle)?;
            let t = h.txn.lock();
            BSignals {
                valid: true,
                id: t.attrs.id,
                resp: t.resp.bits(),
            }
        };
        trace!("write response of id {}", signals.id);
        self.b_state = RespState::Driving(next);
        drive(&mut self.o_b, &mut self.b, signals).await;
        Ok(true)
    }

    pub(super) async fn b_sample(&mut self, scheduler: &Scheduler<Self>) {
        if let RespState::Driving(beat) = self.b_state {
            if self.b_ready {
                self.b_state = RespState::Handshaken;
                self.react(TimePoint::EndResp, beat.handle, scheduler).await;
            }
        }
    }

    pub(super) async fn b_edge(&mut self) -> Result<(), BridgeError> {
        if matches!(self.b_state, RespState::Driving(_)) || self.b_present().await? {
            return Ok(());
        }
        if self.b_state == RespState::Handshaken {
            self.b_state = RespState::Idle;
            let idle = BSignals { valid: false, ..self.b.clone() };
            drive(&mut self.o_b, &mut self.b, idle).await;
        }
        Ok(())
    }
}
