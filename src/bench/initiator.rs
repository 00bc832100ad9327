use std::collections::VecDeque;

use asynchronix::model::{Model, Output};
use log::{debug, info, warn};

use crate::axi::beat::beat_window;
use crate::axi::signals::*;
use crate::axi::{BridgeError, BurstType, Command, Resp};
use crate::config::ReadyPattern;

/// A read burst as the master issues it. `size` is the beat size in bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadBurst {
    pub id: u32,
    pub addr: u64,
    pub beats: u32,
    pub size: u32,
    pub burst: BurstType,
    pub exclusive: bool,
}

impl ReadBurst {
    pub fn new(id: u32, addr: u64, beats: u32, size: u32) -> Self {
        ReadBurst {
            id,
            addr,
            beats,
            size,
            burst: BurstType::Incr,
            exclusive: false,
        }
    }

    fn signals(&self) -> ArSignals {
        ArSignals {
            valid: true,
            id: self.id,
            addr: self.addr,
            len: (self.beats - 1) as u8,
            size: self.size.trailing_zeros() as u8,
            burst: self.burst.bits(),
            lock: self.exclusive,
            ..ArSignals::default()
        }
    }
}

/// A write burst. `data` holds the bytes from `addr` onwards; every byte
/// present is strobed unless `byte_enable` says otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteBurst {
    pub id: u32,
    pub addr: u64,
    pub beats: u32,
    pub size: u32,
    pub burst: BurstType,
    pub exclusive: bool,
    pub data: Vec<u8>,
    /// cycles the address is held back once it reaches the channel; the data
    /// beats go out meanwhile
    pub aw_delay: u32,
    pub stash_nid: Option<u16>,
    pub stash_lpid: Option<u8>,
    pub user: u64,
    /// one flag per data byte, `None` enables them all
    pub byte_enable: Option<Vec<bool>>,
    /// WLAST on the final beat; cleared, the burst never signals its end
    pub wlast: bool,
}

impl WriteBurst {
    pub fn new(id: u32, addr: u64, beats: u32, size: u32, data: Vec<u8>) -> Self {
        WriteBurst {
            id,
            addr,
            beats,
            size,
            burst: BurstType::Incr,
            exclusive: false,
            data,
            aw_delay: 0,
            stash_nid: None,
            stash_lpid: None,
            user: 0,
            byte_enable: None,
            wlast: true,
        }
    }

    fn signals(&self) -> AwSignals {
        AwSignals {
            valid: true,
            id: self.id,
            addr: self.addr,
            len: (self.beats - 1) as u8,
            size: self.size.trailing_zeros() as u8,
            burst: self.burst.bits(),
            lock: self.exclusive,
            stash_nid: self.stash_nid.unwrap_or_default(),
            stash_nid_en: self.stash_nid.is_some(),
            stash_lpid: self.stash_lpid.unwrap_or_default(),
            stash_lpid_en: self.stash_lpid.is_some(),
            user: self.user,
            ..AwSignals::default()
        }
    }

    fn data_beats(&self, bus_bytes: usize) -> Vec<WSignals> {
        (0..self.beats)
            .map(|beat| {
                let win = beat_window(self.addr, beat, self.size as usize, bus_bytes, self.data.len());
                let mut lanes = vec![0u8; bus_bytes];
                lanes[win.lane_range()].copy_from_slice(&self.data[win.buffer_range()]);
                let strb = win
                    .lane_range()
                    .zip(win.buffer_range())
                    .filter(|&(_, i)| self.byte_enable.as_ref().map_or(true, |en| en.get(i) == Some(&true)))
                    .fold(0u128, |s, (lane, _)| s | 1u128 << lane);
                WSignals {
                    valid: true,
                    data: lanes,
                    strb,
                    last: self.wlast && beat + 1 == self.beats,
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusOp {
    Read(ReadBurst),
    Write(WriteBurst),
}

impl BusOp {
    /// Checks that the burst fits the AxLEN and AxSIZE encodings.
    pub fn check(&self) -> Result<(), BridgeError> {
        let (beats, size) = match self {
            BusOp::Read(b) => (b.beats, b.size),
            BusOp::Write(b) => (b.beats, b.size),
        };
        if !(1..=256).contains(&beats) {
            return Err(BridgeError::InvalidEncoding {
                field: "len",
                value: u64::from(beats),
            });
        }
        if !size.is_power_of_two() || size > 128 {
            return Err(BridgeError::InvalidEncoding {
                field: "size",
                value: u64::from(size),
            });
        }
        Ok(())
    }
}

/// A burst whose response has been received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub command: Command,
    pub id: u32,
    pub address: u64,
    pub data: Vec<u8>,
    pub resp: Resp,
    /// cycle of the final handshake
    pub cycle: u64,
}

struct ReadCollect {
    burst: ReadBurst,
    data: Vec<u8>,
    beat: u32,
    active: usize,
}

struct AddressWrite {
    burst: WriteBurst,
    hold: u32,
}

/// Pin-level master. Handshakes are evaluated on the rising edge with the
/// values seen during the cycle before it, then the outputs for the next
/// cycle are driven.
pub struct PinInitiator {
    bus_bytes: usize,
    ready: ReadyPattern,
    cycle: u64,

    ar_queue: VecDeque<ReadBurst>,
    aw_queue: VecDeque<AddressWrite>,
    w_queue: VecDeque<WSignals>,
    reads: VecDeque<ReadCollect>,
    writes: VecDeque<WriteBurst>,
    completions: Vec<Completion>,

    // latched inputs
    ar_ready: bool,
    aw_ready: bool,
    w_ready: bool,
    r: RSignals,
    b: BSignals,

    // driven outputs
    ar: ArSignals,
    aw: AwSignals,
    w: WSignals,
    r_ready: bool,
    b_ready: bool,
    pub o_ar: Output<ArSignals>,
    pub o_aw: Output<AwSignals>,
    pub o_w: Output<WSignals>,
    pub o_r_ready: Output<bool>,
    pub o_b_ready: Output<bool>,
}

impl PinInitiator {
    pub fn new(bus_bytes: usize, ready: ReadyPattern) -> Self {
        PinInitiator {
            bus_bytes,
            ready,
            cycle: 0,
            ar_queue: VecDeque::new(),
            aw_queue: VecDeque::new(),
            w_queue: VecDeque::new(),
            reads: VecDeque::new(),
            writes: VecDeque::new(),
            completions: Vec::new(),
            ar_ready: false,
            aw_ready: false,
            w_ready: false,
            r: RSignals::default(),
            b: BSignals::default(),
            ar: ArSignals::default(),
            aw: AwSignals::default(),
            w: WSignals::default(),
            r_ready: false,
            b_ready: false,
            o_ar: Output::new(),
            o_aw: Output::new(),
            o_w: Output::new(),
            o_r_ready: Output::new(),
            o_b_ready: Output::new(),
        }
    }

    // helper functions

    fn collect_read(&mut self, r: RSignals) {
        let Some(pos) = self.reads.iter().position(|c| c.burst.id == r.id) else {
            warn!("read data for unknown id {}", r.id);
            return;
        };
        let bus_bytes = self.bus_bytes;
        let c = &mut self.reads[pos];
        let win = beat_window(c.burst.addr, c.beat, c.burst.size as usize, bus_bytes, c.data.len());
        c.data[win.buffer_range()].copy_from_slice(&r.data[win.lane_range()]);
        c.active = c.active.max(win.offset + win.len);
        c.beat += 1;
        if !r.last {
            return;
        }
        if let Some(mut c) = self.reads.remove(pos) {
            if c.beat != c.burst.beats {
                warn!("RLAST after {} of {} beats for id {}", c.beat, c.burst.beats, r.id);
            }
            c.data.truncate(c.active);
            info!("read id {} at {:#x} done in cycle {}", r.id, c.burst.addr, self.cycle);
            self.completions.push(Completion {
                command: Command::Read,
                id: r.id,
                address: c.burst.addr,
                data: c.data,
                resp: Resp::from(r.resp),
                cycle: self.cycle,
            });
        }
    }

    fn complete_write(&mut self, b: BSignals) {
        let Some(burst) = self
            .writes
            .iter()
            .position(|w| w.id == b.id)
            .and_then(|pos| self.writes.remove(pos))
        else {
            warn!("write response for unknown id {}", b.id);
            return;
        };
        info!("write id {} at {:#x} done in cycle {}", b.id, burst.addr, self.cycle);
        self.completions.push(Completion {
            command: Command::Write,
            id: b.id,
            address: burst.addr,
            data: burst.data,
            resp: Resp::from(b.resp),
            cycle: self.cycle,
        });
    }

    /// Retires every transfer that saw valid and ready in the last cycle.
    fn handshakes(&mut self) {
        if self.ar.valid && self.ar_ready {
            if let Some(burst) = self.ar_queue.pop_front() {
                debug!("AR handshake for id {}", burst.id);
                let len = (burst.beats * burst.size) as usize;
                self.reads.push_back(ReadCollect {
                    burst,
                    data: vec![0; len],
                    beat: 0,
                    active: 0,
                });
            }
        }
        if self.aw.valid && self.aw_ready {
            if let Some(entry) = self.aw_queue.pop_front() {
                debug!("AW handshake for id {}", entry.burst.id);
                self.writes.push_back(entry.burst);
            }
        }
        if self.w.valid && self.w_ready {
            self.w_queue.pop_front();
        }
        if self.r.valid && self.r_ready {
            self.collect_read(self.r.clone());
        }
        if self.b.valid && self.b_ready {
            self.complete_write(self.b.clone());
        }
    }

    async fn update_outputs(&mut self) {
        let ar = self.ar_queue.front().map(ReadBurst::signals).unwrap_or_default();
        drive(&mut self.o_ar, &mut self.ar, ar).await;

        let aw = match self.aw_queue.front_mut() {
            Some(entry) if entry.hold > 0 => {
                entry.hold -= 1;
                AwSignals::default()
            }
            Some(entry) => entry.burst.signals(),
            None => AwSignals::default(),
        };
        drive(&mut self.o_aw, &mut self.aw, aw).await;

        let w = self.w_queue.front().cloned().unwrap_or_default();
        drive(&mut self.o_w, &mut self.w, w).await;

        let ready = match self.ready {
            ReadyPattern::Always => true,
            ReadyPattern::Toggle => self.cycle % 2 == 0,
        };
        drive(&mut self.o_r_ready, &mut self.r_ready, ready).await;
        drive(&mut self.o_b_ready, &mut self.b_ready, ready).await;
    }

    //  inputs

    pub async fn push(&mut self, op: BusOp) {
        if let Err(e) = op.check() {
            warn!("dropping burst: {}", e);
            return;
        }
        match op {
            BusOp::Read(burst) => self.ar_queue.push_back(burst),
            BusOp::Write(burst) => {
                self.w_queue.extend(burst.data_beats(self.bus_bytes));
                let hold = burst.aw_delay;
                self.aw_queue.push_back(AddressWrite { burst, hold });
            }
        }
    }

    pub async fn on_ar_ready(&mut self, ready: bool) {
        self.ar_ready = ready;
    }
    pub async fn on_aw_ready(&mut self, ready: bool) {
        self.aw_ready = ready;
    }
    pub async fn on_w_ready(&mut self, ready: bool) {
        self.w_ready = ready;
    }
    pub async fn on_r(&mut self, r: RSignals) {
        self.r = r;
    }
    pub async fn on_b(&mut self, b: BSignals) {
        self.b = b;
    }

    pub async fn on_clock_edge(&mut self, _: ()) {
        self.cycle += 1;
        self.handshakes();
        self.update_outputs().await;
    }

    // queries

    pub async fn completions(&mut self, _: ()) -> Vec<Completion> {
        self.completions.clone()
    }

    pub async fn is_done(&mut self, _: ()) -> bool {
        self.ar_queue.is_empty()
            && self.aw_queue.is_empty()
            && self.w_queue.is_empty()
            && self.reads.is_empty()
            && self.writes.is_empty()
    }
}

impl Model for PinInitiator {}
