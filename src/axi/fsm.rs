use std::fmt;

use super::common::Command;
use super::error::BridgeError;
use super::txn::SharedTxn;

/// Protocol handshake milestones of one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimePoint {
    RequestPhaseBeg,
    BegPartReq,
    EndPartReq,
    BegReq,
    EndReq,
    BegPartResp,
    EndPartResp,
    BegResp,
    EndResp,
}

/// Where a handle stands in its request/response sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FsmState {
    #[default]
    Created,
    RequestPhase,
    PartialRequest,
    PartialRequestDone,
    Request,
    RequestDone,
    PartialResponse,
    PartialResponseDone,
    Response,
    Finished,
}

impl FsmState {
    /// Transition table:
    /// `RequestPhaseBeg -> {BegPartReq -> EndPartReq}* -> BegReq -> EndReq ->
    /// {BegPartResp -> EndPartResp}* -> BegResp -> EndResp`.
    /// Partial requests only exist for writes, partial responses only for reads.
    pub fn advance(self, tp: TimePoint, cmd: Command) -> Option<FsmState> {
        use FsmState::*;
        use TimePoint::*;
        let next = match (self, tp) {
            (Created, RequestPhaseBeg) => RequestPhase,
            (RequestPhase | PartialRequestDone, BegPartReq) if cmd == Command::Write => PartialRequest,
            (PartialRequest, EndPartReq) => PartialRequestDone,
            (RequestPhase | PartialRequestDone, BegReq) => Request,
            (Request, EndReq) => RequestDone,
            (RequestDone | PartialResponseDone, BegPartResp) if cmd == Command::Read => PartialResponse,
            (PartialResponse, EndPartResp) => PartialResponseDone,
            (RequestDone | PartialResponseDone, BegResp) => Response,
            (Response, EndResp) => Finished,
            _ => return None,
        };
        Some(next)
    }
}

/// One in-flight transaction plus its transient bookkeeping.
#[derive(Debug)]
pub struct FsmHandle {
    pub txn: SharedTxn,
    pub command: Command,
    pub state: FsmState,
    /// 0-based index of the current beat
    pub beat_count: u32,
    /// bytes actually written through the strobes so far
    pub write_bytes: u32,
}

impl FsmHandle {
    pub fn new(txn: SharedTxn, command: Command) -> Self {
        FsmHandle {
            txn,
            command,
            state: FsmState::Created,
            beat_count: 0,
            write_bytes: 0,
        }
    }
}

/// Generation-checked reference into a [`HandleArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId {
    index: u32,
    generation: u32,
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

#[derive(Debug)]
struct Entry {
    generation: u32,
    handle: Option<FsmHandle>,
}

/// Storage for live fsm handles with slot reuse through a free list.
#[derive(Debug, Default)]
pub struct HandleArena {
    entries: Vec<Entry>,
    free: Vec<u32>,
}

impl HandleArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, handle: FsmHandle) -> HandleId {
        match self.free.pop() {
            Some(index) => {
                let entry = &mut self.entries[index as usize];
                entry.generation = entry.generation.wrapping_add(1);
                entry.handle = Some(handle);
                HandleId { index, generation: entry.generation }
            }
            None => {
                let index = self.entries.len() as u32;
                self.entries.push(Entry { generation: 0, handle: Some(handle) });
                HandleId { index, generation: 0 }
            }
        }
    }

    pub fn get(&self, id: HandleId) -> Result<&FsmHandle, BridgeError> {
        self.entries
            .get(id.index as usize)
            .filter(|e| e.generation == id.generation)
            .and_then(|e| e.handle.as_ref())
            .ok_or(BridgeError::StaleHandle(id))
    }

    pub fn get_mut(&mut self, id: HandleId) -> Result<&mut FsmHandle, BridgeError> {
        self.entries
            .get_mut(id.index as usize)
            .filter(|e| e.generation == id.generation)
            .and_then(|e| e.handle.as_mut())
            .ok_or(BridgeError::StaleHandle(id))
    }

    pub fn remove(&mut self, id: HandleId) -> Result<FsmHandle, BridgeError> {
        let entry = self
            .entries
            .get_mut(id.index as usize)
            .filter(|e| e.generation == id.generation)
            .ok_or(BridgeError::StaleHandle(id))?;
        let handle = entry.handle.take().ok_or(BridgeError::StaleHandle(id))?;
        self.free.push(id.index);
        Ok(handle)
    }

    /// Finds the live handle owning `txn`.
    pub fn find(&self, txn: &SharedTxn) -> Option<HandleId> {
        self.entries.iter().enumerate().find_map(|(index, e)| {
            e.handle
                .as_ref()
                .filter(|h| h.txn.same(txn))
                .map(|_| HandleId { index: index as u32, generation: e.generation })
        })
    }

    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.handle.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    /// the beat currently in its request phase
    ReqBeat,
    /// the burst owning the data channel, spans all of its beats
    Req,
    /// the beat currently in its response phase
    RespBeat,
}

// read, write, and a third slot reserved for snoop traffic
const SLOT_CLASSES: usize = 3;

fn class_of(cmd: Command) -> usize {
    match cmd {
        Command::Read => 0,
        Command::Write => 1,
    }
}

/// Active-handle table: at most one handle per (kind, command).
#[derive(Debug, Default)]
pub struct Slots {
    req_beat: [Option<HandleId>; SLOT_CLASSES],
    req: [Option<HandleId>; SLOT_CLASSES],
    resp_beat: [Option<HandleId>; SLOT_CLASSES],
}

impl Slots {
    fn table(&self, kind: SlotKind) -> &[Option<HandleId>; SLOT_CLASSES] {
        match kind {
            SlotKind::ReqBeat => &self.req_beat,
            SlotKind::Req => &self.req,
            SlotKind::RespBeat => &self.resp_beat,
        }
    }
    fn table_mut(&mut self, kind: SlotKind) -> &mut [Option<HandleId>; SLOT_CLASSES] {
        match kind {
            SlotKind::ReqBeat => &mut self.req_beat,
            SlotKind::Req => &mut self.req,
            SlotKind::RespBeat => &mut self.resp_beat,
        }
    }

    pub fn get(&self, kind: SlotKind, cmd: Command) -> Option<HandleId> {
        self.table(kind)[class_of(cmd)]
    }

    /// Claims a slot. Re-claiming for the handle already holding it is allowed.
    pub fn occupy(&mut self, kind: SlotKind, cmd: Command, id: HandleId) -> Result<(), BridgeError> {
        let slot = &mut self.table_mut(kind)[class_of(cmd)];
        match *slot {
            Some(held) if held != id => Err(BridgeError::SlotBusy { kind, cmd, held }),
            _ => {
                *slot = Some(id);
                Ok(())
            }
        }
    }

    pub fn release(&mut self, kind: SlotKind, cmd: Command) -> Option<HandleId> {
        self.table_mut(kind)[class_of(cmd)].take()
    }
}
