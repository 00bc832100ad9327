use std::fmt;
use std::time::Duration;

use super::error::BridgeError;
use super::txn::SharedTxn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Read,
    Write,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Read => write!(f, "read"),
            Command::Write => write!(f, "write"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BurstType {
    Fixed,
    #[default]
    Incr,
    Wrap,
}

impl TryFrom<u8> for BurstType {
    type Error = BridgeError;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        match bits {
            0 => Ok(BurstType::Fixed),
            1 => Ok(BurstType::Incr),
            2 => Ok(BurstType::Wrap),
            _ => Err(BridgeError::InvalidEncoding { field: "burst", value: bits.into() }),
        }
    }
}

impl BurstType {
    pub fn bits(self) -> u8 {
        match self {
            BurstType::Fixed => 0,
            BurstType::Incr => 1,
            BurstType::Wrap => 2,
        }
    }
}

// ACE shareability domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Domain {
    #[default]
    NonShareable,
    InnerShareable,
    OuterShareable,
    System,
}

impl From<u8> for Domain {
    fn from(bits: u8) -> Self {
        match bits & 0x3 {
            0 => Domain::NonShareable,
            1 => Domain::InnerShareable,
            2 => Domain::OuterShareable,
            _ => Domain::System,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Barrier {
    #[default]
    RespectBarrier,
    MemoryBarrier,
    IgnoreBarrier,
    SyncBarrier,
}

impl From<u8> for Barrier {
    fn from(bits: u8) -> Self {
        match bits & 0x3 {
            0 => Barrier::RespectBarrier,
            1 => Barrier::MemoryBarrier,
            2 => Barrier::IgnoreBarrier,
            _ => Barrier::SyncBarrier,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resp {
    #[default]
    Okay,
    ExOkay,
    SlvErr,
    DecErr,
}

impl Resp {
    pub fn bits(self) -> u8 {
        match self {
            Resp::Okay => 0,
            Resp::ExOkay => 1,
            Resp::SlvErr => 2,
            Resp::DecErr => 3,
        }
    }
}

impl From<u8> for Resp {
    fn from(bits: u8) -> Self {
        match bits & 0x3 {
            0 => Resp::Okay,
            1 => Resp::ExOkay,
            2 => Resp::SlvErr,
            _ => Resp::DecErr,
        }
    }
}

// MESSAGE TYPES

/// Transaction-level handshake phases exchanged with the collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    BeginReq,
    EndReq,
    BeginPartialReq,
    EndPartialReq,
    BeginResp,
    EndResp,
    BeginPartialResp,
    EndPartialResp,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::BeginReq => "BEGIN_REQ",
            Phase::EndReq => "END_REQ",
            Phase::BeginPartialReq => "BEGIN_PARTIAL_REQ",
            Phase::EndPartialReq => "END_PARTIAL_REQ",
            Phase::BeginResp => "BEGIN_RESP",
            Phase::EndResp => "END_RESP",
            Phase::BeginPartialResp => "BEGIN_PARTIAL_RESP",
            Phase::EndPartialResp => "END_PARTIAL_RESP",
        };
        f.write_str(name)
    }
}

/// Answer of a forward call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// the collaborator completes the phase later through the backward path
    Accepted,
    /// the phase is complete after the given delay
    Updated(Duration),
}

/// Forward (bridge -> collaborator) non-blocking transport call.
#[derive(Clone)]
pub struct FwCall {
    pub txn: SharedTxn,
    pub phase: Phase,
    pub delay: Duration,
}

/// Backward (collaborator -> bridge) non-blocking transport call.
#[derive(Clone)]
pub struct BwCall {
    pub txn: SharedTxn,
    pub phase: Phase,
    pub delay: Duration,
}
