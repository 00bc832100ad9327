//! Mapping between burst beats and the transaction buffer.
//!
//! A beat occupies a window of bus byte lanes that maps onto a contiguous run
//! of bytes in the transaction buffer. The same arithmetic is used by the
//! bridge to pack read data and unpack write data, and by the pin-level
//! initiator to build and collect beats.

use super::common::BurstType;
use super::txn::{Transaction, BYTE_DISABLED, BYTE_ENABLED};

/// Lanes `lane..lane + len` on the bus carry buffer bytes
/// `offset..offset + len`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeatWindow {
    pub lane: usize,
    pub offset: usize,
    pub len: usize,
}

impl BeatWindow {
    pub fn buffer_range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.len
    }
    pub fn lane_range(&self) -> std::ops::Range<usize> {
        self.lane..self.lane + self.len
    }
}

/// Computes the window of beat `beat` of a burst starting at `address` with
/// `size` byte beats on a `bus_bytes` wide bus over a buffer of `data_len`
/// bytes.
///
/// An access whose first lane is not zero and that would spill past the bus
/// width is treated as an unaligned multi-beat burst: beat 0 carries the
/// bytes from the start lane up to `size`, later beats start on lane 0 and are
/// clipped to the buffer. Narrow bursts whose start lane lies beyond the
/// beat size therefore produce empty windows; strobes are assumed contiguous.
/// A window past the end of the buffer is empty and sits at its end.
pub fn beat_window(address: u64, beat: u32, size: usize, bus_bytes: usize, data_len: usize) -> BeatWindow {
    let byte_offset = beat as usize * size;
    let lane = ((address + byte_offset as u64) & (bus_bytes as u64 - 1)) as usize;
    if lane != 0 && size + lane > bus_bytes {
        if beat == 0 {
            let len = size.saturating_sub(lane).min(data_len);
            BeatWindow { lane, offset: 0, len }
        } else {
            match byte_offset.checked_sub(lane) {
                Some(start) => BeatWindow {
                    lane: 0,
                    offset: start.min(data_len),
                    len: size.min(data_len.saturating_sub(start)),
                },
                None => BeatWindow { lane: 0, offset: 0, len: 0 },
            }
        }
    } else {
        BeatWindow {
            lane,
            offset: byte_offset.min(data_len),
            len: size.min(data_len.saturating_sub(byte_offset)),
        }
    }
}

/// Window of the given beat of `txn`.
pub fn txn_window(txn: &Transaction, beat: u32, bus_bytes: usize) -> BeatWindow {
    beat_window(
        txn.address,
        beat,
        txn.beat_size_bytes() as usize,
        bus_bytes,
        txn.data().len(),
    )
}

/// Builds the bus data of read beat `beat`. Lanes outside the window are zero.
pub fn read_beat(txn: &Transaction, beat: u32, bus_bytes: usize) -> Vec<u8> {
    let win = txn_window(txn, beat, bus_bytes);
    let mut lanes = vec![0u8; bus_bytes];
    lanes[win.lane_range()].copy_from_slice(&txn.data()[win.buffer_range()]);
    lanes
}

/// Stores write beat `beat` into the transaction. A byte is taken, and marked
/// enabled, only where its strobe bit is set. Returns the number of bytes
/// written.
pub fn write_beat(txn: &mut Transaction, beat: u32, bus_bytes: usize, lanes: &[u8], strobe: u128) -> u32 {
    let win = txn_window(txn, beat, bus_bytes);
    let (data, byte_enable) = txn.data_and_byte_enable_mut();
    let mut written = 0;
    for i in 0..win.len {
        let lane = win.lane + i;
        let idx = win.offset + i;
        if strobe & (1u128 << lane) != 0 {
            data[idx] = lanes.get(lane).copied().unwrap_or_default();
            byte_enable[idx] = BYTE_ENABLED;
            written += 1;
        } else {
            byte_enable[idx] = BYTE_DISABLED;
        }
    }
    written
}

/// Address of beat `beat` of a burst, following the AXI burst type.
pub fn burst_address(address: u64, beat: u32, size: u32, beats: u32, burst: BurstType) -> u64 {
    let size = u64::from(size);
    let aligned = address & !(size - 1);
    match burst {
        BurstType::Fixed => address,
        BurstType::Incr if beat == 0 => address,
        BurstType::Incr => aligned + u64::from(beat) * size,
        BurstType::Wrap => {
            let span = size * u64::from(beats);
            let lower = address - address % span;
            lower + ((aligned - lower + u64::from(beat) * size) % span)
        }
    }
}
