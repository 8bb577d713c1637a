use crate::Ring::Buffer::RingBuffer;
use crate::Ring::Structs::Cell;
use crate::Ring::{ReadLease, WriteLease};
use std::fmt;
use std::sync::atomic::Ordering;

/// Debug function for RingBuffer
///
/// Shows the cursors as a best-effort snapshot, the derived occupancy and
/// the gate flags. Never dereferences a cell, so it is safe to call while
/// leases are outstanding.
pub fn debug_ring_buffer(buffer: &RingBuffer, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RingBuffer")
        .field("capacity", &buffer.capacity)
        .field("payload_size", &buffer.payload_size)
        .field("head", &buffer.head.load(Ordering::Relaxed))
        .field("tail", &buffer.tail.load(Ordering::Relaxed))
        .field("read_cursor", &buffer.read_cursor.load(Ordering::Relaxed))
        .field("free_slots", &buffer.free_slots())
        .field("write_waiting", &buffer.is_write_waiting())
        .field("read_waiting", &buffer.is_read_waiting())
        .finish()
}

/// Debug function for Cell
///
/// Prints the header and the payload length, not the payload bytes.
pub fn debug_cell(cell: &Cell, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Cell")
        .field("magic", &format_args!("0x{:08x}", cell.magic()))
        .field("index", &cell.index())
        .field("capacity", &cell.capacity())
        .field("len", &cell.len())
        .field("timestamp_ns", &cell.timestamp_ns())
        .finish_non_exhaustive()
}

impl fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_ring_buffer(self, f)
    }
}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_cell(self, f)
    }
}

impl fmt::Debug for WriteLease<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteLease")
            .field("slot", &self.slot())
            .field("cell", &**self)
            .finish()
    }
}

impl fmt::Debug for ReadLease<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadLease")
            .field("slot", &self.slot())
            .field("cell", &**self)
            .finish()
    }
}
