// A leased unit of exchange: fixed metadata header plus a payload buffer that
// is allocated once when the ring is created and never resized.

use crate::Core::clock;
use crate::Core::error::RingError;
use std::alloc::{self, Layout};
use std::ptr;

/// Magic tag stamped into every cell at creation ("ring").
pub const CELL_MAGIC: u32 = 0x7269_6e67;

/// Cell metadata. ABI-stable so the C surface can hand out a pointer to it.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CellHeader {
    /// `CELL_MAGIC` for a cell created by a ring; anything else is garbage
    pub magic: u32,
    /// Producer-supplied sequence index
    pub index: u32,
    /// Payload capacity in bytes, fixed at creation
    pub capacity: u32,
    /// Bytes of the payload in use, written by the producer
    pub len: u32,
    /// Monotonic nanoseconds, usually set when the payload was produced
    pub timestamp_ns: u64,
}

/// One slot's worth of message: header plus exclusively owned payload.
///
/// Cells are only reachable through a lease, which is what makes mutation
/// through `&mut Cell` exclusive.
#[repr(C)]
pub struct Cell {
    pub(crate) header: CellHeader,
    pub(crate) payload: Box<[u8]>,
}

fn zeroed_payload(len: usize) -> Option<Box<[u8]>> {
    if len == 0 {
        return Some(Box::default());
    }
    let layout = Layout::array::<u8>(len).ok()?;
    // Safety: `layout` has non-zero size
    let ptr = unsafe { alloc::alloc_zeroed(layout) };
    if ptr.is_null() {
        return None;
    }
    // Safety: `ptr` owns `len` initialised bytes allocated with the layout
    // `Box<[u8]>` frees with
    Some(unsafe { Box::from_raw(ptr::slice_from_raw_parts_mut(ptr, len)) })
}

impl Cell {
    /// Allocate a zeroed cell with `capacity` payload bytes.
    ///
    /// Returns `None` if the allocator refuses, instead of aborting. The
    /// payload comes from `alloc_zeroed`, so untouched pages stay unbacked.
    pub(crate) fn try_new(capacity: usize) -> Option<Self> {
        let payload = zeroed_payload(capacity)?;
        Some(Self {
            header: CellHeader {
                magic: CELL_MAGIC,
                index: 0,
                capacity: capacity as u32,
                len: 0,
                timestamp_ns: 0,
            },
            payload,
        })
    }

    #[inline]
    pub fn header(&self) -> &CellHeader {
        &self.header
    }

    #[inline]
    pub fn magic(&self) -> u32 {
        self.header.magic
    }

    /// True when the magic tag is intact.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.header.magic == CELL_MAGIC
    }

    #[inline]
    pub fn index(&self) -> u32 {
        self.header.index
    }

    #[inline]
    pub fn set_index(&mut self, index: u32) {
        self.header.index = index;
    }

    /// Payload capacity in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.header.capacity as usize
    }

    /// Bytes in use, as set by the producer.
    #[inline]
    pub fn len(&self) -> usize {
        self.header.len as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.header.len == 0
    }

    /// Set the used length after filling [`payload_mut`](Self::payload_mut) directly.
    pub fn set_len(&mut self, len: usize) -> Result<(), RingError> {
        if len > self.capacity() {
            return Err(RingError::PayloadTooLarge {
                len,
                capacity: self.capacity(),
            });
        }
        self.header.len = len as u32;
        Ok(())
    }

    #[inline]
    pub fn timestamp_ns(&self) -> u64 {
        self.header.timestamp_ns
    }

    #[inline]
    pub fn set_timestamp_ns(&mut self, timestamp_ns: u64) {
        self.header.timestamp_ns = timestamp_ns;
    }

    /// Stamp the cell with the current monotonic time.
    #[inline]
    pub fn stamp(&mut self) {
        self.header.timestamp_ns = clock::monotonic_now_ns();
    }

    /// The whole payload buffer, regardless of `len`.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    #[inline]
    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.payload
    }

    /// The bytes in use: `payload()[..len()]`.
    #[inline]
    pub fn data(&self) -> &[u8] {
        // len is writable through the C header, so clamp it
        &self.payload[..self.len().min(self.payload.len())]
    }

    /// Copy `data` into the payload and set `len` to match.
    pub fn write(&mut self, data: &[u8]) -> Result<(), RingError> {
        if data.len() > self.payload.len() {
            return Err(RingError::PayloadTooLarge {
                len: data.len(),
                capacity: self.payload.len(),
            });
        }
        self.payload[..data.len()].copy_from_slice(data);
        self.header.len = data.len() as u32;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_cell_is_tagged_and_zeroed() {
        let cell = Cell::try_new(32).unwrap();
        assert!(cell.is_valid());
        assert_eq!(cell.magic(), CELL_MAGIC);
        assert_eq!(cell.capacity(), 32);
        assert_eq!(cell.payload().len(), 32);
        assert!(cell.payload().iter().all(|&b| b == 0));
        assert!(cell.is_empty());
        assert_eq!(cell.data(), b"");
    }

    #[test]
    fn unsatisfiable_payload_is_refused() {
        assert!(Cell::try_new(usize::MAX).is_none());
        assert!(Cell::try_new(isize::MAX as usize).is_none());
    }

    #[test]
    fn write_sets_len_and_rejects_oversize() {
        let mut cell = Cell::try_new(4).unwrap();
        cell.write(b"abc").unwrap();
        assert_eq!(cell.len(), 3);
        assert_eq!(cell.data(), b"abc");

        assert_eq!(
            cell.write(b"abcde"),
            Err(RingError::PayloadTooLarge { len: 5, capacity: 4 })
        );
        // failed write leaves the previous content alone
        assert_eq!(cell.data(), b"abc");
    }

    #[test]
    fn set_len_bounds() {
        let mut cell = Cell::try_new(8).unwrap();
        cell.payload_mut()[..2].copy_from_slice(&[0xAA, 0xBB]);
        cell.set_len(2).unwrap();
        assert_eq!(cell.data(), &[0xAA, 0xBB]);
        assert!(cell.set_len(8).is_ok());
        assert!(cell.set_len(9).is_err());
    }

    #[test]
    fn header_leads_the_cell() {
        // the C surface casts a cell pointer to its header
        assert_eq!(memoffset::offset_of!(Cell, header), 0);
    }

    #[test]
    fn stamp_uses_monotonic_clock() {
        let mut cell = Cell::try_new(1).unwrap();
        let before = clock::monotonic_now_ns();
        cell.stamp();
        assert!(cell.timestamp_ns() >= before);
    }
}
