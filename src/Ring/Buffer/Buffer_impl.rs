use std::cell::UnsafeCell;
use std::mem::size_of;
use std::sync::atomic::Ordering::{AcqRel, Acquire, Relaxed, Release};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, AtomicUsize};
use std::time::Duration;

use super::cursor;
use super::Buffer::{
    RingBuffer, Slot, MAX_CAPACITY, MAX_PAYLOAD_SIZE, SLOT_IDLE, SLOT_READING, SLOT_RETURNED,
};
use crate::Core::clock;
use crate::Core::error::{RingError, Side};
use crate::Core::gate::{GateError, WaitGate};
use crate::Ring::Structs::Cell_Structs::Cell;
use crossbeam_utils::CachePadded;

/// Added to `read_leases` while `clear` runs so no read lease can start.
const CLEARING: usize = usize::MAX / 2;

impl RingBuffer {
    /// Create a ring of `capacity` cells, each with `payload_size` payload bytes.
    ///
    /// Allows a single outstanding read lease; use [`RingBuffer::builder`] to
    /// raise that limit.
    ///
    /// # Returns
    /// * `Ok(RingBuffer)` with every cell allocated
    /// * `Err(InvalidCapacity)` if `capacity` is outside `2..=MAX_CAPACITY`
    /// * `Err(InvalidPayloadSize)` if `payload_size` is outside `1..=MAX_PAYLOAD_SIZE`
    /// * `Err(AllocationFailed)` if any cell could not be allocated; nothing is leaked
    pub fn new(capacity: usize, payload_size: usize) -> Result<Self, RingError> {
        Self::with_limits(capacity, payload_size, 1)
    }

    pub(crate) fn with_limits(
        capacity: usize,
        payload_size: usize,
        max_read_leases: usize,
    ) -> Result<Self, RingError> {
        if !(2..=MAX_CAPACITY).contains(&capacity) {
            return Err(RingError::InvalidCapacity(capacity));
        }
        if payload_size == 0 || payload_size > MAX_PAYLOAD_SIZE {
            return Err(RingError::InvalidPayloadSize(payload_size));
        }
        if max_read_leases == 0 || max_read_leases >= capacity {
            return Err(RingError::InvalidLeaseLimit(max_read_leases));
        }

        let mut slots: Vec<Slot> = Vec::new();
        if slots.try_reserve_exact(capacity).is_err() {
            tracing::error!(capacity, "failed to allocate slot array");
            return Err(RingError::AllocationFailed { cell: 0 });
        }
        for cell_index in 0..capacity {
            let cell = Cell::try_new(payload_size).ok_or_else(|| {
                tracing::error!(cell_index, payload_size, "failed to allocate cell payload");
                RingError::AllocationFailed { cell: cell_index }
            })?;
            slots.push(Slot {
                state: AtomicU8::new(SLOT_IDLE),
                waited: AtomicBool::new(false),
                cell: UnsafeCell::new(cell),
            });
        }

        tracing::debug!(capacity, payload_size, max_read_leases, "ring buffer created");

        Ok(Self {
            slots: slots.into_boxed_slice(),
            capacity,
            payload_size,
            max_read_leases,
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
            read_cursor: CachePadded::new(AtomicUsize::new(0)),
            write_leased: AtomicBool::new(false),
            push_seq: AtomicU32::new(0),
            read_leases: AtomicUsize::new(0),
            retire_lock: parking_lot::Mutex::new(()),
            write_gate: WaitGate::new(),
            read_gate: WaitGate::new(),
        })
    }

    /// Number of cells in the ring. One of them is always kept free.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Payload bytes per cell.
    #[inline]
    pub fn payload_size(&self) -> usize {
        self.payload_size
    }

    #[inline]
    pub fn max_read_leases(&self) -> usize {
        self.max_read_leases
    }

    // Occupancy queries below are lock-free snapshots. With a producer or
    // consumer running concurrently they may be stale by the time they return.

    /// No produced cell is waiting to be leased by a consumer.
    pub fn is_empty(&self) -> bool {
        cursor::is_empty(self.head.load(Acquire), self.read_cursor.load(Acquire))
    }

    /// The producer cannot lease a cell until a consumer returns one.
    pub fn is_full(&self) -> bool {
        cursor::is_full(self.head.load(Acquire), self.tail.load(Acquire), self.capacity)
    }

    /// Cells the producer can lease before the ring is full.
    pub fn free_slots(&self) -> usize {
        cursor::free_slots(self.head.load(Acquire), self.tail.load(Acquire), self.capacity)
    }

    /// Cells produced and not yet returned by a consumer (leased or not).
    pub fn len(&self) -> usize {
        cursor::occupied(self.head.load(Acquire), self.tail.load(Acquire), self.capacity)
    }

    /// Cells produced and not yet leased by any consumer.
    pub fn unread(&self) -> usize {
        cursor::distance(
            self.read_cursor.load(Acquire),
            self.head.load(Acquire),
            self.capacity,
        )
    }

    /// A producer is blocked on (or holds) the write gate.
    pub fn is_write_waiting(&self) -> bool {
        self.write_gate.is_parked()
    }

    /// A consumer is blocked on (or holds) the read gate.
    pub fn is_read_waiting(&self) -> bool {
        self.read_gate.is_parked()
    }

    /// Discard every unread cell by moving `tail` and `read_cursor` to `head`.
    ///
    /// No buffer is freed. Must be called with no lease outstanding on
    /// either side; otherwise nothing changes and `LeaseOutstanding` is
    /// returned. Lease attempts racing with `clear` fail the same way.
    pub fn clear(&self) -> Result<(), RingError> {
        if self.write_leased.swap(true, Acquire) {
            tracing::warn!("clear called while a write lease is outstanding");
            return Err(RingError::LeaseOutstanding(Side::Write));
        }
        if self
            .read_leases
            .compare_exchange(0, CLEARING, Acquire, Relaxed)
            .is_err()
        {
            self.write_leased.store(false, Release);
            tracing::warn!("clear called while a read lease is outstanding");
            return Err(RingError::LeaseOutstanding(Side::Read));
        }

        let discarded = {
            let _retire = self.retire_lock.lock();
            let head = self.head.load(Acquire);
            let discarded = cursor::distance(self.read_cursor.load(Acquire), head, self.capacity);
            self.read_cursor.store(head, Release);
            self.tail.store(head, Release);
            discarded
        };

        self.read_leases.fetch_sub(CLEARING, Release);
        self.write_leased.store(false, Release);
        tracing::debug!(discarded, "ring buffer cleared");

        self.write_gate.notify();
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Write side
    // -------------------------------------------------------------------------

    /// Lease the cell at `head`, waiting up to `timeout` for room.
    /// Returns the slot index on success.
    pub(crate) fn acquire_write(&self, timeout: Duration) -> Result<usize, RingError> {
        if self.write_leased.swap(true, Acquire) {
            tracing::warn!("write lease requested while another write lease is outstanding");
            return Err(RingError::LeaseOutstanding(Side::Write));
        }

        let acquired = self.wait_for_write_slot(timeout);
        if acquired.is_err() {
            self.write_leased.store(false, Release);
        }
        acquired
    }

    fn wait_for_write_slot(&self, timeout: Duration) -> Result<usize, RingError> {
        // head only moves under the write lease, which we hold
        let head = self.head.load(Relaxed);
        let has_room = || {
            (!cursor::is_full(head, self.tail.load(Acquire), self.capacity)).then_some(head)
        };

        if let Some(index) = has_room() {
            tracing::trace!(index, "write cell leased");
            return Ok(index);
        }
        if timeout.is_zero() {
            return Err(RingError::Full);
        }

        match self
            .write_gate
            .park_until(clock::deadline_after(timeout), has_room)
        {
            Ok(index) => {
                self.slots[index].waited.store(true, Relaxed);
                tracing::trace!(index, "write cell leased after wait");
                Ok(index)
            }
            // `write_leased` admits a single producer, so the write gate is
            // never contended while the lease claim is held
            Err(GateError::Busy) => Err(RingError::LeaseOutstanding(Side::Write)),
            Err(GateError::TimedOut) => {
                tracing::debug!(?timeout, "timed out waiting for a free cell");
                Err(RingError::Full)
            }
        }
    }

    /// Publish the leased cell: advance `head` and wake a blocked consumer.
    pub(crate) fn commit_write(&self, index: usize) -> Result<(), RingError> {
        let head = self.head.load(Relaxed);
        if index != head || !self.write_leased.load(Acquire) {
            return Err(RingError::InvalidLease);
        }

        self.head.store(cursor::advance(head, self.capacity), Release);
        self.finish_write(index);
        tracing::trace!(index, "write cell returned");

        self.read_gate.notify();
        Ok(())
    }

    /// Give the write lease back without publishing the cell.
    pub(crate) fn abort_write(&self, index: usize) -> Result<(), RingError> {
        if index != self.head.load(Relaxed) || !self.write_leased.load(Acquire) {
            return Err(RingError::InvalidLease);
        }
        self.finish_write(index);
        tracing::trace!(index, "write cell discarded");
        Ok(())
    }

    fn finish_write(&self, index: usize) {
        if self.slots[index].waited.swap(false, Relaxed) {
            self.write_gate.unpark();
        }
        self.write_leased.store(false, Release);
    }

    // -------------------------------------------------------------------------
    // Read side
    // -------------------------------------------------------------------------

    /// Lease the cell at `read_cursor`, waiting up to `timeout` for data.
    /// Returns the slot index on success.
    pub(crate) fn acquire_read(&self, timeout: Duration) -> Result<usize, RingError> {
        let outstanding = self.read_leases.fetch_add(1, Acquire);
        if outstanding >= self.max_read_leases {
            self.read_leases.fetch_sub(1, Release);
            tracing::warn!(
                outstanding,
                limit = self.max_read_leases,
                "read lease requested beyond the outstanding lease limit"
            );
            return Err(RingError::LeaseOutstanding(Side::Read));
        }

        let acquired = self.wait_for_read_slot(timeout);
        if acquired.is_err() {
            self.read_leases.fetch_sub(1, Release);
        }
        acquired
    }

    fn wait_for_read_slot(&self, timeout: Duration) -> Result<usize, RingError> {
        if let Some(index) = self.try_claim_read() {
            tracing::trace!(index, "read cell leased");
            return Ok(index);
        }
        if timeout.is_zero() {
            return Err(RingError::Empty);
        }

        match self
            .read_gate
            .park_until(clock::deadline_after(timeout), || self.try_claim_read())
        {
            Ok(index) => {
                self.slots[index].waited.store(true, Relaxed);
                tracing::trace!(index, "read cell leased after wait");
                Ok(index)
            }
            Err(GateError::Busy) => {
                tracing::warn!("read waiter already parked");
                Err(RingError::WaitInProgress(Side::Read))
            }
            Err(GateError::TimedOut) => {
                tracing::debug!(?timeout, "timed out waiting for data");
                Err(RingError::Empty)
            }
        }
    }

    /// Claim the slot at `read_cursor` and move the cursor past it.
    fn try_claim_read(&self) -> Option<usize> {
        let mut read_cursor = self.read_cursor.load(Acquire);
        loop {
            if cursor::is_empty(self.head.load(Acquire), read_cursor) {
                return None;
            }
            let next = cursor::advance(read_cursor, self.capacity);
            match self
                .read_cursor
                .compare_exchange_weak(read_cursor, next, AcqRel, Acquire)
            {
                Ok(_) => {
                    self.slots[read_cursor].state.store(SLOT_READING, Release);
                    return Some(read_cursor);
                }
                Err(actual) => read_cursor = actual,
            }
        }
    }

    /// Return a read lease: advance `tail` and wake a blocked producer.
    pub(crate) fn release_read(&self, index: usize) -> Result<(), RingError> {
        let slot = self.slots.get(index).ok_or(RingError::InvalidLease)?;
        if slot
            .state
            .compare_exchange(SLOT_READING, SLOT_RETURNED, AcqRel, Acquire)
            .is_err()
        {
            return Err(RingError::InvalidLease);
        }
        let waited = slot.waited.swap(false, Relaxed);

        self.retire_returned();
        if waited {
            self.read_gate.unpark();
        }
        self.read_leases.fetch_sub(1, Release);
        tracing::trace!(index, "read cell returned");

        self.write_gate.notify();
        Ok(())
    }

    /// Move `tail` over the run of returned slots.
    ///
    /// With in-order returns this advances `tail` by exactly one. A slot
    /// returned ahead of an older lease stays pinned until that lease returns.
    fn retire_returned(&self) {
        let _retire = self.retire_lock.lock();
        let read_cursor = self.read_cursor.load(Acquire);
        let mut tail = self.tail.load(Relaxed);
        while tail != read_cursor && self.slots[tail].state.load(Acquire) == SLOT_RETURNED {
            self.slots[tail].state.store(SLOT_IDLE, Relaxed);
            tail = cursor::advance(tail, self.capacity);
        }
        self.tail.store(tail, Release);
    }

    // -------------------------------------------------------------------------
    // Raw cell access
    // -------------------------------------------------------------------------

    #[inline]
    pub(crate) fn cell_ptr(&self, index: usize) -> *mut Cell {
        self.slots[index].cell.get()
    }

    /// Map a cell pointer handed out by this ring back to its slot index.
    pub(crate) fn slot_index_of(&self, cell: *const Cell) -> Option<usize> {
        let first = self.cell_ptr(0) as usize;
        let addr = cell as usize;
        let stride = size_of::<Slot>();
        let offset = addr.checked_sub(first)?;
        if offset % stride != 0 {
            return None;
        }
        let index = offset / stride;
        (index < self.capacity).then_some(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_arguments() {
        assert_eq!(RingBuffer::new(0, 8).unwrap_err(), RingError::InvalidCapacity(0));
        assert_eq!(RingBuffer::new(1, 8).unwrap_err(), RingError::InvalidCapacity(1));
        assert_eq!(
            RingBuffer::new(MAX_CAPACITY + 1, 8).unwrap_err(),
            RingError::InvalidCapacity(MAX_CAPACITY + 1)
        );
        assert_eq!(RingBuffer::new(4, 0).unwrap_err(), RingError::InvalidPayloadSize(0));
        assert_eq!(
            RingBuffer::new(4, MAX_PAYLOAD_SIZE + 1).unwrap_err(),
            RingError::InvalidPayloadSize(MAX_PAYLOAD_SIZE + 1)
        );
        assert_eq!(
            RingBuffer::with_limits(4, 8, 4).unwrap_err(),
            RingError::InvalidLeaseLimit(4)
        );
        assert_eq!(
            RingBuffer::with_limits(4, 8, 0).unwrap_err(),
            RingError::InvalidLeaseLimit(0)
        );
    }

    #[test]
    fn every_cell_is_preallocated() {
        let rb = RingBuffer::new(4, 16).unwrap();
        for i in 0..rb.capacity() {
            let cell = unsafe { &*rb.cell_ptr(i) };
            assert!(cell.is_valid());
            assert_eq!(cell.capacity(), 16);
            assert_eq!(cell.payload().len(), 16);
        }
    }

    #[test]
    fn slot_index_round_trip() {
        let rb = RingBuffer::new(5, 8).unwrap();
        for i in 0..5 {
            assert_eq!(rb.slot_index_of(rb.cell_ptr(i)), Some(i));
        }
        let stray = Cell::try_new(8).unwrap();
        assert_eq!(rb.slot_index_of(&stray), None);
        let misaligned = (rb.cell_ptr(1) as usize + 1) as *const Cell;
        assert_eq!(rb.slot_index_of(misaligned), None);
    }

    #[test]
    fn raw_write_protocol_moves_head() {
        let rb = RingBuffer::new(3, 1).unwrap();
        let i = rb.acquire_write(Duration::ZERO).unwrap();
        assert_eq!(i, 0);
        // not the leased slot
        assert_eq!(rb.commit_write(1), Err(RingError::InvalidLease));
        rb.commit_write(i).unwrap();
        // nothing outstanding any more
        assert_eq!(rb.commit_write(1), Err(RingError::InvalidLease));
        assert_eq!(rb.free_slots(), 1);

        let i = rb.acquire_write(Duration::ZERO).unwrap();
        rb.abort_write(i).unwrap();
        assert_eq!(rb.free_slots(), 1);
        assert_eq!(rb.len(), 1);
    }

    #[test]
    fn raw_read_protocol_rejects_double_return() {
        let rb = RingBuffer::new(3, 1).unwrap();
        let w = rb.acquire_write(Duration::ZERO).unwrap();
        rb.commit_write(w).unwrap();

        let r = rb.acquire_read(Duration::ZERO).unwrap();
        assert!(rb.is_empty());
        assert_eq!(rb.len(), 1);
        rb.release_read(r).unwrap();
        assert_eq!(rb.release_read(r), Err(RingError::InvalidLease));
        assert_eq!(rb.release_read(99), Err(RingError::InvalidLease));
        assert_eq!(rb.len(), 0);
        assert_eq!(rb.read_leases.load(Relaxed), 0);
    }

    #[test]
    fn clear_refuses_while_leased() {
        let rb = RingBuffer::new(4, 1).unwrap();
        let w = rb.acquire_write(Duration::ZERO).unwrap();
        assert_eq!(rb.clear(), Err(RingError::LeaseOutstanding(Side::Write)));
        rb.commit_write(w).unwrap();

        let r = rb.acquire_read(Duration::ZERO).unwrap();
        assert_eq!(rb.clear(), Err(RingError::LeaseOutstanding(Side::Read)));
        // failed clear must not leave the write side claimed
        assert!(!rb.write_leased.load(Relaxed));
        rb.release_read(r).unwrap();

        for _ in 0..2 {
            let w = rb.acquire_write(Duration::ZERO).unwrap();
            rb.commit_write(w).unwrap();
        }
        assert_eq!(rb.len(), 2);
        rb.clear().unwrap();
        assert!(rb.is_empty());
        assert_eq!(rb.free_slots(), 3);
        assert_eq!(rb.read_leases.load(Relaxed), 0);
    }
}
