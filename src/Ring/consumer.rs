// Consumer side of the lease ring.
use crate::Core::error::RingError;
use crate::Ring::Buffer::RingBuffer;
use crate::Ring::Structs::Cell;
use std::ops::Deref;
use std::time::Duration;

/// Shared lease on a produced cell.
///
/// Read the cell in place through `Deref`, then [`release`](Self::release)
/// it (or drop the lease) so the producer can reuse the slot.
pub struct ReadLease<'a> {
    ring: &'a RingBuffer,
    index: usize,
    returned: bool,
}

impl<'a> ReadLease<'a> {
    /// Slot index of the leased cell.
    pub fn slot(&self) -> usize {
        self.index
    }

    /// Return the cell to the ring.
    pub fn release(mut self) -> Result<(), RingError> {
        self.returned = true;
        self.ring.release_read(self.index)
    }
}

impl Deref for ReadLease<'_> {
    type Target = Cell;

    fn deref(&self) -> &Cell {
        // Safety: the slot sits between `tail` and `read_cursor`, so the
        // producer will not touch it until this lease is returned
        unsafe { &*self.ring.cell_ptr(self.index) }
    }
}

impl Drop for ReadLease<'_> {
    fn drop(&mut self) {
        if self.returned {
            return;
        }
        if let Err(e) = self.ring.release_read(self.index) {
            tracing::error!(index = self.index, error = %e, "failed to return read lease on drop");
        }
    }
}

impl RingBuffer {
    /// Lease the oldest unread cell.
    ///
    /// # Arguments
    /// * `timeout` - How long to wait when the ring is empty. `Duration::ZERO`
    ///   never blocks.
    ///
    /// # Returns
    /// * `Ok(ReadLease)` for the cell at `read_cursor`; the cursor has already
    ///   moved on, so another consumer can lease the next cell meanwhile
    /// * `Err(RingError::Empty)` if nothing arrives in time
    /// * `Err(RingError::LeaseOutstanding(Read))` if the read lease limit is reached
    /// * `Err(RingError::WaitInProgress(Read))` if the ring is empty and another
    ///   consumer already holds the read gate
    pub fn get_read_cell(&self, timeout: Duration) -> Result<ReadLease<'_>, RingError> {
        let index = self.acquire_read(timeout)?;
        Ok(ReadLease {
            ring: self,
            index,
            returned: false,
        })
    }

    /// Non-blocking [`get_read_cell`](Self::get_read_cell).
    pub fn try_get_read_cell(&self) -> Result<ReadLease<'_>, RingError> {
        self.get_read_cell(Duration::ZERO)
    }

    /// Copy the oldest unread message into `out` and return its length.
    ///
    /// `out` must hold a full cell payload so no message is ever truncated.
    pub fn pop_into(&self, out: &mut [u8], timeout: Duration) -> Result<usize, RingError> {
        if out.len() < self.payload_size {
            return Err(RingError::BufferTooSmall {
                needed: self.payload_size,
                got: out.len(),
            });
        }

        let cell = self.get_read_cell(timeout)?;
        let data = cell.data();
        out[..data.len()].copy_from_slice(data);
        let len = data.len();
        cell.release()?;
        Ok(len)
    }

    /// Iterate over the cells that are unread right now.
    ///
    /// Each item is a lease that returns its cell when dropped. The iterator
    /// is finite (it never yields cells produced after this call) and single
    /// pass. It stops early if a lease cannot be taken, e.g. because the
    /// read lease limit is reached while earlier items are still held.
    pub fn drain(&self) -> Drain<'_> {
        Drain {
            ring: self,
            remaining: self.unread(),
        }
    }

    /// Apply `f` to every unread cell, returning each one afterwards.
    /// Returns how many cells were processed.
    pub fn process_all<F>(&self, mut f: F) -> usize
    where
        F: FnMut(&Cell),
    {
        let mut processed = 0;
        for cell in self.drain() {
            f(&cell);
            processed += 1;
        }
        processed
    }
}

/// Iterator returned by [`RingBuffer::drain`].
pub struct Drain<'a> {
    ring: &'a RingBuffer,
    remaining: usize,
}

impl<'a> Iterator for Drain<'a> {
    type Item = ReadLease<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        match self.ring.try_get_read_cell() {
            Ok(lease) => {
                self.remaining -= 1;
                Some(lease)
            }
            Err(_) => {
                self.remaining = 0;
                None
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

impl std::iter::FusedIterator for Drain<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(values: &[u8]) -> RingBuffer {
        let rb = RingBuffer::new(8, 4).unwrap();
        for &v in values {
            rb.push(&[v], Duration::ZERO).unwrap();
        }
        rb
    }

    #[test]
    fn pop_into_requires_full_payload_room() {
        let rb = filled(&[1]);
        let mut small = [0u8; 2];
        assert_eq!(
            rb.pop_into(&mut small, Duration::ZERO),
            Err(RingError::BufferTooSmall { needed: 4, got: 2 })
        );
        // nothing consumed
        assert_eq!(rb.unread(), 1);

        let mut out = [0u8; 4];
        assert_eq!(rb.pop_into(&mut out, Duration::ZERO), Ok(1));
        assert_eq!(out[0], 1);
        assert_eq!(rb.pop_into(&mut out, Duration::ZERO), Err(RingError::Empty));
    }

    #[test]
    fn process_all_visits_in_order_and_empties() {
        let rb = filled(&[0xAA, 0xBB, 0xCC, 0xDD]);
        let mut seen = Vec::new();
        let n = rb.process_all(|cell| seen.push(cell.data()[0]));
        assert_eq!(n, 4);
        assert_eq!(seen, vec![0xAA, 0xBB, 0xCC, 0xDD]);
        assert_eq!(rb.free_slots(), 7);
        assert!(rb.is_empty());
    }

    #[test]
    fn drain_is_bounded_by_the_snapshot() {
        let rb = filled(&[1, 2]);
        let mut drain = rb.drain();
        let first = drain.next().unwrap();
        assert_eq!(first.data(), &[1]);
        drop(first);
        // produced after the drain started: not part of this pass
        rb.push(&[3], Duration::ZERO).unwrap();
        assert_eq!(drain.next().unwrap().data(), &[2]);
        assert!(drain.next().is_none());
        assert!(drain.next().is_none());
        assert_eq!(rb.unread(), 1);
    }

    #[test]
    fn drain_stops_at_the_lease_limit() {
        let rb = filled(&[1, 2, 3]);
        let held: Vec<_> = rb.drain().collect();
        // default limit is one outstanding read lease
        assert_eq!(held.len(), 1);
        drop(held);
        assert_eq!(rb.drain().count(), 2);
    }
}
