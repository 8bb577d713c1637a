// Producer side of the lease ring.
use crate::Core::error::RingError;
use crate::Ring::Buffer::RingBuffer;
use crate::Ring::Structs::Cell;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::Ordering::Relaxed;
use std::time::Duration;

/// Exclusive lease on the cell at `head`.
///
/// Fill the cell in place through `DerefMut`, then [`commit`](Self::commit)
/// to publish it. A lease dropped without a commit is discarded, so the
/// cell's previous contents are never published twice.
pub struct WriteLease<'a> {
    ring: &'a RingBuffer,
    index: usize,
    returned: bool,
}

impl<'a> WriteLease<'a> {
    /// Slot index of the leased cell.
    pub fn slot(&self) -> usize {
        self.index
    }

    /// Publish the cell to consumers and end the lease.
    pub fn commit(mut self) -> Result<(), RingError> {
        self.returned = true;
        self.ring.commit_write(self.index)
    }

    /// End the lease without publishing the cell.
    pub fn discard(mut self) -> Result<(), RingError> {
        self.returned = true;
        self.ring.abort_write(self.index)
    }
}

impl Deref for WriteLease<'_> {
    type Target = Cell;

    fn deref(&self) -> &Cell {
        // Safety: the write lease is the only path to the cell at `head`
        unsafe { &*self.ring.cell_ptr(self.index) }
    }
}

impl DerefMut for WriteLease<'_> {
    fn deref_mut(&mut self) -> &mut Cell {
        // Safety: as above; `&mut self` keeps the borrow unique
        unsafe { &mut *self.ring.cell_ptr(self.index) }
    }
}

impl Drop for WriteLease<'_> {
    fn drop(&mut self) {
        if self.returned {
            return;
        }
        if let Err(e) = self.ring.abort_write(self.index) {
            tracing::error!(index = self.index, error = %e, "failed to return write lease on drop");
        }
    }
}

impl RingBuffer {
    /// Lease the next free cell for writing.
    ///
    /// # Arguments
    /// * `timeout` - How long to wait when the ring is full. `Duration::ZERO`
    ///   never blocks. The deadline is taken from the monotonic clock.
    ///
    /// # Returns
    /// * `Ok(WriteLease)` for the cell at `head`
    /// * `Err(RingError::Full)` if no cell frees up in time
    /// * `Err(RingError::LeaseOutstanding(Write))` if a write lease is already
    ///   out or another producer is blocked in this call
    pub fn get_write_cell(&self, timeout: Duration) -> Result<WriteLease<'_>, RingError> {
        let index = self.acquire_write(timeout)?;
        Ok(WriteLease {
            ring: self,
            index,
            returned: false,
        })
    }

    /// Non-blocking [`get_write_cell`](Self::get_write_cell).
    pub fn try_get_write_cell(&self) -> Result<WriteLease<'_>, RingError> {
        self.get_write_cell(Duration::ZERO)
    }

    /// Copy `data` into the next free cell, stamp it, and publish it.
    ///
    /// The cell index is the number of messages queued through `push` before
    /// this one, wrapping at `u32::MAX`.
    ///
    /// # Returns
    /// * `Ok(())` if the message was queued
    /// * `Err(RingError::PayloadTooLarge)` before leasing anything if `data`
    ///   exceeds the cell payload size
    /// * any error of [`get_write_cell`](Self::get_write_cell)
    pub fn push(&self, data: &[u8], timeout: Duration) -> Result<(), RingError> {
        if data.len() > self.payload_size {
            return Err(RingError::PayloadTooLarge {
                len: data.len(),
                capacity: self.payload_size,
            });
        }

        let mut cell = self.get_write_cell(timeout)?;
        // only the write lease holder touches the counter
        let seq = self.push_seq.load(Relaxed);
        cell.set_index(seq);
        cell.write(data)?;
        cell.stamp();
        self.push_seq.store(seq.wrapping_add(1), Relaxed);
        cell.commit()
    }
}
