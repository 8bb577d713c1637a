//! # DMXP LeaseRing
//!
//! A fixed-capacity ring of preallocated cells handed out by lease.
//!
//! - Producer workflow: `get_write_cell` → fill the cell in place → `commit`
//! - Consumer workflow: `get_read_cell` → read the cell in place → `release`
//! - Both sides may block for a bounded time (monotonic deadline) when the
//!   ring is full or empty.
//!
//! ```
//! use dmxp_leasering::RingBuffer;
//! use std::time::Duration;
//!
//! let ring = RingBuffer::new(8, 64).unwrap();
//!
//! let mut cell = ring.get_write_cell(Duration::ZERO).unwrap();
//! cell.write(b"hello").unwrap();
//! cell.commit().unwrap();
//!
//! let cell = ring.get_read_cell(Duration::from_millis(10)).unwrap();
//! assert_eq!(cell.data(), b"hello");
//! cell.release().unwrap();
//! ```

// Module naming follows project convention (Core = shared primitives, Ring = the lease ring)
#[allow(non_snake_case)]
pub mod Core;

#[allow(non_snake_case)]
pub mod Ring;

#[allow(non_snake_case)]
pub mod Debug {
    pub mod StructDebug;
}

pub mod ffi;

pub use Core::error::{RingError, Side};
pub use Ring::Buffer::{RingBuffer, MAX_CAPACITY, MAX_PAYLOAD_SIZE};
pub use Ring::Structs::{Cell, CellHeader, CELL_MAGIC};
pub use Ring::{Drain, ReadLease, RingBufferBuilder, WriteLease};
