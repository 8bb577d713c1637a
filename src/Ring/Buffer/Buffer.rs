// The lease ring: a preallocated array of cells plus the cursors and gates
// that hand them out.

use crate::Core::gate::WaitGate;
use crate::Ring::Structs::Cell_Structs::Cell;
use crossbeam_utils::CachePadded;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, AtomicUsize};

/// Largest number of cells a ring may hold.
pub const MAX_CAPACITY: usize = 1 << 24;

/// Largest payload a single cell may carry (64 MiB).
pub const MAX_PAYLOAD_SIZE: usize = 64 * 1024 * 1024;

/// Slot not leased by a consumer.
pub(crate) const SLOT_IDLE: u8 = 0;
/// Slot leased by a consumer.
pub(crate) const SLOT_READING: u8 = 1;
/// Consumer returned the slot, but an older read lease still pins `tail`.
pub(crate) const SLOT_RETURNED: u8 = 2;

/// A single slot in the ring.
pub(crate) struct Slot {
    /// Read-side lease state, one of the `SLOT_*` constants.
    pub(crate) state: AtomicU8,

    /// Set when the lease on this slot was obtained through the blocking
    /// path, i.e. the lease holder also holds its side's gate.
    pub(crate) waited: AtomicBool,

    /// The cell itself. Only the current lease holder touches it.
    pub(crate) cell: UnsafeCell<Cell>,
}

/// A fixed-capacity ring of preallocated cells with lease-based hand-off.
///
/// ### Cursors
/// - `head`: next slot the producer will lease. Advanced on write return.
/// - `read_cursor`: next slot a consumer will lease. Advanced at read lease
///   time, so several read leases can be out at once.
/// - `tail`: oldest slot not yet returned by a consumer. Advanced on read
///   return.
///
/// Empty is `head == read_cursor`, full is `head + 1 == tail` (mod capacity),
/// so `capacity - 1` cells are usable.
///
/// ### Concurrency Design:
/// - **Producer**: one write lease at a time. The cell at `head` is private
///   to it until the return publishes `head` with Release ordering.
/// - **Consumers**: up to `max_read_leases` read leases. Slots between `tail`
///   and `read_cursor` are pinned, so the producer never writes into a cell a
///   consumer is still reading.
/// - **Waiting**: each side has one [`WaitGate`]; a return on one side
///   notifies the other side's gate.
pub struct RingBuffer {
    /// All cells, allocated at creation and freed on drop.
    pub(crate) slots: Box<[Slot]>,

    /// Number of slots (usable capacity is one less).
    pub(crate) capacity: usize,

    /// Payload bytes per cell.
    pub(crate) payload_size: usize,

    /// Maximum concurrently outstanding read leases.
    pub(crate) max_read_leases: usize,

    pub(crate) head: CachePadded<AtomicUsize>,
    pub(crate) tail: CachePadded<AtomicUsize>,
    pub(crate) read_cursor: CachePadded<AtomicUsize>,

    /// Claimed while a write lease (or write attempt) is in progress.
    pub(crate) write_leased: AtomicBool,

    /// Sequence index stamped by the next `push`.
    pub(crate) push_seq: AtomicU32,

    /// Outstanding read leases (and read attempts in progress).
    pub(crate) read_leases: AtomicUsize,

    /// Serializes `tail` advancement between consumers returning out of order.
    pub(crate) retire_lock: parking_lot::Mutex<()>,

    pub(crate) write_gate: WaitGate,
    pub(crate) read_gate: WaitGate,
}

// Cells are only reached through leases, and the cursor protocol gives each
// lease exclusive access to its slot.
unsafe impl Send for RingBuffer {}
unsafe impl Sync for RingBuffer {}
