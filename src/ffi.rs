use crate::Core::clock::timeout_from_micros;
use crate::Core::error::RingError;
use crate::Ring::Buffer::RingBuffer;
use crate::Ring::Structs::{Cell, CellHeader};
use std::ptr;

// Error codes
pub const DMXP_SUCCESS: i32 = 0;
pub const DMXP_ERROR_NULL_POINTER: i32 = -1;
pub const DMXP_ERROR_INVALID_ARG: i32 = -2;
pub const DMXP_ERROR_ALLOCATION_FAILED: i32 = -3;
pub const DMXP_ERROR_FULL: i32 = -4;
pub const DMXP_ERROR_EMPTY: i32 = -5;
pub const DMXP_ERROR_MISUSE: i32 = -6;

/// Handle to a ring buffer instance (opaque pointer)
pub struct RingHandle {
    inner: RingBuffer,
}

fn status(err: RingError) -> i32 {
    match err {
        RingError::InvalidCapacity(_)
        | RingError::InvalidPayloadSize(_)
        | RingError::InvalidLeaseLimit(_)
        | RingError::InvalidLease
        | RingError::PayloadTooLarge { .. }
        | RingError::BufferTooSmall { .. } => DMXP_ERROR_INVALID_ARG,
        RingError::AllocationFailed { .. } => DMXP_ERROR_ALLOCATION_FAILED,
        RingError::Full => DMXP_ERROR_FULL,
        RingError::Empty => DMXP_ERROR_EMPTY,
        RingError::LeaseOutstanding(_) | RingError::WaitInProgress(_) => DMXP_ERROR_MISUSE,
    }
}

// -----------------------------------------------------------------------------
// Lifecycle
// -----------------------------------------------------------------------------

/// Create a ring buffer that allows one outstanding read lease.
///
/// # Arguments
/// * `capacity` - Number of cells (at least 2; one is kept free).
/// * `payload_size` - Payload bytes per cell.
/// * `out_handle` - Receives the new handle. Set to NULL on any failure.
///
/// # Returns
/// * 0 on success. A handle is only ever produced when every cell was allocated.
/// * `DMXP_ERROR_INVALID_ARG` for out-of-range sizes.
/// * `DMXP_ERROR_ALLOCATION_FAILED` if any cell payload could not be allocated.
#[no_mangle]
pub extern "C" fn dmxp_ring_create(
    capacity: u32,
    payload_size: u32,
    out_handle: *mut *mut RingHandle,
) -> i32 {
    dmxp_ring_create_with_leases(capacity, payload_size, 1, out_handle)
}

/// Create a ring buffer with up to `max_read_leases` read cells out at once.
///
/// `max_read_leases` must be in `1..capacity`; otherwise the call fails with
/// `DMXP_ERROR_INVALID_ARG`. Everything else is as for `dmxp_ring_create`.
#[no_mangle]
pub extern "C" fn dmxp_ring_create_with_leases(
    capacity: u32,
    payload_size: u32,
    max_read_leases: u32,
    out_handle: *mut *mut RingHandle,
) -> i32 {
    if out_handle.is_null() {
        return DMXP_ERROR_NULL_POINTER;
    }

    let built = RingBuffer::builder()
        .with_capacity(capacity as usize)
        .with_payload_size(payload_size as usize)
        .with_max_read_leases(max_read_leases as usize)
        .build();
    match built {
        Ok(ring) => {
            let handle = Box::new(RingHandle { inner: ring });
            unsafe { *out_handle = Box::into_raw(handle) };
            DMXP_SUCCESS
        }
        Err(e) => {
            unsafe { *out_handle = ptr::null_mut() };
            status(e)
        }
    }
}

/// Free a ring buffer and every cell in it.
///
/// Cells still leased through this handle become dangling. Passing NULL is
/// a no-op that reports `DMXP_ERROR_NULL_POINTER`.
#[no_mangle]
pub extern "C" fn dmxp_ring_release(handle: *mut RingHandle) -> i32 {
    if handle.is_null() {
        return DMXP_ERROR_NULL_POINTER;
    }
    unsafe {
        let _ = Box::from_raw(handle); // Dropped automatically
    }
    DMXP_SUCCESS
}

// -----------------------------------------------------------------------------
// Occupancy
// -----------------------------------------------------------------------------

/// Best-effort snapshot. A NULL handle reads as empty.
#[no_mangle]
pub extern "C" fn dmxp_ring_is_empty(handle: *const RingHandle) -> bool {
    if handle.is_null() {
        return true;
    }
    unsafe { (*handle).inner.is_empty() }
}

/// Best-effort snapshot. A NULL handle reads as not full.
#[no_mangle]
pub extern "C" fn dmxp_ring_is_full(handle: *const RingHandle) -> bool {
    if handle.is_null() {
        return false;
    }
    unsafe { (*handle).inner.is_full() }
}

/// Best-effort snapshot. A NULL handle has no free slots.
#[no_mangle]
pub extern "C" fn dmxp_ring_free_slots(handle: *const RingHandle) -> u32 {
    if handle.is_null() {
        return 0;
    }
    unsafe { (*handle).inner.free_slots() as u32 }
}

/// Discard all unread cells. Fails with `DMXP_ERROR_MISUSE` while any lease is out.
#[no_mangle]
pub extern "C" fn dmxp_ring_clear(handle: *const RingHandle) -> i32 {
    if handle.is_null() {
        return DMXP_ERROR_NULL_POINTER;
    }
    match unsafe { (*handle).inner.clear() } {
        Ok(()) => DMXP_SUCCESS,
        Err(e) => status(e),
    }
}

// -----------------------------------------------------------------------------
// Write leases
// -----------------------------------------------------------------------------

/// Lease the next free cell for writing.
///
/// # Arguments
/// * `handle` - Pointer to `RingHandle`.
/// * `timeout_us` - Microseconds to wait while full; zero or negative never blocks.
/// * `out_cell` - Receives the leased cell.
///
/// # Returns
/// * 0 on success.
/// * `DMXP_ERROR_FULL` if no cell freed up in time.
/// * `DMXP_ERROR_MISUSE` if a write lease is already out.
#[no_mangle]
pub extern "C" fn dmxp_ring_get_write_cell(
    handle: *const RingHandle,
    timeout_us: i64,
    out_cell: *mut *mut Cell,
) -> i32 {
    if handle.is_null() || out_cell.is_null() {
        return DMXP_ERROR_NULL_POINTER;
    }

    let ring = unsafe { &(*handle).inner };
    match ring.acquire_write(timeout_from_micros(timeout_us)) {
        Ok(index) => {
            unsafe { *out_cell = ring.cell_ptr(index) };
            DMXP_SUCCESS
        }
        Err(e) => {
            unsafe { *out_cell = ptr::null_mut() };
            status(e)
        }
    }
}

/// Publish a cell obtained from `dmxp_ring_get_write_cell`.
#[no_mangle]
pub extern "C" fn dmxp_ring_return_write_cell(handle: *const RingHandle, cell: *mut Cell) -> i32 {
    if handle.is_null() || cell.is_null() {
        return DMXP_ERROR_NULL_POINTER;
    }

    let ring = unsafe { &(*handle).inner };
    let Some(index) = ring.slot_index_of(cell) else {
        return DMXP_ERROR_INVALID_ARG;
    };
    match ring.commit_write(index) {
        Ok(()) => DMXP_SUCCESS,
        Err(e) => status(e),
    }
}

// -----------------------------------------------------------------------------
// Read leases
// -----------------------------------------------------------------------------

/// Lease the oldest unread cell.
///
/// # Returns
/// * 0 on success.
/// * `DMXP_ERROR_EMPTY` if nothing arrived in time.
/// * `DMXP_ERROR_MISUSE` if the read lease limit is reached or another
///   reader is already blocked.
#[no_mangle]
pub extern "C" fn dmxp_ring_get_read_cell(
    handle: *const RingHandle,
    timeout_us: i64,
    out_cell: *mut *const Cell,
) -> i32 {
    if handle.is_null() || out_cell.is_null() {
        return DMXP_ERROR_NULL_POINTER;
    }

    let ring = unsafe { &(*handle).inner };
    match ring.acquire_read(timeout_from_micros(timeout_us)) {
        Ok(index) => {
            unsafe { *out_cell = ring.cell_ptr(index) };
            DMXP_SUCCESS
        }
        Err(e) => {
            unsafe { *out_cell = ptr::null() };
            status(e)
        }
    }
}

/// Return a cell obtained from `dmxp_ring_get_read_cell`.
#[no_mangle]
pub extern "C" fn dmxp_ring_return_read_cell(handle: *const RingHandle, cell: *const Cell) -> i32 {
    if handle.is_null() || cell.is_null() {
        return DMXP_ERROR_NULL_POINTER;
    }

    let ring = unsafe { &(*handle).inner };
    let Some(index) = ring.slot_index_of(cell) else {
        return DMXP_ERROR_INVALID_ARG;
    };
    match ring.release_read(index) {
        Ok(()) => DMXP_SUCCESS,
        Err(e) => status(e),
    }
}

// -----------------------------------------------------------------------------
// Cell access
// -----------------------------------------------------------------------------

/// Header of a leased cell (magic, index, capacity, len, timestamp).
///
/// Only `index`, `len` and `timestamp_ns` may be written, and only through a
/// write lease. Prefer `dmxp_cell_set_len` for the length.
#[no_mangle]
pub extern "C" fn dmxp_cell_header(cell: *mut Cell) -> *mut CellHeader {
    if cell.is_null() {
        return ptr::null_mut();
    }
    unsafe { ptr::addr_of_mut!((*cell).header) }
}

/// Start of a leased cell's payload buffer (`capacity` bytes).
#[no_mangle]
pub extern "C" fn dmxp_cell_payload(cell: *mut Cell) -> *mut u8 {
    if cell.is_null() {
        return ptr::null_mut();
    }
    unsafe { (*cell).payload.as_mut_ptr() }
}

/// Set the used length of a write-leased cell.
#[no_mangle]
pub extern "C" fn dmxp_cell_set_len(cell: *mut Cell, len: u32) -> i32 {
    if cell.is_null() {
        return DMXP_ERROR_NULL_POINTER;
    }
    match unsafe { (*cell).set_len(len as usize) } {
        Ok(()) => DMXP_SUCCESS,
        Err(e) => status(e),
    }
}
