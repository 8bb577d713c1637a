use std::fmt;
use std::io;

/// Which side of the ring an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// Producer side (write leases)
    Write,
    /// Consumer side (read leases)
    Read,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Write => f.write_str("write"),
            Side::Read => f.write_str("read"),
        }
    }
}

/// Result codes for ring buffer operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingError {
    /// Capacity outside `2..=MAX_CAPACITY`
    InvalidCapacity(usize),
    /// Payload size outside `1..=MAX_PAYLOAD_SIZE`
    InvalidPayloadSize(usize),
    /// Read lease limit outside `1..capacity`
    InvalidLeaseLimit(usize),
    /// The cell handed back is not an outstanding lease of this ring
    InvalidLease,
    /// Data does not fit into a cell's payload
    PayloadTooLarge {
        /// Bytes offered
        len: usize,
        /// Payload capacity of the cell
        capacity: usize,
    },
    /// Caller buffer cannot hold a full cell payload
    BufferTooSmall {
        /// Bytes required
        needed: usize,
        /// Bytes provided
        got: usize,
    },
    /// No free cell (ring full), immediately or after the timed wait
    Full,
    /// No readable cell (ring empty), immediately or after the timed wait
    Empty,
    /// The side already has as many leases out as it allows
    LeaseOutstanding(Side),
    /// Another caller is already parked waiting on this side
    WaitInProgress(Side),
    /// A payload buffer could not be allocated at creation
    AllocationFailed {
        /// Index of the first cell that failed
        cell: usize,
    },
}

impl RingError {
    /// Full/Empty: retrying later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, RingError::Full | RingError::Empty)
    }

    /// The caller broke the lease discipline (lease before return, double wait).
    pub fn is_misuse(&self) -> bool {
        matches!(
            self,
            RingError::LeaseOutstanding(_) | RingError::WaitInProgress(_) | RingError::InvalidLease
        )
    }
}

impl fmt::Display for RingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RingError::InvalidCapacity(n) => write!(f, "invalid ring capacity {n}"),
            RingError::InvalidPayloadSize(n) => write!(f, "invalid payload size {n}"),
            RingError::InvalidLeaseLimit(n) => write!(f, "invalid read lease limit {n}"),
            RingError::InvalidLease => f.write_str("cell is not an outstanding lease of this ring"),
            RingError::PayloadTooLarge { len, capacity } => {
                write!(f, "payload too large ({len} > {capacity})")
            }
            RingError::BufferTooSmall { needed, got } => {
                write!(f, "buffer too small ({got} < {needed})")
            }
            RingError::Full => f.write_str("ring buffer full"),
            RingError::Empty => f.write_str("ring buffer empty"),
            RingError::LeaseOutstanding(side) => {
                write!(f, "{side} lease already outstanding, return it before leasing again")
            }
            RingError::WaitInProgress(side) => {
                write!(f, "another {side} waiter is already blocked")
            }
            RingError::AllocationFailed { cell } => {
                write!(f, "failed to allocate payload for cell {cell}")
            }
        }
    }
}

impl std::error::Error for RingError {}

impl From<RingError> for io::Error {
    fn from(err: RingError) -> Self {
        let kind = match err {
            RingError::InvalidCapacity(_)
            | RingError::InvalidPayloadSize(_)
            | RingError::InvalidLeaseLimit(_)
            | RingError::InvalidLease
            | RingError::PayloadTooLarge { .. }
            | RingError::BufferTooSmall { .. } => io::ErrorKind::InvalidInput,
            RingError::Full | RingError::Empty => io::ErrorKind::WouldBlock,
            RingError::LeaseOutstanding(_) | RingError::WaitInProgress(_) => io::ErrorKind::Other,
            RingError::AllocationFailed { .. } => io::ErrorKind::OutOfMemory,
        };
        io::Error::new(kind, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(RingError::Full.is_transient());
        assert!(RingError::Empty.is_transient());
        assert!(!RingError::Full.is_misuse());
        assert!(RingError::WaitInProgress(Side::Read).is_misuse());
        assert!(RingError::LeaseOutstanding(Side::Write).is_misuse());
        assert!(!RingError::AllocationFailed { cell: 3 }.is_transient());
    }

    #[test]
    fn io_error_kinds() {
        let e: io::Error = RingError::Full.into();
        assert_eq!(e.kind(), io::ErrorKind::WouldBlock);
        let e: io::Error = RingError::InvalidCapacity(1).into();
        assert_eq!(e.kind(), io::ErrorKind::InvalidInput);
        let e: io::Error = RingError::AllocationFailed { cell: 0 }.into();
        assert_eq!(e.kind(), io::ErrorKind::OutOfMemory);
        assert_eq!(e.to_string(), "failed to allocate payload for cell 0");
    }
}
