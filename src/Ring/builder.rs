use crate::Core::error::RingError;
use crate::Ring::Buffer::RingBuffer;

/// Default payload bytes per cell.
pub const DEFAULT_PAYLOAD_SIZE: usize = 1024;

/// Default number of cells.
pub const DEFAULT_CAPACITY: usize = 16;

#[derive(Debug, Clone)]
pub struct RingBufferBuilder {
    capacity: usize,
    payload_size: usize,
    max_read_leases: usize,
}

impl Default for RingBufferBuilder {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            payload_size: DEFAULT_PAYLOAD_SIZE,
            max_read_leases: 1, // single consumer lease
        }
    }
}

impl RingBufferBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cells, one of which is always kept free.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_payload_size(mut self, payload_size: usize) -> Self {
        self.payload_size = payload_size;
        self
    }

    /// How many read leases may be outstanding at once (`1..capacity`).
    pub fn with_max_read_leases(mut self, max_read_leases: usize) -> Self {
        self.max_read_leases = max_read_leases;
        self
    }

    pub fn build(self) -> Result<RingBuffer, RingError> {
        RingBuffer::with_limits(self.capacity, self.payload_size, self.max_read_leases)
    }
}

impl RingBuffer {
    pub fn builder() -> RingBufferBuilder {
        RingBufferBuilder::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let rb = RingBufferBuilder::new().build().unwrap();
        assert_eq!(rb.capacity(), DEFAULT_CAPACITY);
        assert_eq!(rb.payload_size(), DEFAULT_PAYLOAD_SIZE);
        assert_eq!(rb.max_read_leases(), 1);
    }

    #[test]
    fn overrides() {
        let rb = RingBuffer::builder()
            .with_capacity(8)
            .with_payload_size(3)
            .with_max_read_leases(7)
            .build()
            .unwrap();
        assert_eq!(rb.capacity(), 8);
        assert_eq!(rb.payload_size(), 3);
        assert_eq!(rb.max_read_leases(), 7);
        assert_eq!(rb.free_slots(), 7);
    }

    #[test]
    fn lease_limit_must_leave_room() {
        let err = RingBuffer::builder()
            .with_capacity(4)
            .with_max_read_leases(4)
            .build()
            .unwrap_err();
        assert_eq!(err, RingError::InvalidLeaseLimit(4));
    }
}
