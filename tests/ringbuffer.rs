use dmxp_leasering::{RingBuffer, RingError, CELL_MAGIC};
use std::time::Duration;

fn write_byte(rb: &RingBuffer, index: u32, value: u8) {
    let mut cell = rb.try_get_write_cell().expect("write cell");
    cell.set_index(index);
    cell.payload_mut()[0] = value;
    cell.set_len(1).unwrap();
    cell.commit().unwrap();
}

#[test]
fn three_values_round_trip_in_order() {
    let rb = RingBuffer::new(8, 16).unwrap();
    assert_eq!(rb.free_slots(), 7);

    write_byte(&rb, 0, 0xAA);
    write_byte(&rb, 1, 0xBB);
    write_byte(&rb, 2, 0xCC);
    assert_eq!(rb.free_slots(), 7 - 3);

    for expected in [0xAA, 0xBB, 0xCC] {
        let cell = rb.get_read_cell(Duration::ZERO).expect("read cell");
        assert_eq!(cell.magic(), CELL_MAGIC);
        assert_eq!(cell.data(), &[expected]);
        cell.release().unwrap();
    }

    let fourth = rb.get_read_cell(Duration::ZERO);
    assert_eq!(fourth.unwrap_err(), RingError::Empty);
    assert_eq!(rb.free_slots(), 7);
}

#[test]
fn fresh_and_full_boundaries() {
    let rb = RingBuffer::new(5, 4).unwrap();
    assert!(rb.is_empty());
    assert!(!rb.is_full());
    assert_eq!(rb.free_slots(), 4);
    assert_eq!(rb.len(), 0);

    for i in 0..4 {
        assert!(!rb.is_full());
        rb.push(&[i], Duration::ZERO).unwrap();
        assert!(!rb.is_empty());
    }
    assert!(rb.is_full());
    assert_eq!(rb.free_slots(), 0);
    assert_eq!(rb.len(), 4);
    assert_eq!(rb.try_get_write_cell().unwrap_err(), RingError::Full);

    let cell = rb.try_get_read_cell().unwrap();
    // leased but not returned: slot is still occupied
    assert!(rb.is_full());
    cell.release().unwrap();
    assert!(!rb.is_full());
    assert_eq!(rb.free_slots(), 1);
}

#[test]
fn payload_is_read_byte_identical() {
    let rb = RingBuffer::new(4, 256).unwrap();
    let message: Vec<u8> = (0..=255u8).collect();

    let mut cell = rb.try_get_write_cell().unwrap();
    cell.write(&message).unwrap();
    cell.set_index(9);
    cell.set_timestamp_ns(123_456);
    cell.commit().unwrap();

    let cell = rb.try_get_read_cell().unwrap();
    assert_eq!(cell.data(), &message[..]);
    assert_eq!(cell.len(), 256);
    assert_eq!(cell.capacity(), 256);
    assert_eq!(cell.index(), 9);
    assert_eq!(cell.timestamp_ns(), 123_456);
}

#[test]
fn sequence_indices_survive_many_wraparounds() {
    let rb = RingBuffer::new(3, 8).unwrap();
    for seq in 0..100u32 {
        let mut cell = rb.try_get_write_cell().unwrap();
        cell.set_index(seq);
        cell.write(&seq.to_le_bytes()).unwrap();
        cell.commit().unwrap();

        let cell = rb.try_get_read_cell().unwrap();
        assert_eq!(cell.index(), seq);
        assert_eq!(cell.data(), &seq.to_le_bytes());
        // cells are reused, never reallocated
        assert_eq!(cell.slot(), seq as usize % 3);
    }
    assert_eq!(rb.free_slots(), 2);
}

#[test]
fn payload_buffer_is_reused_in_place() {
    let rb = RingBuffer::new(2, 8).unwrap();
    let first = {
        let cell = rb.try_get_write_cell().unwrap();
        let ptr = cell.payload().as_ptr();
        cell.commit().unwrap();
        ptr
    };
    rb.try_get_read_cell().unwrap().release().unwrap();
    rb.try_get_write_cell().unwrap().commit().unwrap();
    rb.try_get_read_cell().unwrap().release().unwrap();

    let again = rb.try_get_write_cell().unwrap();
    assert_eq!(again.slot(), 0);
    assert_eq!(again.payload().as_ptr(), first);
}

#[test]
fn clear_discards_unread_cells() {
    let rb = RingBuffer::new(8, 1).unwrap();
    for i in 0..5 {
        rb.push(&[i], Duration::ZERO).unwrap();
    }
    rb.try_get_read_cell().unwrap().release().unwrap();
    assert_eq!(rb.unread(), 4);

    rb.clear().unwrap();
    assert!(rb.is_empty());
    assert_eq!(rb.free_slots(), 7);
    assert_eq!(rb.try_get_read_cell().unwrap_err(), RingError::Empty);

    // the ring keeps working from the cleared position
    rb.push(&[42], Duration::ZERO).unwrap();
    assert_eq!(rb.try_get_read_cell().unwrap().data(), &[42]);
}

#[test]
fn clear_requires_no_outstanding_lease() {
    let rb = RingBuffer::new(4, 1).unwrap();
    rb.push(&[1], Duration::ZERO).unwrap();
    let lease = rb.try_get_read_cell().unwrap();
    let err = rb.clear().unwrap_err();
    assert!(err.is_misuse());
    drop(lease);
    assert!(rb.clear().is_ok());
}

#[test]
fn invalid_creation_is_a_single_error() {
    assert_eq!(RingBuffer::new(1, 8).unwrap_err(), RingError::InvalidCapacity(1));
    assert_eq!(RingBuffer::new(8, 0).unwrap_err(), RingError::InvalidPayloadSize(0));
    let io: std::io::Error = RingBuffer::new(0, 0).unwrap_err().into();
    assert_eq!(io.kind(), std::io::ErrorKind::InvalidInput);
}

#[test]
fn unwritten_write_lease_does_not_republish_old_cell() {
    let rb = RingBuffer::new(2, 8).unwrap();

    let mut cell = rb.try_get_write_cell().unwrap();
    cell.set_index(7);
    cell.write(b"old").unwrap();
    cell.commit().unwrap();
    assert_eq!(rb.try_get_read_cell().unwrap().data(), b"old");

    // move head round to slot 0 again
    rb.push(b"next", Duration::ZERO).unwrap();
    rb.try_get_read_cell().unwrap().release().unwrap();

    let reused = rb.try_get_write_cell().unwrap();
    assert_eq!(reused.slot(), 0);
    drop(reused);

    assert!(rb.is_empty());
    assert_eq!(rb.try_get_read_cell().unwrap_err(), RingError::Empty);
    // the slot is still free for the producer
    assert_eq!(rb.try_get_write_cell().unwrap().slot(), 0);
}
