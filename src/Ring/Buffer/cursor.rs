// Index arithmetic for a ring of `capacity` slots with one slot kept empty.
// Every function is O(1); none of them iterates.

/// Next index after `index`, wrapping at `capacity`.
#[inline]
pub fn advance(index: usize, capacity: usize) -> usize {
    let next = index + 1;
    if next == capacity {
        0
    } else {
        next
    }
}

/// Number of slots between `from` (inclusive) and `to` (exclusive).
#[inline]
pub fn distance(from: usize, to: usize, capacity: usize) -> usize {
    if to >= from {
        to - from
    } else {
        capacity - from + to
    }
}

/// Cells produced and not yet returned by a consumer.
#[inline]
pub fn occupied(head: usize, tail: usize, capacity: usize) -> usize {
    distance(tail, head, capacity)
}

/// Cells the producer can still lease: `(capacity - 1) - occupied`.
#[inline]
pub fn free_slots(head: usize, tail: usize, capacity: usize) -> usize {
    (capacity - 1) - occupied(head, tail, capacity)
}

#[inline]
pub fn is_full(head: usize, tail: usize, capacity: usize) -> bool {
    advance(head, capacity) == tail
}

#[inline]
pub fn is_empty(head: usize, read_cursor: usize) -> bool {
    head == read_cursor
}
