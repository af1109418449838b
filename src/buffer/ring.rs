//! Modular index arithmetic over the slot ring.
//!
//! All cursor movement goes through these total functions so no caller ever
//! does its own wraparound math. `capacity` is the *used* extent of the slot
//! arena, which may be smaller than the arena itself.

/// Slot following `index` in ring order.
pub(crate) fn next_index(index: usize, capacity: usize) -> usize {
    (index + 1) % capacity
}

/// Slot preceding `index` in ring order.
pub(crate) fn prev_index(index: usize, capacity: usize) -> usize {
    if index == 0 { capacity - 1 } else { index - 1 }
}

/// Slot `n` positions after `index` in ring order.
pub(crate) fn nth_index_after(index: usize, n: usize, capacity: usize) -> usize {
    (index + n) % capacity
}

/// Occupied length of a ring with write cursor `free_head` and read cursor
/// `used_tail`. Equal cursors mean empty.
pub(crate) fn occupied_len(free_head: usize, used_tail: usize, capacity: usize) -> usize {
    if free_head >= used_tail {
        free_head - used_tail
    } else {
        free_head + capacity - used_tail
    }
}
