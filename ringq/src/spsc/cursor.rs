//! Cursor state and position arithmetic.
//!
//! Cursors count items ever written/read and never reset. The physical slot
//! of a cursor is `cursor - lower_bound`, where the lower bound steps forward
//! by the slot count each time the cursor passes the end of the buffer. No
//! modulo, no power-of-two requirement.
//!
//! In this module `slots` is the storage length `L`; the usable capacity is
//! `L - 1`. All arithmetic wraps so counter overflow stays consistent.

use std::ops::Deref;
use std::sync::atomic::AtomicUsize;

/// Aligns (and pads) its contents to a 128-byte line pair so that fields
/// written by different threads never share a cache line, including with
/// adjacent-line prefetch.
#[repr(align(128))]
pub(crate) struct CacheLine<T>(T);

impl<T> CacheLine<T> {
    pub(crate) fn new(value: T) -> Self {
        Self(value)
    }
}

impl<T> Deref for CacheLine<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.0
    }
}

/// Producer-written line.
///
/// `write` is published to the consumer (release). `lower_bound` and
/// `cached_read` are touched only by the producer; they are atomics so the
/// state can live behind a shared reference, and are accessed `Relaxed`.
pub(crate) struct ProducerCursor {
    pub(crate) write: AtomicUsize,
    pub(crate) lower_bound: AtomicUsize,
    pub(crate) cached_read: AtomicUsize,
}

/// Consumer-written line. Mirror image of [`ProducerCursor`].
pub(crate) struct ConsumerCursor {
    pub(crate) read: AtomicUsize,
    pub(crate) lower_bound: AtomicUsize,
    pub(crate) cached_write: AtomicUsize,
}

pub(crate) struct CursorState {
    pub(crate) producer: CacheLine<ProducerCursor>,
    pub(crate) consumer: CacheLine<ConsumerCursor>,
}

impl CursorState {
    pub(crate) fn new() -> Self {
        Self {
            producer: CacheLine::new(ProducerCursor {
                write: AtomicUsize::new(0),
                lower_bound: AtomicUsize::new(0),
                cached_read: AtomicUsize::new(0),
            }),
            consumer: CacheLine::new(ConsumerCursor {
                read: AtomicUsize::new(0),
                lower_bound: AtomicUsize::new(0),
                cached_write: AtomicUsize::new(0),
            }),
        }
    }
}

/// Physical slot of `cursor`. Precondition: result is in `[0, slots)`.
#[inline(always)]
pub(crate) fn position(cursor: usize, lower_bound: usize) -> usize {
    cursor.wrapping_sub(lower_bound)
}

/// Advance a cursor by `n`, stepping its lower bound once if the cursor
/// reached the end of the buffer. Requires `n < slots`.
#[inline(always)]
pub(crate) fn advance(cursor: usize, lower_bound: usize, slots: usize, n: usize) -> (usize, usize) {
    debug_assert!(n < slots, "advance: n {} >= slots {}", n, slots);
    let next = cursor.wrapping_add(n);
    if next.wrapping_sub(lower_bound) >= slots {
        (next, lower_bound.wrapping_add(slots))
    } else {
        (next, lower_bound)
    }
}

/// True when `n` more items do not fit.
#[inline(always)]
pub(crate) fn is_full(read: usize, write: usize, slots: usize, n: usize) -> bool {
    n >= slots || write.wrapping_sub(read) >= slots - n
}

/// True when fewer than `n` items are readable.
#[inline(always)]
pub(crate) fn is_empty(read: usize, write: usize, n: usize) -> bool {
    write.wrapping_sub(read) < n
}

#[inline(always)]
pub(crate) fn writable_items(read: usize, write: usize, slots: usize) -> usize {
    let capacity = slots - 1;
    capacity - write.wrapping_sub(read).min(capacity)
}

#[inline(always)]
pub(crate) fn readable_items(read: usize, write: usize) -> usize {
    write.wrapping_sub(read)
}

/// Split a run of `n` items starting at physical `start` into the part that
/// fits before the end of the buffer and the part that wraps to slot 0.
#[inline(always)]
pub(crate) fn split(start: usize, n: usize, slots: usize) -> (usize, usize) {
    let first = n.min(slots - start);
    (first, n - first)
}
