//! Bulk transfer between contiguous slot runs and caller slices.
//!
//! The copy-in and move-out functions take a `progress` counter, so a panic
//! in a `Clone`/`Drop` impl leaves the caller knowing exactly which slots
//! were filled or vacated.

use crate::storage::Slot;
use std::ptr;

/// Clone `src` into the leading slots of `dst`. `progress` counts slots
/// that hold a value.
///
/// # Safety
///
/// - `dst.len() >= src.len()`.
/// - The target slots are vacant and owned by the producer.
#[inline]
pub(crate) unsafe fn write_cloned<T: Clone>(dst: &[Slot<T>], src: &[T], progress: &mut usize) {
    debug_assert!(dst.len() >= src.len());
    for (slot, item) in dst.iter().zip(src) {
        (*slot.get()).write(item.clone());
        *progress += 1;
    }
}

/// Clone the values in `src` into the leading elements of `dst`.
///
/// # Safety
///
/// Every slot in `src` holds an initialized value.
#[inline]
pub(crate) unsafe fn clone_out<T: Clone>(src: &[Slot<T>], dst: &mut [T]) {
    debug_assert!(dst.len() >= src.len());
    for (slot, out) in src.iter().zip(dst.iter_mut()) {
        out.clone_from((*slot.get()).assume_init_ref());
    }
}

/// Move the values in `src` into the leading elements of `dst`, dropping
/// whatever `dst` held. The slots are left vacant.
///
/// # Safety
///
/// Every slot in `src` holds an initialized value owned by the consumer.
#[inline]
pub(crate) unsafe fn move_out<T>(src: &[Slot<T>], dst: &mut [T], progress: &mut usize) {
    debug_assert!(dst.len() >= src.len());
    for (slot, out) in src.iter().zip(dst.iter_mut()) {
        let value = (*slot.get()).assume_init_read();
        *progress += 1;
        *out = value;
    }
}

/// Drop the values in `src` in place, leaving the slots vacant.
///
/// # Safety
///
/// Every slot in `src` holds an initialized value owned by the consumer.
#[inline]
pub(crate) unsafe fn drop_run<T>(src: &[Slot<T>], progress: &mut usize) {
    if !std::mem::needs_drop::<T>() {
        *progress += src.len();
        return;
    }
    for slot in src {
        *progress += 1;
        ptr::drop_in_place((*slot.get()).as_mut_ptr());
    }
}
