use super::{new_slots, Slot, Storage};

/// Heap-allocated slots sized by the caller.
pub struct HeapStorage<T> {
    slots: Box<[Slot<T>]>,
}

impl<T> HeapStorage<T> {
    /// Allocate `len` slots (queue capacity `len - 1`).
    pub fn new(len: usize) -> Self {
        Self {
            slots: new_slots(len),
        }
    }
}

impl<T> From<Box<[Slot<T>]>> for HeapStorage<T> {
    fn from(slots: Box<[Slot<T>]>) -> Self {
        Self { slots }
    }
}

unsafe impl<T> Storage<T> for HeapStorage<T> {
    #[inline]
    fn slots(&self) -> &[Slot<T>] {
        &self.slots
    }

    fn dispose(&mut self) {
        if !self.slots.is_empty() {
            self.slots = Box::new([]);
        }
    }

    fn kind(&self) -> &'static str {
        "heap"
    }
}
