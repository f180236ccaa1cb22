//! Tracing hooks for queue lifecycle and back-pressure events.
//!
//! Enable with `--features tracing`. Without the feature every hook is an
//! empty inline function, so the hot path pays nothing.

#[inline]
pub fn record_created(capacity: usize, storage: &'static str) {
    #[cfg(feature = "tracing")]
    tracing::debug!(capacity, storage, "spsc queue created");
    #[cfg(not(feature = "tracing"))]
    let _ = (capacity, storage);
}

/// Producer rejected a request because the ring had too little room.
#[inline]
pub fn record_full(requested: usize, free: usize) {
    #[cfg(feature = "tracing")]
    tracing::trace!(requested, free, "spsc queue full");
    #[cfg(not(feature = "tracing"))]
    let _ = (requested, free);
}

/// Consumer asked for more items than were visible.
#[inline]
pub fn record_underflow(requested: usize, available: usize) {
    #[cfg(feature = "tracing")]
    tracing::trace!(requested, available, "spsc queue underflow");
    #[cfg(not(feature = "tracing"))]
    let _ = (requested, available);
}

#[inline]
pub fn record_disposed(dropped_items: usize) {
    #[cfg(feature = "tracing")]
    tracing::debug!(dropped_items, "spsc queue storage released");
    #[cfg(not(feature = "tracing"))]
    let _ = dropped_items;
}

#[inline]
pub fn record_pool_rent(len: usize, reused: bool) {
    #[cfg(feature = "tracing")]
    tracing::trace!(len, reused, "pool block rented");
    #[cfg(not(feature = "tracing"))]
    let _ = (len, reused);
}

#[inline]
pub fn record_pool_return(len: usize, retained: bool) {
    #[cfg(feature = "tracing")]
    tracing::trace!(len, retained, "pool block returned");
    #[cfg(not(feature = "tracing"))]
    let _ = (len, retained);
}
