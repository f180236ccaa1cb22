use super::{Slot, Storage};
use crate::error::{QueueError, Result};
use crate::spsc::QueueConfig;
use std::marker::PhantomData;
use std::ptr;

/// Page-aligned slots from an anonymous mmap, optionally mlocked so the
/// ring never takes a page fault on the hot path.
pub struct MappedStorage<T> {
    ptr: *mut Slot<T>,
    len: usize,
    _marker: PhantomData<T>,
}

// Safety: the mapping is exclusively owned; slot contents follow T.
unsafe impl<T: Send> Send for MappedStorage<T> {}

impl<T> MappedStorage<T> {
    /// Map `config.capacity + 1` slots.
    pub fn new(config: &QueueConfig) -> Result<Self> {
        let len = config.slot_count();
        let slot_size = std::mem::size_of::<Slot<T>>();
        if slot_size == 0 {
            return Err(QueueError::config("Zero-sized slots cannot be mapped"));
        }
        if std::mem::align_of::<Slot<T>>() > page_size() {
            return Err(QueueError::config("Slot alignment exceeds page size"));
        }

        let map_len = len
            .checked_mul(slot_size)
            .ok_or_else(|| QueueError::config("Buffer size overflow"))?;
        let p = unsafe {
            let p = libc::mmap(
                ptr::null_mut(),
                map_len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            );
            if p == libc::MAP_FAILED {
                return Err(std::io::Error::last_os_error().into());
            }
            p
        };

        if config.mlock && unsafe { libc::mlock(p, map_len) } != 0 {
            // Locking is best effort (RLIMIT_MEMLOCK); the mapping stays usable.
            #[cfg(feature = "tracing")]
            tracing::warn!(
                "mlock of {} bytes failed: {}",
                map_len,
                std::io::Error::last_os_error()
            );
        }

        Ok(Self {
            ptr: p as *mut Slot<T>,
            len,
            _marker: PhantomData,
        })
    }

    fn map_len(&self) -> usize {
        self.len * std::mem::size_of::<Slot<T>>()
    }
}

unsafe impl<T> Storage<T> for MappedStorage<T> {
    #[inline]
    fn slots(&self) -> &[Slot<T>] {
        if self.ptr.is_null() {
            return &[];
        }
        unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
    }

    fn dispose(&mut self) {
        if !self.ptr.is_null() {
            unsafe {
                libc::munmap(self.ptr as *mut libc::c_void, self.map_len());
            }
            self.ptr = ptr::null_mut();
            self.len = 0;
        }
    }

    fn kind(&self) -> &'static str {
        "mapped"
    }
}

impl<T> Drop for MappedStorage<T> {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn page_size() -> usize {
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as usize
    } else {
        4096
    }
}
