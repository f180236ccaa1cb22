//! ringq - Bounded lock-free SPSC ring queue
//!
//! One producer thread and one consumer thread share a fixed-capacity ring
//! of slots. The two sides synchronize only through their cursors: each side
//! publishes its own cursor with a release store and keeps a cached copy of
//! the other side's cursor, refreshed with an acquire load only when the
//! cached value cannot answer the current request.
//!
//! ```rust
//! use ringq::SpscQueue;
//!
//! // 4 slots, one reserved: usable capacity is 3
//! let mut queue = SpscQueue::<u64>::new(4).unwrap();
//! let mut writer = queue.writer().unwrap();
//!
//! let producer = std::thread::spawn(move || {
//!     for i in 0..1000u64 {
//!         writer.wait_add(i);
//!     }
//! });
//!
//! let mut expected = 0;
//! while expected < 1000 {
//!     if let Some(v) = queue.try_dequeue() {
//!         assert_eq!(v, expected);
//!         expected += 1;
//!     }
//! }
//! producer.join().unwrap();
//! ```

mod bulk;
pub mod error;
pub mod insights;
pub mod pool;
pub mod spsc;
pub mod storage;

// Re-export main components
pub use error::{QueueError, Result};
pub use pool::{BlockPool, PoolConfig};
pub use spsc::{BulkSink, QueueConfig, Run, Snapshot, SpscQueue, Writer};
#[cfg(unix)]
pub use storage::MappedStorage;
pub use storage::{HeapStorage, PooledStorage, Slot, Storage};
