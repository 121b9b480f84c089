//! Synchronisation primitives.
//!
//! The upper MAC itself is single-threaded; the only concurrent peer is
//! CPU-Low on the far side of the shared packet buffers. The spinlock
//! here protects the mailbox transport so a test harness may drive the
//! CPU-Low side from another thread.

mod spinlock;

pub use self::spinlock::{Spinlock, SpinlockGuard};
