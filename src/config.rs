//! # TickOS Configuration
//!
//! Compile-time constants governing the scheduler and system behavior.
//! All limits are fixed at compile time; there is no dynamic allocation.

use crate::thread::Priority;

/// Maximum number of threads the system can manage simultaneously.
/// This bounds the thread registry and every queue that references
/// threads (ready queue, sleep queue, lock attempts).
pub const MAX_THREADS: usize = 32;

/// Maximum number of distinct locks the lock table can track.
pub const MAX_LOCKS: usize = 16;

/// Priority for threads whose creator has no preference.
/// Higher values are more important; negative values are allowed.
pub const DEFAULT_PRIORITY: Priority = 0;

/// Tick at which a freshly created kernel starts counting.
pub const FIRST_TICK: u64 = 0;
