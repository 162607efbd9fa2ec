//! # Kernel Errors
//!
//! Every error in this module is a caller-contract breach. Conditions
//! that are part of normal operation (an idle ready queue, a lock that is
//! currently held, a zero-tick sleep) are never reported here.

use thiserror::Error;

use crate::config::{MAX_LOCKS, MAX_THREADS};
use crate::sync::LockId;
use crate::thread::{ThreadId, ThreadState};

/// Errors reported by the scheduler and the kernel harness.
///
/// An operation that returns one of these leaves every table untouched,
/// so the caller can report the breach without the priority or ownership
/// state having drifted.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// The thread registry has no free slot.
    #[error("thread table is full ({} threads)", MAX_THREADS)]
    ThreadTableFull,

    /// The lock table has no free slot.
    #[error("lock table is full ({} locks)", MAX_LOCKS)]
    LockTableFull,

    /// The handle does not name a live thread (never created, or destroyed).
    #[error("unknown thread {0}")]
    UnknownThread(ThreadId),

    /// The lock was never announced through `on_lock_created`.
    #[error("unknown lock `{0}`")]
    UnknownLock(LockId),

    /// The lock was announced twice.
    #[error("lock `{0}` is already registered")]
    DuplicateLock(LockId),

    /// A thread tried to acquire a lock another thread still holds.
    #[error("{thread} cannot acquire `{lock}`: held by {holder}")]
    LockHeld {
        /// Lock being acquired.
        lock: LockId,
        /// Thread that tried to acquire it.
        thread: ThreadId,
        /// Current holder.
        holder: ThreadId,
    },

    /// A thread released a lock it does not hold.
    #[error("{thread} released `{lock}` without holding it")]
    LockNotHeld {
        /// Lock being released.
        lock: LockId,
        /// Thread that released it.
        thread: ThreadId,
    },

    /// A thread tried to exit while still holding a lock. Its waiters
    /// could never acquire it.
    #[error("{thread} exited while holding `{lock}`")]
    ExitWhileHolding {
        /// Thread that tried to exit.
        thread: ThreadId,
        /// A lock it still holds.
        lock: LockId,
    },

    /// The operation needs a runnable thread.
    #[error("{thread} is not runnable ({state:?})")]
    NotRunnable {
        /// Thread the operation was applied to.
        thread: ThreadId,
        /// State it was found in.
        state: ThreadState,
    },

    /// A thread was destroyed while a queue or the lock table still refers to it.
    #[error("{0} is still referenced by a queue or the lock table")]
    ThreadReferenced(ThreadId),
}

/// Result alias used throughout the kernel.
pub type Result<T> = core::result::Result<T, KernelError>;
