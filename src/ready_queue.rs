//! # Ready Queue
//!
//! Ordered run queue of threads that can be dispatched.
//!
//! ## Ordering
//!
//! 1. Descending `priority`.
//! 2. Among equal `priority`, ascending `original_priority`: a boosted
//!    low-priority lock holder runs ahead of its natural peers so it
//!    releases the lock quickly.
//! 3. Among full ties, insertion order. Re-inserting the thread that just
//!    ran places it behind its siblings, which is what rotates equals
//!    round-robin.

use crate::config::MAX_THREADS;
use crate::error::{KernelError, Result};
use crate::list::FixedList;
use crate::thread::{ThreadControlBlock, ThreadId, ThreadRegistry};

/// `true` if `a` must be placed ahead of an already queued `b`.
#[inline]
fn outranks(a: &ThreadControlBlock, b: &ThreadControlBlock) -> bool {
    a.priority > b.priority
        || (a.priority == b.priority && a.original_priority < b.original_priority)
}

/// Runnable and lock-blocked threads, best candidate at the head.
pub struct ReadyQueue {
    threads: FixedList<ThreadId, MAX_THREADS>,
}

impl ReadyQueue {
    pub const fn new() -> Self {
        Self {
            threads: FixedList::new(),
        }
    }

    /// Insert `id` in front of the first queued thread it outranks, or at
    /// the tail if it outranks none.
    pub fn insert(&mut self, id: ThreadId, registry: &ThreadRegistry) -> Result<()> {
        let tcb = registry.lookup(id)?;
        let index = self
            .threads
            .position(|queued| registry.get(*queued).is_some_and(|other| outranks(tcb, other)))
            .unwrap_or(self.threads.len());

        self.threads
            .insert_at(index, id)
            .map_err(|_| KernelError::ThreadTableFull)
    }

    /// Remove `id` and insert it again under the current priorities.
    ///
    /// Used after dispatch for round-robin, and after any priority change
    /// of a queued thread. A thread that is not queued is left alone.
    pub fn remove_and_reinsert(&mut self, id: ThreadId, registry: &ThreadRegistry) -> Result<()> {
        if self.threads.remove(id) {
            self.insert(id, registry)?;
        }
        Ok(())
    }

    /// Take `id` out of the queue. Returns whether it was queued.
    pub fn remove(&mut self, id: ThreadId) -> bool {
        self.threads.remove(id)
    }

    /// Next candidate for dispatch.
    pub fn head(&self) -> Option<ThreadId> {
        self.threads.first()
    }

    /// Drop the head of the queue and return it.
    pub fn pop_head(&mut self) -> Option<ThreadId> {
        self.threads.remove_at(0)
    }

    /// Evict every terminated thread (or stale handle). Returns how many were removed.
    pub fn pop_terminated(&mut self, registry: &ThreadRegistry) -> usize {
        let mut evicted = 0;
        while let Some(index) = self
            .threads
            .position(|id| registry.get(*id).map_or(true, |tcb| tcb.is_terminated()))
        {
            self.threads.remove_at(index);
            evicted += 1;
        }
        evicted
    }

    pub fn contains(&self, id: ThreadId) -> bool {
        self.threads.contains(id)
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    /// Queued threads from head to tail.
    pub fn iter(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.threads.iter()
    }
}

impl Default for ReadyQueue {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
