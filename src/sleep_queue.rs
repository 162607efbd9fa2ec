//! # Sleep Queue
//!
//! Threads waiting for a wake tick, kept sorted so the next thread to
//! wake is always at the head:
//!
//! - ascending `wake_tick`,
//! - ties broken by descending current priority,
//! - remaining ties in insertion order.
//!
//! The sleep queue never touches the ready queue. [`SleepQueue::release_due`]
//! hands due threads back to the caller, which reinstates them.

use crate::config::MAX_THREADS;
use crate::error::{KernelError, Result};
use crate::list::FixedList;
use crate::thread::{Priority, ThreadId, ThreadRegistry, Tick};

/// One sleeping thread and the tick it wakes at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SleepEntry {
    pub thread: ThreadId,
    pub wake_tick: Tick,
    /// Priority when the entry was last placed. Kept current by
    /// [`SleepQueue::reposition`].
    priority: Priority,
}

impl SleepEntry {
    #[inline]
    fn wakes_before(&self, other: &SleepEntry) -> bool {
        self.wake_tick < other.wake_tick
            || (self.wake_tick == other.wake_tick && self.priority > other.priority)
    }
}

/// Sleeping threads in wake order.
pub struct SleepQueue {
    entries: FixedList<SleepEntry, MAX_THREADS>,
}

impl SleepQueue {
    pub const fn new() -> Self {
        Self {
            entries: FixedList::new(),
        }
    }

    /// Queue `thread` to wake at `wake_tick`.
    pub fn insert(&mut self, thread: ThreadId, wake_tick: Tick, registry: &ThreadRegistry) -> Result<()> {
        let entry = SleepEntry {
            thread,
            wake_tick,
            priority: registry.lookup(thread)?.priority,
        };
        let index = self
            .entries
            .position(|queued| entry.wakes_before(queued))
            .unwrap_or(self.entries.len());

        self.entries
            .insert_at(index, entry)
            .map_err(|_| KernelError::ThreadTableFull)
    }

    /// Drain every thread whose wake tick is `<= current_tick`, in wake order.
    ///
    /// Each `next()` inspects the head afresh, so a partially consumed
    /// iterator leaves the remaining due threads queued for the next call.
    pub fn release_due(&mut self, current_tick: Tick) -> ReleaseDue<'_> {
        ReleaseDue {
            queue: self,
            current_tick,
        }
    }

    /// Move `thread` to the place its current priority earns among the
    /// threads sharing its wake tick. A thread that is not asleep is left alone.
    pub fn reposition(&mut self, thread: ThreadId, registry: &ThreadRegistry) -> Result<()> {
        let Some(index) = self.entries.position(|entry| entry.thread == thread) else {
            return Ok(());
        };
        registry.lookup(thread)?;
        match self.entries.remove_at(index) {
            Some(entry) => self.insert(thread, entry.wake_tick, registry),
            None => Ok(()),
        }
    }

    /// Take `thread` out of the queue without waking it. Returns whether it was queued.
    pub fn remove(&mut self, thread: ThreadId) -> bool {
        match self.entries.position(|entry| entry.thread == thread) {
            Some(index) => self.entries.remove_at(index).is_some(),
            None => false,
        }
    }

    /// Wake tick of the head, if any thread is sleeping.
    pub fn next_wake(&self) -> Option<Tick> {
        self.entries.first().map(|entry| entry.wake_tick)
    }

    /// Tick at which `thread` is due, if it is asleep.
    pub fn wake_tick_of(&self, thread: ThreadId) -> Option<Tick> {
        self.entries
            .iter()
            .find(|entry| entry.thread == thread)
            .map(|entry| entry.wake_tick)
    }

    pub fn contains(&self, thread: ThreadId) -> bool {
        self.entries.iter().any(|entry| entry.thread == thread)
    }

    /// Sleeping threads in the order they will wake.
    pub fn iter(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.entries.iter().map(|entry| entry.thread)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for SleepQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator returned by [`SleepQueue::release_due`].
pub struct ReleaseDue<'a> {
    queue: &'a mut SleepQueue,
    current_tick: Tick,
}

impl Iterator for ReleaseDue<'_> {
    type Item = ThreadId;

    fn next(&mut self) -> Option<ThreadId> {
        let head = self.queue.entries.first()?;
        if head.wake_tick > self.current_tick {
            return None;
        }
        self.queue.entries.remove_at(0);
        Some(head.thread)
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
