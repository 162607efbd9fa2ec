//! # Scheduler
//!
//! Core scheduling logic for TickOS: fixed-priority preemptive selection,
//! round-robin among equals, timed sleep, and priority donation across
//! the lock table.
//!
//! ## Scheduling Algorithm
//!
//! On every call to [`Scheduler::next_thread_to_run`]:
//! 1. **Wake sleepers**: drain due threads from the sleep queue into the
//!    ready queue, in wake order.
//! 2. **Idle check**: an empty ready queue means there is nothing to run.
//! 3. **Pick the head**:
//!    a. A terminated head is evicted and the next head considered.
//!    b. If the head is waiting on a lock whose holder runs at a lower
//!       priority, the holder is boosted to the head's priority and is
//!       dispatched instead, since the head cannot progress until the
//!       holder releases.
//! 4. **Round-robin**: the chosen thread is re-inserted behind its equals.
//!
//! ## Ownership
//!
//! `Scheduler` owns the registry, both queues, and the lock table. Queues
//! and the lock table store [`ThreadId`]s only, so every priority change
//! is made on the single record kept by the registry.

use log::{debug, trace, warn};

use crate::error::{KernelError, Result};
use crate::ready_queue::ReadyQueue;
use crate::sleep_queue::SleepQueue;
use crate::sync::{Donation, LockId, LockTable};
use crate::thread::{
    Priority, ThreadBody, ThreadControlBlock, ThreadId, ThreadRegistry, ThreadState, Tick,
};

// ---------------------------------------------------------------------------
// Scheduler struct
// ---------------------------------------------------------------------------

/// The complete scheduling state of one simulated machine.
///
/// Independent instances share nothing, so several can live side by side
/// in one process.
pub struct Scheduler {
    registry: ThreadRegistry,
    ready: ReadyQueue,
    sleeping: SleepQueue,
    locks: LockTable,
}

impl Scheduler {
    pub const fn new() -> Self {
        Self {
            registry: ThreadRegistry::new(),
            ready: ReadyQueue::new(),
            sleeping: SleepQueue::new(),
            locks: LockTable::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Thread lifecycle
    // -----------------------------------------------------------------------

    /// Create a thread and make it runnable immediately.
    pub fn create_thread(
        &mut self,
        name: &'static str,
        body: ThreadBody,
        arg: usize,
        priority: Priority,
    ) -> Result<ThreadId> {
        let id = self.registry.create(name, body, arg, priority)?;
        if let Err(err) = self.ready.insert(id, &self.registry) {
            self.registry.destroy(id)?;
            return Err(err);
        }
        debug!("[create] {} `{}` at priority {}", id, name, priority);
        Ok(id)
    }

    /// Mark a thread terminated. It is evicted lazily when it reaches the
    /// head of the ready queue, or by [`evict_terminated`](Self::evict_terminated).
    ///
    /// A thread still holding a lock cannot terminate: its waiters would
    /// spin forever on a holder that never releases.
    pub fn terminate(&mut self, id: ThreadId) -> Result<()> {
        self.registry.lookup(id)?;
        if let Some(lock) = self.locks.held_by(id) {
            return Err(KernelError::ExitWhileHolding { thread: id, lock });
        }
        let tcb = self.registry.lookup_mut(id)?;
        tcb.state = ThreadState::Terminated;
        // Sleepers are not visited by the ready-queue eviction path
        self.sleeping.remove(id);
        self.locks.cancel_attempt(id);
        debug!("[terminate] {}", id);
        Ok(())
    }

    /// Free a thread record. Fails while any queue or the lock table still
    /// refers to it.
    pub fn destroy_thread(&mut self, id: ThreadId) -> Result<()> {
        self.registry.lookup(id)?;
        if self.is_referenced(id) {
            return Err(KernelError::ThreadReferenced(id));
        }
        self.registry.destroy(id)?;
        Ok(())
    }

    fn is_referenced(&self, id: ThreadId) -> bool {
        self.ready.contains(id) || self.sleeping.contains(id) || self.locks.references(id)
    }

    /// Destroy every terminated thread nothing refers to any more.
    /// Returns how many records were freed.
    pub fn reap(&mut self) -> usize {
        let mut reaped = 0;
        loop {
            let next = self
                .registry
                .iter()
                .filter(|tcb| tcb.is_terminated())
                .map(|tcb| tcb.id)
                .find(|id| !self.is_referenced(*id));
            let Some(id) = next else {
                break;
            };
            if self.registry.destroy(id).is_err() {
                break;
            }
            debug!("[reap] destroyed {}", id);
            reaped += 1;
        }
        reaped
    }

    /// Evict terminated threads from the ready queue eagerly.
    pub fn evict_terminated(&mut self) -> usize {
        self.ready.pop_terminated(&self.registry)
    }

    /// Set a thread's current priority.
    ///
    /// Requests below the thread's original priority are clamped to it.
    pub fn set_priority(&mut self, id: ThreadId, value: Priority) -> Result<()> {
        let tcb = self.registry.lookup_mut(id)?;
        let applied = value.max(tcb.original_priority);
        if applied != value {
            warn!(
                "[set_priority] {} asked for {}, clamped to original priority {}",
                id, value, applied
            );
        }
        tcb.priority = applied;
        self.reposition(id)
    }

    /// Re-sort `id` in whichever queue holds it after a priority change.
    fn reposition(&mut self, id: ThreadId) -> Result<()> {
        self.ready.remove_and_reinsert(id, &self.registry)?;
        self.sleeping.reposition(id, &self.registry)
    }

    pub(crate) fn note_resumed(&mut self, id: ThreadId) -> Result<()> {
        let tcb = self.registry.lookup_mut(id)?;
        tcb.resumes = tcb.resumes.saturating_add(1);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    /// Wake due sleepers, then choose the thread to run at `current_tick`.
    ///
    /// `None` means the machine is idle.
    pub fn next_thread_to_run(&mut self, current_tick: Tick) -> Option<ThreadId> {
        self.wake_sleepers(current_tick);

        loop {
            let candidate = self.ready.head()?;
            trace!("[next_thread_to_run] trying head {}", candidate);

            let Some(tcb) = self.registry.get(candidate).filter(|tcb| !tcb.is_terminated()) else {
                trace!("[next_thread_to_run] {} was terminated", candidate);
                self.ready.pop_head();
                continue;
            };
            let priority = tcb.priority;

            let chosen = match self.donate_at_dispatch(candidate, priority) {
                Some(holder) => holder,
                None => candidate,
            };

            // `chosen` is queued and alive, so this only fails on a broken table
            if let Err(err) = self.ready.remove_and_reinsert(chosen, &self.registry) {
                warn!("[next_thread_to_run] could not requeue {}: {}", chosen, err);
            }
            return Some(chosen);
        }
    }

    /// If `candidate` waits on a lock held by a lower-priority runnable
    /// thread, boost the holder and return it as the thread to dispatch.
    fn donate_at_dispatch(&mut self, candidate: ThreadId, priority: Priority) -> Option<ThreadId> {
        let lock = self.locks.attempt_of(candidate)?;
        let holder = self.locks.holder_of(lock).filter(|h| *h != candidate)?;
        let tcb = self.registry.get_mut(holder)?;
        if tcb.is_terminated() || tcb.priority >= priority {
            return None;
        }

        debug!(
            "[next_thread_to_run] {} blocked on `{}`: donating {} -> {} to {}",
            candidate, lock, tcb.priority, priority, holder
        );
        tcb.priority = priority;

        // A sleeping holder keeps the boost but cannot be dispatched
        if self.ready.contains(holder) {
            return Some(holder);
        }
        if let Err(err) = self.sleeping.reposition(holder, &self.registry) {
            warn!("[next_thread_to_run] could not reposition sleeping {}: {}", holder, err);
        }
        None
    }

    fn wake_sleepers(&mut self, current_tick: Tick) {
        for id in self.sleeping.release_due(current_tick) {
            let Some(tcb) = self.registry.get_mut(id) else {
                continue;
            };
            if tcb.state == ThreadState::Sleeping {
                tcb.state = ThreadState::Runnable;
            }
            debug!("[wake] {} at tick {}", id, current_tick);
            // Capacity is shared with the sleep queue, so there is always room
            if let Err(err) = self.ready.insert(id, &self.registry) {
                warn!("[wake] {} lost: {}", id, err);
            }
        }
    }

    /// Put `id` to sleep for `ticks` ticks starting at `current_tick`.
    ///
    /// `ticks <= 0` makes the thread due immediately: it is eligible on the
    /// very next scheduling decision, even at the same tick. Returns the
    /// tick at call time.
    ///
    /// Only a runnable thread can go to sleep. A terminated thread must stay
    /// terminated, and a lock-blocked one must stay queued to retry its lock.
    pub fn tick_sleep(&mut self, id: ThreadId, current_tick: Tick, ticks: i64) -> Result<Tick> {
        let state = self.registry.lookup(id)?.state;
        if state != ThreadState::Runnable {
            return Err(KernelError::NotRunnable { thread: id, state });
        }
        let wake_tick = if ticks <= 0 {
            current_tick
        } else {
            current_tick.saturating_add(ticks as u64)
        };

        self.sleeping.remove(id);
        self.sleeping.insert(id, wake_tick, &self.registry)?;
        self.ready.remove(id);
        self.registry.lookup_mut(id)?.state = ThreadState::Sleeping;
        debug!("[tick_sleep] {} sleeps at {} until {}", id, current_tick, wake_tick);
        Ok(current_tick)
    }

    // -----------------------------------------------------------------------
    // Lock lifecycle hooks
    // -----------------------------------------------------------------------

    /// Announce `lock` as existing and free.
    pub fn on_lock_created(&mut self, lock: LockId) -> Result<()> {
        self.locks.on_create(lock)?;
        debug!("[lock] created `{}`", lock);
        Ok(())
    }

    /// `thread` wants `lock`. Donates to a lower-priority holder and marks
    /// `thread` blocked if someone else holds the lock.
    pub fn on_lock_attempted(&mut self, lock: LockId, thread: ThreadId) -> Result<Option<Donation>> {
        let donation = self.locks.on_attempt(lock, thread, &mut self.registry)?;
        if let Some(donation) = donation {
            self.reposition(donation.holder)?;
        }

        let blocked = self.locks.holder_of(lock).is_some_and(|h| h != thread);
        if blocked {
            self.registry.lookup_mut(thread)?.state = ThreadState::BlockedOnLock;
        }
        Ok(donation)
    }

    /// `thread` now holds `lock` and stops waiting.
    pub fn on_lock_acquired(&mut self, lock: LockId, thread: ThreadId) -> Result<()> {
        self.registry.lookup(thread)?;
        self.locks.on_acquire(lock, thread)?;
        self.unblock(thread);
        Ok(())
    }

    /// The lock went away under `thread`: forget the holder and the attempt.
    pub fn on_lock_failed(&mut self, lock: LockId, thread: ThreadId) -> Result<()> {
        self.locks.on_failed(lock, thread)?;
        self.unblock(thread);
        Ok(())
    }

    /// `thread` releases `lock`; its priority returns to the original value.
    pub fn on_lock_released(&mut self, lock: LockId, thread: ThreadId) -> Result<()> {
        self.locks.on_release(lock, thread, &mut self.registry)?;
        self.reposition(thread)
    }

    /// Thread currently holding `lock`.
    pub fn holder_of(&self, lock: LockId) -> Option<ThreadId> {
        self.locks.holder_of(lock)
    }

    /// Lock `thread` is waiting to acquire, if any.
    pub fn attempt_of(&self, thread: ThreadId) -> Option<LockId> {
        self.locks.attempt_of(thread)
    }

    fn unblock(&mut self, thread: ThreadId) {
        if let Some(tcb) = self.registry.get_mut(thread) {
            if tcb.state == ThreadState::BlockedOnLock {
                tcb.state = ThreadState::Runnable;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    /// Record of a live thread.
    pub fn thread(&self, id: ThreadId) -> Option<&ThreadControlBlock> {
        self.registry.get(id)
    }

    pub fn threads(&self) -> impl Iterator<Item = &ThreadControlBlock> {
        self.registry.iter()
    }

    /// Ready threads from head to tail.
    pub fn ready_threads(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.ready.iter()
    }

    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    pub fn sleeping_len(&self) -> usize {
        self.sleeping.len()
    }

    pub fn wake_tick_of(&self, id: ThreadId) -> Option<Tick> {
        self.sleeping.wake_tick_of(id)
    }

    /// Sleeping threads in wake order.
    pub fn sleeping_threads(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.sleeping.iter()
    }

    /// Number of live thread records.
    pub fn thread_count(&self) -> usize {
        self.registry.len()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
