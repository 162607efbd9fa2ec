//! # Lock Table
//!
//! Ownership and attempt bookkeeping for the kernel's single lock kind,
//! and the place where priority donation happens.
//!
//! Two maps are kept:
//! - **holder**: lock → thread holding it (or none),
//! - **attempt**: thread → lock it is waiting to acquire.
//!
//! ## Donation Model
//!
//! Donation is a single scalar overwrite: when a thread attempts a lock
//! whose holder has a lower priority, the holder's priority is raised to
//! the attempter's. Releasing any lock resets the releaser straight back
//! to its original priority. There is no stack of grants; a holder that
//! is still wanted by other waiters gets boosted again the next time one
//! of them is considered for dispatch.

use core::fmt;

use log::debug;

use crate::config::{MAX_LOCKS, MAX_THREADS};
use crate::error::{KernelError, Result};
use crate::list::FixedList;
use crate::thread::{Priority, ThreadId, ThreadRegistry};

/// Name of a lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LockId(&'static str);

impl LockId {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// The name the lock was created with.
    pub const fn name(&self) -> &'static str {
        self.0
    }
}

impl From<&'static str> for LockId {
    fn from(name: &'static str) -> Self {
        Self(name)
    }
}

impl fmt::Display for LockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// A priority boost granted to a lock holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Donation {
    /// Thread whose priority was raised.
    pub holder: ThreadId,
    /// Priority before the boost.
    pub from: Priority,
    /// Priority after the boost.
    pub to: Priority,
}

#[derive(Debug, Clone, Copy)]
struct LockSlot {
    id: LockId,
    holder: Option<ThreadId>,
}

/// Holder and attempt bookkeeping for every announced lock.
pub struct LockTable {
    locks: FixedList<LockSlot, MAX_LOCKS>,
    /// Indexed by thread slot. The stored id guards against slot reuse.
    attempts: [Option<(ThreadId, LockId)>; MAX_THREADS],
}

impl LockTable {
    pub const fn new() -> Self {
        Self {
            locks: FixedList::new(),
            attempts: [None; MAX_THREADS],
        }
    }

    fn index_of(&self, lock: LockId) -> Result<usize> {
        self.locks
            .position(|slot| slot.id == lock)
            .ok_or(KernelError::UnknownLock(lock))
    }

    fn slot_mut(&mut self, lock: LockId) -> Result<&mut LockSlot> {
        let index = self.index_of(lock)?;
        self.locks
            .get_mut(index)
            .ok_or(KernelError::UnknownLock(lock))
    }

    fn clear_attempt_if(&mut self, thread: ThreadId, lock: LockId) {
        if let Some(entry) = self.attempts.get_mut(thread.slot()) {
            if *entry == Some((thread, lock)) {
                *entry = None;
            }
        }
    }

    /// Register `lock` as existing and unheld.
    pub fn on_create(&mut self, lock: LockId) -> Result<()> {
        if self.index_of(lock).is_ok() {
            return Err(KernelError::DuplicateLock(lock));
        }
        self.locks
            .push(LockSlot { id: lock, holder: None })
            .map_err(|_| KernelError::LockTableFull)
    }

    /// Record that `thread` is waiting for `lock` and donate to the holder
    /// if it runs at a lower priority.
    pub fn on_attempt(
        &mut self,
        lock: LockId,
        thread: ThreadId,
        registry: &mut ThreadRegistry,
    ) -> Result<Option<Donation>> {
        let holder = self.locks.get(self.index_of(lock)?).and_then(|slot| slot.holder);
        let priority = registry.lookup(thread)?.priority;

        self.attempts[thread.slot()] = Some((thread, lock));

        let Some(holder) = holder.filter(|h| *h != thread) else {
            return Ok(None);
        };
        let Some(tcb) = registry.get_mut(holder) else {
            return Ok(None);
        };
        if tcb.priority >= priority {
            return Ok(None);
        }

        let donation = Donation {
            holder,
            from: tcb.priority,
            to: priority,
        };
        tcb.priority = priority;
        debug!(
            "[lock] {} waits on `{}`: donating priority {} -> {} to {}",
            thread, lock, donation.from, donation.to, holder
        );
        Ok(Some(donation))
    }

    /// Make `thread` the holder of `lock`.
    ///
    /// Acquiring a lock the thread already holds is a no-op. Acquiring one
    /// held by someone else is a contract breach.
    pub fn on_acquire(&mut self, lock: LockId, thread: ThreadId) -> Result<()> {
        let slot = self.slot_mut(lock)?;
        match slot.holder {
            Some(holder) if holder != thread => {
                return Err(KernelError::LockHeld { lock, thread, holder });
            }
            _ => slot.holder = Some(thread),
        }
        self.clear_attempt_if(thread, lock);
        debug!("[lock] {} acquired `{}`", thread, lock);
        Ok(())
    }

    /// The lock became unavailable: drop its holder and `thread`'s attempt on it.
    ///
    /// Any donation already granted stays in place until the holder releases.
    pub fn on_failed(&mut self, lock: LockId, thread: ThreadId) -> Result<()> {
        self.slot_mut(lock)?.holder = None;
        self.clear_attempt_if(thread, lock);
        debug!("[lock] `{}` failed for {}", lock, thread);
        Ok(())
    }

    /// Release `lock` held by `thread`, restoring its original priority.
    pub fn on_release(
        &mut self,
        lock: LockId,
        thread: ThreadId,
        registry: &mut ThreadRegistry,
    ) -> Result<()> {
        let index = self.index_of(lock)?;
        if self.locks.get(index).and_then(|slot| slot.holder) != Some(thread) {
            return Err(KernelError::LockNotHeld { lock, thread });
        }
        let tcb = registry.lookup_mut(thread)?;
        tcb.restore_priority();

        if let Some(slot) = self.locks.get_mut(index) {
            slot.holder = None;
        }
        debug!(
            "[lock] {} released `{}`, priority back to {}",
            thread, lock, tcb.priority
        );
        Ok(())
    }

    /// Forget whatever `thread` was waiting for. Used when it terminates.
    pub fn cancel_attempt(&mut self, thread: ThreadId) -> Option<LockId> {
        let lock = self.attempt_of(thread)?;
        self.clear_attempt_if(thread, lock);
        Some(lock)
    }

    /// Current holder of `lock`. Unknown locks have no holder.
    pub fn holder_of(&self, lock: LockId) -> Option<ThreadId> {
        let index = self.index_of(lock).ok()?;
        self.locks.get(index)?.holder
    }

    /// Lock `thread` is currently waiting for.
    pub fn attempt_of(&self, thread: ThreadId) -> Option<LockId> {
        match self.attempts.get(thread.slot())? {
            Some((waiter, lock)) if *waiter == thread => Some(*lock),
            _ => None,
        }
    }

    /// First lock `thread` holds, if any.
    pub fn held_by(&self, thread: ThreadId) -> Option<LockId> {
        self.locks
            .iter()
            .find(|slot| slot.holder == Some(thread))
            .map(|slot| slot.id)
    }

    /// Whether `thread` holds a lock or waits on one.
    pub fn references(&self, thread: ThreadId) -> bool {
        self.attempt_of(thread).is_some() || self.locks.iter().any(|slot| slot.holder == Some(thread))
    }

    /// Whether `lock` has been announced.
    pub fn contains(&self, lock: LockId) -> bool {
        self.index_of(lock).is_ok()
    }

    /// Number of registered locks.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl Default for LockTable {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
