//! # Thread Control Block
//!
//! Defines the thread model for TickOS and the registry that owns every
//! thread record. Queues and the lock table never hold a thread directly;
//! they hold a [`ThreadId`], and all reads and writes go through the
//! [`ThreadRegistry`].
//!
//! ## Priority Model
//!
//! Each thread carries two priorities:
//! - **`original_priority`** is fixed at creation.
//! - **`priority`** is what the scheduler ranks by. Donation raises it;
//!   releasing a lock resets it to `original_priority` in one step.
//!
//! `priority >= original_priority` holds at all times.

use core::fmt;

use crate::config::MAX_THREADS;
use crate::error::{KernelError, Result};
use crate::sync::LockId;

/// Scheduling priority. Higher values are more important.
pub type Priority = i32;

/// A point in simulated time.
pub type Tick = u64;

// ---------------------------------------------------------------------------
// Thread identity
// ---------------------------------------------------------------------------

/// Stable handle to a thread record.
///
/// `slot` indexes the registry arena. `generation` is bumped every time a
/// slot is reused, so a handle kept past `destroy` stops resolving instead
/// of silently naming the slot's next occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadId {
    slot: u16,
    generation: u16,
}

impl ThreadId {
    /// Arena index of this handle.
    #[inline]
    pub const fn slot(&self) -> usize {
        self.slot as usize
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "thread#{}.{}", self.slot, self.generation)
    }
}

// ---------------------------------------------------------------------------
// Thread state machine
// ---------------------------------------------------------------------------

/// Execution state of a thread.
///
/// ```text
///                 tick_sleep()             release_due()
///   ┌──────────┐ ─────────────► ┌──────────┐ ──────────┐
///   │ Runnable │                │ Sleeping │           │
///   └──────────┘ ◄───────────── └──────────┘ ◄─────────┘
///     │     ▲
///     │     │ acquire / failed
///     │     │
///     │   ┌───────────────┐
///     │   │ BlockedOnLock │ ◄── attempt on a held lock
///     │   └───────────────┘
///     │ Step::Exit
///     ▼
///   ┌────────────┐
///   │ Terminated │  evicted lazily, then reaped
///   └────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// In the ready queue and able to make progress.
    Runnable,
    /// In the sleep queue until its wake tick.
    Sleeping,
    /// In the ready queue, waiting for a lock another thread holds.
    BlockedOnLock,
    /// Finished. Never returned by the scheduler again.
    Terminated,
}

// ---------------------------------------------------------------------------
// Thread bodies
// ---------------------------------------------------------------------------

/// What a thread body asks the kernel to do after one resumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Give up the rest of the tick and stay runnable.
    Yield,
    /// Sleep for the given number of ticks. `<= 0` wakes on the next decision.
    Sleep(i64),
    /// Try to take a lock; blocks if another thread holds it.
    Acquire(LockId),
    /// Release a held lock.
    Release(LockId),
    /// Terminate the thread.
    Exit,
}

/// A thread's work function. Called once per dispatch.
pub type ThreadBody = fn(&mut ThreadContext<'_>) -> Step;

/// View of the running thread handed to its body.
pub struct ThreadContext<'a> {
    tcb: &'a ThreadControlBlock,
    tick: Tick,
    pub(crate) priority_request: Option<Priority>,
}

impl<'a> ThreadContext<'a> {
    pub(crate) fn new(tcb: &'a ThreadControlBlock, tick: Tick) -> Self {
        Self {
            tcb,
            tick,
            priority_request: None,
        }
    }

    pub fn id(&self) -> ThreadId {
        self.tcb.id
    }

    pub fn name(&self) -> &'static str {
        self.tcb.name
    }

    /// The opaque argument passed at creation.
    pub fn arg(&self) -> usize {
        self.tcb.arg
    }

    /// How many times the body ran before this call (0 on first run).
    pub fn resume_count(&self) -> u32 {
        self.tcb.resumes
    }

    pub fn current_tick(&self) -> Tick {
        self.tick
    }

    /// Current (possibly donated) priority.
    pub fn priority(&self) -> Priority {
        self.tcb.priority
    }

    /// Ask the kernel to change this thread's priority once the step returns.
    pub fn set_my_priority(&mut self, priority: Priority) {
        self.priority_request = Some(priority);
    }
}

// ---------------------------------------------------------------------------
// Thread Control Block
// ---------------------------------------------------------------------------

/// Thread Control Block (TCB): everything the scheduler knows about a thread.
#[derive(Clone, Copy)]
pub struct ThreadControlBlock {
    /// Stable handle of this record.
    pub id: ThreadId,

    /// Human-readable name, immutable after creation.
    pub name: &'static str,

    /// Work function resumed on each dispatch.
    pub body: ThreadBody,

    /// Opaque argument for `body`.
    pub arg: usize,

    /// Priority the scheduler ranks by. Raised by donation.
    pub priority: Priority,

    /// Priority given at creation. Never changed afterwards.
    pub original_priority: Priority,

    /// Current execution state.
    pub state: ThreadState,

    /// Number of times `body` has been resumed.
    pub resumes: u32,
}

impl ThreadControlBlock {
    /// Whether the thread currently runs on a donated priority.
    #[inline]
    pub fn is_boosted(&self) -> bool {
        self.priority > self.original_priority
    }

    #[inline]
    pub fn is_terminated(&self) -> bool {
        self.state == ThreadState::Terminated
    }

    /// Reset `priority` to `original_priority`, undoing any donation.
    #[inline]
    pub fn restore_priority(&mut self) {
        self.priority = self.original_priority;
    }
}

impl fmt::Debug for ThreadControlBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadControlBlock")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("arg", &self.arg)
            .field("priority", &self.priority)
            .field("original_priority", &self.original_priority)
            .field("state", &self.state)
            .field("resumes", &self.resumes)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Thread registry
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
struct Slot {
    generation: u16,
    tcb: Option<ThreadControlBlock>,
}

/// Arena owning every thread record. The only place a thread is created
/// or destroyed.
pub struct ThreadRegistry {
    slots: [Slot; MAX_THREADS],
    count: usize,
}

impl ThreadRegistry {
    pub const fn new() -> Self {
        Self {
            slots: [Slot {
                generation: 0,
                tcb: None,
            }; MAX_THREADS],
            count: 0,
        }
    }

    /// Allocate a record with `priority == original_priority == priority`.
    ///
    /// The new thread starts `Runnable`; placing it in the ready queue is
    /// the scheduler's job.
    pub fn create(
        &mut self,
        name: &'static str,
        body: ThreadBody,
        arg: usize,
        priority: Priority,
    ) -> Result<ThreadId> {
        let slot = self
            .slots
            .iter()
            .position(|s| s.tcb.is_none())
            .ok_or(KernelError::ThreadTableFull)?;

        let entry = &mut self.slots[slot];
        let id = ThreadId {
            slot: slot as u16,
            generation: entry.generation,
        };
        entry.tcb = Some(ThreadControlBlock {
            id,
            name,
            body,
            arg,
            priority,
            original_priority: priority,
            state: ThreadState::Runnable,
            resumes: 0,
        });
        self.count += 1;
        Ok(id)
    }

    /// Free a record. The caller guarantees nothing references it anymore.
    pub fn destroy(&mut self, id: ThreadId) -> Result<ThreadControlBlock> {
        self.get(id).ok_or(KernelError::UnknownThread(id))?;
        let entry = &mut self.slots[id.slot()];
        let tcb = entry.tcb.take().ok_or(KernelError::UnknownThread(id))?;
        entry.generation = entry.generation.wrapping_add(1);
        self.count -= 1;
        Ok(tcb)
    }

    pub fn get(&self, id: ThreadId) -> Option<&ThreadControlBlock> {
        self.slots
            .get(id.slot())?
            .tcb
            .as_ref()
            .filter(|tcb| tcb.id == id)
    }

    pub fn get_mut(&mut self, id: ThreadId) -> Option<&mut ThreadControlBlock> {
        self.slots
            .get_mut(id.slot())?
            .tcb
            .as_mut()
            .filter(|tcb| tcb.id == id)
    }

    /// Like [`get`](Self::get) but reports a missing thread as an error.
    pub fn lookup(&self, id: ThreadId) -> Result<&ThreadControlBlock> {
        self.get(id).ok_or(KernelError::UnknownThread(id))
    }

    pub fn lookup_mut(&mut self, id: ThreadId) -> Result<&mut ThreadControlBlock> {
        self.get_mut(id).ok_or(KernelError::UnknownThread(id))
    }

    /// Number of live threads.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Iterate over live threads in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &ThreadControlBlock> {
        self.slots.iter().filter_map(|s| s.tcb.as_ref())
    }
}

impl Default for ThreadRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
