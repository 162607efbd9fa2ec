//! # Kernel
//!
//! Top-level driver and public API for TickOS.
//!
//! The kernel owns a [`Scheduler`] and the tick counter, and runs thread
//! bodies cooperatively: every tick it asks the scheduler for a thread,
//! resumes that thread's body once, and applies the [`Step`] the body
//! returns.
//!
//! ## Tick Sequence
//!
//! ```text
//! Kernel::run_tick()
//!   ├─► Scheduler::next_thread_to_run(tick)   ← wake, donate, pick
//!   ├─► blocked on a lock?
//!   │     ├─ lock free   → acquire, spend the tick
//!   │     └─ still held  → spin, spend the tick
//!   ├─► otherwise resume body → Step
//!   │     ├─ Yield       → stay runnable
//!   │     ├─ Sleep(n)    → Scheduler::tick_sleep()
//!   │     ├─ Acquire(l)  → attempt, then acquire or block
//!   │     ├─ Release(l)  → Scheduler::on_lock_released()
//!   │     └─ Exit        → Scheduler::terminate(), refused while holding a lock
//!   ├─► Scheduler::reap()
//!   └─► tick += 1
//! ```
//!
//! Any contract breach reported by the scheduler stops the tick with an
//! error; the tick counter is not advanced in that case.

use log::{debug, trace};

use crate::config::FIRST_TICK;
use crate::error::{KernelError, Result};
use crate::scheduler::Scheduler;
use crate::sync::LockId;
use crate::thread::{Priority, Step, ThreadBody, ThreadContext, ThreadId, ThreadState, Tick};

// ---------------------------------------------------------------------------
// Kernel
// ---------------------------------------------------------------------------

/// A simulated single-core machine.
pub struct Kernel {
    scheduler: Scheduler,
    tick: Tick,
    current: Option<ThreadId>,
}

impl Kernel {
    pub const fn new() -> Self {
        Self {
            scheduler: Scheduler::new(),
            tick: FIRST_TICK,
            current: None,
        }
    }

    /// Create a new thread and make it runnable.
    ///
    /// # Example
    /// ```ignore
    /// fn worker(cx: &mut ThreadContext<'_>) -> Step {
    ///     match cx.resume_count() {
    ///         0 => Step::Acquire(LockId::new("disk")),
    ///         1 => Step::Release(LockId::new("disk")),
    ///         _ => Step::Exit,
    ///     }
    /// }
    /// let worker = kernel.create_thread("worker", worker, 0, 3)?;
    /// ```
    pub fn create_thread(
        &mut self,
        name: &'static str,
        body: ThreadBody,
        arg: usize,
        priority: Priority,
    ) -> Result<ThreadId> {
        self.scheduler.create_thread(name, body, arg, priority)
    }

    /// Announce a lock so threads can acquire it.
    pub fn create_lock(&mut self, lock: LockId) -> Result<()> {
        self.scheduler.on_lock_created(lock)
    }

    pub fn current_tick(&self) -> Tick {
        self.tick
    }

    /// Thread being dispatched, while a tick is in progress.
    pub fn current_thread(&self) -> Option<ThreadId> {
        self.current
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    /// Run one tick. Returns the thread that was dispatched, or `None`
    /// if the machine idled.
    pub fn run_tick(&mut self) -> Result<Option<ThreadId>> {
        let tick = self.tick;
        let chosen = self.scheduler.next_thread_to_run(tick);
        self.current = chosen;

        let dispatched = match chosen {
            Some(id) => self.dispatch(id, tick),
            None => {
                trace!("[kernel] tick {} idle", tick);
                Ok(())
            }
        };
        self.current = None;
        dispatched?;

        self.scheduler.reap();
        self.tick += 1;
        Ok(chosen)
    }

    /// Run exactly `ticks` ticks.
    pub fn run(&mut self, ticks: u64) -> Result<()> {
        for _ in 0..ticks {
            self.run_tick()?;
        }
        Ok(())
    }

    /// Run until no thread is ready or sleeping, or `limit` ticks elapsed.
    /// Returns the number of ticks run.
    pub fn run_until_idle(&mut self, limit: u64) -> Result<u64> {
        let mut ran = 0;
        while ran < limit && !self.is_idle() {
            self.run_tick()?;
            ran += 1;
        }
        Ok(ran)
    }

    /// Whether nothing is left to schedule, now or later.
    pub fn is_idle(&self) -> bool {
        self.scheduler.ready_len() == 0 && self.scheduler.sleeping_len() == 0
    }

    fn dispatch(&mut self, id: ThreadId, tick: Tick) -> Result<()> {
        let tcb = self.scheduler.thread(id).ok_or(KernelError::UnknownThread(id))?;
        if tcb.state == ThreadState::BlockedOnLock {
            if let Some(lock) = self.scheduler.attempt_of(id) {
                return self.retry_lock(id, lock);
            }
        }

        let body = tcb.body;
        let mut cx = ThreadContext::new(tcb, tick);
        let step = body(&mut cx);
        let request = cx.priority_request;

        self.scheduler.note_resumed(id)?;
        debug!("[kernel] tick {}: {} -> {:?}", tick, id, step);
        if let Some(priority) = request {
            self.scheduler.set_priority(id, priority)?;
        }

        match step {
            Step::Yield => Ok(()),
            Step::Sleep(ticks) => self.scheduler.tick_sleep(id, tick, ticks).map(|_| ()),
            Step::Acquire(lock) => self.acquire(id, lock),
            Step::Release(lock) => self.scheduler.on_lock_released(lock, id),
            Step::Exit => self.scheduler.terminate(id),
        }
    }

    fn acquire(&mut self, id: ThreadId, lock: LockId) -> Result<()> {
        self.scheduler.on_lock_attempted(lock, id)?;
        match self.scheduler.holder_of(lock) {
            Some(holder) if holder != id => {
                debug!("[kernel] {} blocked on `{}` held by {}", id, lock, holder);
                Ok(())
            }
            _ => self.scheduler.on_lock_acquired(lock, id),
        }
    }

    /// A blocked thread got the CPU: take the lock if it was freed,
    /// otherwise spend the tick spinning.
    fn retry_lock(&mut self, id: ThreadId, lock: LockId) -> Result<()> {
        match self.scheduler.holder_of(lock) {
            None => self.scheduler.on_lock_acquired(lock, id),
            Some(holder) => {
                trace!("[kernel] {} spins on `{}` held by {}", id, lock, holder);
                Ok(())
            }
        }
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn yielder(_: &mut ThreadContext<'_>) -> Step {
        Step::Yield
    }

    fn exits_after_two(cx: &mut ThreadContext<'_>) -> Step {
        if cx.resume_count() < 2 {
            Step::Yield
        } else {
            Step::Exit
        }
    }

    fn napper(cx: &mut ThreadContext<'_>) -> Step {
        match cx.resume_count() {
            0 => Step::Sleep(cx.arg() as i64),
            _ => Step::Exit,
        }
    }

    fn releases_unheld(_: &mut ThreadContext<'_>) -> Step {
        Step::Release(LockId::new("L"))
    }

    fn raises_itself(cx: &mut ThreadContext<'_>) -> Step {
        cx.set_my_priority(10);
        Step::Yield
    }

    #[test]
    fn test_idle_tick_advances_clock() {
        let mut kernel = Kernel::new();
        assert_eq!(kernel.run_tick().unwrap(), None);
        assert_eq!(kernel.current_tick(), 1);
        assert!(kernel.is_idle());
    }

    #[test]
    fn test_exit_terminates_and_reaps() {
        let mut kernel = Kernel::new();
        let t = kernel.create_thread("t", exits_after_two, 0, 1).unwrap();

        // Two yields, the exit, then the tick that evicts the terminated thread
        let ran = kernel.run_until_idle(10).unwrap();
        assert_eq!(ran, 4);
        assert!(kernel.scheduler().thread(t).is_none());
        assert_eq!(kernel.scheduler().thread_count(), 0);
    }

    #[test]
    fn test_sleep_step_parks_thread() {
        let mut kernel = Kernel::new();
        let t = kernel.create_thread("napper", napper, 3, 1).unwrap();

        assert_eq!(kernel.run_tick().unwrap(), Some(t));
        assert_eq!(kernel.scheduler().wake_tick_of(t), Some(3));
        assert_eq!(kernel.run_tick().unwrap(), None);
        assert_eq!(kernel.run_tick().unwrap(), None);
        assert_eq!(kernel.run_tick().unwrap(), Some(t));
    }

    #[test]
    fn test_contract_breach_stops_tick() {
        let mut kernel = Kernel::new();
        kernel.create_lock(LockId::new("L")).unwrap();
        let t = kernel.create_thread("bad", releases_unheld, 0, 1).unwrap();

        assert_eq!(
            kernel.run_tick().unwrap_err(),
            KernelError::LockNotHeld { lock: LockId::new("L"), thread: t }
        );
        assert_eq!(kernel.current_tick(), 0);
        assert_eq!(kernel.current_thread(), None);
    }

    #[test]
    fn test_set_my_priority_applied_after_step() {
        let mut kernel = Kernel::new();
        let other = kernel.create_thread("other", yielder, 0, 5).unwrap();
        let riser = kernel.create_thread("riser", raises_itself, 0, 1).unwrap();

        assert_eq!(kernel.run_tick().unwrap(), Some(other));
        kernel.scheduler_mut().set_priority(riser, 6).unwrap();
        assert_eq!(kernel.run_tick().unwrap(), Some(riser));
        assert_eq!(kernel.scheduler().thread(riser).unwrap().priority, 10);
        assert_eq!(kernel.scheduler().thread(riser).unwrap().resumes, 1);
    }
}
