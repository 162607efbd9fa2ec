//! # TickOS — Tick-Driven Priority Scheduler
//!
//! A cooperative, single-core thread scheduler simulation with
//! fixed-priority preemptive selection, round-robin among equal
//! priorities, timed sleep, and priority donation across a simple
//! mutual-exclusion lock.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                 Thread Bodies (Step fns)                │
//! ├────────────────────────────────────────────────────────┤
//! │                 Kernel Harness (kernel.rs)              │
//! │      create_thread() · create_lock() · run_tick()      │
//! ├────────────────────────────────────────────────────────┤
//! │                 Scheduler (scheduler.rs)                │
//! │   next_thread_to_run() · tick_sleep() · lock hooks     │
//! ├──────────────┬─────────────────┬───────────────────────┤
//! │ Ready Queue  │  Sleep Queue    │  Lock Table           │
//! │ ready_queue  │  sleep_queue    │  sync.rs              │
//! │ ─ priority   │  ─ wake tick    │  ─ holder / attempt   │
//! │ ─ round-robin│  ─ release_due  │  ─ donation           │
//! ├──────────────┴─────────────────┴───────────────────────┤
//! │        Thread Registry · TCB (thread.rs)                │
//! ├────────────────────────────────────────────────────────┤
//! │        Fixed-Capacity List (list.rs)                    │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Priority Donation
//!
//! When a thread waits on a lock held by a lower-priority thread, the
//! holder's priority is raised to the waiter's:
//!
//! 1. On the attempt itself (`on_lock_attempted`).
//! 2. Again at dispatch time, whenever a blocked waiter reaches the head
//!    of the ready queue; the holder is then dispatched in its place.
//!
//! Releasing a lock resets the releaser to its original priority in one
//! step. Among equal current priorities the ready queue prefers the lower
//! *original* priority, so a boosted holder runs before its new peers.
//!
//! ## Memory Model
//!
//! - **No heap**: every table is a fixed-size inline array
//! - **Capacities**: `MAX_THREADS`, `MAX_LOCKS` in [`config`]
//! - **Handles, not references**: queues and the lock table store
//!   [`ThreadId`]s; the [`ThreadRegistry`](thread::ThreadRegistry) owns
//!   every record
//! - **No globals**: all state lives in a [`Scheduler`] value

#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod error;
pub mod kernel;
pub mod list;
pub mod ready_queue;
pub mod scheduler;
pub mod sleep_queue;
pub mod sync;
pub mod thread;

pub use error::{KernelError, Result};
pub use kernel::Kernel;
pub use scheduler::Scheduler;
pub use sync::{Donation, LockId};
pub use thread::{Priority, Step, ThreadBody, ThreadContext, ThreadId, ThreadState, Tick};
