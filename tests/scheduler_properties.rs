//! Property-based tests for the scheduler's ordering and donation invariants.
//!
//! - Dispatch never returns a terminated thread
//! - Ready queue stays sorted by (priority desc, original priority asc)
//! - Round-robin among fully tied threads
//! - Donation only raises the holder, and release restores it exactly
//! - Releasing an unheld lock leaves the releaser's priority alone

use proptest::prelude::*;
use tickos::config::MAX_THREADS;
use tickos::ready_queue::ReadyQueue;
use tickos::thread::ThreadRegistry;
use tickos::{KernelError, LockId, Scheduler, Step, ThreadContext};

const L: LockId = LockId::new("L");

fn idle(_: &mut ThreadContext<'_>) -> Step {
    Step::Yield
}

proptest! {
    #[test]
    fn never_dispatches_terminated(
        priorities in prop::collection::vec(-3i32..6, 1..12),
        kills in prop::collection::vec(any::<bool>(), 12),
        sleeps in prop::collection::vec(0i64..4, 12),
    ) {
        let mut sched = Scheduler::new();
        let ids: Vec<_> = priorities
            .iter()
            .map(|p| sched.create_thread("t", idle, 0, *p).unwrap())
            .collect();

        for (i, id) in ids.iter().enumerate() {
            if sleeps[i] > 0 {
                sched.tick_sleep(*id, 0, sleeps[i]).unwrap();
            }
            if kills[i] {
                sched.terminate(*id).unwrap();
            }
        }

        for tick in 0..20 {
            if let Some(id) = sched.next_thread_to_run(tick) {
                prop_assert!(!sched.thread(id).unwrap().is_terminated());
            }
        }
    }

    #[test]
    fn ready_queue_stays_ordered(
        threads in prop::collection::vec((-5i32..5, 0i32..4), 1..MAX_THREADS),
    ) {
        let mut registry = ThreadRegistry::new();
        let mut queue = ReadyQueue::new();
        for (original, boost) in &threads {
            let id = registry.create("t", idle, 0, *original).unwrap();
            registry.get_mut(id).unwrap().priority = original + boost;
            queue.insert(id, &registry).unwrap();
        }

        let order: Vec<_> = queue.iter().map(|id| *registry.get(id).unwrap()).collect();
        for pair in order.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            prop_assert!(
                a.priority > b.priority
                    || (a.priority == b.priority && a.original_priority <= b.original_priority)
            );
        }
    }

    #[test]
    fn round_robin_cycles_through_equals(count in 1usize..8, priority in -4i32..4) {
        let mut sched = Scheduler::new();
        let ids: Vec<_> = (0..count)
            .map(|_| sched.create_thread("t", idle, 0, priority).unwrap())
            .collect();

        for tick in 0..(2 * count) {
            let chosen = sched.next_thread_to_run(tick as u64);
            prop_assert_eq!(chosen, Some(ids[tick % count]));
        }
    }

    #[test]
    fn donation_is_monotonic_and_release_restores(
        holder_priority in -5i32..5,
        donors in prop::collection::vec(-5i32..15, 0..8),
    ) {
        let mut sched = Scheduler::new();
        let holder = sched.create_thread("holder", idle, 0, holder_priority).unwrap();
        sched.on_lock_created(L).unwrap();
        sched.on_lock_acquired(L, holder).unwrap();

        for donor_priority in donors {
            let donor = sched.create_thread("donor", idle, 0, donor_priority).unwrap();
            let before = sched.thread(holder).unwrap().priority;

            let donation = sched.on_lock_attempted(L, donor).unwrap();
            let after = sched.thread(holder).unwrap().priority;

            prop_assert!(after >= before);
            prop_assert_eq!(after, before.max(donor_priority));
            if donation.is_some() {
                prop_assert!(after >= donor_priority);
            }
        }

        sched.on_lock_released(L, holder).unwrap();
        prop_assert_eq!(sched.thread(holder).unwrap().priority, holder_priority);
        prop_assert_eq!(sched.holder_of(L), None);
    }

    #[test]
    fn releasing_unheld_lock_keeps_priority(priority in -5i32..10, held_by_other in any::<bool>()) {
        let mut sched = Scheduler::new();
        let t = sched.create_thread("t", idle, 0, priority).unwrap();
        sched.on_lock_created(L).unwrap();
        if held_by_other {
            let other = sched.create_thread("other", idle, 0, 0).unwrap();
            sched.on_lock_acquired(L, other).unwrap();
        }

        let err = sched.on_lock_released(L, t).unwrap_err();
        prop_assert_eq!(err, KernelError::LockNotHeld { lock: L, thread: t });
        prop_assert_eq!(sched.thread(t).unwrap().priority, priority);
    }
}
