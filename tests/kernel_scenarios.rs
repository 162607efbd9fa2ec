use tickos::config::DEFAULT_PRIORITY;
use tickos::sleep_queue::SleepQueue;
use tickos::thread::ThreadRegistry;
use tickos::{Kernel, KernelError, LockId, Scheduler, Step, ThreadContext, ThreadId, ThreadState};

const L: LockId = LockId::new("L");

fn yielder(_: &mut ThreadContext<'_>) -> Step {
    Step::Yield
}

/// Low-priority holder: take the lock, work two ticks, release, exit.
fn low_body(cx: &mut ThreadContext<'_>) -> Step {
    match cx.resume_count() {
        0 => Step::Acquire(L),
        1 | 2 => Step::Yield,
        3 => Step::Release(L),
        _ => Step::Exit,
    }
}

/// Medium-priority CPU hog that shows up after the lock is taken.
fn mid_body(cx: &mut ThreadContext<'_>) -> Step {
    match cx.resume_count() {
        0 => Step::Sleep(2),
        1..=4 => Step::Yield,
        _ => Step::Exit,
    }
}

/// High-priority thread that needs the lock.
fn high_body(cx: &mut ThreadContext<'_>) -> Step {
    match cx.resume_count() {
        0 => Step::Sleep(3),
        1 => Step::Acquire(L),
        2 => Step::Release(L),
        _ => Step::Exit,
    }
}

/// Takes the lock and exits without releasing it.
fn leaky_body(cx: &mut ThreadContext<'_>) -> Step {
    match cx.resume_count() {
        0 => Step::Acquire(L),
        _ => Step::Exit,
    }
}

/// Sleeps past the leaky holder's exit, then wants the lock.
fn late_waiter_body(cx: &mut ThreadContext<'_>) -> Step {
    match cx.resume_count() {
        0 => Step::Sleep(3),
        1 => Step::Acquire(L),
        2 => Step::Release(L),
        _ => Step::Exit,
    }
}

fn run_and_record(kernel: &mut Kernel, ticks: usize) -> Vec<Option<ThreadId>> {
    (0..ticks).map(|_| kernel.run_tick().unwrap()).collect()
}

#[test]
fn test_priority_inversion_resolved_by_donation() {
    let mut kernel = Kernel::new();
    kernel.create_lock(L).unwrap();
    let low = kernel.create_thread("low", low_body, 0, 1).unwrap();
    let mid = kernel.create_thread("mid", mid_body, 0, 3).unwrap();
    let high = kernel.create_thread("high", high_body, 0, 5).unwrap();

    let trace = run_and_record(&mut kernel, 4);
    // high and mid go to sleep, low takes the lock, high wakes and blocks
    assert_eq!(trace, [Some(high), Some(mid), Some(low), Some(high)]);
    assert_eq!(kernel.scheduler().holder_of(L), Some(low));
    assert_eq!(kernel.scheduler().thread(high).unwrap().state, ThreadState::BlockedOnLock);
    assert_eq!(kernel.scheduler().thread(low).unwrap().priority, 5);

    // The boosted holder runs ahead of the medium hog until it releases
    let trace = run_and_record(&mut kernel, 3);
    assert_eq!(trace, [Some(low), Some(low), Some(low)]);
    assert_eq!(kernel.scheduler().thread(low).unwrap().priority, 1);
    assert_eq!(kernel.scheduler().holder_of(L), None);

    // high takes the lock, releases it, exits; only then does mid run
    let trace = run_and_record(&mut kernel, 4);
    assert_eq!(trace, [Some(high), Some(high), Some(high), Some(mid)]);
    assert!(kernel.scheduler().thread(high).is_none());

    kernel.run_until_idle(50).unwrap();
    assert!(kernel.is_idle());
    assert_eq!(kernel.scheduler().thread_count(), 0);
}

#[test]
fn test_exit_while_holding_lock_stops_kernel() {
    let mut kernel = Kernel::new();
    kernel.create_lock(L).unwrap();
    let holder = kernel.create_thread("holder", leaky_body, 0, 1).unwrap();
    let waiter = kernel.create_thread("waiter", late_waiter_body, 0, 5).unwrap();

    // waiter sleeps at tick 0, holder takes the lock at tick 1, exits at tick 2
    assert_eq!(
        kernel.run_until_idle(100).unwrap_err(),
        KernelError::ExitWhileHolding { thread: holder, lock: L }
    );
    assert_eq!(kernel.current_tick(), 2);
    assert_eq!(kernel.scheduler().holder_of(L), Some(holder));
    assert_eq!(kernel.scheduler().thread(holder).unwrap().state, ThreadState::Runnable);
    assert_eq!(kernel.scheduler().thread(waiter).unwrap().state, ThreadState::Sleeping);
}

#[test]
fn test_round_robin_through_kernel() {
    let mut kernel = Kernel::new();
    let a = kernel.create_thread("A", yielder, 0, DEFAULT_PRIORITY).unwrap();
    let b = kernel.create_thread("B", yielder, 0, DEFAULT_PRIORITY).unwrap();
    let c = kernel.create_thread("C", yielder, 0, DEFAULT_PRIORITY).unwrap();

    let trace = run_and_record(&mut kernel, 6);
    assert_eq!(
        trace,
        [Some(a), Some(b), Some(c), Some(a), Some(b), Some(c)]
    );
}

#[test]
fn test_holder_waiter_scenario() {
    let mut sched = Scheduler::new();
    let h = sched.create_thread("H", yielder, 0, 1).unwrap();
    let w = sched.create_thread("W", yielder, 0, 5).unwrap();
    sched.on_lock_created(L).unwrap();
    sched.on_lock_acquired(L, h).unwrap();

    sched.on_lock_attempted(L, w).unwrap();
    assert_eq!(sched.thread(h).unwrap().priority, 5);

    sched.on_lock_released(L, h).unwrap();
    assert_eq!(sched.thread(h).unwrap().priority, 1);
    assert_eq!(sched.holder_of(L), None);
}

#[test]
fn test_wake_ordering_ties() {
    let mut registry = ThreadRegistry::new();
    let mut sleeping = SleepQueue::new();
    let first_five = registry.create("five-low", yielder, 0, 1).unwrap();
    let second_five = registry.create("five-high", yielder, 0, 4).unwrap();
    let three = registry.create("three", yielder, 0, 2).unwrap();

    sleeping.insert(first_five, 5, &registry).unwrap();
    sleeping.insert(second_five, 5, &registry).unwrap();
    sleeping.insert(three, 3, &registry).unwrap();

    let woken: Vec<_> = sleeping.release_due(5).collect();
    assert_eq!(woken, [three, second_five, first_five]);
}

#[test]
fn test_zero_tick_sleep_due_same_tick() {
    let mut sched = Scheduler::new();
    let t = sched.create_thread("sleeper", yielder, 0, 1).unwrap();

    assert_eq!(sched.tick_sleep(t, 10, 0).unwrap(), 10);
    assert_eq!(sched.next_thread_to_run(10), Some(t));
}

#[test]
fn test_simultaneous_wakeups_keep_priority_order() {
    let mut sched = Scheduler::new();
    let low = sched.create_thread("low", yielder, 0, 1).unwrap();
    let high = sched.create_thread("high", yielder, 0, 7).unwrap();
    sched.tick_sleep(low, 0, 4).unwrap();
    sched.tick_sleep(high, 0, 4).unwrap();

    assert_eq!(sched.next_thread_to_run(3), None);
    assert_eq!(sched.next_thread_to_run(4), Some(high));
    assert_eq!(sched.ready_threads().collect::<Vec<_>>(), [high, low]);
}
