use std::{cell::Cell, thread, vec::Vec};

use lock_api::RawMutex;
use strum::IntoEnumIterator;

use super::qspinlock::{LockPath, QSpinMutex, RawQSpinLock, WaiterId};
use crate::{interrupt::NestingLevel, processor::ProcessorId, qspin_platform};

std::thread_local! {
    static CURRENT: Cell<Option<WaiterId>> = Cell::new(None);
}

fn current() -> WaiterId {
    CURRENT
        .with(|c| c.get())
        .expect("thread has no cpu bound")
}

fn cpu(id: usize) -> ProcessorId {
    ProcessorId::new(id).unwrap()
}

fn bind(id: usize, level: NestingLevel) -> WaiterId {
    let waiter = WaiterId::new(cpu(id), level);
    CURRENT.with(|c| c.set(Some(waiter)));
    waiter
}

fn wait_until(mut cond: impl FnMut() -> bool) {
    while !cond() {
        thread::yield_now();
    }
}

#[test]
fn init_on_fresh_word_is_noop() {
    qspin_platform!(InitCpu, current = current);
    let mut lock = RawQSpinLock::<InitCpu>::new();
    assert!(!lock.is_locked());
    lock.init();
    assert!(!lock.is_locked());
    assert!(lock.snapshot().is_empty());
}

#[test]
fn init_resets_a_dirty_word() {
    qspin_platform!(ResetCpu, current = current);
    let mut lock = RawQSpinLock::<ResetCpu>::new();
    assert!(lock.try_acquire());
    lock.init();
    assert!(!lock.is_locked());
    assert!(lock.try_acquire());
}

#[test]
fn try_acquire_fails_while_held() {
    qspin_platform!(TryCpu, current = current);
    let lock = RawQSpinLock::<TryCpu>::new();

    let a = lock.acquire(cpu(0), NestingLevel::TASK);
    assert_eq!(a.path(), LockPath::Fast);
    assert!(lock.is_locked());

    // B only ever uses the fast path.
    assert!(!lock.try_acquire());
    a.release();
    assert!(lock.try_acquire());
    assert!(lock.is_locked());

    bind(1, NestingLevel::TASK);
    unsafe { lock.unlock() };
    assert!(!lock.is_locked());
}

#[test]
fn try_lock_guard_releases_on_drop() {
    qspin_platform!(TryGuardCpu, current = current);
    let lock = RawQSpinLock::<TryGuardCpu>::new();
    {
        let guard = lock.try_lock_guard().expect("idle lock");
        assert_eq!(guard.path(), LockPath::Fast);
        assert_eq!(guard.waiter(), None);
        assert!(lock.try_lock_guard().is_none());
    }
    assert!(!lock.is_locked());
}

#[test]
fn second_contender_takes_pending_path() {
    qspin_platform!(PendingCpu, current = current);
    let lock = RawQSpinLock::<PendingCpu>::new();

    let held = lock.acquire(cpu(0), NestingLevel::TASK);
    thread::scope(|s| {
        let arbiter = s.spawn(|| lock.acquire(cpu(1), NestingLevel::TASK).path());

        wait_until(|| lock.snapshot().is_pending());
        let state = lock.snapshot();
        assert!(state.is_locked());
        assert_eq!(state.tail, None);
        assert!(lock.is_contended());

        held.release();
        assert_eq!(arbiter.join().unwrap(), LockPath::Pending);
    });
    assert!(lock.snapshot().is_empty());
}

#[test]
fn third_contender_queues_and_publishes_tail() {
    qspin_platform!(QueueCpu, current = current);
    let lock = RawQSpinLock::<QueueCpu>::new();
    let queued = WaiterId::new(cpu(2), NestingLevel::TASK);

    let held = lock.acquire(cpu(0), NestingLevel::TASK);
    thread::scope(|s| {
        let arbiter = s.spawn(|| lock.acquire(cpu(1), NestingLevel::TASK).path());
        wait_until(|| lock.snapshot().is_pending());

        let waiter = s.spawn(|| lock.acquire(cpu(2), NestingLevel::TASK).path());
        wait_until(|| lock.snapshot().tail == Some(queued));

        held.release();
        assert_eq!(arbiter.join().unwrap(), LockPath::Pending);
        assert_eq!(waiter.join().unwrap(), LockPath::Queued);
    });
    assert!(lock.snapshot().is_empty());
}

#[test]
fn four_contexts_split_across_paths() {
    qspin_platform!(FourCpu, current = current);
    let lock = RawQSpinLock::<FourCpu>::new();

    let held = lock.acquire(cpu(0), NestingLevel::TASK);
    let mut paths = Vec::from([held.path()]);
    thread::scope(|s| {
        let b = s.spawn(|| lock.acquire(cpu(1), NestingLevel::TASK).path());
        wait_until(|| lock.snapshot().is_pending());

        let c = s.spawn(|| lock.acquire(cpu(2), NestingLevel::TASK).path());
        let c_id = WaiterId::new(cpu(2), NestingLevel::TASK);
        wait_until(|| lock.snapshot().tail == Some(c_id));

        let d = s.spawn(|| lock.acquire(cpu(3), NestingLevel::TASK).path());
        let d_id = WaiterId::new(cpu(3), NestingLevel::TASK);
        wait_until(|| lock.snapshot().tail == Some(d_id));

        held.release();
        for h in [b, c, d] {
            paths.push(h.join().unwrap());
        }
    });

    assert_eq!(
        paths,
        [LockPath::Fast, LockPath::Pending, LockPath::Queued, LockPath::Queued]
    );
    assert!(!lock.is_locked());
    assert!(lock.snapshot().is_empty());

    let pool = <FourCpu as crate::processor::Platform>::node_pool();
    assert_eq!(pool.lock_events(LockPath::Fast), 1);
    assert_eq!(pool.lock_events(LockPath::Pending), 1);
    assert_eq!(pool.lock_events(LockPath::Queued), 2);
    assert_eq!(pool.cpu_lock_events(cpu(3), LockPath::Queued), 1);
}

#[test]
fn interrupted_cpu_queues_on_its_own_level() {
    qspin_platform!(NestedCpu, current = current);
    let lock = &RawQSpinLock::<NestedCpu>::new();

    let held = lock.acquire(cpu(0), NestingLevel::TASK);
    thread::scope(|s| {
        let arbiter = s.spawn(|| lock.acquire(cpu(1), NestingLevel::TASK).path());
        wait_until(|| lock.snapshot().is_pending());

        // cpu 2 task code queues, then an interrupt on cpu 2 queues too.
        let task_id = WaiterId::new(cpu(2), NestingLevel::TASK);
        let task = s.spawn(move || lock.acquire(task_id.cpu(), task_id.level()).path());
        wait_until(|| lock.snapshot().tail == Some(task_id));

        let irq_id = WaiterId::new(cpu(2), NestingLevel::HARDIRQ);
        let irq = s.spawn(move || lock.acquire(irq_id.cpu(), irq_id.level()).path());
        wait_until(|| lock.snapshot().tail == Some(irq_id));

        held.release();
        assert_eq!(arbiter.join().unwrap(), LockPath::Pending);
        assert_eq!(task.join().unwrap(), LockPath::Queued);
        assert_eq!(irq.join().unwrap(), LockPath::Queued);
    });
    assert!(lock.snapshot().is_empty());
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "dead lock")]
fn reacquire_at_same_level_is_caught() {
    qspin_platform!(DeadCpu, current = current);
    let lock = RawQSpinLock::<DeadCpu>::new();
    let _held = lock.acquire(cpu(0), NestingLevel::TASK);
    let _again = lock.acquire(cpu(0), NestingLevel::TASK);
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "used twice")]
fn queued_slot_reused_is_caught() {
    qspin_platform!(TwiceCpu, current = current);
    let lock = RawQSpinLock::<TwiceCpu>::new();
    let parked = WaiterId::new(cpu(2), NestingLevel::TASK);

    thread::scope(|s| {
        let held = lock.acquire(cpu(0), NestingLevel::TASK);
        s.spawn(|| lock.acquire(cpu(1), NestingLevel::TASK).path());
        wait_until(|| lock.snapshot().is_pending());
        s.spawn(|| lock.acquire(parked.cpu(), parked.level()).path());
        wait_until(|| lock.snapshot().tail == Some(parked));

        // Same (cpu, level) while its node is still in the queue.
        let _again = lock.acquire(parked.cpu(), parked.level());
        drop(held);
    });
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "dead lock")]
fn mutex_relock_after_try_lock_is_caught() {
    qspin_platform!(TryRelockCpu, current = current);
    let mutex: QSpinMutex<u32, TryRelockCpu> = QSpinMutex::new(0);
    bind(6, NestingLevel::TASK);

    let _held = mutex.try_lock().expect("idle mutex");
    let _again = mutex.lock();
}

#[test]
fn release_clears_holder() {
    qspin_platform!(HolderCpu, current = current);
    let lock = RawQSpinLock::<HolderCpu>::new();
    for _ in 0..3 {
        let guard = lock.acquire(cpu(5), NestingLevel::SOFTIRQ);
        assert_eq!(guard.waiter(), Some(WaiterId::new(cpu(5), NestingLevel::SOFTIRQ)));
        guard.release();
    }
    assert!(!lock.is_locked());
}

#[test]
fn mutex_uses_current_context() {
    qspin_platform!(MutexCpu, current = current);
    let mutex: QSpinMutex<u32, MutexCpu> = QSpinMutex::new(0);
    bind(4, NestingLevel::TASK);

    *mutex.lock() += 1;
    {
        let guard = mutex.lock();
        assert_eq!(*guard, 1);
        assert!(mutex.is_locked());
        assert!(mutex.try_lock().is_none());
    }
    assert!(mutex.try_lock().is_some());

    let pool = <MutexCpu as crate::processor::Platform>::node_pool();
    assert_eq!(pool.cpu_lock_events(cpu(4), LockPath::Fast), 2);
}

#[test]
fn lock_paths_have_stable_names() {
    let names: Vec<_> = LockPath::iter().map(|p| p.to_string()).collect();
    assert_eq!(names, ["fast", "pending", "queued"]);
}
