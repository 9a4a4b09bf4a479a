#![allow(dead_code)]

use std::{cell::Cell, thread};

use qspinlock::{NestingCounter, NestingLevel, ProcessorId, WaiterId};

thread_local! {
    static CPU: Cell<Option<ProcessorId>> = Cell::new(None);
    static NESTING: NestingCounter = NestingCounter::new();
}

/// Pins the calling thread to logical cpu `id` for the lock's purposes.
pub fn bind_cpu(id: usize) -> ProcessorId {
    let cpu = ProcessorId::new(id).expect("cpu id within CPU_NUM");
    CPU.with(|c| c.set(Some(cpu)));
    cpu
}

/// Context of the calling thread: its bound cpu at its current nesting depth.
pub fn current() -> WaiterId {
    let cpu = CPU.with(|c| c.get()).expect("thread has no cpu bound");
    let level = NESTING.with(|n| n.level());
    WaiterId::new(cpu, level)
}

/// Runs `f` as if an interrupt had arrived on the calling thread's cpu.
pub fn in_interrupt<R>(f: impl FnOnce() -> R) -> R {
    NESTING.with(|n| {
        let _irq = n.enter().expect("nesting budget");
        f()
    })
}

pub fn level() -> NestingLevel {
    NESTING.with(|n| n.level())
}

pub fn cpu(id: usize) -> ProcessorId {
    ProcessorId::new(id).unwrap()
}

pub fn relax() {
    thread::yield_now();
}

pub fn wait_until(mut cond: impl FnMut() -> bool) {
    while !cond() {
        thread::yield_now();
    }
}

/// Worker count for stress runs: enough to contend, few enough to finish on
/// small machines.
pub fn workers() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
        .clamp(3, 8)
}

/// Burns a little time so critical sections overlap in varied ways.
pub fn jitter(max_spins: u32) {
    use rand::Rng;
    let spins = rand::thread_rng().gen_range(0..=max_spins);
    for _ in 0..spins {
        std::hint::spin_loop();
    }
}
