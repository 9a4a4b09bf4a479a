//! Waiter nodes and the per-CPU arena they live in.

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use strum::EnumCount;

use super::{word::WaiterId, LockPath};
use crate::{
    config::{CACHE_LINE_SIZE, CPU_NUM, MAX_NESTING},
    processor::{Platform, ProcessorId},
};

/// One MCS queue entry.
///
/// Written by its owner while queued, and by its predecessor exactly once
/// (the hand-off that sets `locked`).
#[repr(C, align(64))]
pub struct QNode {
    /// Encoded tail of the successor, 0 while there is none.
    next: AtomicU32,
    /// Set by the predecessor when this node becomes queue head.
    locked: AtomicBool,
    #[cfg(debug_assertions)]
    queued: AtomicBool,
    /// Address of the lock this (cpu, level) last acquired and still holds.
    #[cfg(debug_assertions)]
    holding: AtomicUsize,
}

const _: () = assert!(core::mem::align_of::<QNode>() == CACHE_LINE_SIZE);

impl QNode {
    const NO_HOLDER: usize = 0;

    pub const fn new() -> Self {
        Self {
            next: AtomicU32::new(0),
            locked: AtomicBool::new(false),
            #[cfg(debug_assertions)]
            queued: AtomicBool::new(false),
            #[cfg(debug_assertions)]
            holding: AtomicUsize::new(Self::NO_HOLDER),
        }
    }

    /// Readies the node for publication; must happen before the tail swap.
    #[inline(always)]
    pub(super) fn reset(&self) {
        #[cfg(debug_assertions)]
        if self.queued.swap(true, Ordering::Relaxed) {
            panic!("waiter node already queued: nesting slot used twice");
        }
        self.locked.store(false, Ordering::Relaxed);
        self.next.store(0, Ordering::Relaxed);
    }

    /// The node goes inert until its next acquisition.
    #[inline(always)]
    pub(super) fn retire(&self) {
        #[cfg(debug_assertions)]
        self.queued.store(false, Ordering::Relaxed);
    }

    #[inline(always)]
    pub(super) fn link(&self, successor_tail: u32) {
        self.next.store(successor_tail, Ordering::Release);
    }

    #[inline(always)]
    pub(super) fn next(&self) -> u32 {
        self.next.load(Ordering::Acquire)
    }

    /// Spins until a successor has linked itself behind this node.
    pub(super) fn wait_next<P: Platform>(&self) -> u32 {
        loop {
            let next = self.next();
            if next != 0 {
                return next;
            }
            P::relax();
        }
    }

    /// Spins until the predecessor hands the queue head over.
    pub(super) fn wait_handoff<P: Platform>(&self) {
        while !self.locked.load(Ordering::Acquire) {
            P::relax();
        }
    }

    #[inline(always)]
    pub(super) fn hand_off(&self) {
        self.locked.store(true, Ordering::Release);
    }

    /// Panics if this (cpu, level) already holds the lock at `lock_addr`.
    #[inline(always)]
    pub(super) fn check_dead_lock(&self, lock_addr: usize) {
        #[cfg(debug_assertions)]
        {
            let holder = self.holding.load(Ordering::Relaxed);
            if holder != Self::NO_HOLDER && holder == lock_addr {
                panic!("dead lock occur, lock {:#x} re-acquired by its holder", holder);
            }
        }
        #[cfg(not(debug_assertions))]
        let _ = lock_addr;
    }

    #[inline(always)]
    pub(super) fn set_holder(&self, lock_addr: usize) {
        #[cfg(debug_assertions)]
        self.holding.store(lock_addr, Ordering::Relaxed);
        #[cfg(not(debug_assertions))]
        let _ = lock_addr;
    }

    #[inline(always)]
    pub(super) fn clear_holder(&self, lock_addr: usize) {
        #[cfg(debug_assertions)]
        let _ = self.holding.compare_exchange(
            lock_addr,
            Self::NO_HOLDER,
            Ordering::Relaxed,
            Ordering::Relaxed,
        );
        #[cfg(not(debug_assertions))]
        let _ = lock_addr;
    }
}

impl Default for QNode {
    fn default() -> Self {
        Self::new()
    }
}

/// Acquisition counters of one CPU, one per [`LockPath`].
#[repr(C, align(64))]
struct LockEvents {
    counts: [AtomicUsize; LockPath::COUNT],
}

impl LockEvents {
    const fn new() -> Self {
        const ZERO: AtomicUsize = AtomicUsize::new(0);
        Self {
            counts: [ZERO; LockPath::COUNT],
        }
    }
}

/// Fixed arena of `CPU_NUM x MAX_NESTING` waiter nodes.
///
/// Indexed by [`WaiterId`]; no allocation ever happens on the lock path.
pub struct QNodePool {
    nodes: [[QNode; MAX_NESTING]; CPU_NUM],
    events: [LockEvents; CPU_NUM],
}

impl QNodePool {
    pub const fn new() -> Self {
        const NODE: QNode = QNode::new();
        const CPU_NODES: [QNode; MAX_NESTING] = [NODE; MAX_NESTING];
        const EVENTS: LockEvents = LockEvents::new();
        Self {
            nodes: [CPU_NODES; CPU_NUM],
            events: [EVENTS; CPU_NUM],
        }
    }

    #[inline(always)]
    pub(super) fn node(&self, id: WaiterId) -> &QNode {
        &self.nodes[id.cpu().as_usize()][id.level().as_usize()]
    }

    /// Counts one acquisition; only `cpu` ever writes its own counters.
    #[inline(always)]
    pub(super) fn record(&self, cpu: ProcessorId, path: LockPath) {
        self.events[cpu.as_usize()].counts[path as usize].fetch_add(1, Ordering::Relaxed);
    }

    /// Acquisitions through `path` made by `cpu`.
    pub fn cpu_lock_events(&self, cpu: ProcessorId, path: LockPath) -> usize {
        self.events[cpu.as_usize()].counts[path as usize].load(Ordering::Relaxed)
    }

    /// Acquisitions through `path` across all CPUs.
    pub fn lock_events(&self, path: LockPath) -> usize {
        self.events
            .iter()
            .map(|cpu| cpu.counts[path as usize].load(Ordering::Relaxed))
            .sum()
    }
}

impl Default for QNodePool {
    fn default() -> Self {
        Self::new()
    }
}
