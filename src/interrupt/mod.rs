//! Nesting levels of execution contexts on one logical CPU.
//!
//! A CPU running task code can be interrupted by deferred work, which can be
//! interrupted by a hard interrupt, which can be interrupted by an NMI. Each of
//! those contexts may spin on a queued spinlock while the interrupted one is
//! still queued, so each needs its own waiter node.

use core::sync::atomic::{AtomicUsize, Ordering};

use crate::{config::MAX_NESTING, error::QSpinError};

/// Which waiter-node slot of its CPU a context uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NestingLevel(usize);

impl NestingLevel {
    /// Normal task context.
    pub const TASK: Self = Self(0);
    /// Deferred work (softirq / bottom half).
    pub const SOFTIRQ: Self = Self(1);
    /// Hardware interrupt handler.
    pub const HARDIRQ: Self = Self(2);
    /// Non-maskable interrupt.
    pub const NMI: Self = Self(3);

    pub const fn new(level: usize) -> Result<Self, QSpinError> {
        if level < MAX_NESTING {
            Ok(Self(level))
        } else {
            Err(QSpinError::NestingOutOfRange)
        }
    }

    #[inline(always)]
    pub const fn as_usize(self) -> usize {
        self.0
    }
}

impl From<NestingLevel> for usize {
    fn from(value: NestingLevel) -> Self {
        value.0
    }
}

impl TryFrom<usize> for NestingLevel {
    type Error = QSpinError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Tracks how deeply the contexts of one CPU are currently nested.
///
/// The runtime keeps one per CPU, enters it on interrupt entry and lets the
/// returned guard restore the previous level on exit.
pub struct NestingCounter {
    depth: AtomicUsize,
}

impl NestingCounter {
    pub const fn new() -> Self {
        Self {
            depth: AtomicUsize::new(0),
        }
    }

    /// The level the code running right now should lock at.
    pub fn level(&self) -> NestingLevel {
        NestingLevel(self.depth.load(Ordering::Acquire))
    }

    /// Enters one level deeper.
    ///
    /// Fails, leaving the depth unchanged, when the new level would have no
    /// waiter node to spin on.
    pub fn enter(&self) -> Result<NestingGuard<'_>, QSpinError> {
        match self
            .depth
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |depth| {
                (depth + 1 < MAX_NESTING).then_some(depth + 1)
            }) {
            Ok(_) => Ok(NestingGuard { counter: self }),
            Err(depth) => {
                log::warn!("nesting depth {} exceeds MAX_NESTING", depth + 1);
                Err(QSpinError::NestingOutOfRange)
            }
        }
    }
}

impl Default for NestingCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard for one nested context.
///
/// When dropped, the counter falls back to the level it had before
/// [`NestingCounter::enter`].
pub struct NestingGuard<'a> {
    counter: &'a NestingCounter,
}

impl NestingGuard<'_> {
    pub fn level(&self) -> NestingLevel {
        self.counter.level()
    }
}

impl Drop for NestingGuard<'_> {
    fn drop(&mut self) {
        self.counter.depth.fetch_sub(1, Ordering::Release);
    }
}
