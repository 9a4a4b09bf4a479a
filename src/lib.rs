//! Queued spinlock for kernel and bare-metal contexts.
//!
//! A mutual-exclusion primitive that packs its whole state into one 32-bit
//! word and lets contended waiters spin on private, per-CPU queue nodes
//! instead of on the shared word:
//! - Fast path: a single CAS on an idle lock
//! - Pending path: the second contender spins on the word, no queue node
//! - Queue path: MCS list of waiter nodes, FIFO hand-off
//!
//! # Architectural Overview
//! ```text
//! +-----------------------------+
//! |  QSpinMutex<T> (lock_api)   |
//! +-----------------------------+
//! |  RawQSpinLock: fast/pending |
//! |  /queue state machine       |
//! +--------------+--------------+
//! |  Lock word   |  QNodePool   |
//! |  codec       |  (cpu x lvl) |
//! +--------------+--------------+
//! |  Platform: current context, |
//! |  relax hint                 |
//! +-----------------------------+
//! ```
//!
//! # Safety Guarantees
//! - No heap allocation and no blocking on any path
//! - At most one holder per lock; queued waiters are served in order
//! - Layout mistakes in `config` fail the build, not the lock

#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod error;
pub mod interrupt;
pub mod logging;
pub mod processor;
pub mod sync;

pub use error::QSpinError;
pub use interrupt::{NestingCounter, NestingGuard, NestingLevel};
pub use processor::{Platform, ProcessorId};
pub use sync::spin::qspinlock::{
    LockPath, LockWordState, QNodePool, QSpinGuard, QSpinMutex, QSpinMutexGuard, RawQSpinLock,
    WaiterId,
};
