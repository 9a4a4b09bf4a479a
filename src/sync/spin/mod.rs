//! # Spin Locks Module
//!
//! Low-level mutual exclusion for contexts that may never sleep.
//!
//! ## Implementations
//! - [x] [`RawQSpinLock`](qspinlock::RawQSpinLock) - Queued (MCS) spinlock
//!     - [x] Fast path, pending arbiter, MCS queue with explicit hand-off
//!     - [x] Per-(cpu, nesting level) waiter nodes, no allocation
//!     - [x] `lock_api` integration ([`QSpinMutex`](qspinlock::QSpinMutex))
//!     - [ ] Paravirtualized lock stealing for guests
//!
//! ## Usage Guidelines
//! ```ignore
//! qspin_platform!(KernelCpu, current = current_waiter);
//! static LOCK: RawQSpinLock<KernelCpu> = RawQSpinLock::new();
//!
//! let guard = LOCK.acquire(cpu, NestingLevel::TASK);
//! // critical section
//! guard.release();
//! ```
//!
//! ## Safety
//! - Spinlocks MUST NOT be held across scheduling boundaries
//! - An interrupt handler that may take a lock must lock at its own
//!   nesting level, never at the level of the code it interrupted

pub mod qspinlock;

#[cfg(test)]
mod test;
