//! Queued spinlock.
//!
//! An MCS-derived lock that keeps all of its shared state in one 32-bit word:
//! a `locked` byte, a `pending` byte and the encoded tail of an MCS queue of
//! per-CPU waiter nodes. Acquisition tries, in order:
//!
//! 1. the fast path, one CAS from the empty word to `locked`;
//! 2. the pending path, where the second contender spins on the word itself
//!    instead of building a queue entry;
//! 3. the queue, where each waiter spins only on its own [`QNode`] and is
//!    handed the queue head by its predecessor.
//!
//! Release is a single atomic clear of the `locked` byte.
//!
//! # Safety
//! - Not reentrant: re-acquiring a held lock from the same (cpu, level)
//!   deadlocks. Debug builds detect it and panic instead.
//! - A context must never lock at a nesting level it does not own; nodes are
//!   indexed by (cpu, level) and sharing one corrupts the queue.
//! - The guard must be released on the context that acquired it.

mod node;
mod slowpath;
pub mod word;

use core::{
    fmt,
    marker::PhantomData,
    sync::atomic::{AtomicU32, Ordering},
};

use lock_api::{GuardNoSend, RawMutex};
use strum_macros::{Display, EnumCount, EnumIter};

pub use node::{QNode, QNodePool};
pub use word::{decode_tail, encode_tail, LockWordFlags, LockWordState, WaiterId};

use word::{LOCKED_VAL, PENDING_MASK, TAIL_MASK};

use crate::{
    interrupt::NestingLevel,
    processor::{Platform, ProcessorId},
};

/// A data-carrying mutex built on the queued spinlock. The acquiring context
/// comes from [`Platform::current_context`].
pub type QSpinMutex<T, P> = lock_api::Mutex<RawQSpinLock<P>, T>;

pub type QSpinMutexGuard<'a, T, P> = lock_api::MutexGuard<'a, RawQSpinLock<P>, T>;

/// Which path an acquisition went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumCount, EnumIter)]
#[repr(usize)]
#[strum(serialize_all = "snake_case")]
pub enum LockPath {
    /// Empty word, one CAS.
    Fast,
    /// Second contender, spun on the lock word.
    Pending,
    /// Waited in the MCS queue.
    Queued,
}

/// The lock word plus the platform it draws waiter nodes from.
pub struct RawQSpinLock<P: Platform> {
    val: AtomicU32,
    _platform: PhantomData<fn() -> P>,
}

impl<P: Platform> RawQSpinLock<P> {
    /// Unlocked, empty queue.
    pub const fn new() -> Self {
        Self {
            val: AtomicU32::new(0),
            _platform: PhantomData,
        }
    }

    /// Resets the word to the unlocked, empty state.
    ///
    /// Exclusive access makes this race-free by construction.
    pub fn init(&mut self) {
        *self.val.get_mut() = 0;
        log::debug!("qspinlock {:#x} initialized", self.addr());
    }

    /// One fast-path attempt; never spins, never queues.
    #[inline(always)]
    pub fn try_acquire(&self) -> bool {
        let val = self.val.load(Ordering::Relaxed);
        val == 0
            && self
                .val
                .compare_exchange(0, LOCKED_VAL, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
    }

    /// Like [`try_acquire`](Self::try_acquire) but hands back a guard.
    pub fn try_lock_guard(&self) -> Option<QSpinGuard<'_, P>> {
        self.try_acquire().then(|| QSpinGuard {
            lock: self,
            waiter: None,
            path: LockPath::Fast,
            _not_send: PhantomData,
        })
    }

    /// Spins until the lock is owned by (`cpu`, `level`).
    ///
    /// # Panics
    /// In debug builds, when (`cpu`, `level`) already holds this lock.
    pub fn acquire(&self, cpu: ProcessorId, level: NestingLevel) -> QSpinGuard<'_, P> {
        let waiter = WaiterId::new(cpu, level);
        let node = P::node_pool().node(waiter);
        node.check_dead_lock(self.addr());

        let path = self.lock_as(waiter);
        node.set_holder(self.addr());
        QSpinGuard {
            lock: self,
            waiter: Some(waiter),
            path,
            _not_send: PhantomData,
        }
    }

    /// Full state machine: fast path, then pending, then queue.
    #[inline]
    fn lock_as(&self, waiter: WaiterId) -> LockPath {
        let path = match self
            .val
            .compare_exchange(0, LOCKED_VAL, Ordering::Acquire, Ordering::Relaxed)
        {
            Ok(_) => LockPath::Fast,
            Err(val) => self.lock_slowpath(val, waiter),
        };
        P::node_pool().record(waiter.cpu(), path);
        path
    }

    /// Clears the locked byte.
    ///
    /// # Safety
    /// The caller must own the lock.
    #[inline(always)]
    unsafe fn unlock_word(&self) {
        self.val.fetch_sub(LOCKED_VAL, Ordering::Release);
    }

    /// Snapshot read; not for synchronization.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.val.load(Ordering::Relaxed) != 0
    }

    /// Somebody besides the owner is waiting (pending or queued).
    #[inline]
    pub fn is_contended(&self) -> bool {
        self.val.load(Ordering::Relaxed) & (PENDING_MASK | TAIL_MASK) != 0
    }

    /// Decoded snapshot of the word, for diagnostics and tests.
    pub fn snapshot(&self) -> LockWordState {
        LockWordState::from_bits(self.val.load(Ordering::Relaxed))
    }

    #[inline(always)]
    fn addr(&self) -> usize {
        self as *const Self as usize
    }
}

impl<P: Platform> Default for RawQSpinLock<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Platform> fmt::Debug for RawQSpinLock<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawQSpinLock")
            .field("state", &self.snapshot())
            .finish()
    }
}

unsafe impl<P: Platform> RawMutex for RawQSpinLock<P> {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: RawQSpinLock<P> = RawQSpinLock::new();

    // Queue nodes belong to the acquiring context.
    type GuardMarker = GuardNoSend;

    fn lock(&self) {
        let waiter = P::current_context();
        let node = P::node_pool().node(waiter);
        node.check_dead_lock(self.addr());
        self.lock_as(waiter);
        node.set_holder(self.addr());
    }

    fn try_lock(&self) -> bool {
        let acquired = self.try_acquire();
        if acquired {
            P::node_pool()
                .node(P::current_context())
                .set_holder(self.addr());
        }
        acquired
    }

    unsafe fn unlock(&self) {
        P::node_pool()
            .node(P::current_context())
            .clear_holder(self.addr());
        self.unlock_word();
    }

    fn is_locked(&self) -> bool {
        RawQSpinLock::is_locked(self)
    }
}

/// Proof of ownership of a [`RawQSpinLock`]. Releases it when dropped.
#[must_use = "if unused the lock is released immediately"]
pub struct QSpinGuard<'a, P: Platform> {
    lock: &'a RawQSpinLock<P>,
    /// `None` when taken through the fast path alone, without an identity.
    waiter: Option<WaiterId>,
    path: LockPath,
    // Release must run on the context that acquired.
    _not_send: PhantomData<*const ()>,
}

impl<P: Platform> QSpinGuard<'_, P> {
    pub fn path(&self) -> LockPath {
        self.path
    }

    pub fn waiter(&self) -> Option<WaiterId> {
        self.waiter
    }

    /// Releases the lock.
    pub fn release(self) {
        drop(self);
    }
}

impl<P: Platform> Drop for QSpinGuard<'_, P> {
    fn drop(&mut self) {
        if let Some(waiter) = self.waiter {
            P::node_pool().node(waiter).clear_holder(self.lock.addr());
        }
        // SAFETY: the guard exists only while the lock is owned.
        unsafe { self.lock.unlock_word() };
    }
}
