//! Processor identity and the platform hooks the queued spinlock consumes.
//!
//! The lock never asks the hardware who is running: the surrounding runtime
//! supplies a [`Platform`] that knows the current (cpu, nesting level) pair,
//! owns the waiter-node arena and, optionally, a pause hint for spin loops.

use crate::{
    config::CPU_NUM,
    error::QSpinError,
    sync::spin::qspinlock::{QNodePool, WaiterId},
};

/// A unique identifier for a logical CPU (or any parallel worker standing in
/// for one). Stable for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessorId(usize);

impl ProcessorId {
    /// Validates `id` against [`CPU_NUM`].
    pub const fn new(id: usize) -> Result<Self, QSpinError> {
        if id < CPU_NUM {
            Ok(Self(id))
        } else {
            Err(QSpinError::ProcessorOutOfRange)
        }
    }

    #[inline(always)]
    pub const fn as_usize(self) -> usize {
        self.0
    }
}

impl From<ProcessorId> for usize {
    fn from(value: ProcessorId) -> Self {
        value.0
    }
}

impl TryFrom<usize> for ProcessorId {
    type Error = QSpinError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Hooks a runtime provides so the lock can find nodes and identities.
///
/// Every lock parameterized by the same platform shares one [`QNodePool`].
/// That is sound because a context waits on at most one lock per nesting
/// level at a time.
pub trait Platform: 'static {
    /// The waiter-node arena for this platform.
    fn node_pool() -> &'static QNodePool;

    /// Who is running right now. Only used by the [`lock_api`] integration;
    /// [`RawQSpinLock::acquire`](crate::RawQSpinLock::acquire) takes the
    /// identity explicitly.
    fn current_context() -> WaiterId;

    /// Called once per failed spin iteration.
    #[inline(always)]
    fn relax() {
        core::hint::spin_loop();
    }
}

/// Declares a [`Platform`] with its own static node pool.
///
/// ```ignore
/// fn current() -> WaiterId { /* read per-cpu state */ }
/// qspin_platform!(pub KernelCpu, current = current);
/// static LOCK: RawQSpinLock<KernelCpu> = RawQSpinLock::new();
/// ```
///
/// An optional `relax = path` replaces the default pause hint, e.g. with a
/// yield when contexts are threads that may outnumber cores.
#[macro_export]
macro_rules! qspin_platform {
    ($vis:vis $name:ident, current = $current:path) => {
        $crate::qspin_platform!($vis $name, current = $current, relax = ::core::hint::spin_loop);
    };
    ($vis:vis $name:ident, current = $current:path, relax = $relax:path) => {
        $vis struct $name;

        impl $crate::processor::Platform for $name {
            fn node_pool() -> &'static $crate::sync::spin::qspinlock::QNodePool {
                static POOL: $crate::sync::spin::qspinlock::QNodePool =
                    $crate::sync::spin::qspinlock::QNodePool::new();
                &POOL
            }

            fn current_context() -> $crate::sync::spin::qspinlock::WaiterId {
                $current()
            }

            #[inline(always)]
            fn relax() {
                $relax()
            }
        }
    };
}
