//! Errors raised while building lock identities.
//!
//! The lock algorithm itself never fails once its preconditions hold; the only
//! recoverable failures are out-of-range context ids handed in by the caller.

use strum_macros::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum QSpinError {
    /// A processor id at or beyond `config::CPU_NUM`.
    #[strum(serialize = "processor id exceeds the configured CPU_NUM")]
    ProcessorOutOfRange,
    /// A nesting level at or beyond `config::MAX_NESTING`, i.e. the caller would
    /// need more waiter-node slots than its CPU owns.
    #[strum(serialize = "nesting level exceeds the configured MAX_NESTING")]
    NestingOutOfRange,
}
