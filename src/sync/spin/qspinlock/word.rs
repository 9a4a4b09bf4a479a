//! Lock word layout.
//!
//! ```text
//!  31                      16+I 16+I-1      16 15        8 7         0
//! +---------------------------+--------------+-----------+-----------+
//! |      tail cpu (cpu + 1)   |  tail index  |  pending  |  locked   |
//! +---------------------------+--------------+-----------+-----------+
//! ```
//!
//! `I` is [`TAIL_IDX_BITS`], wide enough for `MAX_NESTING` levels. `locked`
//! and `pending` each own a full byte so that either can be updated without
//! touching the other; the word value zero means unlocked with an empty queue.

use bitflags::bitflags;

use crate::{
    config::{LOCKED_BITS, PENDING_BITS, TAIL_CPU_BITS, TAIL_IDX_BITS},
    interrupt::NestingLevel,
    processor::ProcessorId,
};

pub const LOCKED_OFFSET: u32 = 0;
pub const LOCKED_MASK: u32 = field_mask(LOCKED_OFFSET, LOCKED_BITS);
pub const LOCKED_VAL: u32 = 1 << LOCKED_OFFSET;

pub const PENDING_OFFSET: u32 = LOCKED_OFFSET + LOCKED_BITS;
pub const PENDING_MASK: u32 = field_mask(PENDING_OFFSET, PENDING_BITS);
pub const PENDING_VAL: u32 = 1 << PENDING_OFFSET;

pub const TAIL_IDX_OFFSET: u32 = PENDING_OFFSET + PENDING_BITS;
pub const TAIL_IDX_MASK: u32 = field_mask(TAIL_IDX_OFFSET, TAIL_IDX_BITS);

pub const TAIL_CPU_OFFSET: u32 = TAIL_IDX_OFFSET + TAIL_IDX_BITS;
pub const TAIL_CPU_MASK: u32 = field_mask(TAIL_CPU_OFFSET, TAIL_CPU_BITS);

pub const TAIL_MASK: u32 = TAIL_IDX_MASK | TAIL_CPU_MASK;
pub const LOCKED_PENDING_MASK: u32 = LOCKED_MASK | PENDING_MASK;

const fn field_mask(offset: u32, bits: u32) -> u32 {
    if bits == 0 {
        0
    } else {
        (u32::MAX >> (u32::BITS - bits)) << offset
    }
}

// Sub-fields must tile the word without overlap.
const _: () = assert!(LOCKED_MASK & PENDING_MASK == 0);
const _: () = assert!(LOCKED_PENDING_MASK & TAIL_MASK == 0);
const _: () = assert!(TAIL_IDX_MASK & TAIL_CPU_MASK == 0);
const _: () = assert!(LOCKED_PENDING_MASK | TAIL_MASK == u32::MAX);

/// Identity of one queued waiter: the CPU it runs on and the nesting level it
/// locked at. Names exactly one node of a [`QNodePool`](super::QNodePool).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WaiterId {
    cpu: ProcessorId,
    level: NestingLevel,
}

impl WaiterId {
    pub const fn new(cpu: ProcessorId, level: NestingLevel) -> Self {
        Self { cpu, level }
    }

    #[inline(always)]
    pub const fn cpu(&self) -> ProcessorId {
        self.cpu
    }

    #[inline(always)]
    pub const fn level(&self) -> NestingLevel {
        self.level
    }
}

/// Packs `id` into the tail bits. Never zero.
#[inline(always)]
pub const fn encode_tail(id: WaiterId) -> u32 {
    let cpu = (id.cpu.as_usize() as u32 + 1) << TAIL_CPU_OFFSET;
    let idx = (id.level.as_usize() as u32) << TAIL_IDX_OFFSET;
    cpu | idx
}

/// Unpacks the tail bits of `bits`, `None` when the queue is empty.
///
/// Only lock words and node `next` links produced by this crate are valid
/// input; their cpu and index are in range by construction.
#[inline(always)]
pub fn decode_tail(bits: u32) -> Option<WaiterId> {
    let cpu = (bits & TAIL_CPU_MASK) >> TAIL_CPU_OFFSET;
    if cpu == 0 {
        return None;
    }
    let idx = (bits & TAIL_IDX_MASK) >> TAIL_IDX_OFFSET;
    let cpu = ProcessorId::new(cpu as usize - 1).ok()?;
    let level = NestingLevel::new(idx as usize).ok()?;
    Some(WaiterId::new(cpu, level))
}

bitflags! {
    /// Owner bits of a lock word snapshot.
    pub struct LockWordFlags: u32 {
        const LOCKED = LOCKED_VAL;
        const PENDING = PENDING_VAL;
    }
}

/// Decoded view of a lock word, for diagnostics and tests only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockWordState {
    pub flags: LockWordFlags,
    pub tail: Option<WaiterId>,
}

impl LockWordState {
    pub fn from_bits(bits: u32) -> Self {
        let mut flags = LockWordFlags::empty();
        flags.set(LockWordFlags::LOCKED, bits & LOCKED_MASK != 0);
        flags.set(LockWordFlags::PENDING, bits & PENDING_MASK != 0);
        Self {
            flags,
            tail: decode_tail(bits),
        }
    }

    pub fn is_locked(&self) -> bool {
        self.flags.contains(LockWordFlags::LOCKED)
    }

    pub fn is_pending(&self) -> bool {
        self.flags.contains(LockWordFlags::PENDING)
    }

    /// Unlocked, nobody pending, nobody queued.
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty() && self.tail.is_none()
    }
}
