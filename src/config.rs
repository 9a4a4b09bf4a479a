pub const CPU_NUM: usize = 64;                  // Logical CPUs a node pool has slots for
pub const MAX_NESTING: usize = 4;               // Levels per CPU: task, softirq, hardirq, nmi
pub const PENDING_LOOPS: usize = 1 << 9;        // Re-reads while a pending hand-over finishes
pub const CACHE_LINE_SIZE: usize = 64;          // Alignment of one waiter node

/// Lock word width in bits.
pub const WORD_BITS: u32 = u32::BITS;

pub const LOCKED_BITS: u32 = 8;
pub const PENDING_BITS: u32 = 8;

/// Bits needed to name a nesting level inside the tail.
pub const TAIL_IDX_BITS: u32 = bits_for(MAX_NESTING);

/// Whatever is left of the word names the CPU (stored as `cpu + 1`).
pub const TAIL_CPU_BITS: u32 = WORD_BITS - LOCKED_BITS - PENDING_BITS - TAIL_IDX_BITS;

const fn bits_for(n: usize) -> u32 {
    if n <= 1 {
        0
    } else {
        usize::BITS - (n - 1).leading_zeros()
    }
}

// The named levels (task, softirq, hardirq, nmi) must each own a slot.
const _: () = assert!(MAX_NESTING >= 4, "MAX_NESTING must cover the four named levels");
const _: () = assert!(CPU_NUM >= 1, "at least one CPU is required");
const _: () = assert!(
    LOCKED_BITS + PENDING_BITS + TAIL_IDX_BITS < WORD_BITS,
    "no room left in the lock word for the tail cpu"
);
// `cpu + 1` must fit, zero is reserved for "no tail".
const _: () = assert!(
    (CPU_NUM as u64) < (1u64 << TAIL_CPU_BITS),
    "CPU_NUM does not fit in the tail cpu field"
);
const _: () = assert!(CACHE_LINE_SIZE.is_power_of_two());
