//! Constants shared across the generator.

/// All 64 bits set; the strobe for a full double-word write.
pub const MASK_64_BIT: u64 = 0xFFFF_FFFF_FFFF_FFFF;

/// Free contiguous code bytes required before relocation is triggered.
///
/// Thirteen 4-byte instructions: enough room for the longest relocation
/// expansion (CSR save, a full 64-bit constant load, padding nops, the
/// indirect jump, and the CSR restore at the landing site).
pub const RELOCATE_WINDOW_BYTES: u64 = 13 * 4;

/// Attempts made to find a free, 8-aligned boot window before giving up.
pub const BOOT_SAMPLE_ATTEMPTS: usize = 256;

/// Number of recent program counters kept for loop detection.
pub const RECENT_PC_WINDOW: usize = 128;

/// Revisits of a recent program counter tolerated before the generation is
/// declared hung in a loop.
pub const CYCLE_REPEAT_LIMIT: u32 = 100;

/// Modelled steps tolerated without a new placement.
pub const MODEL_STEPS_LIMIT: u32 = 1000;

/// Placements tolerated without a modelled step.
pub const PRODUCE_LIMIT: u32 = 100;

/// Candidate pool size for program-counter-guided allocation.
pub const ALLOC_PC_CANDIDATES: usize = 64;

/// Bytes reserved for loadable data when code and data share a bank.
pub const DEFAULT_DATA_RESERVE: u64 = 256 * 1024;

/// Returns the byte-lane strobe for a placement of `byte_size` bytes.
///
/// Only power-of-two sizes up to a double word are representable; any other
/// size has no strobe.
pub const fn strobe_for_size(byte_size: u8) -> Option<u64> {
    match byte_size {
        1 => Some(0xFF),
        2 => Some(0xFFFF),
        4 => Some(0xFFFF_FFFF),
        8 => Some(MASK_64_BIT),
        _ => None,
    }
}
