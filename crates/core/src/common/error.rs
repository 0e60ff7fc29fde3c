//! Fatal failure taxonomy for the generator.
//!
//! Every abort condition in the crate is a variant of [`GenError`]. Locally
//! recoverable conditions (a reservation conflict, an exhausted allocator, an
//! undecodable word in the output path) are deliberately *not* represented
//! here: they surface as `None` at their call sites and the caller retries or
//! skips. Anything that reaches `GenError` ends the generation with a
//! one-line diagnostic.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GenError>;

/// Fatal generation failures.
#[derive(Debug, Error)]
pub enum GenError {
    /// The memory configuration failed validation.
    #[error("invalid memory config: {0}")]
    ConfigInvalid(String),

    /// An address was required to be inside a code bank and was not.
    #[error("code address out of range: {addr:#x} (size={size})")]
    OutOfCodeBank {
        /// The offending address.
        addr: u64,
        /// The access size in bytes.
        size: u64,
    },

    /// An address fell outside every configured code and data bank.
    #[error(
        "address {addr:#x} (size={size}) outside mapped banks. \
         Code: {code_ranges}; Data: {data_ranges}"
    )]
    OutsideMappedBanks {
        /// The offending address.
        addr: u64,
        /// The access size in bytes.
        size: u64,
        /// Display form of every code bank range.
        code_ranges: String,
        /// Display form of every data bank range, or `(none)`.
        data_ranges: String,
    },

    /// A placement collided with an existing placed item.
    #[error("memory {addr:#x}..{end:#x} is already in use")]
    OverlapViolation {
        /// Start of the colliding placement.
        addr: u64,
        /// Exclusive end of the colliding placement.
        end: u64,
    },

    /// An item reached the memory store without a finalised address.
    #[error("item from sequence '{seq}' has no address")]
    UnplacedItem {
        /// Producer tag of the offending item.
        seq: String,
    },

    /// An item carried a byte size the store cannot strobe.
    #[error("unsupported item size: {size} bytes")]
    UnsupportedItemSize {
        /// The offending byte size.
        size: u8,
    },

    /// The modelled program counter left every configured code bank.
    #[error(
        "modelled control flow escaped configured code banks: pc={pc:#x}, \
         allowed: {ranges}"
    )]
    ControlFlowEscape {
        /// The escaping program counter.
        pc: u64,
        /// Display form of the allowed code bank ranges.
        ranges: String,
    },

    /// A sequence made a structurally invalid resource request.
    #[error("invalid resource request from {sequence}: {reason}")]
    InvalidResourceRequest {
        /// Name of the offending sequence.
        sequence: String,
        /// Why the request can never be satisfied.
        reason: String,
    },

    /// A full round-robin round yielded nothing.
    #[error(
        "round-robin funnel cannot make progress: all producers are blocked \
         on reservations"
    )]
    FunnelCannotProgress,

    /// Items kept being produced without the model ever stepping.
    #[error("potentially hung: {placements} placements with no modelled step")]
    HungGenerator {
        /// Number of consecutive placements observed.
        placements: u32,
    },

    /// The model kept stepping without reaching new code.
    #[error("potentially hung in a loop near pc {pc:#x} ({detail}); try another seed")]
    HungInLoop {
        /// Program counter at detection time.
        pc: u64,
        /// Which bound tripped.
        detail: String,
    },

    /// A mandatory allocation (exception handler, exit block, relocation
    /// target) found no space.
    #[error("no space for {what}")]
    AllocationFailed {
        /// What was being allocated.
        what: &'static str,
    },

    /// Failure writing an output file.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
