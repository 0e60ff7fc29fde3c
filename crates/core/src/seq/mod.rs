//! Sequences: lazy producers of instruction and data items.
//!
//! A sequence yields [`GenItem`]s one pull at a time through
//! [`Sequence::next_item`]. The pull-driven shape matters: a sequence that
//! needs the current program counter or allocator state observes it at the
//! pull that needs it, after every earlier item has been placed and modelled.
//! Sequences may declare resource requests; the round-robin funnel grants a
//! claim before the first pull and releases it when the stream ends.

/// Conditional branch and indirect jump sequences.
pub mod branch;

/// Float bit-pattern generation and float stress sequences.
pub mod float_stress;

/// Writer/reader register hazard pairs.
pub mod hazard;

/// Load and store sequences.
pub mod ldst;

/// Scalar and register-file initialisation sequences.
pub mod loadgpr;

/// Program start, end, and relocation sequences.
pub mod program;

/// Random instruction streams.
pub mod random;

/// Minimal sequences demonstrating the reservation protocol.
pub mod reserving;

use rand::rngs::StdRng;
use rand::Rng;

use crate::common::Result;
use crate::isa::{Isa, InstrInstance};
use crate::mem::{LdstInfo, MemoryStore};
use crate::resource::{AllocatedClaim, Reserver, ResourceRequests};

/// One generated instruction or data word, before placement.
#[derive(Clone, Debug)]
pub struct GenItem {
    /// Encoded instruction or raw data word.
    pub data: u64,
    /// Size in bytes (1, 2, 4 or 8).
    pub byte_size: u8,
    /// Absolute address, when the producer fixed one; otherwise the core
    /// loop places the item at the current program counter.
    pub addr: Option<u64>,
    /// Data to pre-populate before execution reaches this item.
    pub ldst: Option<LdstInfo>,
    /// Producer tag.
    pub seq: String,
    /// Human-readable note for the assembly output.
    pub comment: Option<String>,
    /// True for loadable data.
    pub is_data: bool,
    /// False when control flow must not be steered into this item.
    pub safe_to_jump_to: bool,
}

impl GenItem {
    /// A 4-byte instruction item with no fixed address.
    pub fn instr(word: u32, seq: impl Into<String>) -> Self {
        Self {
            data: u64::from(word),
            byte_size: 4,
            addr: None,
            ldst: None,
            seq: seq.into(),
            comment: None,
            is_data: false,
            safe_to_jump_to: true,
        }
    }

    /// A data word at a fixed address.
    pub fn data_word(data: u64, byte_size: u8, addr: u64, seq: impl Into<String>) -> Self {
        Self {
            data,
            byte_size,
            addr: Some(addr),
            ldst: None,
            seq: seq.into(),
            comment: None,
            is_data: true,
            safe_to_jump_to: false,
        }
    }

    /// Attaches a comment.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Fixes the address.
    pub fn with_addr(mut self, addr: u64) -> Self {
        self.addr = Some(addr);
        self
    }

    /// Attaches associated load/store data.
    pub fn with_ldst(mut self, addr: u64, data: u64, size: u8) -> Self {
        self.ldst = Some(LdstInfo { addr, data, size });
        self
    }
}

/// Everything a sequence may consult while producing.
#[derive(Debug)]
pub struct GenCtx<'a> {
    /// Instruction-set description.
    pub isa: &'a Isa,
    /// The one seeded random source.
    pub rng: &'a mut StdRng,
    /// The memory store and allocator.
    pub mem: &'a mut MemoryStore,
    /// The shared reserver; only funnels touch it.
    pub reserver: &'a mut Reserver,
    /// Program counter at which the next unaddressed item will be placed.
    pub pc: u64,
    /// Slot the program-start sequence fills with the handler address.
    pub exception_address: &'a mut Option<u64>,
}

/// A lazy producer of generated items.
pub trait Sequence {
    /// Display name; doubles as the default producer tag.
    fn name(&self) -> &str;

    /// Resource needs, declared before the first pull. Default: none.
    fn resource_requests(&self) -> ResourceRequests {
        ResourceRequests::default()
    }

    /// Receives the granted claim (or `None`) before the first pull.
    fn set_claim(&mut self, _claim: Option<AllocatedClaim>) {}

    /// Produces the next item, or `None` when the stream has ended.
    ///
    /// # Errors
    ///
    /// Fatal generation failures only; retryable conditions are handled
    /// inside the sequence.
    fn next_item(&mut self, ctx: &mut GenCtx<'_>) -> Result<Option<GenItem>>;
}

impl std::fmt::Debug for dyn Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sequence({})", self.name())
    }
}

/// Encodes `mnemonic` with the fields set by `build`, when it exists.
pub(crate) fn enc(
    isa: &Isa,
    mnemonic: &str,
    build: impl FnOnce(InstrInstance) -> InstrInstance,
) -> Option<u32> {
    isa.build(mnemonic).map(|inst| build(inst).encode())
}

/// A uniformly random instance of `desc`: the fixed bits plus random
/// operand fields. Returns `None` when the operand fields hit a reserved
/// encoding (e.g. rounding mode 5 or 6).
pub(crate) fn random_instance(
    isa: &Isa,
    rng: &mut StdRng,
    mnemonic: &str,
) -> Option<InstrInstance> {
    let desc = isa.instr(mnemonic)?;
    let word = desc.match_bits | (rng.r#gen::<u32>() & !desc.mask);
    isa.decode(word).filter(|i| i.desc.mnemonic == mnemonic)
}
