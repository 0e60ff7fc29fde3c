//! Debug-output document model.
//!
//! Everything the `--debug-yaml` flag emits lives here: the placed-memory
//! map, the per-step execution trace, and the run summary. Addresses are
//! rendered as zero-padded hex strings so the YAML mapping sorts numerically.

use std::collections::BTreeMap;

use serde::Serialize;

/// Renders an address as `0x`-prefixed, zero-padded hex.
pub fn hex_addr(addr: u64) -> String {
    format!("{addr:#010x}")
}

/// One register write in a step record.
#[derive(Clone, Debug, Serialize)]
pub struct RegWriteDump {
    /// Register or CSR name.
    pub reg: String,
    /// Written value, in hex.
    pub value: String,
}

/// One memory access in a step record.
#[derive(Clone, Debug, Serialize)]
pub struct MemAccessDump {
    /// Absolute address, in hex.
    pub address: String,
    /// Access size in bytes.
    pub size: u64,
    /// True for a store.
    pub is_write: bool,
    /// Transferred value, when the access completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// Branch outcome in a step record.
#[derive(Clone, Debug, Serialize)]
pub struct BranchDump {
    /// Whether the branch was taken.
    pub taken: bool,
    /// Target address, in hex.
    pub target: String,
}

/// One modelled execution step.
#[derive(Clone, Debug, Serialize)]
pub struct StepRecord {
    /// Program counter, in hex.
    pub pc: String,
    /// Absolute program counter (identical in this address model).
    pub abs_pc: String,
    /// Raw instruction word, in hex.
    pub instr: String,
    /// Disassembled text, or `UNDECODABLE_INSTRUCTION`.
    pub asm: String,
    /// Program counter after the step (post-trap when one applied).
    pub next_pc: String,
    /// GPR writes.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub gpr_writes: Vec<RegWriteDump>,
    /// FPR writes.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fpr_writes: Vec<RegWriteDump>,
    /// CSR writes.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub csr_writes: Vec<RegWriteDump>,
    /// Memory accesses.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub memory_accesses: Vec<MemAccessDump>,
    /// Exception cause code, when the step trapped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception_code: Option<u64>,
    /// Exception cause identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception_name: Option<String>,
    /// Branch outcome.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<BranchDump>,
}

/// One placed item in the memory map.
#[derive(Clone, Debug, Serialize)]
pub struct MemoryItemDump {
    /// Data word, in hex.
    pub data: String,
    /// Size in bytes.
    pub byte_size: u8,
    /// Producer tag.
    pub seq: String,
    /// Comment, when the producer attached one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// True for loadable data.
    pub is_data: bool,
    /// Associated load/store data address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ldst_addr: Option<String>,
    /// Associated load/store data value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ldst_data: Option<String>,
    /// Associated load/store data size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ldst_size: Option<u8>,
}

/// One declared bank.
#[derive(Clone, Debug, Serialize)]
pub struct BankDump {
    /// Bank name.
    pub name: String,
    /// Base address, in hex.
    pub base: String,
    /// Size in bytes, in hex.
    pub size: String,
    /// Code role.
    pub code: bool,
    /// Data role.
    pub data: bool,
    /// Access letters.
    pub access: String,
}

/// Why and where the generation stopped.
#[derive(Clone, Debug, Serialize)]
pub struct ExecutionSummary {
    /// Termination reason identifier.
    pub termination_reason: String,
    /// Program counter at termination, in hex.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub termination_pc: Option<String>,
    /// Number of recorded execution steps.
    pub steps_recorded: usize,
}

/// The full debug document.
#[derive(Clone, Debug, Serialize)]
pub struct DebugDoc {
    /// Base of the first code bank, in hex.
    pub load_addr: String,
    /// Sum of code bank sizes, in hex.
    pub ram_size: String,
    /// Boot address, in hex.
    pub boot_address: Option<String>,
    /// Exit address, in hex.
    pub exit_address: Option<String>,
    /// Exception handler address, in hex.
    pub exception_address: Option<String>,
    /// Placed items keyed by zero-padded hex address.
    pub memory: BTreeMap<String, MemoryItemDump>,
    /// Declared banks.
    pub memory_banks: Vec<BankDump>,
    /// Per-step execution trace, when recording was enabled.
    pub executed_instructions: Vec<StepRecord>,
    /// Run summary.
    pub execution_summary: ExecutionSummary,
}
