//! Architectural single-step executor.
//!
//! The model holds the architectural register state the generated program
//! observes: GPRs, FPRs, the CSR file, and a program counter. One call to
//! [`Model::execute`] steps exactly one instruction against an injected
//! [`ModelMemory`] implementation and reports everything that happened as a
//! [`Changes`] record. Memory rejections surface as access-fault exception
//! codes, never as errors; the caller decides how to trap.

use std::collections::BTreeMap;

use crate::isa::{CsrAccess, Format, Isa};

/// A memory access the model could not complete.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemFault;

/// The memory interface the model dispatches every load and store through.
pub trait ModelMemory {
    /// Loads `size` bytes, little-endian, zero-extended.
    ///
    /// # Errors
    ///
    /// [`MemFault`] when the address is outside the mapped banks.
    fn load(&mut self, addr: u64, size: u64) -> Result<u64, MemFault>;

    /// Stores the low `size` bytes of `value`.
    ///
    /// # Errors
    ///
    /// [`MemFault`] when the address is outside the mapped banks.
    fn store(&mut self, addr: u64, value: u64, size: u64) -> Result<(), MemFault>;
}

/// One observed memory access.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemAccess {
    /// Absolute address.
    pub address: u64,
    /// Access size in bytes.
    pub size: u64,
    /// True for a store.
    pub is_write: bool,
    /// The transferred value, when the access completed.
    pub value: Option<u64>,
}

/// Control-flow outcome of a branch or jump.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BranchInfo {
    /// Whether the branch was taken.
    pub taken: bool,
    /// The (possibly untaken) target address.
    pub target: u64,
}

/// Everything one executed instruction changed.
#[derive(Clone, Debug, Default)]
pub struct Changes {
    /// Exception cause code, when the instruction trapped.
    pub exception_code: Option<u64>,
    /// Memory accesses, including faulting ones.
    pub memory_accesses: Vec<MemAccess>,
    /// GPR writes as `(index, value)`.
    pub gpr_writes: Vec<(u8, u64)>,
    /// FPR writes as `(index, bits)`.
    pub fpr_writes: Vec<(u8, u64)>,
    /// CSR writes as `(address, value)`.
    pub csr_writes: Vec<(u16, u64)>,
    /// Program counter before and after the step.
    pub pc_change: (u64, u64),
    /// Branch outcome, for control-flow instructions.
    pub branch: Option<BranchInfo>,
}

// Standard machine cause codes.
const EXC_FETCH_MISALIGNED: u64 = 0;
const EXC_ILLEGAL: u64 = 2;
const EXC_BREAKPOINT: u64 = 3;
const EXC_LOAD_MISALIGNED: u64 = 4;
const EXC_LOAD_FAULT: u64 = 5;
const EXC_STORE_MISALIGNED: u64 = 6;
const EXC_STORE_FAULT: u64 = 7;
const EXC_ECALL_M: u64 = 11;

/// NaN-boxing pattern for single-precision values.
const NAN_BOX: u64 = 0xFFFF_FFFF_0000_0000;

/// Canonical single-precision NaN, substituted for unboxed inputs.
const F32_CANONICAL_NAN: u32 = 0x7FC0_0000;

/// Architectural state and single-step execution.
#[derive(Debug)]
pub struct Model {
    gprs: [u64; 32],
    fprs: [u64; 32],
    csrs: BTreeMap<u16, u64>,
    csr_writable: BTreeMap<u16, bool>,
    pc: u64,
}

impl Model {
    /// A reset model with the CSR file seeded from the ISA table.
    pub fn new(isa: &Isa) -> Self {
        let mut csrs = BTreeMap::new();
        let mut csr_writable = BTreeMap::new();
        for csr in isa.csrs() {
            let _ = csrs.insert(csr.address, 0u64);
            let _ = csr_writable.insert(csr.address, csr.access == CsrAccess::ReadWrite);
        }
        Self {
            gprs: [0; 32],
            fprs: [0; 32],
            csrs,
            csr_writable,
            pc: 0,
        }
    }

    /// Sets the program counter.
    pub fn poke_pc(&mut self, pc: u64) {
        self.pc = pc;
    }

    /// The current program counter.
    pub fn get_pc(&self) -> u64 {
        self.pc
    }

    /// Writes a CSR directly, bypassing access checks.
    pub fn poke_csr(&mut self, address: u16, value: u64) {
        let _ = self.csrs.insert(address, value);
    }

    /// Reads a CSR; `None` for addresses outside the CSR file.
    pub fn peek_csr(&self, address: u16) -> Option<u64> {
        self.csrs.get(&address).copied()
    }

    /// Reads a GPR; the zero register always reads zero.
    pub fn gpr(&self, idx: u8) -> u64 {
        self.gprs[(idx & 0x1F) as usize]
    }

    /// Reads an FPR's raw bits.
    pub fn fpr(&self, idx: u8) -> u64 {
        self.fprs[(idx & 0x1F) as usize]
    }

    fn write_gpr(&mut self, ch: &mut Changes, idx: u8, value: u64) {
        if idx & 0x1F == 0 {
            return;
        }
        self.gprs[(idx & 0x1F) as usize] = value;
        ch.gpr_writes.push((idx & 0x1F, value));
    }

    fn write_fpr(&mut self, ch: &mut Changes, idx: u8, bits: u64) {
        self.fprs[(idx & 0x1F) as usize] = bits;
        ch.fpr_writes.push((idx & 0x1F, bits));
    }

    fn write_csr_tracked(&mut self, ch: &mut Changes, address: u16, value: u64) {
        let _ = self.csrs.insert(address, value);
        ch.csr_writes.push((address, value));
    }

    /// Unboxed single-precision view of an FPR.
    fn fpr_f32(&self, idx: u8) -> f32 {
        let bits = self.fprs[(idx & 0x1F) as usize];
        if bits & NAN_BOX == NAN_BOX {
            f32::from_bits(bits as u32)
        } else {
            f32::from_bits(F32_CANONICAL_NAN)
        }
    }

    /// Double-precision view of an FPR.
    fn fpr_f64(&self, idx: u8) -> f64 {
        f64::from_bits(self.fprs[(idx & 0x1F) as usize])
    }

    fn box_f32(bits: u32) -> u64 {
        NAN_BOX | u64::from(bits)
    }

    /// Steps one instruction.
    ///
    /// On an exception the program counter is left unchanged; the caller
    /// applies the trap and repoints the model.
    pub fn execute(&mut self, isa: &Isa, opc: u32, mem: &mut dyn ModelMemory) -> Changes {
        let pc = self.pc;
        let mut ch = Changes {
            pc_change: (pc, pc),
            ..Changes::default()
        };

        let Some(inst) = isa.decode(opc) else {
            ch.exception_code = Some(EXC_ILLEGAL);
            return ch;
        };

        let rd = inst.rd;
        let rs1v = self.gpr(inst.rs1);
        let rs2v = self.gpr(inst.rs2);
        let imm = inst.imm;
        let mut next_pc = pc.wrapping_add(4);

        match inst.desc.mnemonic {
            // ── Upper immediates ──────────────────────────────
            "lui" => {
                let value = ((imm as u64) << 12) as i32 as i64 as u64;
                self.write_gpr(&mut ch, rd, value);
            }
            "auipc" => {
                let offset = (((imm as u64) << 12) as i32) as i64;
                self.write_gpr(&mut ch, rd, pc.wrapping_add(offset as u64));
            }

            // ── Jumps ─────────────────────────────────────────
            "jal" => {
                let target = pc.wrapping_add(imm as u64);
                if target & 3 != 0 {
                    ch.exception_code = Some(EXC_FETCH_MISALIGNED);
                    return ch;
                }
                self.write_gpr(&mut ch, rd, pc.wrapping_add(4));
                ch.branch = Some(BranchInfo { taken: true, target });
                next_pc = target;
            }
            "jalr" => {
                let target = rs1v.wrapping_add(imm as u64) & !1;
                if target & 3 != 0 {
                    ch.exception_code = Some(EXC_FETCH_MISALIGNED);
                    return ch;
                }
                self.write_gpr(&mut ch, rd, pc.wrapping_add(4));
                ch.branch = Some(BranchInfo { taken: true, target });
                next_pc = target;
            }

            // ── Conditional branches ──────────────────────────
            "beq" | "bne" | "blt" | "bge" | "bltu" | "bgeu" => {
                let taken = match inst.desc.mnemonic {
                    "beq" => rs1v == rs2v,
                    "bne" => rs1v != rs2v,
                    "blt" => (rs1v as i64) < (rs2v as i64),
                    "bge" => (rs1v as i64) >= (rs2v as i64),
                    "bltu" => rs1v < rs2v,
                    _ => rs1v >= rs2v,
                };
                let target = pc.wrapping_add(imm as u64);
                ch.branch = Some(BranchInfo { taken, target });
                if taken {
                    if target & 3 != 0 {
                        ch.exception_code = Some(EXC_FETCH_MISALIGNED);
                        return ch;
                    }
                    next_pc = target;
                }
            }

            // ── Loads and stores ──────────────────────────────
            "lb" | "lh" | "lw" | "ld" | "lbu" | "lhu" | "lwu" => {
                let size = u64::from(inst.desc.mem_bytes.unwrap_or(8));
                let addr = rs1v.wrapping_add(imm as u64);
                if addr % size != 0 {
                    ch.memory_accesses.push(MemAccess {
                        address: addr,
                        size,
                        is_write: false,
                        value: None,
                    });
                    ch.exception_code = Some(EXC_LOAD_MISALIGNED);
                    return ch;
                }
                match mem.load(addr, size) {
                    Ok(raw) => {
                        ch.memory_accesses.push(MemAccess {
                            address: addr,
                            size,
                            is_write: false,
                            value: Some(raw),
                        });
                        let value = match inst.desc.mnemonic {
                            "lb" => raw as u8 as i8 as i64 as u64,
                            "lh" => raw as u16 as i16 as i64 as u64,
                            "lw" => raw as u32 as i32 as i64 as u64,
                            _ => raw,
                        };
                        self.write_gpr(&mut ch, rd, value);
                    }
                    Err(MemFault) => {
                        ch.memory_accesses.push(MemAccess {
                            address: addr,
                            size,
                            is_write: false,
                            value: None,
                        });
                        ch.exception_code = Some(EXC_LOAD_FAULT);
                        return ch;
                    }
                }
            }
            "sb" | "sh" | "sw" | "sd" => {
                let size = u64::from(inst.desc.mem_bytes.unwrap_or(8));
                let addr = rs1v.wrapping_add(imm as u64);
                if addr % size != 0 {
                    ch.memory_accesses.push(MemAccess {
                        address: addr,
                        size,
                        is_write: true,
                        value: None,
                    });
                    ch.exception_code = Some(EXC_STORE_MISALIGNED);
                    return ch;
                }
                match mem.store(addr, rs2v, size) {
                    Ok(()) => ch.memory_accesses.push(MemAccess {
                        address: addr,
                        size,
                        is_write: true,
                        value: Some(rs2v),
                    }),
                    Err(MemFault) => {
                        ch.memory_accesses.push(MemAccess {
                            address: addr,
                            size,
                            is_write: true,
                            value: None,
                        });
                        ch.exception_code = Some(EXC_STORE_FAULT);
                        return ch;
                    }
                }
            }
            "flw" | "fld" => {
                let size = u64::from(inst.desc.mem_bytes.unwrap_or(8));
                let addr = rs1v.wrapping_add(imm as u64);
                if addr % size != 0 {
                    ch.memory_accesses.push(MemAccess {
                        address: addr,
                        size,
                        is_write: false,
                        value: None,
                    });
                    ch.exception_code = Some(EXC_LOAD_MISALIGNED);
                    return ch;
                }
                match mem.load(addr, size) {
                    Ok(raw) => {
                        ch.memory_accesses.push(MemAccess {
                            address: addr,
                            size,
                            is_write: false,
                            value: Some(raw),
                        });
                        let bits = if inst.desc.mnemonic == "flw" {
                            Self::box_f32(raw as u32)
                        } else {
                            raw
                        };
                        self.write_fpr(&mut ch, rd, bits);
                    }
                    Err(MemFault) => {
                        ch.memory_accesses.push(MemAccess {
                            address: addr,
                            size,
                            is_write: false,
                            value: None,
                        });
                        ch.exception_code = Some(EXC_LOAD_FAULT);
                        return ch;
                    }
                }
            }
            "fsw" | "fsd" => {
                let size = u64::from(inst.desc.mem_bytes.unwrap_or(8));
                let addr = rs1v.wrapping_add(imm as u64);
                let bits = self.fpr(inst.rs2);
                let value = if inst.desc.mnemonic == "fsw" {
                    bits & 0xFFFF_FFFF
                } else {
                    bits
                };
                if addr % size != 0 {
                    ch.memory_accesses.push(MemAccess {
                        address: addr,
                        size,
                        is_write: true,
                        value: None,
                    });
                    ch.exception_code = Some(EXC_STORE_MISALIGNED);
                    return ch;
                }
                match mem.store(addr, value, size) {
                    Ok(()) => ch.memory_accesses.push(MemAccess {
                        address: addr,
                        size,
                        is_write: true,
                        value: Some(value),
                    }),
                    Err(MemFault) => {
                        ch.memory_accesses.push(MemAccess {
                            address: addr,
                            size,
                            is_write: true,
                            value: None,
                        });
                        ch.exception_code = Some(EXC_STORE_FAULT);
                        return ch;
                    }
                }
            }

            // ── Immediate arithmetic ──────────────────────────
            "addi" => self.write_gpr(&mut ch, rd, rs1v.wrapping_add(imm as u64)),
            "slti" => self.write_gpr(&mut ch, rd, u64::from((rs1v as i64) < imm)),
            "sltiu" => self.write_gpr(&mut ch, rd, u64::from(rs1v < imm as u64)),
            "xori" => self.write_gpr(&mut ch, rd, rs1v ^ imm as u64),
            "ori" => self.write_gpr(&mut ch, rd, rs1v | imm as u64),
            "andi" => self.write_gpr(&mut ch, rd, rs1v & imm as u64),
            "addiw" => {
                let v = (rs1v.wrapping_add(imm as u64) as u32) as i32 as i64 as u64;
                self.write_gpr(&mut ch, rd, v);
            }
            "slli" => self.write_gpr(&mut ch, rd, rs1v << (inst.shamt & 0x3F)),
            "srli" => self.write_gpr(&mut ch, rd, rs1v >> (inst.shamt & 0x3F)),
            "srai" => {
                self.write_gpr(&mut ch, rd, ((rs1v as i64) >> (inst.shamt & 0x3F)) as u64);
            }
            "slliw" => {
                let v = ((rs1v as u32) << (inst.shamt & 0x1F)) as i32 as i64 as u64;
                self.write_gpr(&mut ch, rd, v);
            }
            "srliw" => {
                let v = ((rs1v as u32) >> (inst.shamt & 0x1F)) as i32 as i64 as u64;
                self.write_gpr(&mut ch, rd, v);
            }
            "sraiw" => {
                let v = ((rs1v as u32 as i32) >> (inst.shamt & 0x1F)) as i64 as u64;
                self.write_gpr(&mut ch, rd, v);
            }

            // ── Register arithmetic ───────────────────────────
            "add" => self.write_gpr(&mut ch, rd, rs1v.wrapping_add(rs2v)),
            "sub" => self.write_gpr(&mut ch, rd, rs1v.wrapping_sub(rs2v)),
            "sll" => self.write_gpr(&mut ch, rd, rs1v << (rs2v & 0x3F)),
            "slt" => self.write_gpr(&mut ch, rd, u64::from((rs1v as i64) < (rs2v as i64))),
            "sltu" => self.write_gpr(&mut ch, rd, u64::from(rs1v < rs2v)),
            "xor" => self.write_gpr(&mut ch, rd, rs1v ^ rs2v),
            "srl" => self.write_gpr(&mut ch, rd, rs1v >> (rs2v & 0x3F)),
            "sra" => self.write_gpr(&mut ch, rd, ((rs1v as i64) >> (rs2v & 0x3F)) as u64),
            "or" => self.write_gpr(&mut ch, rd, rs1v | rs2v),
            "and" => self.write_gpr(&mut ch, rd, rs1v & rs2v),
            "addw" => {
                let v = (rs1v.wrapping_add(rs2v) as u32) as i32 as i64 as u64;
                self.write_gpr(&mut ch, rd, v);
            }
            "subw" => {
                let v = (rs1v.wrapping_sub(rs2v) as u32) as i32 as i64 as u64;
                self.write_gpr(&mut ch, rd, v);
            }
            "sllw" => {
                let v = ((rs1v as u32) << (rs2v & 0x1F)) as i32 as i64 as u64;
                self.write_gpr(&mut ch, rd, v);
            }
            "srlw" => {
                let v = ((rs1v as u32) >> (rs2v & 0x1F)) as i32 as i64 as u64;
                self.write_gpr(&mut ch, rd, v);
            }
            "sraw" => {
                let v = ((rs1v as u32 as i32) >> (rs2v & 0x1F)) as i64 as u64;
                self.write_gpr(&mut ch, rd, v);
            }

            // ── System ────────────────────────────────────────
            "fence" => {}
            "ecall" => {
                ch.exception_code = Some(EXC_ECALL_M);
                return ch;
            }
            "ebreak" => {
                ch.exception_code = Some(EXC_BREAKPOINT);
                return ch;
            }
            "mret" => {
                let mepc = isa
                    .csr_address("mepc")
                    .and_then(|addr| self.peek_csr(addr))
                    .unwrap_or(0)
                    & !1;
                ch.branch = Some(BranchInfo {
                    taken: true,
                    target: mepc,
                });
                next_pc = mepc;
            }
            "csrrw" | "csrrs" | "csrrc" | "csrrwi" | "csrrsi" | "csrrci" => {
                if let Some(code) = self.execute_csr(&mut ch, &inst) {
                    ch.exception_code = Some(code);
                    return ch;
                }
            }

            // ── Float arithmetic ──────────────────────────────
            mnemonic if inst.desc.in_group("float") => {
                self.execute_float(&mut ch, mnemonic, &inst);
            }

            _ => {
                ch.exception_code = Some(EXC_ILLEGAL);
                return ch;
            }
        }

        if ch.exception_code.is_some() {
            return ch;
        }
        self.pc = next_pc;
        ch.pc_change = (pc, next_pc);
        ch
    }

    /// CSR read-modify-write; returns an exception code on access violation.
    fn execute_csr(
        &mut self,
        ch: &mut Changes,
        inst: &crate::isa::InstrInstance,
    ) -> Option<u64> {
        let address = inst.csr;
        let Some(old) = self.peek_csr(address) else {
            return Some(EXC_ILLEGAL);
        };
        let writable = self.csr_writable.get(&address).copied().unwrap_or(false);
        let is_imm = matches!(inst.desc.format, Format::CsrImm);
        let operand = if is_imm {
            u64::from(inst.rs1 & 0x1F)
        } else {
            self.gpr(inst.rs1)
        };
        let (writes, new) = match inst.desc.mnemonic {
            "csrrw" | "csrrwi" => (true, operand),
            "csrrs" | "csrrsi" => (inst.rs1 != 0, old | operand),
            _ => (inst.rs1 != 0, old & !operand),
        };
        if writes && !writable {
            return Some(EXC_ILLEGAL);
        }
        if writes {
            self.write_csr_tracked(ch, address, new);
        }
        self.write_gpr(ch, inst.rd, old);
        None
    }

    /// Floating-point execution over host floats.
    fn execute_float(
        &mut self,
        ch: &mut Changes,
        mnemonic: &str,
        inst: &crate::isa::InstrInstance,
    ) {
        let rd = inst.rd;
        let (a32, b32) = (self.fpr_f32(inst.rs1), self.fpr_f32(inst.rs2));
        let (a64, b64) = (self.fpr_f64(inst.rs1), self.fpr_f64(inst.rs2));
        let bits1 = self.fpr(inst.rs1);
        let bits2 = self.fpr(inst.rs2);
        let gpr1 = self.gpr(inst.rs1);
        match mnemonic {
            "fadd.s" => self.write_fpr(ch, rd, Self::box_f32((a32 + b32).to_bits())),
            "fsub.s" => self.write_fpr(ch, rd, Self::box_f32((a32 - b32).to_bits())),
            "fmul.s" => self.write_fpr(ch, rd, Self::box_f32((a32 * b32).to_bits())),
            "fdiv.s" => self.write_fpr(ch, rd, Self::box_f32((a32 / b32).to_bits())),
            "fsqrt.s" => self.write_fpr(ch, rd, Self::box_f32(a32.sqrt().to_bits())),
            "fadd.d" => self.write_fpr(ch, rd, (a64 + b64).to_bits()),
            "fsub.d" => self.write_fpr(ch, rd, (a64 - b64).to_bits()),
            "fmul.d" => self.write_fpr(ch, rd, (a64 * b64).to_bits()),
            "fdiv.d" => self.write_fpr(ch, rd, (a64 / b64).to_bits()),
            "fsqrt.d" => self.write_fpr(ch, rd, a64.sqrt().to_bits()),
            "fmin.s" => self.write_fpr(ch, rd, Self::box_f32(a32.min(b32).to_bits())),
            "fmax.s" => self.write_fpr(ch, rd, Self::box_f32(a32.max(b32).to_bits())),
            "fmin.d" => self.write_fpr(ch, rd, a64.min(b64).to_bits()),
            "fmax.d" => self.write_fpr(ch, rd, a64.max(b64).to_bits()),
            "fsgnj.s" => {
                let bits = (bits1 as u32 & 0x7FFF_FFFF) | (bits2 as u32 & 0x8000_0000);
                self.write_fpr(ch, rd, Self::box_f32(bits));
            }
            "fsgnjn.s" => {
                let bits = (bits1 as u32 & 0x7FFF_FFFF) | (!(bits2 as u32) & 0x8000_0000);
                self.write_fpr(ch, rd, Self::box_f32(bits));
            }
            "fsgnjx.s" => {
                let bits = (bits1 as u32) ^ ((bits2 as u32) & 0x8000_0000);
                self.write_fpr(ch, rd, Self::box_f32(bits));
            }
            "fsgnj.d" => {
                self.write_fpr(ch, rd, (bits1 & !(1 << 63)) | (bits2 & (1 << 63)));
            }
            "fsgnjn.d" => {
                self.write_fpr(ch, rd, (bits1 & !(1 << 63)) | (!bits2 & (1 << 63)));
            }
            "fsgnjx.d" => self.write_fpr(ch, rd, bits1 ^ (bits2 & (1 << 63))),
            "feq.s" => self.write_gpr(ch, rd, u64::from(a32 == b32)),
            "flt.s" => self.write_gpr(ch, rd, u64::from(a32 < b32)),
            "fle.s" => self.write_gpr(ch, rd, u64::from(a32 <= b32)),
            "feq.d" => self.write_gpr(ch, rd, u64::from(a64 == b64)),
            "flt.d" => self.write_gpr(ch, rd, u64::from(a64 < b64)),
            "fle.d" => self.write_gpr(ch, rd, u64::from(a64 <= b64)),
            "fcvt.s.d" => self.write_fpr(ch, rd, Self::box_f32((a64 as f32).to_bits())),
            "fcvt.d.s" => self.write_fpr(ch, rd, f64::from(a32).to_bits()),
            "fcvt.w.s" => self.write_gpr(ch, rd, (a32 as i32) as i64 as u64),
            "fcvt.wu.s" => self.write_gpr(ch, rd, (a32 as u32) as i32 as i64 as u64),
            "fcvt.l.s" => self.write_gpr(ch, rd, (a32 as i64) as u64),
            "fcvt.lu.s" => self.write_gpr(ch, rd, a32 as u64),
            "fcvt.w.d" => self.write_gpr(ch, rd, (a64 as i32) as i64 as u64),
            "fcvt.wu.d" => self.write_gpr(ch, rd, (a64 as u32) as i32 as i64 as u64),
            "fcvt.l.d" => self.write_gpr(ch, rd, (a64 as i64) as u64),
            "fcvt.lu.d" => self.write_gpr(ch, rd, a64 as u64),
            "fcvt.s.w" => {
                self.write_fpr(ch, rd, Self::box_f32((gpr1 as i32 as f32).to_bits()));
            }
            "fcvt.s.wu" => {
                self.write_fpr(ch, rd, Self::box_f32((gpr1 as u32 as f32).to_bits()));
            }
            "fcvt.s.l" => {
                self.write_fpr(ch, rd, Self::box_f32((gpr1 as i64 as f32).to_bits()));
            }
            "fcvt.s.lu" => self.write_fpr(ch, rd, Self::box_f32((gpr1 as f32).to_bits())),
            "fcvt.d.w" => self.write_fpr(ch, rd, f64::from(gpr1 as i32).to_bits()),
            "fcvt.d.wu" => self.write_fpr(ch, rd, f64::from(gpr1 as u32).to_bits()),
            "fcvt.d.l" => self.write_fpr(ch, rd, (gpr1 as i64 as f64).to_bits()),
            "fcvt.d.lu" => self.write_fpr(ch, rd, (gpr1 as f64).to_bits()),
            "fmv.x.w" => self.write_gpr(ch, rd, bits1 as u32 as i32 as i64 as u64),
            "fmv.x.d" => self.write_gpr(ch, rd, bits1),
            "fmv.w.x" => self.write_fpr(ch, rd, Self::box_f32(gpr1 as u32)),
            "fmv.d.x" => self.write_fpr(ch, rd, gpr1),
            _ => {
                ch.exception_code = Some(EXC_ILLEGAL);
            }
        }
    }
}
