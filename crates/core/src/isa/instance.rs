//! Decoded instruction instances: field access, re-encoding, and rendering.

use super::formats::{self, Format};
use super::table::InstrDesc;

/// Rounding-mode operand names, indexed by encoding (5 and 6 are reserved).
const RM_NAMES: [&str; 5] = ["rne", "rtz", "rdn", "rup", "rmm"];

/// Dynamic rounding: the assembler default, omitted when rendering.
const RM_DYN: u8 = 7;

/// One instruction with concrete operand values.
#[derive(Clone, Copy, Debug)]
pub struct InstrInstance {
    /// The descriptor this instance realises.
    pub desc: &'static InstrDesc,
    /// Destination register field (GPR or FPR index, by format).
    pub rd: u8,
    /// First source register field; carries the CSR-immediate `uimm` for
    /// the `csrr*i` forms.
    pub rs1: u8,
    /// Second source register field.
    pub rs2: u8,
    /// Immediate: sign-extended for I/S/B/J, the raw 20-bit value for U.
    pub imm: i64,
    /// CSR address for the CSR formats.
    pub csr: u16,
    /// Rounding mode for the floating-point formats that carry one.
    pub rm: u8,
    /// Shift amount for the shift-immediate formats.
    pub shamt: u8,
}

impl InstrInstance {
    /// A zeroed instance of `desc`.
    pub const fn new(desc: &'static InstrDesc) -> Self {
        Self {
            desc,
            rd: 0,
            rs1: 0,
            rs2: 0,
            imm: 0,
            csr: 0,
            rm: 0,
            shamt: 0,
        }
    }

    /// Sets the destination register field.
    pub const fn rd(mut self, rd: u8) -> Self {
        self.rd = rd;
        self
    }

    /// Sets the first source register field.
    pub const fn rs1(mut self, rs1: u8) -> Self {
        self.rs1 = rs1;
        self
    }

    /// Sets the second source register field.
    pub const fn rs2(mut self, rs2: u8) -> Self {
        self.rs2 = rs2;
        self
    }

    /// Sets the immediate.
    pub const fn imm(mut self, imm: i64) -> Self {
        self.imm = imm;
        self
    }

    /// Sets the CSR address.
    pub const fn csr(mut self, csr: u16) -> Self {
        self.csr = csr;
        self
    }

    /// Sets the rounding mode.
    pub const fn rm(mut self, rm: u8) -> Self {
        self.rm = rm;
        self
    }

    /// Sets the shift amount.
    pub const fn shamt(mut self, shamt: u8) -> Self {
        self.shamt = shamt;
        self
    }

    /// Extracts an instance from a word known to match `desc`.
    pub(super) fn from_word(desc: &'static InstrDesc, word: u32) -> Option<Self> {
        let mut inst = Self::new(desc);
        match desc.format {
            Format::R | Format::FpRF3 | Format::FpCmp => {
                inst.rd = formats::rd(word);
                inst.rs1 = formats::rs1(word);
                inst.rs2 = formats::rs2(word);
            }
            Format::I | Format::FpLoad => {
                inst.rd = formats::rd(word);
                inst.rs1 = formats::rs1(word);
                inst.imm = formats::imm_i(word);
            }
            Format::IShift => {
                inst.rd = formats::rd(word);
                inst.rs1 = formats::rs1(word);
                inst.shamt = ((word >> 20) & 0x3F) as u8;
            }
            Format::IShiftW => {
                inst.rd = formats::rd(word);
                inst.rs1 = formats::rs1(word);
                inst.shamt = ((word >> 20) & 0x1F) as u8;
            }
            Format::S | Format::FpStore => {
                inst.rs1 = formats::rs1(word);
                inst.rs2 = formats::rs2(word);
                inst.imm = formats::imm_s(word);
            }
            Format::B => {
                inst.rs1 = formats::rs1(word);
                inst.rs2 = formats::rs2(word);
                inst.imm = formats::imm_b(word);
            }
            Format::U => {
                inst.rd = formats::rd(word);
                inst.imm = formats::imm_u(word);
            }
            Format::J => {
                inst.rd = formats::rd(word);
                inst.imm = formats::imm_j(word);
            }
            Format::Csr | Format::CsrImm => {
                inst.rd = formats::rd(word);
                inst.rs1 = formats::rs1(word);
                inst.csr = ((word >> 20) & 0xFFF) as u16;
            }
            Format::Sys => {}
            Format::FpR => {
                inst.rd = formats::rd(word);
                inst.rs1 = formats::rs1(word);
                inst.rs2 = formats::rs2(word);
                inst.rm = formats::funct3(word);
            }
            Format::Fp2 | Format::FpCvtGpr | Format::FpCvtFpr => {
                inst.rd = formats::rd(word);
                inst.rs1 = formats::rs1(word);
                inst.rm = formats::funct3(word);
            }
            Format::FpMvToGpr | Format::FpMvToFpr => {
                inst.rd = formats::rd(word);
                inst.rs1 = formats::rs1(word);
            }
        }
        // Reserved rounding modes make the whole encoding illegal.
        if desc.format.has_rounding_mode() && (inst.rm == 5 || inst.rm == 6) {
            return None;
        }
        Some(inst)
    }

    /// Re-encodes the instance to its 32-bit word.
    pub fn encode(&self) -> u32 {
        let m = self.desc.match_bits;
        match self.desc.format {
            Format::R | Format::FpRF3 | Format::FpCmp => {
                m | formats::pack_regs(self.rd, self.rs1, self.rs2)
            }
            Format::I | Format::FpLoad => {
                m | formats::pack_imm_i(self.imm) | formats::pack_regs(self.rd, self.rs1, 0)
            }
            Format::IShift => {
                m | (u32::from(self.shamt & 0x3F) << 20)
                    | formats::pack_regs(self.rd, self.rs1, 0)
            }
            Format::IShiftW => {
                m | (u32::from(self.shamt & 0x1F) << 20)
                    | formats::pack_regs(self.rd, self.rs1, 0)
            }
            Format::S | Format::FpStore => {
                m | formats::pack_imm_s(self.imm) | formats::pack_regs(0, self.rs1, self.rs2)
            }
            Format::B => {
                m | formats::pack_imm_b(self.imm) | formats::pack_regs(0, self.rs1, self.rs2)
            }
            Format::U => m | formats::pack_imm_u(self.imm) | formats::pack_regs(self.rd, 0, 0),
            Format::J => m | formats::pack_imm_j(self.imm) | formats::pack_regs(self.rd, 0, 0),
            Format::Csr | Format::CsrImm => {
                m | (u32::from(self.csr & 0xFFF) << 20)
                    | formats::pack_regs(self.rd, self.rs1, 0)
            }
            Format::Sys => m,
            Format::FpR => {
                m | formats::pack_regs(self.rd, self.rs1, self.rs2)
                    | (u32::from(self.rm & 0x7) << 12)
            }
            Format::Fp2 | Format::FpCvtGpr | Format::FpCvtFpr => {
                m | formats::pack_regs(self.rd, self.rs1, 0) | (u32::from(self.rm & 0x7) << 12)
            }
            Format::FpMvToGpr | Format::FpMvToFpr => {
                m | formats::pack_regs(self.rd, self.rs1, 0)
            }
        }
    }

    /// Index of a named FPR operand, when the format has one of that name.
    pub fn fpr_operand(&self, name: &str) -> Option<u8> {
        if !self.desc.fpr_source_operands().contains(&name)
            && !self.desc.format.fpr_dest_operands().contains(&name)
        {
            return None;
        }
        match name {
            "rd" => Some(self.rd),
            "rs1" => Some(self.rs1),
            "rs2" => Some(self.rs2),
            _ => None,
        }
    }

    /// Sets a register field by operand name. Unknown names are ignored.
    pub fn set_reg(&mut self, name: &str, idx: u8) {
        match name {
            "rd" => self.rd = idx & 0x1F,
            "rs1" => self.rs1 = idx & 0x1F,
            "rs2" => self.rs2 = idx & 0x1F,
            _ => {}
        }
    }

    /// Renders assembler text that reassembles to exactly this encoding.
    pub fn to_asm(&self) -> String {
        let mn = self.desc.mnemonic;
        match self.desc.format {
            Format::R => format!("{mn} x{}, x{}, x{}", self.rd, self.rs1, self.rs2),
            Format::I => {
                if self.desc.mem_bytes.is_some() || mn == "jalr" {
                    format!("{mn} x{}, {}(x{})", self.rd, self.imm, self.rs1)
                } else {
                    format!("{mn} x{}, x{}, {}", self.rd, self.rs1, self.imm)
                }
            }
            Format::IShift | Format::IShiftW => {
                format!("{mn} x{}, x{}, {}", self.rd, self.rs1, self.shamt)
            }
            Format::S => format!("{mn} x{}, {}(x{})", self.rs2, self.imm, self.rs1),
            Format::B => format!("{mn} x{}, x{}, {}", self.rs1, self.rs2, self.imm),
            Format::U => format!("{mn} x{}, {:#x}", self.rd, self.imm),
            Format::J => format!("{mn} x{}, {}", self.rd, self.imm),
            Format::Csr => format!("{mn} x{}, {:#x}, x{}", self.rd, self.csr, self.rs1),
            Format::CsrImm => format!("{mn} x{}, {:#x}, {}", self.rd, self.csr, self.rs1),
            Format::Sys => mn.to_owned(),
            Format::FpR => self.with_rm(format!(
                "{mn} f{}, f{}, f{}",
                self.rd, self.rs1, self.rs2
            )),
            Format::FpRF3 => format!("{mn} f{}, f{}, f{}", self.rd, self.rs1, self.rs2),
            Format::FpCmp => format!("{mn} x{}, f{}, f{}", self.rd, self.rs1, self.rs2),
            Format::Fp2 => self.with_rm(format!("{mn} f{}, f{}", self.rd, self.rs1)),
            Format::FpCvtGpr => self.with_rm(format!("{mn} x{}, f{}", self.rd, self.rs1)),
            Format::FpCvtFpr => self.with_rm(format!("{mn} f{}, x{}", self.rd, self.rs1)),
            Format::FpMvToGpr => format!("{mn} x{}, f{}", self.rd, self.rs1),
            Format::FpMvToFpr => format!("{mn} f{}, x{}", self.rd, self.rs1),
            Format::FpLoad => format!("{mn} f{}, {}(x{})", self.rd, self.imm, self.rs1),
            Format::FpStore => format!("{mn} f{}, {}(x{})", self.rs2, self.imm, self.rs1),
        }
    }

    /// Appends the explicit rounding-mode operand unless it is dynamic.
    fn with_rm(&self, base: String) -> String {
        if self.rm == RM_DYN {
            base
        } else {
            RM_NAMES
                .get(self.rm as usize)
                .map_or(base.clone(), |name| format!("{base}, {name}"))
        }
    }
}
