//! Scalar loads into registers and whole-register-file initialisation.
//!
//! `LoadGpr` expands an arbitrary 64-bit constant into the shortest
//! `lui`/`addiw` pair it can, recursing through `slli`/`addi` for values
//! that do not fit a sign-extended 32-bit immediate.

use std::collections::VecDeque;

use rand::Rng;

use crate::common::constants::MASK_64_BIT;
use crate::common::Result;
use crate::isa::Isa;
use crate::seq::float_stress::FloatGen;
use crate::seq::{enc, GenCtx, GenItem, Sequence};

/// Sign-extends `val` from bit index `bit`.
fn sext_from_bit(val: u64, bit: u32) -> u64 {
    if (val >> bit) & 1 == 1 {
        val | (MASK_64_BIT << (bit + 1))
    } else {
        val & ((1u64 << (bit + 1)) - 1)
    }
}

/// Appends the expansion of `reg <- value` to `buf`.
///
/// Values that sign-extend from bit 31 take a `lui`+`addiw` pair; wider
/// values recurse on their upper part, shift it into place and patch the
/// low 12 bits.
pub(crate) fn push_load_gpr(
    buf: &mut VecDeque<GenItem>,
    isa: &Isa,
    reg: u8,
    value: u64,
    seq: &str,
) {
    if reg == 0 {
        return;
    }
    let val = value & MASK_64_BIT;
    if val == sext_from_bit(val, 31) {
        let u20 = (val.wrapping_add(0x800) >> 12) & 0xF_FFFF;
        let l12 = sext_from_bit(val, 11) as i64;
        let mut src = 0u8;
        if u20 != 0 {
            if let Some(word) = enc(isa, "lui", |i| i.rd(reg).imm(u20 as i64)) {
                buf.push_back(
                    GenItem::instr(word, seq).with_comment(format!("lui x{reg}, {u20:#x}")),
                );
            }
            src = reg;
        }
        if l12 != 0 || u20 == 0 {
            if let Some(word) = enc(isa, "addiw", |i| i.rd(reg).rs1(src).imm(l12)) {
                buf.push_back(
                    GenItem::instr(word, seq).with_comment(format!("addiw x{reg}, x{src}, {l12}")),
                );
            }
        }
    } else {
        let l12 = sext_from_bit(val, 11) as i64;
        let u52 = val.wrapping_add(0x800) >> 12;
        let shamt = 12 + u52.trailing_zeros();
        let upper = sext_from_bit(u52 >> (shamt - 12), 64 - shamt);
        push_load_gpr(buf, isa, reg, upper, seq);
        if let Some(word) = enc(isa, "slli", |i| i.rd(reg).rs1(reg).shamt(shamt as u8)) {
            buf.push_back(
                GenItem::instr(word, seq).with_comment(format!("slli x{reg}, x{reg}, {shamt}")),
            );
        }
        if l12 != 0 {
            if let Some(word) = enc(isa, "addi", |i| i.rd(reg).rs1(reg).imm(l12)) {
                buf.push_back(
                    GenItem::instr(word, seq).with_comment(format!("addi x{reg}, x{reg}, {l12}")),
                );
            }
        }
    }
}

/// Loads one scalar value into one register.
#[derive(Debug)]
pub struct LoadGpr {
    name: String,
    reg: u8,
    value: u64,
    built: bool,
    buf: VecDeque<GenItem>,
}

impl LoadGpr {
    /// A sequence loading `value` into `x<reg>`.
    pub fn new(reg: u8, value: u64) -> Self {
        Self {
            name: "LoadGPR".to_owned(),
            reg,
            value,
            built: false,
            buf: VecDeque::new(),
        }
    }

    /// Same, tagged as part of a larger sequence.
    pub fn named(reg: u8, value: u64, parent: &str) -> Self {
        Self {
            name: format!("{parent} [LoadGPR]"),
            reg,
            value,
            built: false,
            buf: VecDeque::new(),
        }
    }
}

impl Sequence for LoadGpr {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_item(&mut self, ctx: &mut GenCtx<'_>) -> Result<Option<GenItem>> {
        if !self.built {
            self.built = true;
            push_load_gpr(&mut self.buf, ctx.isa, self.reg, self.value, &self.name);
        }
        Ok(self.buf.pop_front())
    }
}

/// Initialises `x1..x<n>` with random values, zeros, or a fixed sentinel.
#[derive(Debug)]
pub struct SetGprs {
    num_gprs: u8,
    random_values: bool,
    built: bool,
    buf: VecDeque<GenItem>,
}

impl SetGprs {
    /// Initialises all writable GPRs.
    pub fn new() -> Self {
        Self {
            num_gprs: 32,
            random_values: true,
            built: false,
            buf: VecDeque::new(),
        }
    }

    /// Restricts the register count or forces the sentinel value.
    pub fn with_options(num_gprs: u8, random_values: bool) -> Self {
        Self {
            num_gprs,
            random_values,
            built: false,
            buf: VecDeque::new(),
        }
    }
}

impl Default for SetGprs {
    fn default() -> Self {
        Self::new()
    }
}

impl Sequence for SetGprs {
    fn name(&self) -> &str {
        "SetGPRs"
    }

    fn next_item(&mut self, ctx: &mut GenCtx<'_>) -> Result<Option<GenItem>> {
        if !self.built {
            self.built = true;
            for reg in 1..self.num_gprs {
                let val = if self.random_values {
                    match ctx.rng.gen_range(0..3u8) {
                        0 => ctx.rng.r#gen::<u64>(),
                        1 => 0,
                        _ => 0xDEAD_BEEF,
                    }
                } else {
                    0xDEAD_BEEF
                };
                push_load_gpr(&mut self.buf, ctx.isa, reg, val, "SetGPRs");
            }
        }
        Ok(self.buf.pop_front())
    }
}

/// Number of bytes one FPR initialisation slot occupies.
const FPR_SLOT_BYTES: u64 = 8;

/// Builds the item list that fills every FPR from a fresh data arena.
///
/// Returns an empty list when no arena space is left; skipping is the
/// caller's recovery.
pub(crate) fn set_fprs_items(ctx: &mut GenCtx<'_>, p_f64: f64) -> VecDeque<GenItem> {
    let mut buf = VecDeque::new();
    let count = 32u64;
    let Some(base) = ctx
        .mem
        .allocate_data_region(count * FPR_SLOT_BYTES, FPR_SLOT_BYTES)
    else {
        return buf;
    };
    let base_reg = 1u8;
    push_load_gpr(&mut buf, ctx.isa, base_reg, base, "SetFPRs");
    if ctx.isa.instr("fld").is_none() {
        return buf;
    }
    let mut float_gen = FloatGen::from_rng(ctx.rng);
    for i in 0..count {
        let float_data = float_gen.gen_any(p_f64);
        let offset = i * FPR_SLOT_BYTES;
        if let Some(word) = enc(ctx.isa, "fld", |b| {
            b.rd(i as u8).rs1(base_reg).imm(offset as i64)
        }) {
            buf.push_back(
                GenItem::instr(word, "SetFPRs")
                    .with_comment(format!("fld f{i}, {offset}(x{base_reg})"))
                    .with_ldst(base + offset, float_data, 8),
            );
        }
    }
    buf
}

/// Initialises every FPR with generated float bit patterns.
#[derive(Debug)]
pub struct SetFprs {
    p_f64: f64,
    built: bool,
    buf: VecDeque<GenItem>,
}

impl SetFprs {
    /// `p_f64` is the probability each pattern is double-precision.
    pub fn new(p_f64: f64) -> Self {
        Self {
            p_f64,
            built: false,
            buf: VecDeque::new(),
        }
    }
}

impl Sequence for SetFprs {
    fn name(&self) -> &str {
        "SetFPRs"
    }

    fn next_item(&mut self, ctx: &mut GenCtx<'_>) -> Result<Option<GenItem>> {
        if !self.built {
            self.built = true;
            self.buf = set_fprs_items(ctx, self.p_f64);
        }
        Ok(self.buf.pop_front())
    }
}
