//! Float bit-pattern generation and float stress sequences.
//!
//! [`FloatGen`] produces weighted IEEE-754 bit patterns: the exponent and
//! mantissa are drawn from seven bands each (minimum through maximum), with
//! NaN and infinity mixed in, and single-precision patterns NaN-boxed most
//! of the time. The stress sequences sweep a chosen source operand through
//! every polarity/exponent/mantissa band combination while the instruction
//! under stress executes between loads.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::common::constants::MASK_64_BIT;
use crate::common::Result;
use crate::isa::Isa;
use crate::seq::loadgpr::{push_load_gpr, set_fprs_items};
use crate::seq::{enc, random_instance, GenCtx, GenItem, Sequence};

/// Single-precision exponent width.
const F32_EXP_W: u32 = 8;
/// Single-precision mantissa width.
const F32_MANT_W: u32 = 23;
/// Double-precision exponent width.
const F64_EXP_W: u32 = 11;
/// Double-precision mantissa width.
const F64_MANT_W: u32 = 52;

/// NaN-boxing pattern for single-precision values in 64-bit registers.
const NAN_BOX: u64 = 0xFFFF_FFFF_0000_0000;

/// Value band for an exponent or mantissa draw.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Band {
    /// The maximum valid field value.
    Max,
    /// Within a few counts of the maximum.
    NearMax,
    /// Upper quartile.
    Large,
    /// Middle half.
    Medium,
    /// Lower quartile.
    Small,
    /// Within a few counts of zero.
    NearMin,
    /// Zero (or the canonical-NaN mantissa for NaN patterns).
    Min,
}

/// Every band, in sweep order.
pub const BANDS: [Band; 7] = [
    Band::Max,
    Band::NearMax,
    Band::Large,
    Band::Medium,
    Band::Small,
    Band::NearMin,
    Band::Min,
];

/// Kind of float pattern to produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FType {
    Nan,
    Inf,
    Num,
}

/// Packs sign, exponent and mantissa into 32- or 64-bit float bits.
const fn pack_float(sign: u64, exponent: u64, mantissa: u64, f64_sel: bool) -> u64 {
    if f64_sel {
        (sign << 63)
            | ((exponent & ((1 << F64_EXP_W) - 1)) << F64_MANT_W)
            | (mantissa & ((1 << F64_MANT_W) - 1))
    } else {
        (sign << 31)
            | ((exponent & ((1 << F32_EXP_W) - 1)) << F32_MANT_W)
            | (mantissa & ((1 << F32_MANT_W) - 1))
    }
}

/// Weighted IEEE-754 bit-pattern generator.
#[derive(Debug)]
pub struct FloatGen {
    rng: StdRng,
}

impl FloatGen {
    /// Seeds a generator from the main random source.
    pub fn from_rng(rng: &mut StdRng) -> Self {
        Self {
            rng: StdRng::seed_from_u64(rng.r#gen()),
        }
    }

    fn rand_range(&mut self, low: u64, high: u64) -> u64 {
        if low >= high {
            low
        } else {
            self.rng.gen_range(low..high)
        }
    }

    fn pick_band(&mut self) -> Band {
        // Default weights: the middle bands dominate, the edges stay rare.
        let weighted: [(Band, u32); 7] = [
            (Band::Max, 1),
            (Band::NearMax, 2),
            (Band::Large, 5),
            (Band::Medium, 5),
            (Band::Small, 5),
            (Band::NearMin, 2),
            (Band::Min, 1),
        ];
        let total: u32 = weighted.iter().map(|&(_, w)| w).sum();
        let mut roll = self.rng.gen_range(0..total);
        for (band, weight) in weighted {
            if roll < weight {
                return band;
            }
            roll -= weight;
        }
        Band::Medium
    }

    fn pick_ftype(&mut self) -> FType {
        let roll = self.rng.gen_range(0..12u32);
        match roll {
            0 => FType::Nan,
            1 => FType::Inf,
            _ => FType::Num,
        }
    }

    fn exponent_for(&mut self, band: Band, f64_sel: bool) -> u64 {
        let exp_w = if f64_sel { F64_EXP_W } else { F32_EXP_W };
        let q25 = 1u64 << (exp_w - 2);
        let q75 = (1u64 << (exp_w - 1)) + q25;
        let max_valid = (1u64 << exp_w) - 2;
        match band {
            Band::Min => 0,
            Band::NearMin => self.rand_range(1, 4),
            Band::Small => self.rand_range(4, q25),
            Band::Medium => self.rand_range(q25, q75),
            Band::Large => self.rand_range(q75, max_valid - 3),
            Band::NearMax => self.rand_range(max_valid - 3, max_valid),
            Band::Max => max_valid,
        }
    }

    fn mantissa_for(&mut self, band: Band, f64_sel: bool, ftype: FType) -> u64 {
        let mant_w = if f64_sel { F64_MANT_W } else { F32_MANT_W };
        let q25 = 1u64 << (mant_w - 2);
        let q75 = (1u64 << (mant_w - 1)) + q25;
        let max = (1u64 << mant_w) - 1;
        let canonical_nan = 1u64 << (mant_w - 1);
        match band {
            Band::Min => {
                if ftype == FType::Nan {
                    canonical_nan
                } else {
                    0
                }
            }
            Band::NearMin => self.rand_range(1, 8),
            Band::Small => self.rand_range(8, q25),
            Band::Medium => self.rand_range(q25, q75),
            Band::Large => self.rand_range(q75, max - 7),
            Band::NearMax => self.rand_range(max - 7, max),
            Band::Max => max,
        }
    }

    fn generate(
        &mut self,
        f64_sel: bool,
        negative: bool,
        ftype: FType,
        exp_band: Band,
        mant_band: Band,
        boxed: bool,
    ) -> u64 {
        let exp_w = if f64_sel { F64_EXP_W } else { F32_EXP_W };
        let exponent = if ftype == FType::Num {
            self.exponent_for(exp_band, f64_sel)
        } else {
            (1u64 << exp_w) - 1
        };
        let mantissa = if ftype == FType::Inf {
            0
        } else {
            self.mantissa_for(mant_band, f64_sel, ftype)
        };
        let mut packed = pack_float(u64::from(negative), exponent, mantissa, f64_sel);
        if !f64_sel && boxed {
            packed = (packed & 0xFFFF_FFFF) | NAN_BOX;
        }
        packed & MASK_64_BIT
    }

    /// A fully random pattern; `p_f64` selects double precision.
    pub fn gen_any(&mut self, p_f64: f64) -> u64 {
        let f64_sel = self.rng.gen_bool(p_f64.clamp(0.0, 1.0));
        let negative = self.rng.gen_bool(0.5);
        let ftype = self.pick_ftype();
        let exp_band = self.pick_band();
        let mant_band = self.pick_band();
        let boxed = self.rng.gen_bool(0.95);
        self.generate(f64_sel, negative, ftype, exp_band, mant_band, boxed)
    }

    /// A numeric (non-NaN, non-Inf) pattern with explicit bands.
    pub fn gen_num(&mut self, f64_sel: bool, negative: bool, exp_band: Band, mant_band: Band) -> u64 {
        let boxed = self.rng.gen_bool(0.95);
        self.generate(f64_sel, negative, FType::Num, exp_band, mant_band, boxed)
    }
}

/// True for a double-precision mnemonic.
fn is_f64_mnemonic(mnemonic: &str) -> bool {
    mnemonic.contains(".d")
}

/// Attempts per mnemonic when drawing a valid random instance.
const INSTANCE_TRIES: usize = 200;

/// Polarities swept by the stress sequences.
const POLARITY: [bool; 2] = [false, true];

/// Builds the full band sweep for one stressed FPR source operand.
///
/// For each polarity/exponent/mantissa combination, one `fld` into the
/// stressed register, then the instruction under stress.
fn push_band_sweep(
    buf: &mut VecDeque<GenItem>,
    ctx: &mut GenCtx<'_>,
    float_gen: &mut FloatGen,
    name: &str,
    base_reg: u8,
    base_addr: u64,
    load_offset: &mut u64,
    stressed_idx: u8,
    f64_sel: bool,
    stress_word: u32,
    stress_asm: &str,
) {
    for negative in POLARITY {
        for exp_band in BANDS {
            for mant_band in BANDS {
                let float_val = float_gen.gen_num(f64_sel, negative, exp_band, mant_band);
                if let Some(word) = enc(ctx.isa, "fld", |b| {
                    b.rd(stressed_idx).rs1(base_reg).imm(*load_offset as i64)
                }) {
                    buf.push_back(
                        GenItem::instr(word, name)
                            .with_comment(format!(
                                "fld f{stressed_idx}, {load_offset}(x{base_reg})"
                            ))
                            .with_ldst(base_addr + *load_offset, float_val, 8),
                    );
                }
                *load_offset += 8;
                buf.push_back(GenItem::instr(stress_word, name).with_comment(stress_asm));
            }
        }
    }
}

/// Stresses float instructions with exactly one FPR source (sqrt, converts).
#[derive(Debug)]
pub struct StressSingleFprSourceFloatInstrs {
    pool: Vec<&'static str>,
    built: bool,
    buf: VecDeque<GenItem>,
}

impl StressSingleFprSourceFloatInstrs {
    /// Builds the mnemonic pool from the instruction table.
    pub fn new(isa: &Isa) -> Self {
        let mut pool: Vec<&'static str> = isa
            .instructions()
            .filter(|d| d.in_group("float") && d.fpr_source_operands().len() == 1)
            .map(|d| d.mnemonic)
            .collect();
        if pool.is_empty() {
            pool = ["fsqrt.d", "fsqrt.s"]
                .into_iter()
                .filter(|m| isa.instr(m).is_some())
                .collect();
        }
        Self {
            pool,
            built: false,
            buf: VecDeque::new(),
        }
    }
}

impl Sequence for StressSingleFprSourceFloatInstrs {
    fn name(&self) -> &str {
        "StressSingleFPRSourceFloatInstrs"
    }

    fn next_item(&mut self, ctx: &mut GenCtx<'_>) -> Result<Option<GenItem>> {
        if !self.built {
            self.built = true;
            self.build(ctx);
        }
        Ok(self.buf.pop_front())
    }
}

impl StressSingleFprSourceFloatInstrs {
    fn build(&mut self, ctx: &mut GenCtx<'_>) {
        if self.pool.is_empty() || ctx.isa.instr("fld").is_none() {
            return;
        }
        let mnemonic = self.pool[ctx.rng.gen_range(0..self.pool.len())];
        let Some(inst) = (0..INSTANCE_TRIES)
            .find_map(|_| random_instance(ctx.isa, ctx.rng, mnemonic))
        else {
            return;
        };
        let Some(&src_name) = inst.desc.fpr_source_operands().first() else {
            return;
        };
        let Some(src_idx) = inst.fpr_operand(src_name) else {
            return;
        };
        let sweeps = (POLARITY.len() * BANDS.len() * BANDS.len()) as u64;
        let Some(base_addr) = ctx.mem.allocate_data_region(sweeps * 8, 8) else {
            return;
        };
        let name = "StressSingleFPRSourceFloatInstrs".to_owned();
        let base_reg = 1u8;
        push_load_gpr(&mut self.buf, ctx.isa, base_reg, base_addr, &name);
        let mut float_gen = FloatGen::from_rng(ctx.rng);
        let mut load_offset = 0u64;
        let stress_asm = inst.to_asm();
        push_band_sweep(
            &mut self.buf,
            ctx,
            &mut float_gen,
            &name,
            base_reg,
            base_addr,
            &mut load_offset,
            src_idx,
            is_f64_mnemonic(mnemonic),
            inst.encode(),
            &stress_asm,
        );
    }
}

/// Stresses float instructions with one of several FPR sources swept and the
/// rest loaded once with arbitrary patterns.
#[derive(Debug)]
pub struct StressMultiFprSourceFloatInstrs {
    pool: Vec<&'static str>,
    built: bool,
    buf: VecDeque<GenItem>,
}

impl StressMultiFprSourceFloatInstrs {
    /// Builds the mnemonic pool from the instruction table.
    pub fn new(isa: &Isa) -> Self {
        let mut pool: Vec<&'static str> = isa
            .instructions()
            .filter(|d| d.in_group("float") && !d.fpr_source_operands().is_empty())
            .map(|d| d.mnemonic)
            .collect();
        if pool.is_empty() {
            pool = ["fadd.d", "fadd.s"]
                .into_iter()
                .filter(|m| isa.instr(m).is_some())
                .collect();
        }
        Self {
            pool,
            built: false,
            buf: VecDeque::new(),
        }
    }

    fn build(&mut self, ctx: &mut GenCtx<'_>) {
        if self.pool.is_empty() || ctx.isa.instr("fld").is_none() {
            return;
        }
        let mnemonic = self.pool[ctx.rng.gen_range(0..self.pool.len())];
        let Some(inst) = (0..INSTANCE_TRIES)
            .find_map(|_| random_instance(ctx.isa, ctx.rng, mnemonic))
        else {
            return;
        };
        let src_names = inst.desc.fpr_source_operands();
        if src_names.is_empty() {
            return;
        }
        let stressed = if src_names.len() > 1 {
            ctx.rng.gen_range(0..src_names.len())
        } else {
            0
        };
        let others: Vec<usize> = (0..src_names.len()).filter(|&i| i != stressed).collect();
        let sweeps = (POLARITY.len() * BANDS.len() * BANDS.len()) as u64;
        let total_loads = sweeps + others.len() as u64;
        let Some(base_addr) = ctx.mem.allocate_data_region(total_loads * 8, 8) else {
            return;
        };
        let name = "StressMultiFPRSourceFloatInstrs".to_owned();
        let base_reg = 1u8;
        push_load_gpr(&mut self.buf, ctx.isa, base_reg, base_addr, &name);
        let mut float_gen = FloatGen::from_rng(ctx.rng);
        let f64_sel = is_f64_mnemonic(mnemonic);
        let mut load_offset = 0u64;
        for &other in &others {
            let Some(idx) = inst.fpr_operand(src_names[other]) else {
                continue;
            };
            let float_val = float_gen.gen_any(if f64_sel { 1.0 } else { 0.0 });
            if let Some(word) = enc(ctx.isa, "fld", |b| {
                b.rd(idx).rs1(base_reg).imm(load_offset as i64)
            }) {
                self.buf.push_back(
                    GenItem::instr(word, name.as_str())
                        .with_comment(format!("fld f{idx}, {load_offset}(x{base_reg})"))
                        .with_ldst(base_addr + load_offset, float_val, 8),
                );
            }
            load_offset += 8;
        }
        let Some(stressed_idx) = inst.fpr_operand(src_names[stressed]) else {
            return;
        };
        let stress_asm = inst.to_asm();
        push_band_sweep(
            &mut self.buf,
            ctx,
            &mut float_gen,
            &name,
            base_reg,
            base_addr,
            &mut load_offset,
            stressed_idx,
            f64_sel,
            inst.encode(),
            &stress_asm,
        );
    }
}

impl Sequence for StressMultiFprSourceFloatInstrs {
    fn name(&self) -> &str {
        "StressMultiFPRSourceFloatInstrs"
    }

    fn next_item(&mut self, ctx: &mut GenCtx<'_>) -> Result<Option<GenItem>> {
        if !self.built {
            self.built = true;
            self.build(ctx);
        }
        Ok(self.buf.pop_front())
    }
}

/// Emits divide and square-root grids over a freshly initialised FPR file.
#[derive(Debug)]
pub struct FloatDivSqrt {
    built: bool,
    buf: VecDeque<GenItem>,
}

/// Mnemonics the divide/sqrt sweep may pick from.
const DIV_SQRT_MNEMONICS: [&str; 4] = ["fdiv.s", "fdiv.d", "fsqrt.s", "fsqrt.d"];

/// FPR file size used by the sweep grids.
const NUM_FPRS: u8 = 32;

impl FloatDivSqrt {
    /// A fresh divide/sqrt sweep.
    pub fn new() -> Self {
        Self {
            built: false,
            buf: VecDeque::new(),
        }
    }

    fn build(&mut self, ctx: &mut GenCtx<'_>) {
        let valid: Vec<&str> = DIV_SQRT_MNEMONICS
            .into_iter()
            .filter(|m| ctx.isa.instr(m).is_some())
            .collect();
        if valid.is_empty() {
            return;
        }
        let mnemonic = valid[ctx.rng.gen_range(0..valid.len())];
        let p_f64 = if is_f64_mnemonic(mnemonic) { 1.0 } else { 0.0 };
        self.buf = set_fprs_items(ctx, p_f64);
        let dest = ctx.rng.gen_range(0..NUM_FPRS);
        if mnemonic.starts_with("fsqrt") {
            for src1 in 0..NUM_FPRS {
                if let Some(word) = enc(ctx.isa, mnemonic, |b| b.rd(dest).rs1(src1).rm(0)) {
                    self.buf.push_back(
                        GenItem::instr(word, "FloatDivSqrt")
                            .with_comment(format!("{mnemonic} f{dest}, f{src1}")),
                    );
                }
            }
        } else {
            for src1 in 0..NUM_FPRS {
                for src2 in 0..NUM_FPRS {
                    if let Some(word) =
                        enc(ctx.isa, mnemonic, |b| b.rd(dest).rs1(src1).rs2(src2).rm(0))
                    {
                        self.buf.push_back(
                            GenItem::instr(word, "FloatDivSqrt")
                                .with_comment(format!("{mnemonic} f{dest}, f{src1}, f{src2}")),
                        );
                    }
                }
            }
        }
    }
}

impl Default for FloatDivSqrt {
    fn default() -> Self {
        Self::new()
    }
}

impl Sequence for FloatDivSqrt {
    fn name(&self) -> &str {
        "FloatDivSqrt"
    }

    fn next_item(&mut self, ctx: &mut GenCtx<'_>) -> Result<Option<GenItem>> {
        if !self.built {
            self.built = true;
            self.build(ctx);
        }
        Ok(self.buf.pop_front())
    }
}
