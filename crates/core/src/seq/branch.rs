//! Conditional branch and indirect jump sequences.
//!
//! Branch targets are allocated through the store so they are guaranteed to
//! be free code space inside the immediate's reach; the offset is computed
//! against the program counter at the pull that emits the branch, after the
//! operand set-up has been placed and modelled.

use std::collections::VecDeque;

use rand::Rng;
use tracing::debug;

use crate::common::Result;
use crate::isa::Isa;
use crate::mem::AllocRequest;
use crate::seq::loadgpr::push_load_gpr;
use crate::seq::{enc, GenCtx, GenItem, Sequence};

/// Conditional branch mnemonics eligible for random selection.
const BRANCH_MNEMONICS: [&str; 6] = ["beq", "bne", "blt", "bge", "bltu", "bgeu"];

/// Bytes reserved at each branch or jump target.
const TARGET_BYTES: u64 = 64;

#[derive(Debug)]
enum Phase {
    Start,
    Branch { mnemonic: &'static str, rs1: u8, rs2: u8 },
    Done,
}

/// Emits a random relative branch with operands arranged for a chosen
/// direction.
#[derive(Debug)]
pub struct RelativeBranching {
    pool: Vec<&'static str>,
    phase: Phase,
    buf: VecDeque<GenItem>,
}

impl RelativeBranching {
    /// A single random branch episode.
    pub fn new(isa: &Isa) -> Self {
        let mut pool: Vec<&'static str> = BRANCH_MNEMONICS
            .into_iter()
            .filter(|m| isa.instr(m).is_some())
            .collect();
        if pool.is_empty() {
            pool = vec!["beq"];
        }
        Self {
            pool,
            phase: Phase::Start,
            buf: VecDeque::new(),
        }
    }

    fn start(&mut self, ctx: &mut GenCtx<'_>) {
        let name = "RelativeBranching";
        let mnemonic = self.pool[ctx.rng.gen_range(0..self.pool.len())];

        let rs1 = ctx.rng.gen_range(1..=31u8);
        let mut rs2 = ctx.rng.gen_range(1..=31u8);
        if rs1 == rs2 {
            rs2 = (rs2 % 31) + 1;
        }

        let taken = ctx.rng.r#gen::<bool>();
        let val1 = ctx.rng.r#gen::<u64>();
        let val2 = if taken {
            if matches!(mnemonic, "beq" | "bge" | "bgeu") {
                val1
            } else {
                val1.wrapping_add(1)
            }
        } else {
            val1.wrapping_add(ctx.rng.gen_range(1..=100))
        };

        push_load_gpr(&mut self.buf, ctx.isa, rs1, val1, name);
        push_load_gpr(&mut self.buf, ctx.isa, rs2, val2, name);
        self.phase = Phase::Branch { mnemonic, rs1, rs2 };
    }

    fn emit_branch(
        &mut self,
        ctx: &mut GenCtx<'_>,
        mnemonic: &'static str,
        rs1: u8,
        rs2: u8,
    ) -> Option<GenItem> {
        let range = ctx.isa.instr(mnemonic).and_then(|d| d.offset_range())?;
        let pc = ctx.pc;
        let target = ctx.mem.allocate(
            &AllocRequest::code(TARGET_BYTES).align(4).within(pc, range),
            ctx.rng,
        );
        match target {
            Some(target) => {
                let offset = target as i64 - pc as i64;
                let word = enc(ctx.isa, mnemonic, |i| i.rs1(rs1).rs2(rs2).imm(offset))?;
                Some(GenItem::instr(word, "RelativeBranching").with_comment(mnemonic))
            }
            None => {
                debug!(mnemonic, "no valid branch target in range");
                None
            }
        }
    }
}

impl Sequence for RelativeBranching {
    fn name(&self) -> &str {
        "RelativeBranching"
    }

    fn next_item(&mut self, ctx: &mut GenCtx<'_>) -> Result<Option<GenItem>> {
        if matches!(self.phase, Phase::Start) {
            self.start(ctx);
        }
        // Drain the operand set-up first; the branch itself waits until the
        // loads have been placed so the offset is computed from the right pc.
        if let Some(item) = self.buf.pop_front() {
            return Ok(Some(item));
        }
        match std::mem::replace(&mut self.phase, Phase::Done) {
            Phase::Branch { mnemonic, rs1, rs2 } => Ok(self.emit_branch(ctx, mnemonic, rs1, rs2)),
            _ => Ok(None),
        }
    }
}

/// Emits an indirect jump (`jalr`) to an allocated absolute target.
#[derive(Debug)]
pub struct AbsoluteBranching {
    pool: Vec<&'static str>,
    built: bool,
    buf: VecDeque<GenItem>,
}

impl AbsoluteBranching {
    /// A single random indirect-jump episode.
    pub fn new(isa: &Isa) -> Self {
        let pool: Vec<&'static str> = isa
            .instructions()
            .filter(|d| {
                d.in_group("branch/jump") && d.gpr_source_operands().contains(&"rs1")
            })
            .map(|d| d.mnemonic)
            .collect();
        Self {
            pool,
            built: false,
            buf: VecDeque::new(),
        }
    }

    fn build(&mut self, ctx: &mut GenCtx<'_>) {
        if self.pool.is_empty() {
            return;
        }
        let name = "AbsoluteBranching";
        let mnemonic = self.pool[ctx.rng.gen_range(0..self.pool.len())];
        let base_reg = ctx.rng.gen_range(1..=31u8);
        let target = ctx.mem.allocate(
            &AllocRequest::code(TARGET_BYTES).align(4).near(ctx.pc),
            ctx.rng,
        );
        let Some(target) = target else {
            debug!("no space for an indirect jump target");
            return;
        };
        let target = target & !3;
        push_load_gpr(&mut self.buf, ctx.isa, base_reg, target, name);
        let rd = if ctx.rng.r#gen::<bool>() { 1 } else { 0 };
        if let Some(word) = enc(ctx.isa, mnemonic, |i| i.rd(rd).rs1(base_reg).imm(0)) {
            self.buf
                .push_back(GenItem::instr(word, name).with_comment(mnemonic));
        }
    }
}

impl Sequence for AbsoluteBranching {
    fn name(&self) -> &str {
        "AbsoluteBranching"
    }

    fn next_item(&mut self, ctx: &mut GenCtx<'_>) -> Result<Option<GenItem>> {
        if !self.built {
            self.built = true;
            self.build(ctx);
        }
        Ok(self.buf.pop_front())
    }
}
