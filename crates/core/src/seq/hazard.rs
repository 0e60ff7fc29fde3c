//! Register hazard pairs: a writer immediately followed by a reader.

use std::collections::VecDeque;

use rand::Rng;

use crate::common::Result;
use crate::isa::Isa;
use crate::seq::{random_instance, GenCtx, GenItem, Sequence};

/// Groups excluded from hazard pair selection.
const BLOCKED_GROUPS: [&str; 3] = ["memory", "branch", "system"];

/// Draw attempts per half of the pair.
const DRAW_TRIES: usize = 200;

/// Emits two instructions sharing a GPR: the first writes it, the second
/// reads it.
#[derive(Debug)]
pub struct Hazards {
    with_dest: Vec<&'static str>,
    with_src: Vec<&'static str>,
    built: bool,
    buf: VecDeque<GenItem>,
}

impl Hazards {
    /// A single hazard-pair episode.
    pub fn new(isa: &Isa) -> Self {
        let blocked = |d: &crate::isa::InstrDesc| {
            BLOCKED_GROUPS.iter().any(|g| d.in_group(g)) || d.in_group("float")
        };
        let mut with_dest: Vec<&'static str> = isa
            .instructions()
            .filter(|d| !d.gpr_dest_operands().is_empty() && !blocked(d))
            .map(|d| d.mnemonic)
            .collect();
        let mut with_src: Vec<&'static str> = isa
            .instructions()
            .filter(|d| !d.gpr_source_operands().is_empty() && !blocked(d))
            .map(|d| d.mnemonic)
            .collect();
        if with_dest.is_empty() {
            with_dest = vec!["addi"];
        }
        if with_src.is_empty() {
            with_src = vec!["add"];
        }
        Self {
            with_dest,
            with_src,
            built: false,
            buf: VecDeque::new(),
        }
    }

    /// Draws an instance of `mnemonic` with the named register operands
    /// forced to `reg`.
    fn draw_with_regs(
        ctx: &mut GenCtx<'_>,
        mnemonic: &str,
        operands: &[&str],
        reg: u8,
    ) -> Option<GenItem> {
        for _ in 0..DRAW_TRIES {
            if let Some(mut inst) = random_instance(ctx.isa, ctx.rng, mnemonic) {
                for name in operands {
                    inst.set_reg(name, reg);
                }
                return Some(
                    GenItem::instr(inst.encode(), "Hazards").with_comment(inst.to_asm()),
                );
            }
        }
        None
    }

    fn build(&mut self, ctx: &mut GenCtx<'_>) {
        let first = self.with_dest[ctx.rng.gen_range(0..self.with_dest.len())];
        let second = self.with_src[ctx.rng.gen_range(0..self.with_src.len())];
        let hazard_reg = ctx.rng.gen_range(0..32u8);

        let Some(first_desc) = ctx.isa.instr(first) else {
            return;
        };
        let Some(second_desc) = ctx.isa.instr(second) else {
            return;
        };
        let Some(writer) =
            Self::draw_with_regs(ctx, first, first_desc.gpr_dest_operands(), hazard_reg)
        else {
            return;
        };
        let Some(reader) =
            Self::draw_with_regs(ctx, second, second_desc.gpr_source_operands(), hazard_reg)
        else {
            return;
        };
        self.buf.push_back(writer);
        self.buf.push_back(reader);
    }
}

impl Sequence for Hazards {
    fn name(&self) -> &str {
        "Hazards"
    }

    fn next_item(&mut self, ctx: &mut GenCtx<'_>) -> Result<Option<GenItem>> {
        if !self.built {
            self.built = true;
            self.build(ctx);
        }
        Ok(self.buf.pop_front())
    }
}
