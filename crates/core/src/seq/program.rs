//! Program scaffolding sequences: start, end, and relocation.
//!
//! `DefaultProgramStart` installs the resume-after-trap exception handler and
//! points `mtvec` at it. `DefaultProgramEnd` jumps to a freshly allocated
//! exit block and drops the self-looping terminator there.
//! `DefaultRelocate` moves execution to fresh code space when the contiguous
//! room at the current program counter runs out.

use std::collections::VecDeque;

use rand::Rng;
use tracing::debug;

use crate::common::{GenError, Result};
use crate::mem::AllocRequest;
use crate::seq::loadgpr::push_load_gpr;
use crate::seq::{enc, GenCtx, GenItem, Sequence};

/// Producer tag of the end sequence; the core loop watches for it to learn
/// the exit address.
pub const PROGRAM_END_SEQ: &str = "DefaultProgramEnd";

/// Code bytes reserved for the exception handler.
const HANDLER_BYTES: u64 = 40;

/// Offset above the first code bank where scaffolding may be placed, so a
/// boot at the bank base stays clear.
const SCAFFOLD_MIN_OFFSET: u64 = 0x100;

/// Code bytes allocated for the exit block and relocation targets.
const BLOCK_BYTES: u64 = 100;

/// Installs the exception handler and programs `mtvec`.
#[derive(Debug)]
pub struct DefaultProgramStart {
    built: bool,
    buf: VecDeque<GenItem>,
}

impl DefaultProgramStart {
    /// A fresh program-start sequence.
    pub fn new() -> Self {
        Self {
            built: false,
            buf: VecDeque::new(),
        }
    }

    fn build(&mut self, ctx: &mut GenCtx<'_>) -> Result<()> {
        let name = "DefaultProgramStart";
        let mepc = ctx
            .isa
            .csr_address("mepc")
            .ok_or_else(|| GenError::ConfigInvalid("CSR table missing mepc".to_owned()))?;
        let mtvec = ctx
            .isa
            .csr_address("mtvec")
            .ok_or_else(|| GenError::ConfigInvalid("CSR table missing mtvec".to_owned()))?;

        let min_start = ctx.mem.code_segments()[0].base + SCAFFOLD_MIN_OFFSET;
        let base = ctx
            .mem
            .allocate(
                &AllocRequest::code(HANDLER_BYTES).min_start(min_start),
                ctx.rng,
            )
            .ok_or(GenError::AllocationFailed {
                what: "exception handler",
            })?;
        *ctx.exception_address = Some(base);

        push_load_gpr(&mut self.buf, ctx.isa, 1, base, &format!("{name} [LoadGPR]"));
        if let Some(word) = enc(ctx.isa, "csrrw", |i| i.rd(0).rs1(1).csr(mtvec)) {
            self.buf
                .push_back(GenItem::instr(word, name).with_comment("csrrw x0, mtvec, x1"));
        }

        // The handler itself: bump mepc past the excepting instruction and
        // return. Placed at its own fixed addresses.
        let handler = [
            (
                enc(ctx.isa, "csrrs", |i| i.rd(1).rs1(0).csr(mepc)),
                "csrrs x1, mepc, x0  (read mepc)",
            ),
            (
                enc(ctx.isa, "addi", |i| i.rd(1).rs1(1).imm(4)),
                "addi x1, x1, 4",
            ),
            (
                enc(ctx.isa, "csrrw", |i| i.rd(0).rs1(1).csr(mepc)),
                "csrrw x0, mepc, x1",
            ),
            (enc(ctx.isa, "mret", |i| i), "mret"),
        ];
        for (i, (word, comment)) in handler.into_iter().enumerate() {
            if let Some(word) = word {
                self.buf.push_back(
                    GenItem::instr(word, "Exception handler")
                        .with_comment(comment)
                        .with_addr(base + 4 * i as u64),
                );
            }
        }
        Ok(())
    }
}

impl Default for DefaultProgramStart {
    fn default() -> Self {
        Self::new()
    }
}

impl Sequence for DefaultProgramStart {
    fn name(&self) -> &str {
        "DefaultProgramStart"
    }

    fn next_item(&mut self, ctx: &mut GenCtx<'_>) -> Result<Option<GenItem>> {
        if !self.built {
            self.built = true;
            self.build(ctx)?;
        }
        Ok(self.buf.pop_front())
    }
}

/// Jumps to a fresh exit block and places the terminating self-loop.
#[derive(Debug)]
pub struct DefaultProgramEnd {
    built: bool,
    buf: VecDeque<GenItem>,
}

impl DefaultProgramEnd {
    /// A fresh program-end sequence.
    pub fn new() -> Self {
        Self {
            built: false,
            buf: VecDeque::new(),
        }
    }

    fn build(&mut self, ctx: &mut GenCtx<'_>) -> Result<()> {
        let exit_base = ctx
            .mem
            .allocate(&AllocRequest::code(BLOCK_BYTES), ctx.rng)
            .ok_or(GenError::AllocationFailed { what: "exit block" })?;
        push_load_gpr(
            &mut self.buf,
            ctx.isa,
            1,
            exit_base,
            &format!("{PROGRAM_END_SEQ} [LoadGPR]"),
        );
        if let Some(word) = enc(ctx.isa, "jalr", |i| i.rd(0).rs1(1).imm(0)) {
            self.buf
                .push_back(GenItem::instr(word, PROGRAM_END_SEQ).with_comment("jalr x0, 0(x1)"));
        }
        if let Some(word) = enc(ctx.isa, "jal", |i| i.rd(0).imm(0)) {
            self.buf
                .push_back(GenItem::instr(word, PROGRAM_END_SEQ).with_comment("jal x0, .  (END TEST)"));
        }
        Ok(())
    }
}

impl Default for DefaultProgramEnd {
    fn default() -> Self {
        Self::new()
    }
}

impl Sequence for DefaultProgramEnd {
    fn name(&self) -> &str {
        PROGRAM_END_SEQ
    }

    fn next_item(&mut self, ctx: &mut GenCtx<'_>) -> Result<Option<GenItem>> {
        if !self.built {
            self.built = true;
            self.build(ctx)?;
        }
        Ok(self.buf.pop_front())
    }
}

/// Moves execution to freshly allocated code space.
///
/// Prefers a single near `jal` when a target inside the jump immediate's
/// reach can be allocated; otherwise loads the absolute target and uses an
/// indirect jump, saving and restoring `x1` through `mscratch` when that
/// CSR exists.
#[derive(Debug)]
pub struct DefaultRelocate {
    built: bool,
    buf: VecDeque<GenItem>,
}

impl DefaultRelocate {
    /// A fresh relocation episode.
    pub fn new() -> Self {
        Self {
            built: false,
            buf: VecDeque::new(),
        }
    }

    /// Picks the landing address for the indirect-jump path.
    fn pick_landing(&mut self, ctx: &mut GenCtx<'_>) -> Result<u64> {
        if let Some(addr) = ctx
            .mem
            .allocate(&AllocRequest::code(BLOCK_BYTES).near(ctx.pc), ctx.rng)
        {
            return Ok(addr);
        }
        // Tight allocation failed; grab a larger block and land somewhere
        // inside it.
        let largest = ctx
            .mem
            .code_segments()
            .iter()
            .map(|s| s.size)
            .max()
            .unwrap_or(64);
        let max_block = largest.saturating_sub(64).clamp(64, 1 << 20);
        let size = ctx.rng.gen_range(64..=max_block.max(64));
        let base = ctx
            .mem
            .allocate(&AllocRequest::code(size).near(ctx.pc), ctx.rng)
            .ok_or(GenError::AllocationFailed {
                what: "relocation target",
            })?;
        let offset = if ctx.rng.gen_bool(0.9) {
            ctx.rng.gen_range(0..=size.saturating_sub(48).max(1))
        } else if ctx.rng.gen_bool(0.5) {
            size.saturating_sub(48)
        } else {
            0
        };
        Ok(base + (offset & !3))
    }

    fn build(&mut self, ctx: &mut GenCtx<'_>) -> Result<()> {
        let name = "Relocate";
        let jal_range = ctx.isa.instr("jal").and_then(|d| d.offset_range());

        if let Some(range) = jal_range {
            let near = ctx
                .mem
                .allocate(&AllocRequest::code(BLOCK_BYTES).within(ctx.pc, range), ctx.rng);
            if let Some(target) = near {
                if ctx.rng.gen_bool(0.95) {
                    let offset = target as i64 - ctx.pc as i64;
                    if let Some(word) = enc(ctx.isa, "jal", |i| i.rd(0).imm(offset)) {
                        self.buf.push_back(
                            GenItem::instr(word, name).with_comment(format!("jal x0, {offset}")),
                        );
                    }
                    return Ok(());
                }
            }
        }

        let mscratch = ctx.isa.csr_address("mscratch");
        if let Some(mscratch) = mscratch {
            if let Some(word) = enc(ctx.isa, "csrrw", |i| i.rd(0).rs1(1).csr(mscratch)) {
                self.buf
                    .push_back(GenItem::instr(word, name).with_comment("csrrw x0, mscratch, x1"));
            }
        }

        let landing = self.pick_landing(ctx)?;
        debug!(landing = format_args!("{landing:#x}"), "relocating via indirect jump");
        push_load_gpr(&mut self.buf, ctx.isa, 1, landing, name);
        for _ in 0..ctx.rng.gen_range(0..=4u32) {
            if let Some(word) = enc(ctx.isa, "addi", |i| i.rd(0).rs1(0).imm(0)) {
                self.buf.push_back(GenItem::instr(word, name).with_comment("nop"));
            }
        }
        if let Some(word) = enc(ctx.isa, "jalr", |i| i.rd(0).rs1(1).imm(0)) {
            self.buf
                .push_back(GenItem::instr(word, name).with_comment("jalr x0, 0(x1)"));
        }
        if let Some(mscratch) = mscratch {
            if let Some(word) = enc(ctx.isa, "csrrw", |i| i.rd(1).rs1(0).csr(mscratch)) {
                self.buf
                    .push_back(GenItem::instr(word, name).with_comment("csrrw x1, mscratch, x0"));
            }
        }
        Ok(())
    }
}

impl Default for DefaultRelocate {
    fn default() -> Self {
        Self::new()
    }
}

impl Sequence for DefaultRelocate {
    fn name(&self) -> &str {
        "Relocate"
    }

    fn next_item(&mut self, ctx: &mut GenCtx<'_>) -> Result<Option<GenItem>> {
        if !self.built {
            self.built = true;
            self.build(ctx)?;
        }
        Ok(self.buf.pop_front())
    }
}
