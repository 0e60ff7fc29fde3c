//! Load and store sequences.
//!
//! Loads come with their source memory pre-populated through the item's
//! associated data, so the model reads a defined value. The faulting
//! variant aims at address zero on purpose to exercise the trap path.

use std::collections::VecDeque;

use rand::Rng;

use crate::common::Result;
use crate::isa::Isa;
use crate::seq::loadgpr::push_load_gpr;
use crate::seq::{enc, GenCtx, GenItem, Sequence};

/// Integer load/store mnemonic pool for a group, skipping the float forms
/// whose data register is an FPR.
fn int_mem_pool(isa: &Isa, group: &str) -> Vec<&'static str> {
    isa.instructions()
        .filter(|d| d.in_group(group) && !d.in_group("float"))
        .map(|d| d.mnemonic)
        .collect()
}

/// Emits one random load from a pre-populated data address.
#[derive(Debug)]
pub struct Load {
    pool: Vec<&'static str>,
    built: bool,
    buf: VecDeque<GenItem>,
}

impl Load {
    /// A single random load episode.
    pub fn new(isa: &Isa) -> Self {
        let mut pool = int_mem_pool(isa, "memory/load");
        if pool.is_empty() {
            pool = vec!["lw"];
        }
        Self {
            pool,
            built: false,
            buf: VecDeque::new(),
        }
    }

    fn build(&mut self, ctx: &mut GenCtx<'_>) {
        let name = "Load";
        let mnemonic = self.pool[ctx.rng.gen_range(0..self.pool.len())];
        let Some(desc) = ctx.isa.instr(mnemonic) else {
            return;
        };
        let base_reg = ctx.rng.gen_range(1..=31u8);
        let dest_reg = ctx.rng.gen_range(1..=31u8);
        let bytes = desc.mem_bytes.unwrap_or(4);
        let slot = u64::from(bytes).max(8);
        let Some(base_addr) = ctx.mem.allocate_data_region(slot, 8) else {
            return;
        };
        push_load_gpr(&mut self.buf, ctx.isa, base_reg, base_addr, name);
        let bits = u32::from(bytes) * 8;
        let mask = if bits >= 64 {
            u64::MAX
        } else {
            (1u64 << bits) - 1
        };
        let data = ctx.rng.r#gen::<u64>() & mask;
        if let Some(word) = enc(ctx.isa, mnemonic, |i| i.rd(dest_reg).rs1(base_reg).imm(0)) {
            self.buf.push_back(
                GenItem::instr(word, name)
                    .with_comment(mnemonic)
                    .with_ldst(base_addr, data, bytes),
            );
        }
    }
}

impl Sequence for Load {
    fn name(&self) -> &str {
        "Load"
    }

    fn next_item(&mut self, ctx: &mut GenCtx<'_>) -> Result<Option<GenItem>> {
        if !self.built {
            self.built = true;
            self.build(ctx);
        }
        Ok(self.buf.pop_front())
    }
}

/// Emits one load whose base is the zero register, so it faults at address
/// zero and exercises the exception handler.
#[derive(Debug)]
pub struct LoadException {
    pool: Vec<&'static str>,
    done: bool,
}

impl LoadException {
    /// A single faulting-load episode.
    pub fn new(isa: &Isa) -> Self {
        let mut pool = int_mem_pool(isa, "memory/load");
        if pool.is_empty() {
            pool = vec!["lw"];
        }
        Self { pool, done: false }
    }
}

impl Sequence for LoadException {
    fn name(&self) -> &str {
        "LoadException"
    }

    fn next_item(&mut self, ctx: &mut GenCtx<'_>) -> Result<Option<GenItem>> {
        if self.done {
            return Ok(None);
        }
        self.done = true;
        let mnemonic = self.pool[ctx.rng.gen_range(0..self.pool.len())];
        let dest = ctx.rng.gen_range(1..=31u8);
        let Some(word) = enc(ctx.isa, mnemonic, |i| i.rd(dest).rs1(0).imm(0)) else {
            return Ok(None);
        };
        Ok(Some(
            GenItem::instr(word, "LoadException")
                .with_comment(format!("{mnemonic} (base=x0 -> fault)")),
        ))
    }
}

/// Emits one random store to an allocated data address.
#[derive(Debug)]
pub struct Store {
    pool: Vec<&'static str>,
    built: bool,
    buf: VecDeque<GenItem>,
}

impl Store {
    /// A single random store episode.
    pub fn new(isa: &Isa) -> Self {
        let mut pool = int_mem_pool(isa, "memory/store");
        if pool.is_empty() {
            pool = vec!["sw"];
        }
        Self {
            pool,
            built: false,
            buf: VecDeque::new(),
        }
    }

    fn build(&mut self, ctx: &mut GenCtx<'_>) {
        let name = "Store";
        let mnemonic = self.pool[ctx.rng.gen_range(0..self.pool.len())];
        let Some(desc) = ctx.isa.instr(mnemonic) else {
            return;
        };
        let base_reg = ctx.rng.gen_range(1..=31u8);
        let mut data_reg = ctx.rng.gen_range(1..=31u8);
        if base_reg == data_reg {
            data_reg = (data_reg % 31) + 1;
        }
        let bytes = desc.mem_bytes.unwrap_or(4);
        let slot = u64::from(bytes).max(8);
        let Some(base_addr) = ctx.mem.allocate_data_region(slot, 8) else {
            return;
        };
        push_load_gpr(&mut self.buf, ctx.isa, base_reg, base_addr, name);
        let bits = u32::from(bytes) * 8;
        let mask = if bits >= 64 {
            u64::MAX
        } else {
            (1u64 << bits) - 1
        };
        let data = ctx.rng.r#gen::<u64>() & mask;
        push_load_gpr(&mut self.buf, ctx.isa, data_reg, data, name);
        if let Some(word) = enc(ctx.isa, mnemonic, |i| i.rs1(base_reg).rs2(data_reg).imm(0)) {
            self.buf
                .push_back(GenItem::instr(word, name).with_comment(mnemonic));
        }
    }
}

impl Sequence for Store {
    fn name(&self) -> &str {
        "Store"
    }

    fn next_item(&mut self, ctx: &mut GenCtx<'_>) -> Result<Option<GenItem>> {
        if !self.built {
            self.built = true;
            self.build(ctx);
        }
        Ok(self.buf.pop_front())
    }
}
