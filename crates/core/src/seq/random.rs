//! Random instruction streams.
//!
//! Each pull picks a mnemonic from the pool and draws a uniformly random
//! instance of it (random operand fields over the fixed bits). A draw that
//! lands on a reserved encoding is retried a bounded number of times, then
//! the slot is forfeited.

use rand::Rng;

use crate::common::Result;
use crate::isa::{Extension, Isa};
use crate::seq::{random_instance, GenCtx, GenItem, Sequence};

/// Draw attempts per emitted instruction.
const DRAW_TRIES: usize = 100;

/// Generates random base-integer instructions.
#[derive(Debug)]
pub struct RandomInstrs {
    name: &'static str,
    pool: Vec<&'static str>,
    remaining: usize,
}

impl RandomInstrs {
    /// `length` random I-extension instructions.
    pub fn new(isa: &Isa, length: usize) -> Self {
        let mut pool: Vec<&'static str> = isa
            .instructions()
            .filter(|d| d.extension == Extension::I)
            .map(|d| d.mnemonic)
            .collect();
        if pool.is_empty() {
            pool = isa.instructions().map(|d| d.mnemonic).collect();
        }
        Self {
            name: "RandomInstrs",
            pool,
            remaining: length,
        }
    }

    /// Pool accessor for the filtered variants.
    fn retain(&mut self, isa: &Isa, keep: impl Fn(&Isa, &str) -> bool) {
        self.pool.retain(|m| keep(isa, m));
    }
}

impl Sequence for RandomInstrs {
    fn name(&self) -> &str {
        self.name
    }

    fn next_item(&mut self, ctx: &mut GenCtx<'_>) -> Result<Option<GenItem>> {
        while self.remaining > 0 {
            self.remaining -= 1;
            if self.pool.is_empty() {
                return Ok(None);
            }
            let mnemonic = self.pool[ctx.rng.gen_range(0..self.pool.len())];
            for _ in 0..DRAW_TRIES {
                if let Some(inst) = random_instance(ctx.isa, ctx.rng, mnemonic) {
                    let item = GenItem::instr(inst.encode(), self.name)
                        .with_comment(inst.to_asm());
                    return Ok(Some(item));
                }
            }
        }
        Ok(None)
    }
}

/// Random base-integer instructions avoiding loads, stores, branches and
/// system instructions; the stream the recipes interleave everywhere.
#[derive(Debug)]
pub struct RandomSafeInstrs {
    inner: RandomInstrs,
}

impl RandomSafeInstrs {
    /// `length` safe random instructions.
    pub fn new(isa: &Isa, length: usize) -> Self {
        let mut inner = RandomInstrs::new(isa, length);
        inner.retain(isa, |isa, m| {
            isa.instr(m).is_some_and(|d| {
                !d.in_group("memory") && !d.in_group("branch") && !d.in_group("system")
            })
        });
        if inner.pool.is_empty() {
            inner.pool = ["addi", "add"]
                .into_iter()
                .filter(|m| isa.instr(m).is_some())
                .collect();
        }
        inner.name = "RandomSafeInstrs";
        Self { inner }
    }
}

impl Sequence for RandomSafeInstrs {
    fn name(&self) -> &str {
        self.inner.name
    }

    fn next_item(&mut self, ctx: &mut GenCtx<'_>) -> Result<Option<GenItem>> {
        self.inner.next_item(ctx)
    }
}

/// Random floating-point instructions.
#[derive(Debug)]
pub struct RandomFloatInstrs {
    inner: RandomInstrs,
}

impl RandomFloatInstrs {
    /// `length` random float-group instructions.
    pub fn new(isa: &Isa, length: usize) -> Self {
        let mut inner = RandomInstrs::new(isa, length);
        inner.pool = isa
            .instructions()
            .filter(|d| d.in_group("float"))
            .map(|d| d.mnemonic)
            .collect();
        if inner.pool.is_empty() {
            inner.pool = isa.instructions().map(|d| d.mnemonic).collect();
        }
        inner.name = "RandomFloatInstrs";
        Self { inner }
    }
}

impl Sequence for RandomFloatInstrs {
    fn name(&self) -> &str {
        self.inner.name
    }

    fn next_item(&mut self, ctx: &mut GenCtx<'_>) -> Result<Option<GenItem>> {
        self.inner.next_item(ctx)
    }
}
