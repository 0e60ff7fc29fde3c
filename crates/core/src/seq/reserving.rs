//! Minimal sequences exercising the reservation protocol end to end.
//!
//! These double as executable documentation: one claims a concrete register,
//! the other lets the reserver pick, and both consult the granted claim when
//! choosing the register they write.

use crate::common::Result;
use crate::resource::{
    AllocatedClaim, ResourceId, ResourceIdent, ResourceRequest, ResourceRequests, ResourceSlot,
};
use crate::seq::{enc, GenCtx, GenItem, Sequence};

/// First index of a claim's exclusive set, when it is a register.
fn claimed_index(claim: Option<&AllocatedClaim>) -> Option<u8> {
    claim.and_then(|c| {
        c.exclusive.iter().next().and_then(|rid| match rid.ident {
            ResourceIdent::Index(i) => Some(i as u8),
            ResourceIdent::Name(_) => None,
        })
    })
}

/// Reserves one concrete GPR exclusively and writes it once.
#[derive(Debug)]
pub struct ExampleGprSequence {
    gpr_index: u8,
    claim: Option<AllocatedClaim>,
    done: bool,
}

impl ExampleGprSequence {
    /// Claims `x<gpr_index>`.
    pub fn new(gpr_index: u8) -> Self {
        Self {
            gpr_index,
            claim: None,
            done: false,
        }
    }
}

impl Sequence for ExampleGprSequence {
    fn name(&self) -> &str {
        "ExampleGPRSequence"
    }

    fn resource_requests(&self) -> ResourceRequests {
        ResourceRequests {
            exclusive: vec![ResourceRequest::Id(ResourceId::indexed(
                "GPR",
                u32::from(self.gpr_index),
            ))],
            shared: Vec::new(),
        }
    }

    fn set_claim(&mut self, claim: Option<AllocatedClaim>) {
        self.claim = claim;
    }

    fn next_item(&mut self, ctx: &mut GenCtx<'_>) -> Result<Option<GenItem>> {
        if self.done {
            return Ok(None);
        }
        self.done = true;
        let reg = claimed_index(self.claim.as_ref()).unwrap_or(self.gpr_index);
        let Some(word) = enc(ctx.isa, "addi", |i| i.rd(reg).rs1(0).imm(42)) else {
            return Ok(None);
        };
        Ok(Some(
            GenItem::instr(word, "ExampleGPRSequence")
                .with_comment(format!("addi x{reg}, x0, 42")),
        ))
    }
}

/// Reserves any one GPR via a slot and writes it once.
#[derive(Debug)]
pub struct ExampleSlotSequence {
    claim: Option<AllocatedClaim>,
    done: bool,
}

impl ExampleSlotSequence {
    /// Claims one reserver-chosen GPR.
    pub fn new() -> Self {
        Self {
            claim: None,
            done: false,
        }
    }
}

impl Default for ExampleSlotSequence {
    fn default() -> Self {
        Self::new()
    }
}

impl Sequence for ExampleSlotSequence {
    fn name(&self) -> &str {
        "ExampleSlotSequence"
    }

    fn resource_requests(&self) -> ResourceRequests {
        ResourceRequests {
            exclusive: vec![ResourceRequest::Slot(ResourceSlot::new("GPR", 1))],
            shared: Vec::new(),
        }
    }

    fn set_claim(&mut self, claim: Option<AllocatedClaim>) {
        self.claim = claim;
    }

    fn next_item(&mut self, ctx: &mut GenCtx<'_>) -> Result<Option<GenItem>> {
        if self.done {
            return Ok(None);
        }
        self.done = true;
        let reg = claimed_index(self.claim.as_ref()).unwrap_or(1);
        let Some(word) = enc(ctx.isa, "addi", |i| i.rd(reg).rs1(0).imm(1)) else {
            return Ok(None);
        };
        Ok(Some(
            GenItem::instr(word, "ExampleSlotSequence")
                .with_comment(format!("addi x{reg}, x0, 1")),
        ))
    }
}
