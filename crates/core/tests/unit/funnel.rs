//! Funnel composition and reservation lifecycle tests.

use std::collections::{BTreeMap, VecDeque};

use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;

use tibbar_core::funnel::{ItemSource, RoundRobinFunnel, SimpleFunnel};
use tibbar_core::mem::{AddressSegment, MemoryStore};
use tibbar_core::resource::{Reserver, ResourceIdent, ResourceSpace};
use tibbar_core::seq::reserving::{ExampleGprSequence, ExampleSlotSequence};
use tibbar_core::seq::{GenCtx, GenItem, Sequence};
use tibbar_core::{GenError, Isa, Result};

/// Owned parts of a generation context for driving funnels directly.
struct Harness {
    isa: Isa,
    rng: StdRng,
    mem: MemoryStore,
    reserver: Reserver,
    exception_address: Option<u64>,
}

impl Harness {
    fn new() -> Self {
        let isa = Isa::new();
        let reserver = Reserver::new(ResourceSpace::from_pools(isa.reservable_resources()));
        Self {
            isa,
            rng: StdRng::seed_from_u64(1),
            mem: MemoryStore::new(
                vec![AddressSegment::new(0x8000_0000, 0x1_0000)],
                Vec::new(),
            ),
            reserver,
            exception_address: None,
        }
    }

    fn with_space(space: ResourceSpace) -> Self {
        let mut harness = Self::new();
        harness.reserver = Reserver::new(space);
        harness
    }

    fn ctx(&mut self) -> GenCtx<'_> {
        GenCtx {
            isa: &self.isa,
            rng: &mut self.rng,
            mem: &mut self.mem,
            reserver: &mut self.reserver,
            pc: 0x8000_0000,
            exception_address: &mut self.exception_address,
        }
    }
}

/// Scripted sequence yielding pre-set data words.
struct Script {
    label: &'static str,
    vals: VecDeque<u64>,
}

impl Script {
    fn new(label: &'static str, vals: &[u64]) -> Self {
        Self {
            label,
            vals: vals.iter().copied().collect(),
        }
    }
}

impl Sequence for Script {
    fn name(&self) -> &str {
        self.label
    }

    fn next_item(&mut self, _ctx: &mut GenCtx<'_>) -> Result<Option<GenItem>> {
        Ok(self.vals.pop_front().map(|v| {
            let mut item = GenItem::instr(0x13, self.label);
            item.data = v;
            item
        }))
    }
}

fn drain(source: &mut dyn ItemSource, harness: &mut Harness) -> Result<Vec<u64>> {
    let mut out = Vec::new();
    loop {
        let mut ctx = harness.ctx();
        match source.next_item(&mut ctx)? {
            Some(item) => out.push(item.data),
            None => return Ok(out),
        }
    }
}

#[test]
fn simple_funnel_concatenates() {
    let mut harness = Harness::new();
    let mut funnel = SimpleFunnel::new();
    let _ = funnel
        .add_sequence(Box::new(Script::new("a", &[1, 2, 3])))
        .add_sequence(Box::new(Script::new("b", &[10, 20])));
    let out = drain(&mut funnel, &mut harness).expect("drains");
    assert_eq!(out, vec![1, 2, 3, 10, 20]);
}

#[test]
fn round_robin_yields_one_item_per_producer_per_round() {
    let mut harness = Harness::new();
    let mut funnel = RoundRobinFunnel::new();
    let _ = funnel
        .add_sequence(Box::new(Script::new("a", &[1, 2, 3])))
        .add_sequence(Box::new(Script::new("b", &[10, 20])));
    let out = drain(&mut funnel, &mut harness).expect("drains");
    assert_eq!(out, vec![1, 10, 2, 20, 3]);
}

#[test]
fn round_robin_interleaves_nested_funnels() {
    let mut harness = Harness::new();
    let mut inner = SimpleFunnel::new();
    let _ = inner.add_sequence(Box::new(Script::new("inner", &[10, 20, 30])));
    let mut funnel = RoundRobinFunnel::new();
    let _ = funnel
        .add_sequence(Box::new(Script::new("a", &[1, 2, 3])))
        .add_funnel(Box::new(inner));
    let out = drain(&mut funnel, &mut harness).expect("drains");
    assert_eq!(out, vec![1, 10, 2, 20, 3, 30]);
}

#[test]
fn conflicting_reservations_recover_after_release() {
    // Both sequences want exclusive GPR 5; the second waits for the first.
    let mut harness = Harness::new();
    let mut funnel = RoundRobinFunnel::with_reserver();
    let _ = funnel
        .add_sequence(Box::new(ExampleGprSequence::new(5)))
        .add_sequence(Box::new(ExampleGprSequence::new(5)));
    let out = drain(&mut funnel, &mut harness).expect("drains");
    // Each sequence yields exactly one item; the total is the sum of both.
    assert_eq!(out.len(), 2);
}

#[test]
fn slot_claims_are_honoured() {
    let mut harness = Harness::new();
    let mut funnel = RoundRobinFunnel::with_reserver();
    let _ = funnel
        .add_sequence(Box::new(ExampleGprSequence::new(1)))
        .add_sequence(Box::new(ExampleSlotSequence::new()));
    let out = drain(&mut funnel, &mut harness).expect("drains");
    assert_eq!(out.len(), 2);
}

#[test]
fn invalid_reservation_request_is_fatal() {
    let mut harness = Harness::new();
    let mut funnel = RoundRobinFunnel::with_reserver();
    let _ = funnel.add_sequence(Box::new(ExampleGprSequence::new(0)));
    let mut ctx = harness.ctx();
    let err = funnel.next_item(&mut ctx).expect_err("x0 is not reservable");
    assert!(matches!(err, GenError::InvalidResourceRequest { .. }));
}

#[test]
fn fully_blocked_round_cannot_progress() {
    // The space only contains GPR 1; both sequences demand GPR 2 forever.
    let mut pools = BTreeMap::new();
    let _ = pools.insert("GPR".to_owned(), vec![ResourceIdent::Index(1)]);
    let mut harness = Harness::with_space(ResourceSpace::from_pools(pools));
    let mut funnel = RoundRobinFunnel::with_reserver();
    let _ = funnel
        .add_sequence(Box::new(ExampleGprSequence::new(2)))
        .add_sequence(Box::new(ExampleGprSequence::new(2)));
    let mut ctx = harness.ctx();
    let err = funnel.next_item(&mut ctx).expect_err("everyone is blocked");
    assert!(matches!(err, GenError::FunnelCannotProgress));
}
