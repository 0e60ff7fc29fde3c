//! Load-exception suite: faulting loads, stores, and branching.

use rand::rngs::StdRng;

use crate::funnel::SimpleFunnel;
use crate::isa::Isa;
use crate::seq::branch::RelativeBranching;
use crate::seq::ldst::{LoadException, Store};

/// Faulting loads interleaved with stores, with occasional branches.
pub(super) fn main_funnel(isa: &Isa, _rng: &mut StdRng) -> SimpleFunnel {
    let mut funnel = SimpleFunnel::new();
    for _ in 0..25 {
        for _ in 0..50 {
            let _ = funnel.add_sequence(Box::new(LoadException::new(isa)));
            let _ = funnel.add_sequence(Box::new(Store::new(isa)));
        }
        let _ = funnel.add_sequence(Box::new(RelativeBranching::new(isa)));
    }
    funnel
}
