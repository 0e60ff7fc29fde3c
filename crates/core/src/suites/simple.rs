//! Simple suite: random safe instruction bursts and relative branching.

use rand::rngs::StdRng;
use rand::Rng;

use crate::funnel::SimpleFunnel;
use crate::isa::Isa;
use crate::seq::branch::RelativeBranching;
use crate::seq::random::RandomSafeInstrs;

/// Variable-length safe bursts, each followed by one branch.
pub(super) fn main_funnel(isa: &Isa, rng: &mut StdRng) -> SimpleFunnel {
    let mut funnel = SimpleFunnel::new();
    for _ in 0..25 {
        let length = rng.gen_range(1..=100);
        let _ = funnel.add_sequence(Box::new(RandomSafeInstrs::new(isa, length)));
        let _ = funnel.add_sequence(Box::new(RelativeBranching::new(isa)));
    }
    funnel
}
