//! Float suite: random float instructions and branching.

use rand::rngs::StdRng;
use rand::Rng;

use crate::funnel::SimpleFunnel;
use crate::isa::Isa;
use crate::seq::branch::RelativeBranching;
use crate::seq::random::RandomFloatInstrs;

/// Random float bursts, each followed by one branch.
pub(super) fn main_funnel(isa: &Isa, rng: &mut StdRng) -> SimpleFunnel {
    let mut funnel = SimpleFunnel::new();
    for _ in 0..25 {
        let length = rng.gen_range(50..=200);
        let _ = funnel.add_sequence(Box::new(RandomFloatInstrs::new(isa, length)));
        let _ = funnel.add_sequence(Box::new(RelativeBranching::new(isa)));
    }
    funnel
}
