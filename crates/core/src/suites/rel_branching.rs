//! Relative-branching-heavy suite.

use rand::rngs::StdRng;
use rand::Rng;

use crate::funnel::SimpleFunnel;
use crate::isa::Isa;
use crate::seq::branch::RelativeBranching;
use crate::seq::random::RandomSafeInstrs;

/// Short safe bursts with ten branches after each.
pub(super) fn main_funnel(isa: &Isa, rng: &mut StdRng) -> SimpleFunnel {
    let mut funnel = SimpleFunnel::new();
    for _ in 0..100 {
        let length = rng.gen_range(1..=5);
        let _ = funnel.add_sequence(Box::new(RandomSafeInstrs::new(isa, length)));
        for _ in 0..10 {
            let _ = funnel.add_sequence(Box::new(RelativeBranching::new(isa)));
        }
    }
    funnel
}
