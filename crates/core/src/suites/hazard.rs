//! Hazard suite: writer/reader pairs between safe bursts and memory traffic.

use rand::rngs::StdRng;

use crate::funnel::SimpleFunnel;
use crate::isa::Isa;
use crate::seq::hazard::Hazards;
use crate::seq::ldst::{Load, Store};
use crate::seq::loadgpr::SetGprs;
use crate::seq::random::RandomSafeInstrs;

/// Register initialisation, safe bursts, hazard pairs, then memory traffic.
pub(super) fn main_funnel(isa: &Isa, _rng: &mut StdRng) -> SimpleFunnel {
    let mut funnel = SimpleFunnel::new();
    for _ in 0..25 {
        let _ = funnel.add_sequence(Box::new(SetGprs::new()));
        let _ = funnel.add_sequence(Box::new(RandomSafeInstrs::new(isa, 10)));
        let _ = funnel.add_sequence(Box::new(Hazards::new(isa)));
        for _ in 0..10 {
            let _ = funnel.add_sequence(Box::new(Load::new(isa)));
            let _ = funnel.add_sequence(Box::new(Store::new(isa)));
        }
    }
    funnel
}
