//! Load/store-heavy suite.

use rand::rngs::StdRng;

use crate::funnel::SimpleFunnel;
use crate::isa::Isa;
use crate::seq::ldst::{Load, Store};

/// Many load/store pairs, nothing else.
pub(super) fn main_funnel(isa: &Isa, _rng: &mut StdRng) -> SimpleFunnel {
    let mut funnel = SimpleFunnel::new();
    for _ in 0..25 {
        for _ in 0..20 {
            let _ = funnel.add_sequence(Box::new(Load::new(isa)));
            let _ = funnel.add_sequence(Box::new(Store::new(isa)));
        }
    }
    funnel
}
