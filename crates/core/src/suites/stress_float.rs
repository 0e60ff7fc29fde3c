//! Float stress suite: operand band sweeps and divide/sqrt grids.

use rand::rngs::StdRng;

use crate::funnel::SimpleFunnel;
use crate::isa::Isa;
use crate::seq::float_stress::{
    FloatDivSqrt, StressMultiFprSourceFloatInstrs, StressSingleFprSourceFloatInstrs,
};

/// Alternating single-source and multi-source sweeps with one div/sqrt grid.
pub(super) fn main_funnel(isa: &Isa, _rng: &mut StdRng) -> SimpleFunnel {
    let mut funnel = SimpleFunnel::new();
    for _ in 0..10 {
        let _ = funnel.add_sequence(Box::new(StressSingleFprSourceFloatInstrs::new(isa)));
        let _ = funnel.add_sequence(Box::new(StressMultiFprSourceFloatInstrs::new(isa)));
    }
    let _ = funnel.add_sequence(Box::new(FloatDivSqrt::new()));
    funnel
}
