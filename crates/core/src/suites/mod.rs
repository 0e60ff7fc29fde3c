//! The recipe catalog.
//!
//! Each recipe composes a main funnel of sequences between the default
//! program start and end, and uses the default relocation strategy. Recipes
//! are looked up by name from the command line.

mod float;
mod hazard;
mod ldst;
mod ldst_exception;
mod rel_branching;
mod simple;
mod stress_float;

use rand::rngs::StdRng;

use crate::funnel::SimpleFunnel;
use crate::generator::RecipeSet;
use crate::isa::Isa;
use crate::seq::program::{DefaultProgramEnd, DefaultProgramStart, DefaultRelocate};

/// Names of every available recipe.
pub const RECIPE_NAMES: [&str; 7] = [
    "ldst",
    "rel_branching",
    "simple",
    "float",
    "stress_float",
    "hazard",
    "ldst_exception",
];

/// Builds a recipe by name; `None` for an unknown name.
pub fn build(name: &str, isa: &Isa, rng: &mut StdRng) -> Option<RecipeSet> {
    let main = match name {
        "ldst" => ldst::main_funnel(isa, rng),
        "rel_branching" => rel_branching::main_funnel(isa, rng),
        "simple" => simple::main_funnel(isa, rng),
        "float" => float::main_funnel(isa, rng),
        "stress_float" => stress_float::main_funnel(isa, rng),
        "hazard" => hazard::main_funnel(isa, rng),
        "ldst_exception" => ldst_exception::main_funnel(isa, rng),
        _ => return None,
    };
    Some(scaffold(main))
}

/// Wraps a main funnel in the default start/end/relocate scaffolding.
fn scaffold(main: SimpleFunnel) -> RecipeSet {
    let mut stream = SimpleFunnel::new();
    let _ = stream
        .add_sequence(Box::new(DefaultProgramStart::new()))
        .add_funnel(Box::new(main))
        .add_sequence(Box::new(DefaultProgramEnd::new()));
    RecipeSet {
        stream,
        relocate: Box::new(|| {
            let seq: Box<dyn crate::seq::Sequence> = Box::new(DefaultRelocate::new());
            seq
        }),
    }
}
