//! Tibbar: a co-simulating instruction-stream generator for 64-bit RISC-V.
//!
//! Given a seed and a memory layout, the generator emits an assembly file and
//! matching linker script describing a self-terminating test program. It
//! provides:
//! 1. **Memory:** Absolute-address bank mapping, a byte store with
//!    gap-finding allocation, and the model-facing memory adapter.
//! 2. **ISA:** A table-driven RV64 I/Zicsr/F/D description with encode,
//!    decode and rendering.
//! 3. **Model:** An architectural single-step executor that co-simulates
//!    every placed instruction as it is generated.
//! 4. **Sequences:** Lazy item producers, resource reservation, and funnels
//!    that compose them.
//! 5. **Generation:** The produce/execute main loop, trap synthesis,
//!    relocation, and the assembly/linker-script writers.

/// Common constants and the error taxonomy.
pub mod common;
/// Memory-layout configuration (YAML model, validation, resolution).
pub mod config;
/// Assembly and linker-script rendering.
pub mod emit;
/// Sequence composition funnels.
pub mod funnel;
/// The generator main loop.
pub mod generator;
/// Instruction-set description.
pub mod isa;
/// Absolute-address memory machinery.
pub mod mem;
/// Architectural single-step executor.
pub mod model;
/// Resource reservation.
pub mod resource;
/// Sequences: lazy producers of generated items.
pub mod seq;
/// The recipe catalog.
pub mod suites;
/// Debug-output document model.
pub mod trace;

/// Fatal error taxonomy; every abort condition in the crate.
pub use common::{GenError, Result};
/// Memory layout loaded from YAML or built in.
pub use config::MemoryLayout;
/// The generator itself; construct with `Tibbar::new`, drive with
/// `create_test`.
pub use generator::{RecipeSet, Tibbar};
/// The instruction-set description.
pub use isa::Isa;
