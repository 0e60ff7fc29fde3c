//! End-to-end generator scenarios.

use std::collections::VecDeque;

use pretty_assertions::assert_eq;

use tibbar_core::funnel::SimpleFunnel;
use tibbar_core::seq::{GenCtx, GenItem, Sequence};
use tibbar_core::{GenError, MemoryLayout, RecipeSet, Result, Tibbar};

const SINGLE_BANK: &str = "
memory:
  banks:
    - name: RAM
      base: 0x80000000
      size: 0x80000
      code: true
      data: true
      access: rwx
";

const TWO_BANKS: &str = "
memory:
  banks:
    - name: CODE
      base: 0x80000000
      size: 0x40000
      code: true
      data: false
      access: rx
    - name: DATA
      base: 0x80040000
      size: 0x40000
      data: true
      access: rw
";

fn layout(yaml: &str) -> MemoryLayout {
    MemoryLayout::from_yaml_str(yaml).expect("valid layout")
}

/// Runs a catalog recipe and returns the generator plus the rendered
/// assembly and linker script.
fn run(yaml: &str, recipe: &str, seed: u64) -> (Tibbar, String, String) {
    let mut tibbar = Tibbar::new(&layout(yaml), seed, false).expect("generator");
    let recipe = tibbar.build_recipe(recipe).expect("catalog recipe");
    tibbar.create_test(recipe).expect("generation succeeds");
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("test.S");
    tibbar.write_asm(&path).expect("write outputs");
    let asm = std::fs::read_to_string(&path).expect("assembly");
    let ld = std::fs::read_to_string(dir.path().join("test.S.ld")).expect("linker script");
    (tibbar, asm, ld)
}

#[test]
fn single_bank_random_boot_simple() {
    let (tibbar, asm, ld) = run(SINGLE_BANK, "simple", 1);
    assert!(asm.contains("# Load address: 0x80000000"));
    assert!(asm.contains("# RAM size: 0x80000"));
    assert!(asm.contains("# Boot: 0x"));
    assert!(!asm.contains("# Data region:"));
    assert!(asm.contains("_start:"));
    assert!(asm.contains("_exit:"));
    assert!(asm.contains(".text.bank0"));

    assert!(ld.contains("ENTRY(_start)"));
    assert!(ld.contains("CODE0 (rwx)"));
    assert!(ld.contains("PHDRS"));
    assert!(ld.contains("__stack_top"));

    let summary = tibbar.summary().expect("finished");
    assert_eq!(summary.termination_reason, "exit_reached");
    assert!(tibbar.boot_address().is_some());
    assert_eq!(tibbar.exit_address().map(|a| tibbar.mapper().is_runtime_code(a, 4)), Some(true));
}

#[test]
fn split_banks_emit_data_sections() {
    let (tibbar, asm, ld) = run(TWO_BANKS, "ldst", 1);
    assert!(asm.contains("# Data region: 0x80040000"));
    assert!(asm.contains(".text.bank0"));
    assert!(asm.contains(".data.bank0"));
    assert!(ld.contains("CODE0 (rx)"));
    assert!(ld.contains("DATA0 (rw)"));
    assert!(ld.contains(".data.bank0 : { *(.data.bank0) } > DATA0 :data"));
    assert_eq!(tibbar.data_region_base(), Some(0x8004_0000));
    assert_eq!(tibbar.ram_size(), 0x4_0000);
}

#[test]
fn configured_boot_is_used_verbatim() {
    let yaml = "
memory:
  banks:
    - name: RAM
      base: 0x80000000
      size: 0x80000
      code: true
      data: true
      access: rwx
  boot: 0x80000200
";
    let (tibbar, asm, _ld) = run(yaml, "simple", 1);
    assert_eq!(tibbar.boot_address(), Some(0x8000_0200));
    assert!(asm.contains("# Boot: 0x80000200"));
    assert!(asm.contains("_start:"));
}

#[test]
fn boot_at_the_bank_base_is_valid() {
    let yaml = "
memory:
  banks:
    - name: RAM
      base: 0x80000000
      size: 0x80000
      code: true
      data: true
      access: rwx
  boot: 0x80000000
";
    let (tibbar, asm, _ld) = run(yaml, "simple", 1);
    assert_eq!(tibbar.boot_address(), Some(0x8000_0000));
    assert!(asm.contains("# Boot: 0x80000000"));
    assert!(tibbar.exit_address().expect("exit") != 0);
}

#[test]
fn boot_inside_the_reserved_data_carve_is_rejected() {
    // The shared-bank carve occupies the top of the bank; a boot there can
    // never leave a free window.
    let yaml = "
memory:
  banks:
    - name: RAM
      base: 0x80000000
      size: 0x80000
      code: true
      data: true
      access: rwx
  boot: 0x8007f000
";
    let mut tibbar = Tibbar::new(&layout(yaml), 1, false).expect("generator");
    let recipe = tibbar.build_recipe("simple").expect("recipe");
    let err = tibbar.create_test(recipe).expect_err("boot in the data carve");
    assert!(matches!(err, GenError::ConfigInvalid(_)));
}

#[test]
fn multi_bank_addresses_validate_absolutely() {
    let yaml = "
memory:
  banks:
    - { name: CODE0, base: 0x80000000, size: 0x200, code: true, access: rx }
    - { name: DATA0, base: 0x81000000, size: 0x100, data: true, access: rw }
    - { name: CODE1, base: 0x90000000, size: 0x300, code: true, access: rx }
    - { name: DATA1, base: 0x91000000, size: 0x180, data: true, access: rw }
";
    let tibbar = Tibbar::new(&layout(yaml), 1, false).expect("generator");
    assert_eq!(tibbar.ram_size(), 0x500);
    let mapper = tibbar.mapper();
    assert!(mapper.require_code_addr(0x8000_0010, 4).is_ok());
    assert!(mapper.require_code_addr(0x9000_0010, 4).is_ok());
    assert!(mapper.require_store_addr(0x8100_0010, 4).is_ok());
    assert!(mapper.require_store_addr(0x9100_0010, 4).is_ok());
    assert!(mapper.require_store_addr(0x8200_0000, 4).is_err());
}

/// Scripted word stream used by the escape scenario.
struct Words {
    vals: VecDeque<u32>,
}

impl Sequence for Words {
    fn name(&self) -> &str {
        "Unit"
    }

    fn next_item(&mut self, _ctx: &mut GenCtx<'_>) -> Result<Option<GenItem>> {
        Ok(self.vals.pop_front().map(|w| GenItem::instr(w, "Unit")))
    }
}

/// Relocation stub that never emits anything.
struct NoRelocate;

impl Sequence for NoRelocate {
    fn name(&self) -> &str {
        "NoRelocate"
    }

    fn next_item(&mut self, _ctx: &mut GenCtx<'_>) -> Result<Option<GenItem>> {
        Ok(None)
    }
}

#[test]
fn control_flow_escaping_the_code_banks_is_fatal() {
    let mut tibbar = Tibbar::new(&layout(SINGLE_BANK), 0, false).expect("generator");
    let mut stream = SimpleFunnel::new();
    let _ = stream.add_sequence(Box::new(Words {
        // addiw x1, x0, 0x3a0 ; jalr x0, 0(x1) -> absolute 0x3a0, outside
        // the configured bank.
        vals: [0x3A00_009B, 0x0000_8067].into_iter().collect(),
    }));
    let recipe = RecipeSet {
        stream,
        relocate: Box::new(|| {
            let seq: Box<dyn Sequence> = Box::new(NoRelocate);
            seq
        }),
    };
    let err = tibbar.create_test(recipe).expect_err("escape");
    match err {
        GenError::ControlFlowEscape { pc, ranges } => {
            assert_eq!(pc, 0x3A0);
            assert!(ranges.contains("0x80000000"));
        }
        other => panic!("expected a control-flow escape, got: {other}"),
    }
}

#[test]
fn identical_seed_and_config_reproduce_identical_outputs() {
    let (_t1, asm1, ld1) = run(SINGLE_BANK, "simple", 7);
    let (_t2, asm2, ld2) = run(SINGLE_BANK, "simple", 7);
    assert_eq!(asm1, asm2);
    assert_eq!(ld1, ld2);
    // A different seed produces a different program.
    let (_t3, asm3, _ld3) = run(SINGLE_BANK, "simple", 8);
    assert_ne!(asm1, asm3);
}

#[test]
fn float_recipe_reaches_the_exit() {
    let (tibbar, asm, _ld) = run(SINGLE_BANK, "float", 1);
    assert!(asm.contains("_exit:"));
    assert_eq!(
        tibbar.summary().expect("finished").termination_reason,
        "exit_reached"
    );
}

#[test]
fn every_modelled_pc_stayed_inside_the_code_banks() {
    // Escape freedom: generation succeeding is the guarantee; spot-check
    // that every placed code item is inside a code bank too.
    let (tibbar, _asm, _ld) = run(TWO_BANKS, "simple", 3);
    for item in tibbar.mem_store().placed_items() {
        if !item.is_data {
            assert!(
                tibbar
                    .mapper()
                    .is_runtime_code(item.addr, u64::from(item.byte_size)),
                "code item at {:#x} escaped the banks",
                item.addr
            );
        }
    }
}

#[test]
fn debug_document_captures_the_run() {
    let mut tibbar = Tibbar::new(&layout(SINGLE_BANK), 5, true).expect("generator");
    let recipe = tibbar.build_recipe("simple").expect("recipe");
    tibbar.create_test(recipe).expect("generation succeeds");

    let doc = tibbar.debug_doc();
    assert_eq!(doc.load_addr, "0x80000000");
    assert_eq!(doc.ram_size, "0x80000");
    assert!(doc.boot_address.is_some());
    assert!(doc.exit_address.is_some());
    assert!(doc.exception_address.is_some());
    assert!(!doc.memory.is_empty());
    assert!(!doc.executed_instructions.is_empty());
    let first = &doc.executed_instructions[0];
    assert!(first.pc.starts_with("0x"));
    assert_eq!(first.pc, first.abs_pc);
    assert!(first.instr.starts_with("0x"));
    assert!(!first.asm.is_empty());
    assert_eq!(doc.execution_summary.termination_reason, "exit_reached");
    assert_eq!(
        doc.execution_summary.steps_recorded,
        doc.executed_instructions.len()
    );

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("debug.yaml");
    tibbar.write_debug_yaml(&path).expect("write yaml");
    let text = std::fs::read_to_string(&path).expect("yaml");
    assert!(text.contains("boot_address"));
    assert!(text.contains("executed_instructions"));
    assert!(text.contains("execution_summary"));
}

#[test]
fn exhausted_stream_terminates_normally() {
    // A recipe with no end sequence: the loop stops when the stream dries
    // up instead of reaching an exit loop.
    let mut tibbar = Tibbar::new(&layout(SINGLE_BANK), 2, false).expect("generator");
    let mut stream = SimpleFunnel::new();
    let _ = stream.add_sequence(Box::new(Words {
        // Three harmless addi instructions.
        vals: [0x0010_0093, 0x0020_0113, 0x0030_0193].into_iter().collect(),
    }));
    let recipe = RecipeSet {
        stream,
        relocate: Box::new(|| {
            let seq: Box<dyn Sequence> = Box::new(NoRelocate);
            seq
        }),
    };
    tibbar.create_test(recipe).expect("terminates");
    assert_eq!(
        tibbar.summary().expect("summary").termination_reason,
        "generator_exhausted"
    );
}
