//! The generator main loop.
//!
//! `Tibbar` interleaves producing and modelling: when the program counter
//! points at placed code it single-steps the architectural model, applying
//! traps and watching for the exit self-loop; when it points at empty memory
//! it pulls the next item from the recipe (or from a relocation episode when
//! contiguous space runs low) and places it. Escape from the configured code
//! banks, loops that never reach the exit, and production without modelling
//! are all detected and reported as fatal errors.

use std::collections::VecDeque;
use std::fmt;
use std::path::Path;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, info_span};

use crate::common::constants::{
    BOOT_SAMPLE_ATTEMPTS, CYCLE_REPEAT_LIMIT, MODEL_STEPS_LIMIT, PRODUCE_LIMIT,
    RECENT_PC_WINDOW, RELOCATE_WINDOW_BYTES,
};
use crate::common::{GenError, Result};
use crate::config::{MemoryLayout, ResolvedLayout};
use crate::emit;
use crate::funnel::{ItemSource, SimpleFunnel};
use crate::isa::Isa;
use crate::mem::{AddressMapper, MemoryAdapter, MemoryStore};
use crate::model::{Changes, Model};
use crate::resource::{Reserver, ResourceSpace};
use crate::seq::program::PROGRAM_END_SEQ;
use crate::seq::{GenCtx, GenItem, Sequence};
use crate::trace::{
    hex_addr, BankDump, BranchDump, DebugDoc, ExecutionSummary, MemAccessDump, MemoryItemDump,
    RegWriteDump, StepRecord,
};

/// A complete generation recipe: the main item stream plus the relocation
/// strategy, which is re-instantiated for every episode.
pub struct RecipeSet {
    /// Start, main and end producers, chained.
    pub stream: SimpleFunnel,
    /// Builds a fresh relocation sequence when space runs low.
    pub relocate: Box<dyn Fn() -> Box<dyn Sequence>>,
}

impl fmt::Debug for RecipeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecipeSet").field("stream", &self.stream).finish_non_exhaustive()
    }
}

/// The instruction-stream generator.
#[derive(Debug)]
pub struct Tibbar {
    isa: Isa,
    rng: StdRng,
    mem: MemoryStore,
    mapper: AddressMapper,
    model: Model,
    reserver: Reserver,
    layout: ResolvedLayout,
    seed: u64,
    pc: u64,
    boot_address: Option<u64>,
    exception_address: Option<u64>,
    exit_address: Option<u64>,
    record_trace: bool,
    steps: Vec<StepRecord>,
    summary: Option<ExecutionSummary>,
}

impl Tibbar {
    /// Builds a generator over a validated memory layout.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::ConfigInvalid`] when the layout does not resolve.
    pub fn new(layout: &MemoryLayout, seed: u64, record_trace: bool) -> Result<Self> {
        let resolved = layout.resolve()?;
        let mut mem = MemoryStore::new(
            resolved.code_segments.clone(),
            resolved.data_segments.clone(),
        );
        mem.reserve_data_region(resolved.data_reserve, 8)?;
        let mapper = AddressMapper::new(
            resolved.code_segments.clone(),
            resolved.data_segments.clone(),
        )?;
        let isa = Isa::new();
        let model = Model::new(&isa);
        let reserver = Reserver::new(ResourceSpace::from_pools(isa.reservable_resources()));
        Ok(Self {
            isa,
            rng: StdRng::seed_from_u64(seed),
            mem,
            mapper,
            model,
            reserver,
            layout: resolved,
            seed,
            pc: 0,
            boot_address: None,
            exception_address: None,
            exit_address: None,
            record_trace,
            steps: Vec::new(),
            summary: None,
        })
    }

    /// The instruction-set description, for recipe construction.
    pub fn isa(&self) -> &Isa {
        &self.isa
    }

    /// The seeded random source, for recipe construction.
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Builds a catalog recipe by name against this generator's ISA and
    /// random source.
    pub fn build_recipe(&mut self, name: &str) -> Option<RecipeSet> {
        crate::suites::build(name, &self.isa, &mut self.rng)
    }

    /// The resolved memory layout.
    pub fn layout(&self) -> &ResolvedLayout {
        &self.layout
    }

    /// Base of the first code bank.
    pub fn load_addr(&self) -> u64 {
        self.layout.load_addr
    }

    /// Sum of the code bank sizes.
    pub fn ram_size(&self) -> u64 {
        self.layout.ram_size
    }

    /// Base of the first pure data bank, when configured.
    pub fn data_region_base(&self) -> Option<u64> {
        self.layout.data_base
    }

    /// The boot address, once generation has started.
    pub fn boot_address(&self) -> Option<u64> {
        self.boot_address
    }

    /// The exit address, once the end sequence has been placed.
    pub fn exit_address(&self) -> Option<u64> {
        self.exit_address
    }

    /// The exception handler address, once installed.
    pub fn exception_address(&self) -> Option<u64> {
        self.exception_address
    }

    /// The termination summary, once generation has finished.
    pub fn summary(&self) -> Option<&ExecutionSummary> {
        self.summary.as_ref()
    }

    /// The memory store, for inspection.
    pub fn mem_store(&self) -> &MemoryStore {
        &self.mem
    }

    /// The address mapper, for inspection.
    pub fn mapper(&self) -> &AddressMapper {
        &self.mapper
    }

    /// Picks the boot address: the configured one when fixed, otherwise a
    /// random 8-aligned spot in the largest code bank with a free window.
    fn choose_boot(&mut self) -> Result<u64> {
        if let Some(boot) = self.layout.boot {
            let boot = boot & !7;
            if self
                .mapper
                .require_code_addr(boot, RELOCATE_WINDOW_BYTES)
                .is_err()
                || !self.mem.check_region_empty(boot, RELOCATE_WINDOW_BYTES)
            {
                return Err(GenError::ConfigInvalid(format!(
                    "boot {boot:#x} does not leave a free {RELOCATE_WINDOW_BYTES}-byte window \
                     inside a code bank"
                )));
            }
            return Ok(boot);
        }
        let seg = self
            .layout
            .code_segments
            .iter()
            .max_by_key(|s| s.size)
            .copied()
            .ok_or_else(|| GenError::ConfigInvalid("no code banks".to_owned()))?;
        if seg.size > RELOCATE_WINDOW_BYTES {
            let max_off = seg.size - RELOCATE_WINDOW_BYTES;
            for _ in 0..BOOT_SAMPLE_ATTEMPTS {
                let addr = (seg.base + self.rng.gen_range(0..=max_off)) & !7;
                if addr >= seg.base && self.mem.check_region_empty(addr, RELOCATE_WINDOW_BYTES) {
                    return Ok(addr);
                }
            }
        }
        Err(GenError::ConfigInvalid(
            "could not find a free boot window; enlarge the code banks or shrink data_reserve"
                .to_owned(),
        ))
    }

    /// Runs the whole generation: boot selection, the produce/execute loop,
    /// and termination.
    ///
    /// # Errors
    ///
    /// Any fatal condition from §failure taxonomy: escape, hangs, overlap,
    /// unmapped placements, funnel starvation.
    pub fn create_test(&mut self, recipe: RecipeSet) -> Result<()> {
        let span = info_span!("tibbar", seed = self.seed);
        let _enter = span.enter();

        let boot = self.choose_boot()?;
        self.mem.reserve_window(boot, RELOCATE_WINDOW_BYTES);
        self.boot_address = Some(boot);
        self.pc = boot;
        info!(boot = format_args!("{boot:#x}"), "created boot");

        let RecipeSet { mut stream, relocate } = recipe;
        let mut relocating: Option<Box<dyn Sequence>> = None;
        let mut steps_since_produce = 0u32;
        let mut produce_since_model = 0u32;
        let mut recent: VecDeque<u64> = VecDeque::with_capacity(RECENT_PC_WINDOW);
        let mut cycle_repeats = 0u32;
        let mut placed_count = 0u64;
        let start = Instant::now();

        loop {
            if self.mem.is_memory_populated(self.pc) {
                let pc_before = self.pc;
                let opc = self.mem.read_from_mem_store(pc_before, 4) as u32;
                self.model.poke_pc(pc_before);
                let changes = {
                    let mut adapter = MemoryAdapter::new(&self.mapper, &mut self.mem);
                    self.model.execute(&self.isa, opc, &mut adapter)
                };

                if let Some(code) = changes.exception_code {
                    debug!(
                        code,
                        name = Isa::exception_name(code).unwrap_or("UNKNOWN"),
                        "instruction excepted"
                    );
                    self.apply_trap(pc_before, code, &changes)?;
                } else {
                    let next = self.model.get_pc();
                    self.require_runtime_pc(next)?;
                    self.pc = next;
                }
                if self.record_trace {
                    self.record_step(pc_before, opc, &changes);
                }

                if self.pc == pc_before {
                    // The self-looping terminator: the test is complete.
                    if self.exit_address.is_none() {
                        self.exit_address = Some(pc_before);
                    }
                    self.finish("exit_reached", Some(pc_before));
                    break;
                }

                if recent.contains(&self.pc) {
                    cycle_repeats += 1;
                    if cycle_repeats > CYCLE_REPEAT_LIMIT {
                        return Err(GenError::HungInLoop {
                            pc: self.pc,
                            detail: "repeated program counters without new code".to_owned(),
                        });
                    }
                } else {
                    cycle_repeats = 0;
                }
                recent.push_back(self.pc);
                if recent.len() > RECENT_PC_WINDOW {
                    let _ = recent.pop_front();
                }

                produce_since_model = 0;
                steps_since_produce += 1;
                if steps_since_produce > MODEL_STEPS_LIMIT {
                    return Err(GenError::HungInLoop {
                        pc: self.pc,
                        detail: "modelling without producing new instructions".to_owned(),
                    });
                }
            } else {
                let free = self.mem.get_free_space(self.pc);
                let mut produced: Option<GenItem> = None;

                if free <= RELOCATE_WINDOW_BYTES || relocating.is_some() {
                    if relocating.is_none() {
                        debug!(
                            free,
                            pc = format_args!("{:#x}", self.pc),
                            "free space low, relocating"
                        );
                        relocating = Some(relocate());
                    }
                    if let Some(seq) = relocating.as_mut() {
                        let mut ctx = GenCtx {
                            isa: &self.isa,
                            rng: &mut self.rng,
                            mem: &mut self.mem,
                            reserver: &mut self.reserver,
                            pc: self.pc,
                            exception_address: &mut self.exception_address,
                        };
                        produced = seq.next_item(&mut ctx)?;
                    }
                    if produced.is_none() {
                        relocating = None;
                    }
                }

                let mut item = match produced {
                    Some(item) => item,
                    None => {
                        let mut ctx = GenCtx {
                            isa: &self.isa,
                            rng: &mut self.rng,
                            mem: &mut self.mem,
                            reserver: &mut self.reserver,
                            pc: self.pc,
                            exception_address: &mut self.exception_address,
                        };
                        match stream.next_item(&mut ctx)? {
                            Some(item) => item,
                            None => {
                                self.finish("generator_exhausted", Some(self.pc));
                                break;
                            }
                        }
                    }
                };

                match item.addr {
                    None => item.addr = Some(self.pc),
                    Some(addr) => {
                        let _ = self
                            .mapper
                            .require_store_addr(addr, u64::from(item.byte_size))?;
                    }
                }
                if let Some(ldst) = item.ldst {
                    let _ = self
                        .mapper
                        .require_store_addr(ldst.addr, u64::from(ldst.size))?;
                }

                let item_addr = item.addr.unwrap_or(self.pc);
                let is_end = item.seq == PROGRAM_END_SEQ;
                self.mem.add_to_mem_store(item)?;
                placed_count += 1;
                if is_end {
                    self.exit_address = Some(item_addr);
                }

                steps_since_produce = 0;
                recent.clear();
                cycle_repeats = 0;
                produce_since_model += 1;
                if produce_since_model > PRODUCE_LIMIT {
                    return Err(GenError::HungGenerator {
                        placements: produce_since_model,
                    });
                }
            }
        }

        let elapsed = start.elapsed().as_secs_f64();
        info!(
            placed = placed_count,
            seconds = format_args!("{elapsed:.1}"),
            "generated testcase"
        );
        Ok(())
    }

    /// Validates a runtime program counter against the code banks.
    fn require_runtime_pc(&self, pc: u64) -> Result<()> {
        if self.mapper.require_code_addr(pc, 4).is_err() {
            return Err(GenError::ControlFlowEscape {
                pc,
                ranges: self.mapper.code_ranges_display(),
            });
        }
        Ok(())
    }

    /// Applies a trap: records the cause in the machine CSRs and vectors the
    /// program counter through `mtvec`.
    fn apply_trap(&mut self, pc_before: u64, code: u64, changes: &Changes) -> Result<()> {
        if let Some(mepc) = self.isa.csr_address("mepc") {
            self.model.poke_csr(mepc, pc_before);
        }
        if let Some(mcause) = self.isa.csr_address("mcause") {
            self.model.poke_csr(mcause, code);
        }
        let mtval_val = changes.memory_accesses.first().map_or(0, |a| a.address);
        if let Some(mtval) = self.isa.csr_address("mtval") {
            self.model.poke_csr(mtval, mtval_val);
        }
        let vector = self
            .isa
            .csr_address("mtvec")
            .and_then(|addr| self.model.peek_csr(addr))
            .unwrap_or(0);
        self.model.poke_pc(vector & !3);
        let next = self.model.get_pc();
        self.require_runtime_pc(next)?;
        self.pc = next;
        Ok(())
    }

    /// Records one execution step for the debug trace.
    fn record_step(&mut self, pc_before: u64, opc: u32, changes: &Changes) {
        let asm = self
            .isa
            .decode(opc)
            .map_or_else(|| "UNDECODABLE_INSTRUCTION".to_owned(), |i| i.to_asm());
        let step = StepRecord {
            pc: hex_addr(pc_before),
            abs_pc: hex_addr(pc_before),
            instr: format!("{opc:#010x}"),
            asm,
            next_pc: hex_addr(self.pc),
            gpr_writes: changes
                .gpr_writes
                .iter()
                .map(|&(r, v)| RegWriteDump {
                    reg: format!("x{r}"),
                    value: format!("{v:#x}"),
                })
                .collect(),
            fpr_writes: changes
                .fpr_writes
                .iter()
                .map(|&(r, v)| RegWriteDump {
                    reg: format!("f{r}"),
                    value: format!("{v:#x}"),
                })
                .collect(),
            csr_writes: changes
                .csr_writes
                .iter()
                .map(|&(addr, v)| RegWriteDump {
                    reg: self
                        .isa
                        .csr_by_address(addr)
                        .map_or_else(|| format!("{addr:#x}"), |c| c.name.to_owned()),
                    value: format!("{v:#x}"),
                })
                .collect(),
            memory_accesses: changes
                .memory_accesses
                .iter()
                .map(|a| MemAccessDump {
                    address: hex_addr(a.address),
                    size: a.size,
                    is_write: a.is_write,
                    value: a.value.map(|v| format!("{v:#x}")),
                })
                .collect(),
            exception_code: changes.exception_code,
            exception_name: changes
                .exception_code
                .and_then(Isa::exception_name)
                .map(str::to_owned),
            branch: changes.branch.map(|b| BranchDump {
                taken: b.taken,
                target: hex_addr(b.target),
            }),
        };
        self.steps.push(step);
    }

    /// Records the termination summary.
    fn finish(&mut self, reason: &str, pc: Option<u64>) {
        self.summary = Some(ExecutionSummary {
            termination_reason: reason.to_owned(),
            termination_pc: pc.map(hex_addr),
            steps_recorded: self.steps.len(),
        });
    }

    /// Writes the assembly file and its companion linker script.
    ///
    /// # Errors
    ///
    /// I/O failures only.
    pub fn write_asm(&self, path: &Path) -> Result<()> {
        let asm = emit::render_asm(
            &self.isa,
            &self.mem,
            &self.mapper,
            &self.layout,
            self.boot_address,
            self.exit_address,
        );
        std::fs::write(path, asm)?;
        let ld = emit::render_linker_script(&self.layout);
        let mut ld_path = path.as_os_str().to_owned();
        ld_path.push(".ld");
        std::fs::write(Path::new(&ld_path), ld)?;
        Ok(())
    }

    /// Builds the full debug document.
    pub fn debug_doc(&self) -> DebugDoc {
        let memory = self
            .mem
            .placed_items()
            .map(|p| {
                (
                    hex_addr(p.addr),
                    MemoryItemDump {
                        data: format!("{:#x}", p.data),
                        byte_size: p.byte_size,
                        seq: p.seq.clone(),
                        comment: p.comment.clone(),
                        is_data: p.is_data,
                        ldst_addr: p.ldst.map(|l| hex_addr(l.addr)),
                        ldst_data: p.ldst.map(|l| format!("{:#x}", l.data)),
                        ldst_size: p.ldst.map(|l| l.size),
                    },
                )
            })
            .collect();
        DebugDoc {
            load_addr: format!("{:#x}", self.layout.load_addr),
            ram_size: format!("{:#x}", self.layout.ram_size),
            boot_address: self.boot_address.map(hex_addr),
            exit_address: self.exit_address.map(hex_addr),
            exception_address: self.exception_address.map(hex_addr),
            memory,
            memory_banks: self
                .layout
                .banks
                .iter()
                .map(|b| BankDump {
                    name: b.name.clone().unwrap_or_default(),
                    base: format!("{:#x}", b.base),
                    size: format!("{:#x}", b.size),
                    code: b.code,
                    data: b.data,
                    access: b.access.clone(),
                })
                .collect(),
            executed_instructions: self.steps.clone(),
            execution_summary: self.summary.clone().unwrap_or(ExecutionSummary {
                termination_reason: "not_run".to_owned(),
                termination_pc: None,
                steps_recorded: 0,
            }),
        }
    }

    /// Writes the debug YAML document.
    ///
    /// # Errors
    ///
    /// I/O and serialisation failures.
    pub fn write_debug_yaml(&self, path: &Path) -> Result<()> {
        let doc = self.debug_doc();
        let text = serde_yaml::to_string(&doc)
            .map_err(|e| GenError::ConfigInvalid(format!("debug yaml: {e}")))?;
        std::fs::write(path, text)?;
        Ok(())
    }
}
