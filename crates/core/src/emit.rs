//! Assembly and linker-script rendering.
//!
//! Placed items are grouped into one `.text.bank<i>` section per code bank
//! and one `.data.bank<j>` per pure data bank, with section-relative `.org`
//! directives for gaps. Branch and jump targets get `.L_tgt_<addr>` labels
//! and the source operand is rewritten to use them, so the linker resolves
//! the offsets; a referenced target that was never populated is back-filled
//! with a no-op so the link cannot fail on an undefined symbol.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use crate::config::ResolvedLayout;
use crate::isa::{Format, Isa};
use crate::mem::{AddressMapper, MemoryStore};

/// The canonical no-op encoding (`addi x0, x0, 0`).
const NOP_WORD: u32 = 0x0000_0013;

/// One renderable item.
#[derive(Clone, Debug)]
struct EmitItem {
    addr: u64,
    byte_size: u8,
    data: u64,
    is_data: bool,
}

/// Section role; text sections sort before data sections.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Role {
    Text,
    Data,
}

/// Renders the complete assembly file.
pub fn render_asm(
    isa: &Isa,
    mem: &MemoryStore,
    mapper: &AddressMapper,
    layout: &ResolvedLayout,
    boot: Option<u64>,
    exit: Option<u64>,
) -> String {
    let mut items: Vec<EmitItem> = mem
        .placed_items()
        .map(|p| EmitItem {
            addr: p.addr,
            byte_size: p.byte_size,
            data: p.data,
            is_data: p.is_data,
        })
        .collect();

    // Branch and jump targets, restricted to mapped code space.
    let mut targets: BTreeSet<u64> = BTreeSet::new();
    for item in &items {
        if item.is_data || item.byte_size != 4 {
            continue;
        }
        if let Some(target) = branch_target(isa, item.addr, item.data as u32) {
            if mapper.is_runtime_code(target, 4) {
                let _ = targets.insert(target);
            }
        }
    }

    // Back-fill unpopulated targets with no-ops so every label resolves.
    for &target in &targets {
        if !mem.is_memory_populated(target) {
            items.push(EmitItem {
                addr: target,
                byte_size: 4,
                data: u64::from(NOP_WORD),
                is_data: false,
            });
        }
    }

    let mut labels: BTreeMap<u64, Vec<String>> = BTreeMap::new();
    if let Some(boot) = boot {
        labels.entry(boot).or_default().push("_start".to_owned());
    }
    if let Some(exit) = exit {
        labels.entry(exit).or_default().push("_exit".to_owned());
    }
    for &target in &targets {
        labels
            .entry(target)
            .or_default()
            .push(format!(".L_tgt_{target:x}"));
    }

    // Group items by (role, bank index).
    let mut sections: BTreeMap<(Role, usize), Vec<EmitItem>> = BTreeMap::new();
    for item in items {
        let key = if let Some(idx) = mapper.find_code_segment_index(item.addr, 1) {
            (Role::Text, idx)
        } else if let Some(idx) = mapper.find_data_segment_index(item.addr, 1) {
            (Role::Data, idx)
        } else {
            continue;
        };
        sections.entry(key).or_default().push(item);
    }
    for section in sections.values_mut() {
        section.sort_by_key(|i| i.addr);
    }

    let mut out = String::new();
    let _ = writeln!(out, "# Tibbar - RISC-V instruction stream");
    let _ = writeln!(
        out,
        "# Assemble with: riscv64-unknown-elf-as -march=rv64gc -o test.o test.S"
    );
    let _ = writeln!(out, "#");
    let _ = writeln!(out, "# Load address: {:#x}", layout.load_addr);
    let _ = writeln!(out, "# RAM size: {:#x}", layout.ram_size);
    if let Some(data_base) = layout.data_base {
        let _ = writeln!(out, "# Data region: {data_base:#x}");
    }
    if let Some(boot) = boot {
        let _ = writeln!(out, "# Boot: {boot:#x}");
    }
    if let Some(exit) = exit {
        let _ = writeln!(out, "# Exit: {exit:#x}");
    }
    let _ = writeln!(out);

    let boot_section = boot.and_then(|b| mapper.find_code_segment_index(b, 1));

    for (&(role, idx), section) in &sections {
        let (base, name, align) = match role {
            Role::Text => (
                mapper.code_segments()[idx].base,
                format!(".text.bank{idx}"),
                2,
            ),
            Role::Data => (
                mapper.data_segments()[idx].base,
                format!(".data.bank{idx}"),
                3,
            ),
        };
        let _ = writeln!(out, "  .section {name}");
        let _ = writeln!(out, "  .align {align}");
        if role == Role::Text && boot_section == Some(idx) {
            let _ = writeln!(out, "  .globl _start");
        }
        let _ = writeln!(out);

        let mut cursor = base;
        for item in section {
            if item.addr > cursor {
                let _ = writeln!(out, "  .org {:#x}", item.addr - base);
            }
            cursor = item.addr + u64::from(item.byte_size);
            if let Some(names) = labels.get(&item.addr) {
                for label in names {
                    let _ = writeln!(out, "{label}:");
                }
            }
            let text = render_item(isa, item, &labels);
            let _ = writeln!(out, "  {text}  # {:#010x}", item.addr);
        }
        let _ = writeln!(out);
    }

    out
}

/// Target address of a branch or jump word placed at `addr`, when any.
fn branch_target(isa: &Isa, addr: u64, word: u32) -> Option<u64> {
    let inst = isa.decode(word)?;
    match inst.desc.format {
        Format::B | Format::J => Some(addr.wrapping_add(inst.imm as u64)),
        _ => None,
    }
}

/// Renders one item to its assembly line.
fn render_item(isa: &Isa, item: &EmitItem, labels: &BTreeMap<u64, Vec<String>>) -> String {
    if item.is_data {
        return match item.byte_size {
            8 => format!(".dword {:#018x}", item.data),
            4 => format!(".word {:#010x}", item.data as u32),
            2 => format!(".half {:#06x}", item.data as u16),
            _ => format!(".byte {:#04x}", item.data as u8),
        };
    }
    if item.byte_size != 4 {
        return format!(".dword {:#018x}", item.data);
    }
    let word = item.data as u32;
    let Some(inst) = isa.decode(word) else {
        return format!(".word {word:#010x}");
    };
    // Rewrite pc-relative operands to labels so the linker resolves them.
    if let Some(target) = branch_target(isa, item.addr, word) {
        if let Some(names) = labels.get(&target) {
            if let Some(label) = names.iter().find(|n| n.starts_with(".L_tgt_")) {
                return match inst.desc.format {
                    Format::J => format!("jal x{}, {label}", inst.rd),
                    _ => format!(
                        "{} x{}, x{}, {label}",
                        inst.desc.mnemonic, inst.rs1, inst.rs2
                    ),
                };
            }
        }
    }
    inst.to_asm()
}

/// Renders the companion linker script.
pub fn render_linker_script(layout: &ResolvedLayout) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "/* Tibbar linker script */");
    let _ = writeln!(out, "OUTPUT_ARCH(riscv)");
    let _ = writeln!(out, "ENTRY(_start)");
    let _ = writeln!(out);

    // Named memory regions: code banks then pure data banks, in declaration
    // order.
    let code_banks: Vec<_> = layout.banks.iter().filter(|b| b.code).collect();
    let data_banks: Vec<_> = layout.banks.iter().filter(|b| b.data && !b.code).collect();

    let _ = writeln!(out, "MEMORY");
    let _ = writeln!(out, "{{");
    for (i, bank) in code_banks.iter().enumerate() {
        let _ = writeln!(
            out,
            "  CODE{i} ({access}) : ORIGIN = {base:#x}, LENGTH = {size:#x}",
            access = bank.access,
            base = bank.base,
            size = bank.size
        );
    }
    for (j, bank) in data_banks.iter().enumerate() {
        let _ = writeln!(
            out,
            "  DATA{j} ({access}) : ORIGIN = {base:#x}, LENGTH = {size:#x}",
            access = bank.access,
            base = bank.base,
            size = bank.size
        );
    }
    let _ = writeln!(out, "}}");
    let _ = writeln!(out);

    let _ = writeln!(out, "PHDRS");
    let _ = writeln!(out, "{{");
    let _ = writeln!(out, "  text PT_LOAD FLAGS(5);");
    let _ = writeln!(out, "  data PT_LOAD FLAGS(6);");
    let _ = writeln!(out, "}}");
    let _ = writeln!(out);

    // Fallback home for .data/.bss: the first pure data bank, else the last
    // code bank.
    let data_home = if data_banks.is_empty() {
        format!("CODE{}", code_banks.len().saturating_sub(1))
    } else {
        "DATA0".to_owned()
    };

    let _ = writeln!(out, "SECTIONS");
    let _ = writeln!(out, "{{");
    for i in 0..code_banks.len() {
        let _ = writeln!(
            out,
            "  .text.bank{i} : {{ *(.text.bank{i}) }} > CODE{i} :text"
        );
    }
    for j in 0..data_banks.len() {
        let _ = writeln!(
            out,
            "  .data.bank{j} : {{ *(.data.bank{j}) }} > DATA{j} :data"
        );
    }
    let _ = writeln!(out, "  .text : {{ *(.text) }} > CODE0 :text");
    let _ = writeln!(
        out,
        "  .rodata : {{ *(.rodata) *(.rodata.*) }} > CODE0 :text"
    );
    let _ = writeln!(out, "  .data : {{ *(.data) }} > {data_home} :data");
    let _ = writeln!(out, "  .bss : {{ *(.bss) *(.sbss) }} > {data_home} :data");
    let _ = writeln!(
        out,
        "  __stack_top = ORIGIN({data_home}) + LENGTH({data_home});"
    );
    let _ = writeln!(out, "}}");

    out
}
