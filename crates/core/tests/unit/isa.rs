//! Instruction-set description tests.

use pretty_assertions::assert_eq;
use rstest::rstest;

use tibbar_core::isa::{CsrAccess, Extension, Format, Isa, TABLE};
use tibbar_core::resource::ResourceIdent;

#[test]
fn every_table_entry_round_trips_through_decode() {
    let isa = Isa::new();
    for desc in TABLE {
        // The all-zero-operand instance of every entry must decode back to
        // the same mnemonic and re-encode to the identical word.
        let word = desc.match_bits;
        let inst = isa
            .decode(word)
            .unwrap_or_else(|| panic!("{} did not decode", desc.mnemonic));
        assert_eq!(inst.desc.mnemonic, desc.mnemonic);
        assert_eq!(inst.encode(), word, "{} re-encode", desc.mnemonic);
    }
}

#[test]
fn operand_fields_round_trip() {
    let isa = Isa::new();
    let addi = isa
        .build("addi")
        .expect("addi exists")
        .rd(1)
        .rs1(2)
        .imm(-5);
    let word = addi.encode();
    let back = isa.decode(word).expect("decodes");
    assert_eq!(back.rd, 1);
    assert_eq!(back.rs1, 2);
    assert_eq!(back.imm, -5);

    let beq = isa
        .build("beq")
        .expect("beq exists")
        .rs1(3)
        .rs2(4)
        .imm(-1024);
    let back = isa.decode(beq.encode()).expect("decodes");
    assert_eq!(back.desc.mnemonic, "beq");
    assert_eq!(back.imm, -1024);

    let jal = isa.build("jal").expect("jal exists").rd(0).imm(0x7_F000);
    let back = isa.decode(jal.encode()).expect("decodes");
    assert_eq!(back.imm, 0x7_F000);

    let sd = isa
        .build("sd")
        .expect("sd exists")
        .rs1(5)
        .rs2(6)
        .imm(2040);
    let back = isa.decode(sd.encode()).expect("decodes");
    assert_eq!(back.imm, 2040);
    assert_eq!(back.desc.mem_bytes, Some(8));
}

#[test]
fn reserved_rounding_modes_do_not_decode() {
    let isa = Isa::new();
    let good = isa.build("fadd.s").expect("fadd.s").rd(1).rs1(2).rs2(3);
    assert!(isa.decode(good.rm(0).encode()).is_some());
    assert!(isa.decode(good.rm(5).encode()).is_none());
    assert!(isa.decode(good.rm(6).encode()).is_none());
    assert!(isa.decode(good.rm(7).encode()).is_some());
}

#[test]
fn group_matching_is_hierarchical() {
    let isa = Isa::new();
    let lw = isa.instr("lw").expect("lw");
    assert!(lw.in_group("memory"));
    assert!(lw.in_group("memory/load"));
    assert!(!lw.in_group("memory/store"));
    assert!(!lw.in_group("mem"));

    let jal = isa.instr("jal").expect("jal");
    assert!(jal.in_group("branch"));
    assert!(jal.in_group("branch/jump"));

    let add = isa.instr("add").expect("add");
    assert!(!add.in_group("memory"));
    assert!(!add.in_group("branch"));

    let fld = isa.instr("fld").expect("fld");
    assert!(fld.in_group("float"));
    assert!(fld.in_group("memory/load"));
}

#[test]
fn operand_introspection_matches_formats() {
    let isa = Isa::new();
    assert_eq!(isa.instr("lw").expect("lw").gpr_dest_operands(), ["rd"]);
    assert_eq!(isa.instr("add").expect("add").gpr_source_operands(), ["rs1", "rs2"]);
    assert_eq!(
        isa.instr("fadd.s").expect("fadd.s").fpr_source_operands(),
        ["rs1", "rs2"]
    );
    assert_eq!(
        isa.instr("fsqrt.d").expect("fsqrt.d").fpr_source_operands(),
        ["rs1"]
    );
    assert_eq!(isa.instr("fsw").expect("fsw").fpr_source_operands(), ["rs2"]);
    assert!(isa.instr("jal").expect("jal").gpr_source_operands().is_empty());
}

#[test]
fn asm_rendering_is_assembler_compatible() {
    let isa = Isa::new();
    let addi = isa.build("addi").expect("addi").rd(1).rs1(0).imm(42);
    assert_eq!(addi.to_asm(), "addi x1, x0, 42");

    let lw = isa.build("lw").expect("lw").rd(5).rs1(2).imm(8);
    assert_eq!(lw.to_asm(), "lw x5, 8(x2)");

    let sw = isa.build("sw").expect("sw").rs1(2).rs2(7).imm(-4);
    assert_eq!(sw.to_asm(), "sw x7, -4(x2)");

    let csrrw = isa.build("csrrw").expect("csrrw").rd(0).rs1(1).csr(0x305);
    assert_eq!(csrrw.to_asm(), "csrrw x0, 0x305, x1");

    let fadd = isa
        .build("fadd.s")
        .expect("fadd.s")
        .rd(1)
        .rs1(2)
        .rs2(3)
        .rm(0);
    assert_eq!(fadd.to_asm(), "fadd.s f1, f2, f3, rne");

    let lui = isa.build("lui").expect("lui").rd(4).imm(0x12345);
    assert_eq!(lui.to_asm(), "lui x4, 0x12345");

    let mret = isa.build("mret").expect("mret");
    assert_eq!(mret.to_asm(), "mret");
}

#[test]
fn unknown_words_do_not_decode() {
    let isa = Isa::new();
    assert!(isa.decode(0xFFFF_FFFF).is_none());
    assert!(isa.decode(0x0000_0000).is_none());
}

#[rstest]
#[case::base_integer("addi", Extension::I)]
#[case::csr_access("csrrw", Extension::Zicsr)]
#[case::single_precision("fadd.s", Extension::F)]
#[case::double_precision("fadd.d", Extension::D)]
#[case::privileged("mret", Extension::Priv)]
fn extensions_partition_the_table(#[case] mnemonic: &str, #[case] extension: Extension) {
    let isa = Isa::new();
    assert_eq!(isa.instr(mnemonic).expect("known mnemonic").extension, extension);
}

#[rstest]
#[case::jump("jal", Some((-(1 << 20), (1 << 20) - 2)))]
#[case::branch("beq", Some((-(1 << 12), (1 << 12) - 2)))]
#[case::not_pc_relative("addi", None)]
fn branch_offset_ranges_match_the_immediates(
    #[case] mnemonic: &str,
    #[case] range: Option<(i64, i64)>,
) {
    let isa = Isa::new();
    assert_eq!(isa.instr(mnemonic).expect("known mnemonic").offset_range(), range);
}

#[test]
fn csr_table_and_causes() {
    let isa = Isa::new();
    assert_eq!(isa.csr_address("mtvec"), Some(0x305));
    assert_eq!(isa.csr_address("mepc"), Some(0x341));
    assert_eq!(isa.csr_address("mscratch"), Some(0x340));
    assert_eq!(isa.csr_address("nonexistent"), None);
    assert_eq!(
        isa.csr_by_address(0xC00).expect("cycle").access,
        CsrAccess::ReadOnly
    );
    assert_eq!(Isa::exception_name(2), Some("illegal_instruction"));
    assert_eq!(Isa::exception_name(5), Some("load_access_fault"));
    assert_eq!(Isa::exception_name(99), None);
}

#[test]
fn reservable_resources_exclude_x0_and_read_only_csrs() {
    let isa = Isa::new();
    let pools = isa.reservable_resources();
    let gprs = pools.get("GPR").expect("GPR namespace");
    assert_eq!(gprs.len(), 31);
    assert!(!gprs.contains(&ResourceIdent::Index(0)));
    let fprs = pools.get("FPR").expect("FPR namespace");
    assert_eq!(fprs.len(), 32);
    let csrs = pools.get("CSR").expect("CSR namespace");
    assert!(csrs.contains(&ResourceIdent::Name("mscratch".to_owned())));
    assert!(!csrs.contains(&ResourceIdent::Name("cycle".to_owned())));
}

#[test]
fn shift_formats_keep_their_shamt_widths() {
    let isa = Isa::new();
    let slli = isa.build("slli").expect("slli").rd(1).rs1(1).shamt(45);
    let back = isa.decode(slli.encode()).expect("decodes");
    assert_eq!(back.shamt, 45);
    assert_eq!(back.desc.format, Format::IShift);

    let slliw = isa.build("slliw").expect("slliw").rd(1).rs1(1).shamt(20);
    let back = isa.decode(slliw.encode()).expect("decodes");
    assert_eq!(back.shamt, 20);
    assert_eq!(back.desc.format, Format::IShiftW);
}
