//! Memory-layout configuration tests.

use pretty_assertions::assert_eq;
use rstest::rstest;

use tibbar_core::common::constants::DEFAULT_DATA_RESERVE;
use tibbar_core::{GenError, MemoryLayout};

const ONE_BANK: &str = "
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

#[test]
fn one_bank_code_and_data() {
    let layout = MemoryLayout::from_yaml_str(ONE_BANK).expect("valid config");
    assert_eq!(layout.banks.len(), 1);
    assert_eq!(layout.data_reserve, DEFAULT_DATA_RESERVE);
    assert_eq!(layout.boot, None); // omitted => randomised
    let bank = &layout.banks[0];
    assert_eq!(bank.name.as_deref(), Some("RAM"));
    assert_eq!(bank.base, 0x8000_0000);
    assert_eq!(bank.size, 0x8_0000);
    assert!(bank.code);
    assert!(bank.data);
    assert_eq!(bank.access, "rwx");

    let resolved = layout.resolve().expect("resolves");
    assert_eq!(resolved.load_addr, 0x8000_0000);
    assert_eq!(resolved.ram_size, 0x8_0000);
    assert_eq!(resolved.data_base, None);
    assert!(resolved.data_segments.is_empty());
}

#[test]
fn two_banks_split_code_and_data() {
    let layout = MemoryLayout::from_yaml_str(TWO_BANKS).expect("valid config");
    let resolved = layout.resolve().expect("resolves");
    assert_eq!(resolved.load_addr, 0x8000_0000);
    assert_eq!(resolved.ram_size, 0x4_0000);
    assert_eq!(resolved.data_base, Some(0x8004_0000));
    assert_eq!(resolved.code_segments.len(), 1);
    assert_eq!(resolved.data_segments.len(), 1);
}

#[test]
fn integers_accept_decimal_and_hex_strings() {
    let layout = MemoryLayout::from_yaml_str(
        "
memory:
  banks:
    - base: \"0x90000000\"
      size: 524288
      code: true
  data_reserve: \"0x20000\"
  boot: \"0x90000100\"
",
    )
    .expect("valid config");
    assert_eq!(layout.banks[0].base, 0x9000_0000);
    assert_eq!(layout.banks[0].size, 0x8_0000);
    assert_eq!(layout.data_reserve, 0x2_0000);
    assert_eq!(layout.boot, Some(0x9000_0100));
    // Unnamed banks get generated names.
    assert_eq!(layout.banks[0].name.as_deref(), Some("bank0"));
}

#[test]
fn multi_non_contiguous_banks_resolve_absolutely() {
    let layout = MemoryLayout::from_yaml_str(
        "
memory:
  banks:
    - { name: CODE0, base: 0x80000000, size: 0x200, code: true, access: rx }
    - { name: DATA0, base: 0x81000000, size: 0x100, data: true, access: rw }
    - { name: CODE1, base: 0x90000000, size: 0x300, code: true, access: rx }
    - { name: DATA1, base: 0x91000000, size: 0x180, data: true, access: rw }
",
    )
    .expect("valid config");
    let resolved = layout.resolve().expect("resolves");
    assert_eq!(resolved.ram_size, 0x500);
    assert_eq!(resolved.code_segments.len(), 2);
    assert_eq!(resolved.data_segments.len(), 2);
    assert_eq!(resolved.data_base, Some(0x8100_0000));
}

#[rstest]
#[case::no_code_bank(
    "
memory:
  banks:
    - { name: DATA, base: 0x80000000, size: 0x1000, data: true }
",
    "code: true"
)]
#[case::zero_sized_bank(
    "
memory:
  banks:
    - { name: RAM, base: 0x80000000, size: 0, code: true }
",
    "size must be > 0"
)]
#[case::wrapping_bank(
    "
memory:
  banks:
    - { name: RAM, base: 0xFFFFFFFFFFFFF000, size: 0x2000, code: true }
",
    "wraps"
)]
#[case::invalid_access_letter(
    "
memory:
  banks:
    - { name: RAM, base: 0x80000000, size: 0x1000, code: true, access: rq }
",
    "invalid access letter"
)]
#[case::overlapping_banks(
    "
memory:
  banks:
    - { name: A, base: 0x80000000, size: 0x2000, code: true }
    - { name: B, base: 0x80001000, size: 0x2000, data: true }
",
    "overlap"
)]
#[case::boot_outside_code(
    "
memory:
  banks:
    - { name: RAM, base: 0x80000000, size: 0x1000, code: true }
  boot: 0x90000000
",
    "boot"
)]
fn invalid_layouts_are_rejected(#[case] yaml: &str, #[case] message: &str) {
    let err = MemoryLayout::from_yaml_str(yaml).expect_err("layout must be rejected");
    assert!(matches!(err, GenError::ConfigInvalid(_)));
    assert!(
        err.to_string().contains(message),
        "diagnostic '{err}' does not mention '{message}'"
    );
}

#[test]
fn access_strings_are_case_insensitive() {
    let layout = MemoryLayout::from_yaml_str(
        "
memory:
  banks:
    - { name: RAM, base: 0x80000000, size: 0x1000, code: true, access: \" RWX \" }
",
    )
    .expect("normalised");
    assert_eq!(layout.banks[0].access, "rwx");
}

#[test]
fn built_in_layout_matches_the_documented_defaults() {
    let layout = MemoryLayout::built_in();
    let resolved = layout.resolve().expect("resolves");
    assert_eq!(resolved.load_addr, 0x8000_0000);
    assert_eq!(resolved.ram_size, 0x4_0000);
    assert_eq!(resolved.data_base, Some(0x8004_0000));
    assert_eq!(layout.boot, Some(0x8000_0100));
}

#[test]
fn empty_document_is_rejected() {
    assert!(MemoryLayout::from_yaml_str("").is_err());
    assert!(MemoryLayout::from_yaml_str("memory: {}").is_err());
}
