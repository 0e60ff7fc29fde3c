//! Absolute-address bank mapping tests.

use pretty_assertions::assert_eq;

use tibbar_core::mem::{AddressMapper, AddressSegment, MemoryAdapter, MemoryStore};
use tibbar_core::model::ModelMemory;
use tibbar_core::GenError;

fn mapper() -> AddressMapper {
    AddressMapper::new(
        vec![AddressSegment::new(0x8000_0000, 0x4_0000)],
        vec![AddressSegment::new(0x8004_0000, 0x4_0000)],
    )
    .expect("valid mapper")
}

#[test]
fn require_code_addr_accepts_code_address() {
    let mapper = mapper();
    assert_eq!(mapper.require_code_addr(0x8000_0120, 4).expect("code"), 0x8000_0120);
}

#[test]
fn require_store_addr_accepts_code_and_data() {
    let mapper = mapper();
    assert_eq!(
        mapper.require_store_addr(0x8000_0018, 8).expect("code"),
        0x8000_0018
    );
    assert_eq!(
        mapper.require_store_addr(0x8004_0018, 8).expect("data"),
        0x8004_0018
    );
}

#[test]
fn rejects_out_of_range_store() {
    let mapper = mapper();
    let err = mapper
        .require_store_addr(0x9000_0000, 4)
        .expect_err("outside every bank");
    assert!(matches!(err, GenError::OutsideMappedBanks { .. }));
    assert!(err.to_string().contains("outside mapped banks"));
}

#[test]
fn range_straddling_a_segment_end_is_rejected() {
    let mapper = mapper();
    // The last four bytes of the code bank are fine; crossing the end is not.
    assert!(mapper.require_code_addr(0x8003_FFFC, 4).is_ok());
    assert!(mapper.require_code_addr(0x8003_FFFE, 4).is_err());
}

#[test]
fn multi_code_banks_validate_absolutely() {
    let mapper = AddressMapper::new(
        vec![
            AddressSegment::new(0x8000_0000, 0x100),
            AddressSegment::new(0x9000_0000, 0x100),
        ],
        Vec::new(),
    )
    .expect("valid mapper");
    assert_eq!(mapper.require_code_addr(0x8000_0040, 4).expect("bank 0"), 0x8000_0040);
    assert_eq!(mapper.require_code_addr(0x9000_0040, 4).expect("bank 1"), 0x9000_0040);
    let err = mapper
        .require_code_addr(0x8800_0000, 4)
        .expect_err("between the banks");
    assert!(matches!(err, GenError::OutOfCodeBank { .. }));
}

#[test]
fn segment_index_lookup() {
    let mapper = AddressMapper::new(
        vec![
            AddressSegment::new(0x8000_0000, 0x100),
            AddressSegment::new(0x9000_0000, 0x100),
        ],
        vec![AddressSegment::new(0xA000_0000, 0x80)],
    )
    .expect("valid mapper");
    assert_eq!(mapper.find_code_segment_index(0x8000_0010, 1), Some(0));
    assert_eq!(mapper.find_code_segment_index(0x9000_0010, 1), Some(1));
    assert_eq!(mapper.find_data_segment_index(0xA000_0010, 1), Some(0));
    assert_eq!(mapper.find_data_segment_index(0xA100_0010, 1), None);
}

#[test]
fn no_code_segments_is_invalid() {
    let err = AddressMapper::new(Vec::new(), Vec::new()).expect_err("no code regions");
    assert!(matches!(err, GenError::ConfigInvalid(_)));
}

#[test]
fn adapter_enforces_bounds_and_reads_live_bytes() {
    let mapper = AddressMapper::new(
        vec![AddressSegment::new(0x8000_0000, 0x100)],
        vec![AddressSegment::new(0x8001_0000, 0x100)],
    )
    .expect("valid mapper");
    let mut store = MemoryStore::new(
        vec![AddressSegment::new(0x8000_0000, 0x100)],
        vec![AddressSegment::new(0x8001_0000, 0x100)],
    );
    store.write_to_mem_store(0x8000_0020, 0xAB, 0xFF);
    store.write_to_mem_store(0x8001_0010, 0xCD, 0xFF);

    let mut adapter = MemoryAdapter::new(&mapper, &mut store);
    assert_eq!(adapter.load(0x8000_0020, 1).expect("code load"), 0xAB);
    assert_eq!(adapter.load(0x8001_0010, 1).expect("data load"), 0xCD);
    assert!(adapter.load(0x7000_0000, 1).is_err());
    assert!(adapter.store(0x7000_0000, 0, 1).is_err());

    adapter.store(0x8001_0020, 0x1122, 2).expect("data store");
    drop(adapter);
    assert_eq!(store.read_from_mem_store(0x8001_0020, 2), 0x1122);
}
