//! Byte store and allocator tests.

use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;

use tibbar_core::mem::{AddressSegment, AllocRequest, MemoryStore};
use tibbar_core::seq::GenItem;
use tibbar_core::GenError;

const CODE_BASE: u64 = 0x8000_0000;
const CODE_SIZE: u64 = 0x8_0000;

fn single_bank_store() -> MemoryStore {
    MemoryStore::new(vec![AddressSegment::new(CODE_BASE, CODE_SIZE)], Vec::new())
}

fn rng() -> StdRng {
    StdRng::seed_from_u64(1)
}

#[test]
fn read_after_masked_write_returns_the_value() {
    let mut store = single_bank_store();
    store.write_to_mem_store(CODE_BASE + 0x40, 0xDEAD_BEEF, 0xFFFF_FFFF);
    assert_eq!(store.read_from_mem_store(CODE_BASE + 0x40, 4), 0xDEAD_BEEF);
    // Wider reads zero-extend past the written lanes.
    assert_eq!(store.read_from_mem_store(CODE_BASE + 0x40, 8), 0xDEAD_BEEF);
    // A strobe only touches its own lanes.
    store.write_to_mem_store(CODE_BASE + 0x40, 0x11, 0xFF);
    assert_eq!(store.read_from_mem_store(CODE_BASE + 0x40, 4), 0xDEAD_BE11);
}

#[test]
fn placements_may_not_overlap() {
    let mut store = single_bank_store();
    let first = GenItem::instr(0x13, "t").with_addr(CODE_BASE + 0x10);
    store.add_to_mem_store(first).expect("first placement");
    let second = GenItem::instr(0x13, "t").with_addr(CODE_BASE + 0x12);
    let err = store.add_to_mem_store(second).expect_err("overlap");
    assert!(matches!(err, GenError::OverlapViolation { .. }));
    // A placement after the first item is fine.
    let third = GenItem::instr(0x13, "t").with_addr(CODE_BASE + 0x14);
    store.add_to_mem_store(third).expect("adjacent placement");
}

#[test]
fn items_without_an_address_are_rejected() {
    let mut store = single_bank_store();
    let err = store
        .add_to_mem_store(GenItem::instr(0x13, "t"))
        .expect_err("no address");
    assert!(matches!(err, GenError::UnplacedItem { .. }));
}

#[test]
fn associated_ldst_data_is_placed_first() {
    let mut store = single_bank_store();
    store.reserve_data_region(0x1000, 8).expect("reserve");
    let data_base = store.data_region_base().expect("arena");
    let item = GenItem::instr(0x13, "t")
        .with_addr(CODE_BASE + 0x20)
        .with_ldst(data_base, 0x1234_5678_9ABC_DEF0, 8);
    store.add_to_mem_store(item).expect("placement");
    assert!(store.is_memory_populated(data_base));
    assert_eq!(
        store.read_from_mem_store(data_base, 8),
        0x1234_5678_9ABC_DEF0
    );
    assert_eq!(store.placed_len(), 2);
}

#[test]
fn shared_bank_reserve_carves_the_top_of_the_code_bank() {
    let mut store = single_bank_store();
    store.reserve_data_region(0x4_0000, 8).expect("reserve");
    assert_eq!(store.data_region_base(), Some(CODE_BASE + 0x4_0000));
    assert_eq!(store.data_region_size(), 0x4_0000);
}

#[test]
fn reserve_data_region_is_idempotent() {
    let mut store = single_bank_store();
    store.reserve_data_region(0x1000, 8).expect("first");
    let base = store.data_region_base();
    let size = store.data_region_size();
    store.reserve_data_region(0x800, 8).expect("second is a no-op");
    assert_eq!(store.data_region_base(), base);
    assert_eq!(store.data_region_size(), size);
}

#[test]
fn pure_data_banks_become_the_arenas() {
    let mut store = MemoryStore::new(
        vec![AddressSegment::new(CODE_BASE, 0x4_0000)],
        vec![AddressSegment::new(0x8004_0000, 0x4_0000)],
    );
    store.reserve_data_region(0x4_0000, 8).expect("reserve");
    assert_eq!(store.data_region_base(), Some(0x8004_0000));
    // The code bank keeps its full span for code.
    assert!(store.check_region_empty(CODE_BASE, 0x4_0000));
}

#[test]
fn data_allocation_bumps_and_aligns() {
    let mut store = single_bank_store();
    store.reserve_data_region(0x1000, 8).expect("reserve");
    let base = store.data_region_base().expect("arena");
    let a = store.allocate_data_region(12, 8).expect("first");
    let b = store.allocate_data_region(8, 8).expect("second");
    assert_eq!(a, base);
    assert_eq!(b, base + 16); // 12 rounded up to the next 8-aligned cursor
    assert_eq!(b % 8, 0);
}

#[test]
fn data_allocation_fails_when_the_arena_is_full() {
    let mut store = single_bank_store();
    store.reserve_data_region(0x20, 8).expect("reserve");
    assert!(store.allocate_data_region(0x18, 8).is_some());
    assert!(store.allocate_data_region(0x18, 8).is_none());
}

#[test]
fn code_allocation_respects_alignment_and_min_start() {
    let mut store = single_bank_store();
    let mut rng = rng();
    let base = store
        .allocate(
            &AllocRequest::code(64).align(16).min_start(CODE_BASE + 0x111),
            &mut rng,
        )
        .expect("allocation");
    assert_eq!(base % 16, 0);
    assert!(base >= CODE_BASE + 0x111);
    assert!(base + 64 <= CODE_BASE + CODE_SIZE);
}

#[test]
fn code_allocations_do_not_collide() {
    let mut store = single_bank_store();
    let mut rng = rng();
    let mut seen: Vec<(u64, u64)> = Vec::new();
    for _ in 0..64 {
        let base = store
            .allocate(&AllocRequest::code(48), &mut rng)
            .expect("allocation");
        for &(lo, hi) in &seen {
            assert!(base + 48 <= lo || base >= hi, "allocations overlap");
        }
        seen.push((base, base + 48));
    }
}

#[test]
fn within_window_with_one_candidate_returns_it() {
    let mut store = single_bank_store();
    let mut rng = rng();
    let pc = CODE_BASE;
    // Fill everything except one aligned slot inside the window.
    store.reserve_window(CODE_BASE, 0x100);
    store.reserve_window(CODE_BASE + 0x110, CODE_SIZE - 0x110);
    let base = store
        .allocate(
            &AllocRequest::code(16).align(4).within(pc, (0x100, 0x10c)),
            &mut rng,
        )
        .expect("the single candidate");
    assert_eq!(base, CODE_BASE + 0x100);
}

#[test]
fn within_window_out_of_reach_fails() {
    let mut store = single_bank_store();
    let mut rng = rng();
    // The window sits entirely below the bank.
    let pc = CODE_BASE;
    assert!(store
        .allocate(
            &AllocRequest::code(16).align(4).within(pc, (-0x1000, -0x800)),
            &mut rng,
        )
        .is_none());
}

#[test]
fn check_region_empty_tracks_reservations_and_banks() {
    let mut store = single_bank_store();
    assert!(store.check_region_empty(CODE_BASE + 0x100, 0x40));
    assert!(!store.check_region_empty(0x7000_0000, 4)); // outside every bank
    store.reserve_window(CODE_BASE + 0x100, 0x40);
    assert!(!store.check_region_empty(CODE_BASE + 0x120, 8));
    assert!(store.check_region_empty(CODE_BASE + 0x140, 8));
}

#[test]
fn free_space_stops_at_placed_items_and_arenas() {
    let mut store = single_bank_store();
    store.reserve_data_region(0x4_0000, 8).expect("reserve");
    let arena = store.data_region_base().expect("arena");

    // Nothing placed: free space runs to the arena.
    assert_eq!(store.get_free_space(CODE_BASE), arena - CODE_BASE);

    let item = GenItem::instr(0x13, "t").with_addr(CODE_BASE + 0x40);
    store.add_to_mem_store(item).expect("placement");
    assert_eq!(store.get_free_space(CODE_BASE), 0x40);

    // Populated and out-of-bank addresses have no free space.
    assert_eq!(store.get_free_space(CODE_BASE + 0x40), 0);
    assert_eq!(store.get_free_space(0x7000_0000), 0);
    // Inside the data arena there is never code space.
    assert_eq!(store.get_free_space(arena + 8), 0);
}

#[test]
fn code_reservations_do_not_block_free_space() {
    let mut store = single_bank_store();
    store.reserve_window(CODE_BASE + 0x20, 0x40);
    // Linear flow may run through a pending code reservation.
    assert!(store.get_free_space(CODE_BASE) > 0x60);
}
