//! Bank-aware byte-addressable memory store and allocator.
//!
//! The store owns every physical placement the generator makes. It keeps:
//! 1. **Placed items:** An address-ordered record of every instruction and
//!    data word, with producer tags for the assembly writer.
//! 2. **Live bytes:** The byte image the architectural model reads and writes
//!    through the memory adapter.
//! 3. **Used ranges:** The merged union of placements and reservations, which
//!    drives gap-finding allocation.
//! 4. **Data arenas:** Bump-allocated regions for loadable data, either the
//!    configured pure data banks or a carve at the top of the last code bank.

use std::collections::{BTreeMap, HashMap};

use rand::rngs::StdRng;
use rand::Rng;
use tracing::debug;

use crate::common::constants::{strobe_for_size, ALLOC_PC_CANDIDATES};
use crate::common::{GenError, Result};
use crate::mem::mapper::AddressSegment;
use crate::seq::GenItem;

/// Associated load/store data carried by a placed instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LdstInfo {
    /// Absolute address the data must occupy before execution.
    pub addr: u64,
    /// The data value.
    pub data: u64,
    /// Size of the data in bytes (1, 2, 4 or 8).
    pub size: u8,
}

/// One finalised byte range in the store.
#[derive(Clone, Debug)]
pub struct PlacedItem {
    /// Absolute address.
    pub addr: u64,
    /// Size in bytes (1, 2, 4 or 8).
    pub byte_size: u8,
    /// Encoded instruction or raw data word.
    pub data: u64,
    /// Producer tag.
    pub seq: String,
    /// Optional human-readable note for the assembly output.
    pub comment: Option<String>,
    /// True for loadable data, false for an instruction.
    pub is_data: bool,
    /// Associated pre-populated load/store data, when any.
    pub ldst: Option<LdstInfo>,
}

/// What an allocation will hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Purpose {
    /// Instruction bytes inside a code segment.
    Code,
    /// Loadable data inside a data arena.
    Data,
}

/// Parameters of one allocation.
#[derive(Clone, Copy, Debug)]
pub struct AllocRequest {
    /// Minimum usable bytes.
    pub min_size: u64,
    /// Required base alignment.
    pub align: u64,
    /// Code or data placement.
    pub purpose: Purpose,
    /// Program counter used to bias candidate selection and anchor `within`.
    pub pc: Option<u64>,
    /// Lowest acceptable base address.
    pub min_start: Option<u64>,
    /// Relative reach window `(min_off, max_off)` around `pc`, in bytes;
    /// the range a branch immediate can cover.
    pub within: Option<(i64, i64)>,
}

impl AllocRequest {
    /// A code allocation with default 8-byte alignment.
    pub const fn code(min_size: u64) -> Self {
        Self {
            min_size,
            align: 8,
            purpose: Purpose::Code,
            pc: None,
            min_start: None,
            within: None,
        }
    }

    /// A data allocation with default 8-byte alignment.
    pub const fn data(min_size: u64) -> Self {
        Self {
            min_size,
            align: 8,
            purpose: Purpose::Data,
            pc: None,
            min_start: None,
            within: None,
        }
    }

    /// Overrides the base alignment.
    pub const fn align(mut self, align: u64) -> Self {
        self.align = align;
        self
    }

    /// Biases candidate selection towards `pc`.
    pub const fn near(mut self, pc: u64) -> Self {
        self.pc = Some(pc);
        self
    }

    /// Restricts the base to addresses at or above `min_start`.
    pub const fn min_start(mut self, min_start: u64) -> Self {
        self.min_start = Some(min_start);
        self
    }

    /// Restricts the base to `[pc+min_off, pc+max_off]`.
    pub const fn within(mut self, pc: u64, window: (i64, i64)) -> Self {
        self.pc = Some(pc);
        self.within = Some(window);
        self
    }
}

/// One bump-allocated data arena.
#[derive(Clone, Copy, Debug)]
struct DataArena {
    base: u64,
    size: u64,
    next: u64,
}

impl DataArena {
    const fn hi(&self) -> u64 {
        self.base + self.size
    }
}

/// Bank-aware byte-addressable store with gap-finding allocation.
#[derive(Debug)]
pub struct MemoryStore {
    code_segments: Vec<AddressSegment>,
    data_segments: Vec<AddressSegment>,
    /// Placed items, ordered by address. Item byte ranges never overlap.
    placed: BTreeMap<u64, PlacedItem>,
    /// The byte image the model observes.
    live: HashMap<u64, u8>,
    /// Sorted, non-overlapping `[lo, hi)` union of placements and
    /// reservations.
    used: Vec<(u64, u64)>,
    /// Bump arenas for loadable data.
    arenas: Vec<DataArena>,
    data_reserved: bool,
}

impl MemoryStore {
    /// Creates an empty store over the given absolute regions.
    pub fn new(code_segments: Vec<AddressSegment>, data_segments: Vec<AddressSegment>) -> Self {
        Self {
            code_segments,
            data_segments,
            placed: BTreeMap::new(),
            live: HashMap::new(),
            used: Vec::new(),
            arenas: Vec::new(),
            data_reserved: false,
        }
    }

    /// The configured code segments.
    pub fn code_segments(&self) -> &[AddressSegment] {
        &self.code_segments
    }

    /// The configured pure data segments.
    pub fn data_segments(&self) -> &[AddressSegment] {
        &self.data_segments
    }

    /// Ordered view of every placed item.
    pub fn placed_items(&self) -> impl Iterator<Item = &PlacedItem> {
        self.placed.values()
    }

    /// Number of placed items.
    pub fn placed_len(&self) -> usize {
        self.placed.len()
    }

    /// Start of the first data arena, when data has been reserved.
    pub fn data_region_base(&self) -> Option<u64> {
        self.arenas.first().map(|a| a.base)
    }

    /// Total bytes across all data arenas.
    pub fn data_region_size(&self) -> u64 {
        self.arenas.iter().map(|a| a.size).sum()
    }

    /// Reserves the loadable-data arena. Idempotent.
    ///
    /// With configured pure data banks, those banks become the arenas and no
    /// code space is consumed. Otherwise `size` bytes are carved from the
    /// high end of the last code segment and recorded as used.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::ConfigInvalid`] when the carve does not fit inside
    /// the last code segment.
    pub fn reserve_data_region(&mut self, size: u64, align: u64) -> Result<()> {
        if self.data_reserved {
            return Ok(());
        }
        if self.data_segments.is_empty() {
            let last = self.code_segments[self.code_segments.len() - 1];
            let base = last.hi().saturating_sub(size) & !(align - 1);
            if base < last.base || base >= last.hi() {
                return Err(GenError::ConfigInvalid(format!(
                    "data reserve of {size:#x} bytes does not fit in code bank \
                     [{:#x}, {:#x})",
                    last.base,
                    last.hi()
                )));
            }
            let size = last.hi() - base;
            self.insert_used_range(base, base + size);
            self.arenas.push(DataArena {
                base,
                size,
                next: base,
            });
        } else {
            self.arenas = self
                .data_segments
                .iter()
                .map(|s| DataArena {
                    base: s.base,
                    size: s.size,
                    next: s.base,
                })
                .collect();
        }
        self.data_reserved = true;
        Ok(())
    }

    /// Marks `[start, start+size)` as used without placing an item.
    pub fn reserve_window(&mut self, start: u64, size: u64) {
        self.insert_used_range(start, start.saturating_add(size));
    }

    /// Inserts a range into the merged used set.
    fn insert_used_range(&mut self, start: u64, end: u64) {
        if start >= end {
            return;
        }
        let idx = self.used.partition_point(|&(s, _)| s < start);
        self.used.insert(idx, (start, end));
        let mut i = idx.saturating_sub(1);
        while i + 1 < self.used.len() {
            if self.used[i + 1].0 <= self.used[i].1 {
                self.used[i].1 = self.used[i].1.max(self.used[i + 1].1);
                let _ = self.used.remove(i + 1);
            } else {
                i += 1;
                if i > idx {
                    break;
                }
            }
        }
    }

    /// True when `[start, end)` intersects any used range.
    fn overlaps_used(&self, start: u64, end: u64) -> bool {
        // Ranges are sorted and disjoint, so ends are sorted too; binary
        // search for the first range that ends after `start`.
        let idx = self.used.partition_point(|&(_, e)| e <= start);
        idx < self.used.len() && self.used[idx].0 < end
    }

    /// True when `[addr, addr+end)` intersects any placed item.
    fn overlaps_placed(&self, addr: u64, end: u64) -> bool {
        if let Some((&prev, item)) = self.placed.range(..addr).next_back() {
            if prev + u64::from(item.byte_size) > addr {
                return true;
            }
        }
        self.placed.range(addr..end).next().is_some()
    }

    /// True when the range lies inside a mapped bank and is entirely
    /// unreserved.
    pub fn check_region_empty(&self, addr: u64, size: u64) -> bool {
        if size == 0 {
            return false;
        }
        let Some(end) = addr.checked_add(size) else {
            return false;
        };
        let mapped = self
            .code_segments
            .iter()
            .chain(self.data_segments.iter())
            .any(|s| s.contains(addr, size));
        mapped && !self.overlaps_used(addr, end)
    }

    /// True when the byte at `addr` has been written.
    pub fn is_memory_populated(&self, addr: u64) -> bool {
        self.live.contains_key(&addr)
    }

    /// Little-endian read of up to eight live bytes, zero-extended.
    pub fn read_from_mem_store(&self, addr: u64, size: u64) -> u64 {
        let size = size.min(8);
        let mut dword = 0u64;
        for byte in 0..size {
            let b = self.live.get(&(addr + byte)).copied().unwrap_or(0);
            dword |= u64::from(b) << (8 * byte);
        }
        dword
    }

    /// Per-byte masked write into the live image.
    pub fn write_to_mem_store(&mut self, addr: u64, data: u64, strobe: u64) {
        for i in 0..8u64 {
            if (strobe >> (i * 8)) & 0xFF != 0 {
                let _ = self.live.insert(addr + i, (data >> (8 * i)) as u8);
            }
        }
    }

    /// Inserts a generated item at its finalised address.
    ///
    /// Any associated load/store data is placed first, recursively. The item
    /// may land inside a reserved window, but never on top of another placed
    /// item.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::UnplacedItem`] when the address was never set,
    /// [`GenError::OverlapViolation`] on a collision with an existing item,
    /// and [`GenError::UnsupportedItemSize`] for a size with no byte strobe.
    pub fn add_to_mem_store(&mut self, item: GenItem) -> Result<()> {
        let addr = item.addr.ok_or_else(|| GenError::UnplacedItem {
            seq: item.seq.clone(),
        })?;

        if let Some(ldst) = item.ldst {
            let data_item = GenItem::data_word(ldst.data, ldst.size, ldst.addr, item.seq.clone())
                .with_comment(format!(
                    "Load data for instruction at {addr:#x} (data={:#x}, size={})",
                    ldst.data, ldst.size
                ));
            self.add_to_mem_store(data_item)?;
        }

        let end = addr + u64::from(item.byte_size);
        if self.overlaps_placed(addr, end) {
            return Err(GenError::OverlapViolation { addr, end });
        }
        let strobe = strobe_for_size(item.byte_size)
            .ok_or(GenError::UnsupportedItemSize {
                size: item.byte_size,
            })?;

        debug!(addr = format_args!("{addr:#x}"), seq = %item.seq, "placing item");

        let data = item.data;
        let placed = PlacedItem {
            addr,
            byte_size: item.byte_size,
            data,
            seq: item.seq,
            comment: item.comment,
            is_data: item.is_data,
            ldst: item.ldst,
        };
        let _ = self.placed.insert(addr, placed);
        self.insert_used_range(addr, end);
        self.write_to_mem_store(addr, data, strobe);
        Ok(())
    }

    /// Contiguous free bytes at `pc` before the next blocking boundary.
    ///
    /// Code reservations (pending branch targets, relocation blocks) do not
    /// block: linear flow is allowed to run through them. Placed items and
    /// data arenas do. Returns 0 when `pc` is outside every code segment,
    /// already populated, or inside a data arena.
    pub fn get_free_space(&self, pc: u64) -> u64 {
        let Some(seg) = self.code_segments.iter().find(|s| s.contains(pc, 1)) else {
            return 0;
        };
        if self.is_memory_populated(pc) {
            return 0;
        }
        let mut limit = seg.hi();
        if let Some((&next, _)) = self.placed.range(pc..).next() {
            limit = limit.min(next);
        }
        for arena in &self.arenas {
            if arena.base <= pc && pc < arena.hi() {
                return 0;
            }
            if arena.base >= pc {
                limit = limit.min(arena.base);
            }
        }
        limit - pc
    }

    /// Allocates a block for code or data.
    ///
    /// Data allocations bump from the arena cursors. Code allocations
    /// enumerate free gaps in every code segment, filter them through the
    /// request's alignment, `min_start` and `within` constraints, then pick
    /// uniformly; when a program counter is supplied, the pick is uniform
    /// among the nearest candidates instead. Returns `None` when nothing
    /// satisfies the request; that is a retryable condition for the caller.
    pub fn allocate(&mut self, req: &AllocRequest, rng: &mut StdRng) -> Option<u64> {
        match req.purpose {
            Purpose::Data => self.allocate_data_block(req.min_size, req.align),
            Purpose::Code => {
                let mut candidates = self.collect_code_candidates(req, req.pc);
                if candidates.is_empty() && req.pc.is_some() {
                    // One unbiased retry before giving up.
                    candidates = self.collect_code_candidates(req, None);
                }
                if candidates.is_empty() {
                    return None;
                }
                let base = if let Some(pc) = req.pc {
                    candidates.sort_by_key(|&c| (c.abs_diff(pc), c));
                    candidates.truncate(ALLOC_PC_CANDIDATES);
                    candidates[rng.gen_range(0..candidates.len())]
                } else {
                    candidates[rng.gen_range(0..candidates.len())]
                };
                self.insert_used_range(base, base + req.min_size);
                Some(base)
            }
        }
    }

    /// Bump-allocates from the first data arena with room.
    pub fn allocate_data_region(&mut self, size: u64, align: u64) -> Option<u64> {
        self.allocate_data_block(size, align)
    }

    fn allocate_data_block(&mut self, size: u64, align: u64) -> Option<u64> {
        for arena in &mut self.arenas {
            let base = align_up(arena.next, align);
            if base.checked_add(size).is_some_and(|end| end <= arena.hi()) {
                arena.next = base + size;
                return Some(base);
            }
        }
        None
    }

    /// Free gaps of a code segment, in ascending order.
    fn segment_gaps(&self, seg: AddressSegment) -> Vec<(u64, u64)> {
        let mut gaps = Vec::new();
        let mut prev = seg.base;
        let start = self.used.partition_point(|&(_, e)| e <= seg.base);
        for &(s, e) in &self.used[start..] {
            if s >= seg.hi() {
                break;
            }
            if s > prev {
                gaps.push((prev, s.min(seg.hi())));
            }
            prev = prev.max(e);
            if prev >= seg.hi() {
                break;
            }
        }
        if prev < seg.hi() {
            gaps.push((prev, seg.hi()));
        }
        gaps
    }

    /// Candidate base addresses across every code segment.
    fn collect_code_candidates(&self, req: &AllocRequest, pc: Option<u64>) -> Vec<u64> {
        let mut candidates: Vec<u64> = Vec::new();
        for seg in &self.code_segments {
            for (gap_start, gap_end) in self.segment_gaps(*seg) {
                if gap_end - gap_start < req.min_size {
                    continue;
                }
                let aligned = align_up(gap_start, req.align);
                if let Some((min_off, max_off)) = req.within {
                    // The window is anchored on the program counter; without
                    // one there is nothing to reach from.
                    let Some(pc) = pc else { continue };
                    if aligned + req.min_size > gap_end {
                        continue;
                    }
                    let win_lo = saturating_offset(pc, min_off);
                    let win_hi = saturating_offset(pc, max_off);
                    let lo = aligned.max(win_lo);
                    let hi = (gap_end - req.min_size).min(win_hi);
                    if lo <= hi {
                        let cand = align_up(lo, req.align);
                        if cand <= hi && cand + req.min_size <= gap_end {
                            candidates.push(cand);
                        }
                    }
                } else {
                    let mut start_cand = aligned;
                    if let Some(min_start) = req.min_start {
                        if start_cand < min_start {
                            start_cand = align_up(min_start, req.align);
                        }
                    }
                    if start_cand
                        .checked_add(req.min_size)
                        .is_some_and(|end| end <= gap_end)
                    {
                        candidates.push(start_cand);
                        // A second candidate as close to the program counter
                        // as the gap allows.
                        let hi = gap_end - req.min_size;
                        if let Some(pc) = pc {
                            if hi > start_cand {
                                let near = align_up(pc.clamp(start_cand, hi), req.align);
                                if near >= start_cand && near <= hi {
                                    candidates.push(near);
                                }
                            }
                        }
                    }
                }
            }
        }
        if let Some(min_start) = req.min_start {
            candidates.retain(|&c| c >= min_start);
        }
        candidates.sort_unstable();
        candidates.dedup();
        candidates
    }
}

/// Rounds `value` up to the next multiple of `align`.
fn align_up(value: u64, align: u64) -> u64 {
    if align <= 1 {
        value
    } else {
        value.div_ceil(align) * align
    }
}

/// Adds a signed offset to an unsigned address, clamping at zero.
fn saturating_offset(base: u64, off: i64) -> u64 {
    if off >= 0 {
        base.saturating_add(off as u64)
    } else {
        base.saturating_sub(off.unsigned_abs())
    }
}
