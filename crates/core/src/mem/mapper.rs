//! Absolute-address bank mapping.
//!
//! A pure predicate/locator over immutable segment lists. Every runtime
//! address the generator places or the model touches is re-validated here, so
//! the checks stay cheap and allocation-free on the success path.

use crate::common::{GenError, Result};

/// One absolute-address bank segment, the half-open range `[base, base+size)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddressSegment {
    /// Absolute base address.
    pub base: u64,
    /// Size in bytes; always non-zero.
    pub size: u64,
}

impl AddressSegment {
    /// Creates a segment from a base and size.
    pub const fn new(base: u64, size: u64) -> Self {
        Self { base, size }
    }

    /// Exclusive end of the segment.
    pub const fn hi(&self) -> u64 {
        self.base + self.size
    }

    /// True when `[addr, addr+size)` lies fully inside this segment.
    pub fn contains(&self, addr: u64, size: u64) -> bool {
        self.base <= addr
            && addr
                .checked_add(size)
                .is_some_and(|end| end <= self.hi())
    }
}

/// Absolute-address validator/locator for code and data banks.
#[derive(Clone, Debug)]
pub struct AddressMapper {
    code_segments: Vec<AddressSegment>,
    data_segments: Vec<AddressSegment>,
}

impl AddressMapper {
    /// Builds a mapper from code and data segments.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::ConfigInvalid`] when no code segment is given.
    pub fn new(
        code_segments: Vec<AddressSegment>,
        data_segments: Vec<AddressSegment>,
    ) -> Result<Self> {
        if code_segments.is_empty() {
            return Err(GenError::ConfigInvalid(
                "no configured code regions".to_owned(),
            ));
        }
        Ok(Self {
            code_segments,
            data_segments,
        })
    }

    /// The configured code segments.
    pub fn code_segments(&self) -> &[AddressSegment] {
        &self.code_segments
    }

    /// The configured data segments.
    pub fn data_segments(&self) -> &[AddressSegment] {
        &self.data_segments
    }

    /// Base of the first code segment.
    pub fn code_base(&self) -> u64 {
        self.code_segments[0].base
    }

    /// Total code bytes across all segments.
    pub fn code_size(&self) -> u64 {
        self.code_segments.iter().map(|s| s.size).sum()
    }

    /// True when any pure data segment is configured.
    pub fn has_data(&self) -> bool {
        !self.data_segments.is_empty()
    }

    /// Finds the code segment fully containing `[addr, addr+size)`.
    pub fn find_code_segment(&self, addr: u64, size: u64) -> Option<&AddressSegment> {
        self.code_segments.iter().find(|s| s.contains(addr, size))
    }

    /// Finds the data segment fully containing `[addr, addr+size)`.
    pub fn find_data_segment(&self, addr: u64, size: u64) -> Option<&AddressSegment> {
        self.data_segments.iter().find(|s| s.contains(addr, size))
    }

    /// Index of the containing code segment, for section assignment.
    pub fn find_code_segment_index(&self, addr: u64, size: u64) -> Option<usize> {
        self.code_segments.iter().position(|s| s.contains(addr, size))
    }

    /// Index of the containing data segment, for section assignment.
    pub fn find_data_segment_index(&self, addr: u64, size: u64) -> Option<usize> {
        self.data_segments.iter().position(|s| s.contains(addr, size))
    }

    /// True when the range is executable at runtime.
    pub fn is_runtime_code(&self, addr: u64, size: u64) -> bool {
        self.find_code_segment(addr, size).is_some()
    }

    /// True when the range is a runtime data location.
    pub fn is_runtime_data(&self, addr: u64, size: u64) -> bool {
        self.find_data_segment(addr, size).is_some()
    }

    /// Requires `[addr, addr+size)` to lie inside a code segment.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::OutOfCodeBank`] otherwise.
    pub fn require_code_addr(&self, addr: u64, size: u64) -> Result<u64> {
        if self.find_code_segment(addr, size).is_some() {
            Ok(addr)
        } else {
            Err(GenError::OutOfCodeBank { addr, size })
        }
    }

    /// Requires `[addr, addr+size)` to lie inside a code *or* data segment.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::OutsideMappedBanks`] naming every mapped range.
    pub fn require_store_addr(&self, addr: u64, size: u64) -> Result<u64> {
        if self.find_code_segment(addr, size).is_some()
            || self.find_data_segment(addr, size).is_some()
        {
            return Ok(addr);
        }
        Err(GenError::OutsideMappedBanks {
            addr,
            size,
            code_ranges: ranges_display(&self.code_segments),
            data_ranges: if self.data_segments.is_empty() {
                "(none)".to_owned()
            } else {
                ranges_display(&self.data_segments)
            },
        })
    }

    /// Display form of the code ranges, for escape diagnostics.
    pub fn code_ranges_display(&self) -> String {
        ranges_display(&self.code_segments)
    }
}

/// Renders segments as `[0x…, 0x…), …` for diagnostics.
fn ranges_display(segments: &[AddressSegment]) -> String {
    segments
        .iter()
        .map(|s| format!("[{:#x}, {:#x})", s.base, s.hi()))
        .collect::<Vec<_>>()
        .join(", ")
}
