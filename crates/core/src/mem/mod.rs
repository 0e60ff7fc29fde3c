//! Absolute-address memory machinery.
//!
//! This module owns physical placement for the whole generator. It provides:
//! 1. **Mapping:** Pure validation of absolute addresses against the
//!    configured code and data banks.
//! 2. **Storage:** The bank-aware byte store, placed-item records, and the
//!    gap-finding allocator.
//! 3. **Bridging:** The adapter that exposes the store to the architectural
//!    model with bounds enforcement on every access.

/// Adapter between the store and the model's memory interface.
pub mod adapter;

/// Absolute-address segment mapping and validation.
pub mod mapper;

/// Byte-addressable store and allocator.
pub mod store;

pub use adapter::MemoryAdapter;
pub use mapper::{AddressMapper, AddressSegment};
pub use store::{AllocRequest, LdstInfo, MemoryStore, PlacedItem, Purpose};
