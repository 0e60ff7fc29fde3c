//! Bridge between the memory store and the architectural model.
//!
//! The model never touches the store directly: every load and store is
//! re-validated against the address mapper here, and a rejection surfaces as
//! a memory fault for the model to turn into an access-fault exception.

use crate::common::constants::strobe_for_size;
use crate::mem::{AddressMapper, MemoryStore};
use crate::model::{MemFault, ModelMemory};

/// The model-facing view of the store, with bounds enforcement.
#[derive(Debug)]
pub struct MemoryAdapter<'a> {
    mapper: &'a AddressMapper,
    store: &'a mut MemoryStore,
}

impl<'a> MemoryAdapter<'a> {
    /// Creates an adapter over a mapper and store.
    pub fn new(mapper: &'a AddressMapper, store: &'a mut MemoryStore) -> Self {
        Self { mapper, store }
    }
}

impl ModelMemory for MemoryAdapter<'_> {
    fn load(&mut self, addr: u64, size: u64) -> Result<u64, MemFault> {
        if self.mapper.require_store_addr(addr, size).is_err() {
            return Err(MemFault);
        }
        Ok(self.store.read_from_mem_store(addr, size))
    }

    fn store(&mut self, addr: u64, value: u64, size: u64) -> Result<(), MemFault> {
        if self.mapper.require_store_addr(addr, size).is_err() {
            return Err(MemFault);
        }
        let strobe = strobe_for_size(size as u8).ok_or(MemFault)?;
        self.store.write_to_mem_store(addr, value, strobe);
        Ok(())
    }
}
