//! Persistent storage (delegated to the host, current/original tiers for
//! SSTORE's net-gas accounting) and transient storage (EIP-1153).

use crate::host::{Host, HostError};
use ethereum_types::{Address, H256, U256};
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Default)]
pub struct Storage {
    /// Value at the start of the current transaction for every
    /// `(address, slot)` touched so far. Populated lazily on first access;
    /// never changes again once written (spec invariant).
    original: FxHashMap<(Address, H256), U256>,
    /// EIP-1153: per-contract, cleared at transaction end, never persisted.
    transient: FxHashMap<(Address, H256), U256>,
}

impl Storage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value is always the host's (the host *is* the in-memory map
    /// when no external backend is plugged in). First access also seeds
    /// `original` for this `(address, slot)`.
    pub fn sload(
        &mut self,
        host: &mut dyn Host,
        address: Address,
        slot: H256,
    ) -> Result<U256, HostError> {
        let value = host.get_storage(address, slot)?;
        self.original.entry((address, slot)).or_insert(value);
        Ok(value)
    }

    /// Returns the original (start-of-tx) value without touching the host,
    /// if it has already been observed this transaction.
    pub fn original(&self, address: Address, slot: H256) -> Option<U256> {
        self.original.get(&(address, slot)).copied()
    }

    pub fn sstore(
        &mut self,
        host: &mut dyn Host,
        address: Address,
        slot: H256,
        new_value: U256,
    ) -> Result<(), HostError> {
        if !self.original.contains_key(&(address, slot)) {
            // First touch of this slot in the transaction: the gas-cost
            // model needs the pre-SSTORE value, which SSTORE's own handler
            // must have already fetched via `sload` before charging gas —
            // this just guards against a handler that skipped that step.
            let current = host.get_storage(address, slot)?;
            self.original.insert((address, slot), current);
        }
        host.set_storage(address, slot, new_value)
    }

    pub fn tload(&self, address: Address, slot: H256) -> U256 {
        self.transient
            .get(&(address, slot))
            .copied()
            .unwrap_or_default()
    }

    pub fn tstore(&mut self, address: Address, slot: H256, value: U256) {
        self.transient.insert((address, slot), value);
    }

    /// Called once at transaction end (EIP-1153).
    pub fn clear_transient(&mut self) {
        self.transient.clear();
    }

    /// Full copy of the transient map, for the call orchestrator's
    /// snapshot/restore protocol around nested calls.
    pub fn snapshot_transient(&self) -> FxHashMap<(Address, H256), U256> {
        self.transient.clone()
    }

    pub fn restore_transient(&mut self, snapshot: FxHashMap<(Address, H256), U256>) {
        self.transient = snapshot;
    }

    /// Snapshot of the `original` map's key set, consulted by the call
    /// orchestrator's revert protocol — `original` itself is never rolled
    /// back (it must stay stable for the whole tx), but an orchestrator
    /// snapshot only needs to know which keys existed at snapshot time to
    /// restore `current` values correctly on revert (handled by the
    /// substate, which snapshots storage values it has touched).
    pub fn original_keys(&self) -> impl Iterator<Item = &(Address, H256)> {
        self.original.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::InMemoryDatabase;

    #[test]
    fn sload_seeds_original_once() {
        let mut db = InMemoryDatabase::new();
        let mut storage = Storage::new();
        let addr = Address::repeat_byte(1);
        db.set_storage(addr, H256::zero(), U256::from(100)).unwrap();

        storage.sload(&mut db, addr, H256::zero()).unwrap();
        assert_eq!(storage.original(addr, H256::zero()), Some(U256::from(100)));

        storage
            .sstore(&mut db, addr, H256::zero(), U256::from(200))
            .unwrap();
        // original must not move even though current changed.
        assert_eq!(storage.original(addr, H256::zero()), Some(U256::from(100)));
    }

    #[test]
    fn transient_is_isolated_from_persistent() {
        let mut storage = Storage::new();
        let addr = Address::repeat_byte(2);
        storage.tstore(addr, H256::zero(), U256::from(7));
        assert_eq!(storage.tload(addr, H256::zero()), U256::from(7));
        storage.clear_transient();
        assert_eq!(storage.tload(addr, H256::zero()), U256::zero());
    }
}
