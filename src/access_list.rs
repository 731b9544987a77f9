//! EIP-2929/2930 warm/cold address and storage-slot tracking.

use ethereum_types::{Address, H256};
use rustc_hash::FxHashSet;

/// EIP-2929 base costs. Several opcodes (BALANCE/EXTCODESIZE/EXTCODEHASH/
/// CALL-family) use these as-is post-Berlin; others (SLOAD) have their own
/// historical base cost that only becomes this value at Berlin — that
/// per-opcode, per-fork blending lives in `gas_cost`, not here.
pub const COLD_ACCOUNT_ACCESS_COST: u64 = 2600;
pub const COLD_SLOAD_COST: u64 = 2100;
pub const WARM_ACCESS_COST: u64 = 100;

#[derive(Debug, Clone, Default)]
pub struct AccessList {
    warm_addresses: FxHashSet<Address>,
    warm_slots: FxHashSet<(Address, H256)>,
}

/// A point-in-time copy, used by the call orchestrator's snapshot/restore
/// protocol around nested calls.
#[derive(Debug, Clone, Default)]
pub struct AccessListSnapshot {
    warm_addresses: FxHashSet<Address>,
    warm_slots: FxHashSet<(Address, H256)>,
}

impl AccessList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `address` warm, returning `true` if it was already warm.
    pub fn mark_address_warm(&mut self, address: Address) -> bool {
        !self.warm_addresses.insert(address)
    }

    pub fn is_address_warm(&self, address: Address) -> bool {
        self.warm_addresses.contains(&address)
    }

    /// Marks `(address, slot)` warm (and `address` itself warm too),
    /// returning `true` if the slot was already warm.
    pub fn mark_slot_warm(&mut self, address: Address, slot: H256) -> bool {
        self.warm_addresses.insert(address);
        !self.warm_slots.insert((address, slot))
    }

    pub fn is_slot_warm(&self, address: Address, slot: H256) -> bool {
        self.warm_slots.contains(&(address, slot))
    }

    /// `access_address(a) -> gas_cost`: literal EIP-2929 constants.
    pub fn access_address(&mut self, address: Address) -> u64 {
        if self.mark_address_warm(address) {
            WARM_ACCESS_COST
        } else {
            COLD_ACCOUNT_ACCESS_COST
        }
    }

    /// `access_storage_slot(a, s) -> gas_cost`: literal EIP-2929 constants.
    pub fn access_storage_slot(&mut self, address: Address, slot: H256) -> u64 {
        if self.mark_slot_warm(address, slot) {
            WARM_ACCESS_COST
        } else {
            COLD_SLOAD_COST
        }
    }

    pub fn pre_warm_addresses(&mut self, addresses: impl IntoIterator<Item = Address>) {
        self.warm_addresses.extend(addresses);
    }

    /// Pre-warms from an EIP-2930 access list: `(address, slots)` pairs.
    pub fn pre_warm_from_access_list(
        &mut self,
        access_list: impl IntoIterator<Item = (Address, Vec<H256>)>,
    ) {
        for (address, slots) in access_list {
            self.warm_addresses.insert(address);
            for slot in slots {
                self.warm_slots.insert((address, slot));
            }
        }
    }

    pub fn snapshot(&self) -> AccessListSnapshot {
        AccessListSnapshot {
            warm_addresses: self.warm_addresses.clone(),
            warm_slots: self.warm_slots.clone(),
        }
    }

    pub fn restore(&mut self, snapshot: AccessListSnapshot) {
        self.warm_addresses = snapshot.warm_addresses;
        self.warm_slots = snapshot.warm_slots;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_touch_is_cold_then_warm() {
        let mut al = AccessList::new();
        let a = Address::repeat_byte(1);
        assert_eq!(al.access_address(a), COLD_ACCOUNT_ACCESS_COST);
        assert_eq!(al.access_address(a), WARM_ACCESS_COST);
    }

    #[test]
    fn slot_access_also_warms_address() {
        let mut al = AccessList::new();
        let a = Address::repeat_byte(2);
        al.access_storage_slot(a, H256::zero());
        assert!(al.is_address_warm(a));
    }

    #[test]
    fn snapshot_restore_roundtrip() {
        let mut al = AccessList::new();
        let a = Address::repeat_byte(3);
        let snap = al.snapshot();
        al.access_address(a);
        assert!(al.is_address_warm(a));
        al.restore(snap);
        assert!(!al.is_address_warm(a));
    }
}
